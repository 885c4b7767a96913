//! Vendor media type parsing.

use regex::Regex;
use std::sync::LazyLock;

static RESOURCE_MEDIA_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\Aapplication/vnd\.danger-room\.([\w\-]+)\+json").expect("static pattern"));

/// Extract `<name>` from `application/vnd.danger-room.<name>+json`.
///
/// Parameters after the media type (`; charset=utf-8`) are ignored.
pub fn resource_type(content_type: &str) -> Option<&str> {
    RESOURCE_MEDIA_TYPE
        .captures(content_type)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
}

/// The media type a resource type is posted with.
pub fn media_type_for(resource_type: &str) -> String {
    format!("application/vnd.danger-room.{}+json", resource_type)
}
