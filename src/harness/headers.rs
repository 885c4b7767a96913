//! Status and header rewriting.

use async_trait::async_trait;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;

use super::{BodyReader, BodyTransfer, BodyWriter, Harness};

/// Overrides the status code and corrupts or strips response headers while
/// leaving the body alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HeaderHarness {
    /// Status sent instead of the origin's.
    pub status: Option<u16>,
    /// Headers inserted (replacing any origin values).
    pub set: BTreeMap<String, String>,
    /// Headers removed before `set` is applied.
    pub remove: Vec<String>,
}

#[async_trait]
impl Harness for HeaderHarness {
    fn write_header(&self, status: StatusCode, headers: &mut HeaderMap) -> StatusCode {
        for name in &self.remove {
            match HeaderName::from_bytes(name.as_bytes()) {
                Ok(name) => {
                    headers.remove(&name);
                }
                Err(_) => tracing::warn!(header = %name, "Skipping invalid header name"),
            }
        }

        for (name, value) in &self.set {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping invalid header"),
            }
        }

        match self.status.map(StatusCode::from_u16) {
            Some(Ok(overridden)) => overridden,
            Some(Err(_)) => {
                tracing::warn!(status = ?self.status, "Ignoring invalid status override");
                status
            }
            None => status,
        }
    }

    async fn write_body(&self, _dst: &mut BodyWriter, _src: &mut BodyReader) -> io::Result<BodyTransfer> {
        Ok(BodyTransfer::Declined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/plain".parse().unwrap());
        headers.insert("content-length", "2".parse().unwrap());
        headers
    }

    #[test]
    fn test_rewrites_status_and_headers() {
        let harness: HeaderHarness = serde_json::from_str(
            r#"{"status": 503, "set": {"content-type": "application/garbage"}, "remove": ["content-length"]}"#,
        )
        .unwrap();

        let mut headers = origin_headers();
        let status = harness.write_header(StatusCode::OK, &mut headers);

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(headers.get("content-type").unwrap(), "application/garbage");
        assert!(headers.get("content-length").is_none());
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let harness = HeaderHarness {
            status: Some(42),
            set: BTreeMap::from([("bad header".to_string(), "x".to_string())]),
            remove: vec!["also bad".to_string()],
        };

        let mut headers = origin_headers();
        let status = harness.write_header(StatusCode::CREATED, &mut headers);

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers, origin_headers());
    }
}
