//! Request URI rewriting.
//!
//! # Responsibilities
//! - Point an inbound URI at the upstream target
//! - Strip the mount prefix and join the remaining path onto the target's
//!   base path with exactly one slash
//! - Merge the target's query with the request's
//!
//! # Design Decisions
//! - Pure: the director never touches headers or bodies
//! - Paths are joined as raw (already percent-encoded) strings

use hyper::Uri;
use url::{Position, Url};

/// Rewrites inbound request URIs onto a single upstream target.
#[derive(Debug, Clone)]
pub struct Director {
    target: Url,
    prefix: Option<String>,
}

impl Director {
    /// Director for `target`, stripping `prefix` from inbound paths when set.
    pub fn new(target: Url, prefix: Option<String>) -> Self {
        let prefix = prefix.filter(|p| !p.is_empty());
        Self { target, prefix }
    }

    /// The upstream origin.
    pub fn target(&self) -> &Url {
        &self.target
    }

    /// The mount prefix stripped from inbound paths.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Rewrite `uri` to address the target.
    pub fn rewrite(&self, uri: &Uri) -> Result<Uri, hyper::http::uri::InvalidUri> {
        let path = single_joining_slash(self.target.path(), self.strip_prefix(uri.path()));
        let query = join_query(self.target.query().unwrap_or(""), uri.query().unwrap_or(""));

        let origin = &self.target[..Position::AfterPort];
        let rewritten = if query.is_empty() {
            format!("{}{}", origin, path)
        } else {
            format!("{}{}?{}", origin, path, query)
        };

        rewritten.parse()
    }

    fn strip_prefix<'a>(&self, path: &'a str) -> &'a str {
        match &self.prefix {
            Some(prefix) => path.strip_prefix(prefix.as_str()).unwrap_or(path),
            None => path,
        }
    }
}

/// Join two path segments so exactly one `/` separates them.
pub fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) => format!("{}/{}", a, b),
        _ => format!("{}{}", a, b),
    }
}

fn join_query(target: &str, request: &str) -> String {
    if target.is_empty() || request.is_empty() {
        format!("{}{}", target, request)
    } else {
        format!("{}&{}", target, request)
    }
}
