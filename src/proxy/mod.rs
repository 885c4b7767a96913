//! Proxy engine.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → director.rs (URI onto the target, mount prefix stripped)
//!     → headers.rs (hop-by-hop stripped, X-Forwarded-For appended)
//!     → client.rs (upstream call)
//!     → headers.rs (hop-by-hop stripped from the origin response)
//!     → harness status decision
//!     → body.rs / flush.rs (body transfer task → client)
//! ```
//!
//! # Design Decisions
//! - Request bodies are streamed to the origin, never buffered
//! - Upstream failures become a 500 with a one-line diagnostic; no retries
//! - Target and director are fixed for the life of a proxy; only the
//!   harness can change

pub mod body;
pub mod client;
pub mod director;
pub mod engine;
pub mod flush;
pub mod headers;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::error::Error as _;

pub use client::{build_client, shared_client, supports_scheme, UpstreamClient};
pub use director::Director;
pub use engine::{ActiveHarness, Proxy};

/// Failure to get a response out of the origin.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid upstream uri: {0}")]
    Rewrite(#[from] hyper::http::uri::InvalidUri),

    #[error("proxy error: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

impl ProxyError {
    /// The error and its causes on one line.
    pub fn diagnostic(&self) -> String {
        let mut line = self.to_string();
        let mut source = self.source();
        // The variants above already print their immediate source.
        if let Some(inner) = source {
            source = inner.source();
        }
        while let Some(cause) = source {
            line.push_str(": ");
            line.push_str(&cause.to_string());
            source = cause.source();
        }
        line
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", self.diagnostic())).into_response()
    }
}
