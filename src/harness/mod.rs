//! Fault-injection harnesses.
//!
//! # Data Flow
//! ```text
//! origin response (status, headers)
//!     → Harness::write_header (pick status, rewrite headers)
//!     → response head sent to client
//!
//! origin body (AsyncRead)
//!     → Harness::write_body (Handled: harness owns the transfer)
//!     → Declined: proxy copies the whole body
//!     → client body (AsyncWrite)
//! ```
//!
//! # Design Decisions
//! - A harness is immutable once built; reconfiguration swaps the whole
//!   harness on the proxy instead of mutating it
//! - Body transfer failures are not errors from the proxy's point of view:
//!   an abrupt end of body is a scenario the harness may want
//! - Harnesses are looked up by resource-type name through an explicit
//!   [`HarnessRegistry`], never through global state

pub mod headers;
pub mod limiting;
pub mod noop;
pub mod registry;

use async_trait::async_trait;
use hyper::{HeaderMap, StatusCode};
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

pub use headers::HeaderHarness;
pub use limiting::LimitingHarness;
pub use noop::NoopHarness;
pub use registry::{HarnessFactory, HarnessRegistry, HarnessResource};

/// Readable side of an origin response body.
pub type BodyReader = dyn AsyncRead + Send + Unpin;

/// Writable side of a client response body.
pub type BodyWriter = dyn AsyncWrite + Send + Unpin;

/// Outcome of [`Harness::write_body`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyTransfer {
    /// The harness moved whatever it wanted to move; the proxy stops here.
    Handled,
    /// The harness did nothing; the proxy copies the full body.
    Declined,
}

/// A pluggable strategy shaping how a proxied response reaches the client.
#[async_trait]
pub trait Harness: Send + Sync + fmt::Debug {
    /// Decide the status code sent to the client.
    ///
    /// `headers` are the response headers about to be written; a harness may
    /// rewrite them here since the head is not sent until this returns.
    fn write_header(&self, status: StatusCode, _headers: &mut HeaderMap) -> StatusCode {
        status
    }

    /// Transfer the body from `src` to `dst`, or decline and let the proxy
    /// copy it unchanged.
    async fn write_body(&self, dst: &mut BodyWriter, src: &mut BodyReader) -> io::Result<BodyTransfer>;
}
