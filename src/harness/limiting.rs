//! Response size limiting.
//!
//! Copies only the first `response_size_limit` bytes of the origin body and
//! then reports the transfer as handled. The proxy never copies the rest, so
//! a response that declared a `Content-Length` ends short of it and the
//! client has to notice the unexpected end of body.

use async_trait::async_trait;
use serde::Deserialize;
use std::io;
use tokio::io::AsyncReadExt;

use super::{BodyReader, BodyTransfer, BodyWriter, Harness};

/// Truncates response bodies after a fixed number of bytes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LimitingHarness {
    /// Bytes to let through. Anything below 1 disables limiting.
    pub response_size_limit: i64,
}

impl LimitingHarness {
    pub fn new(response_size_limit: i64) -> Self {
        Self { response_size_limit }
    }

    fn limit(&self) -> Option<u64> {
        u64::try_from(self.response_size_limit).ok().filter(|limit| *limit > 0)
    }
}

#[async_trait]
impl Harness for LimitingHarness {
    async fn write_body(&self, dst: &mut BodyWriter, src: &mut BodyReader) -> io::Result<BodyTransfer> {
        let Some(limit) = self.limit() else {
            return Ok(BodyTransfer::Declined);
        };

        let mut limited = AsyncReadExt::take(src, limit);
        match tokio::io::copy(&mut limited, dst).await {
            Ok(copied) => tracing::debug!(limit, copied, "Response body truncated"),
            Err(e) => tracing::debug!(limit, error = %e, "Limited body copy ended early"),
        }

        Ok(BodyTransfer::Handled)
    }
}
