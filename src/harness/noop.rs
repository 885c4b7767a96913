//! Pass-through harness.

use async_trait::async_trait;
use serde::Deserialize;
use std::io;

use super::{BodyReader, BodyTransfer, BodyWriter, Harness};

/// Leaves the response untouched. Used whenever no harness is configured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoopHarness {}

#[async_trait]
impl Harness for NoopHarness {
    async fn write_body(&self, _dst: &mut BodyWriter, _src: &mut BodyReader) -> io::Result<BodyTransfer> {
        Ok(BodyTransfer::Declined)
    }
}
