//! Request/response pipeline of a single mounted proxy.
//!
//! # Responsibilities
//! - Rewrite and forward the inbound request (streaming its body)
//! - Strip hop-by-hop headers in both directions
//! - Let the active harness pick the status and drive the body transfer
//!
//! # Design Decisions
//! - The harness is read once per request; a concurrent swap only affects
//!   requests that start afterwards
//! - The body is transferred by a task of its own so the response head goes
//!   out as soon as the harness has decided on it
//! - Transfer errors end the body without being reported anywhere else

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    http::{header, Request, Response},
};
use futures_util::TryStreamExt;
use http_body_util::BodyExt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::io::StreamReader;

use crate::harness::{BodyTransfer, BodyWriter, Harness, NoopHarness};
use crate::observability::metrics;
use crate::proxy::body::{self, ChannelWriter};
use crate::proxy::client::{shared_client, UpstreamClient};
use crate::proxy::director::Director;
use crate::proxy::flush::MaxLatencyWriter;
use crate::proxy::headers::{append_forwarded_for, remove_hop_headers};
use crate::proxy::ProxyError;

/// The harness currently attached to a proxy.
#[derive(Debug)]
pub struct ActiveHarness {
    /// Resource type the harness was configured through.
    pub resource_type: String,
    pub harness: Arc<dyn Harness>,
}

/// Forwards requests to one origin through a swappable harness.
#[derive(Debug)]
pub struct Proxy {
    client: UpstreamClient,
    harness: ArcSwap<ActiveHarness>,
    director: Director,
    flush_interval: Option<Duration>,
}

impl Proxy {
    /// Proxy using the shared client, the no-op harness and no periodic
    /// flushing.
    pub fn new(director: Director) -> Self {
        Self {
            client: shared_client(),
            harness: ArcSwap::from_pointee(ActiveHarness {
                resource_type: "noop".to_string(),
                harness: Arc::new(NoopHarness::default()),
            }),
            director,
            flush_interval: None,
        }
    }

    pub fn with_client(mut self, client: UpstreamClient) -> Self {
        self.client = client;
        self
    }

    pub fn with_harness(self, resource_type: impl Into<String>, harness: Arc<dyn Harness>) -> Self {
        self.set_harness(resource_type, harness);
        self
    }

    /// Flush buffered output at most once per `interval`; `None` forwards
    /// every write as it happens.
    pub fn with_flush_interval(mut self, interval: Option<Duration>) -> Self {
        self.flush_interval = interval.filter(|i| !i.is_zero());
        self
    }

    pub fn director(&self) -> &Director {
        &self.director
    }

    /// Snapshot of the active harness.
    pub fn harness(&self) -> Arc<ActiveHarness> {
        self.harness.load_full()
    }

    /// Replace the active harness. Requests already in flight keep theirs.
    pub fn set_harness(&self, resource_type: impl Into<String>, harness: Arc<dyn Harness>) {
        self.harness.store(Arc::new(ActiveHarness {
            resource_type: resource_type.into(),
            harness,
        }));
    }

    /// Forward `request` and shape the origin's response.
    ///
    /// `remote` is the caller's address, appended to X-Forwarded-For when
    /// known.
    pub async fn serve(&self, request: Request<Body>, remote: Option<SocketAddr>) -> Result<Response<Body>, ProxyError> {
        let active = self.harness();

        // Head and body are split so the body stream moves to the origin
        // request untouched.
        let (parts, inbound_body) = request.into_parts();
        let uri = self.director.rewrite(&parts.uri)?;

        let mut headers = parts.headers;
        headers.remove(header::HOST);
        remove_hop_headers(&mut headers);
        if let Some(addr) = remote {
            append_forwarded_for(&mut headers, addr.ip());
        }

        let mut outbound = Request::new(inbound_body);
        *outbound.method_mut() = parts.method;
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = headers;

        tracing::debug!(
            method = %outbound.method(),
            upstream = %outbound.uri(),
            harness = %active.resource_type,
            "Forwarding request"
        );

        let origin = match self.client.request(outbound).await {
            Ok(origin) => origin,
            Err(e) => {
                tracing::warn!(upstream = %self.director.target(), error = %e, "Upstream request failed");
                metrics::record_upstream_error(self.director.prefix().unwrap_or("/"));
                return Err(e.into());
            }
        };
        let (mut head, origin_body) = origin.into_parts();
        remove_hop_headers(&mut head.headers);

        let status = active.harness.write_header(head.status, &mut head.headers);

        let (tx, client_body) = body::channel();
        let dst: Box<BodyWriter> = match self.flush_interval {
            Some(latency) => Box::new(MaxLatencyWriter::spawn(tx, latency)),
            None => Box::new(ChannelWriter::new(tx)),
        };
        let src: Pin<Box<dyn AsyncRead + Send>> = Box::pin(StreamReader::new(TryStreamExt::map_err(
            origin_body.into_data_stream(),
            io::Error::other,
        )));
        tokio::spawn(transfer(active.harness.clone(), dst, src));

        let mut response = Response::new(Body::new(client_body));
        *response.status_mut() = status;
        *response.headers_mut() = head.headers;

        metrics::record_proxied(self.director.prefix().unwrap_or("/"), status.as_u16());
        Ok(response)
    }
}

/// Move the origin body to the client through `harness`.
///
/// Both ends are dropped on return whatever happened: dropping `src`
/// releases the origin connection and dropping `dst` stops any flush loop.
async fn transfer(harness: Arc<dyn Harness>, mut dst: Box<BodyWriter>, mut src: Pin<Box<dyn AsyncRead + Send>>) {
    match harness.write_body(&mut *dst, &mut src).await {
        Ok(BodyTransfer::Handled) => {}
        Ok(BodyTransfer::Declined) => {
            if let Err(e) = tokio::io::copy(&mut src, &mut *dst).await {
                tracing::debug!(error = %e, "Response body copy ended early");
            }
        }
        Err(e) => tracing::debug!(error = %e, "Harness body transfer failed"),
    }

    if let Err(e) = dst.shutdown().await {
        tracing::trace!(error = %e, "Closing client body failed");
    }
}
