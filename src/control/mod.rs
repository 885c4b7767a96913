//! Runtime configuration endpoint.
//!
//! # Data Flow
//! ```text
//! POST/PUT <control-prefix>[<mount>]  (Content-Type: application/vnd.danger-room.<name>+json)
//!     → media_type.rs (extract <name>)
//!     → HarnessRegistry lookup + decode (target URL, harness)
//!     → mount prefix from the control path
//!     → table.rs (create the proxy, or swap its harness)
//!     → 200 "<name> resource set on <prefix>"
//!
//! GET <control-prefix>
//!     → table.rs listing as JSON
//! ```
//!
//! # Design Decisions
//! - Every failure is answered to the caller (404 or 500); nothing here
//!   can take the process down
//! - A mount's target is fixed by the first document posted to it

pub mod handlers;
pub mod media_type;
pub mod table;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use url::Url;

use crate::config::{ControlConfig, UpstreamConfig};
use crate::harness::{HarnessFactory, HarnessRegistry};
use crate::observability::metrics;
use crate::proxy::{supports_scheme, Director, Proxy, UpstreamClient};

pub use table::{Binding, MountInfo, ProxyTable};

/// Methods the control prefix answers to.
pub const ALLOWED_METHODS: &str = "GET, POST, PUT";

/// Rejected control request.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("no harness for the given content type")]
    UnsupportedMediaType,

    #[error("no harness for the given content type")]
    UnknownHarness(String),

    #[error("failed to read configuration body: {0}")]
    Body(#[source] axum::Error),

    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidTarget(#[from] url::ParseError),

    #[error("unsupported target scheme: {0}")]
    UnsupportedScheme(String),

    #[error("method not allowed")]
    MethodNotAllowed,
}

impl ControlError {
    pub fn status(&self) -> StatusCode {
        match self {
            ControlError::UnsupportedMediaType | ControlError::UnknownHarness(_) => StatusCode::NOT_FOUND,
            ControlError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ControlError::Body(_)
            | ControlError::Decode(_)
            | ControlError::InvalidTarget(_)
            | ControlError::UnsupportedScheme(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Fixed label used for the control request counter.
    pub fn outcome(&self) -> &'static str {
        match self {
            ControlError::UnsupportedMediaType | ControlError::UnknownHarness(_) => "unknown_type",
            ControlError::Body(_) => "body_error",
            ControlError::Decode(_) => "decode_error",
            ControlError::InvalidTarget(_) | ControlError::UnsupportedScheme(_) => "invalid_target",
            ControlError::MethodNotAllowed => "method_not_allowed",
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), format!("{}\n", self)).into_response();
        if matches!(self, ControlError::MethodNotAllowed) {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        response
    }
}

/// Successful configuration of a mount.
#[derive(Debug)]
pub struct Configured {
    pub resource_type: String,
    pub prefix: String,
    pub binding: Binding,
}

impl IntoResponse for Configured {
    fn into_response(self) -> Response {
        format!("{} resource set on {}\n", self.resource_type, self.prefix).into_response()
    }
}

/// Decodes configuration documents and applies them to the proxy table.
#[derive(Debug)]
pub struct ControlServer {
    registry: Arc<HarnessRegistry>,
    table: Arc<ProxyTable>,
    client: UpstreamClient,
    control: ControlConfig,
    upstream: UpstreamConfig,
}

impl ControlServer {
    pub fn new(
        registry: Arc<HarnessRegistry>,
        table: Arc<ProxyTable>,
        client: UpstreamClient,
        control: ControlConfig,
        upstream: UpstreamConfig,
    ) -> Self {
        Self {
            registry,
            table,
            client,
            control,
            upstream,
        }
    }

    pub fn table(&self) -> &Arc<ProxyTable> {
        &self.table
    }

    pub fn config(&self) -> &ControlConfig {
        &self.control
    }

    /// Apply the configuration document `body`, posted to `path` with
    /// `content_type`.
    pub async fn configure(&self, path: &str, content_type: Option<&str>, body: &[u8]) -> Result<Configured, ControlError> {
        let (resource_type, factory) = self.factory_for(content_type)?;
        self.apply(path, resource_type, factory, body).await
    }

    /// Resolve the harness factory named by `content_type`.
    ///
    /// Needs nothing from the request body, so callers can reject unknown
    /// types before reading it.
    pub fn factory_for<'a>(&'a self, content_type: Option<&'a str>) -> Result<(&'a str, &'a HarnessFactory), ControlError> {
        let resource_type = content_type
            .and_then(media_type::resource_type)
            .ok_or(ControlError::UnsupportedMediaType)?;
        let factory = self
            .registry
            .lookup(resource_type)
            .ok_or_else(|| ControlError::UnknownHarness(resource_type.to_string()))?;
        Ok((resource_type, factory))
    }

    /// Decode `body` with `factory` and bind the result to the mount
    /// addressed by `path`.
    pub async fn apply(
        &self,
        path: &str,
        resource_type: &str,
        factory: &HarnessFactory,
        body: &[u8],
    ) -> Result<Configured, ControlError> {
        let resource = factory.decode(resource_type, body)?;
        let target = Url::parse(&resource.target)?;
        if !supports_scheme(target.scheme()) {
            return Err(ControlError::UnsupportedScheme(target.scheme().to_string()));
        }

        let prefix = mount_prefix(&self.control.prefix, &self.control.default_mount, path);
        let build = || {
            Proxy::new(Director::new(target.clone(), Some(prefix.clone())))
                .with_client(self.client.clone())
                .with_flush_interval(self.upstream.flush_interval())
        };
        let binding = self
            .table
            .bind(&prefix, &resource.resource_type, resource.harness.clone(), build)
            .await;

        match &binding {
            Binding::Created(_) => {
                tracing::info!(prefix = %prefix, upstream = %target, harness = %resource.resource_type, "Mounted proxy");
                metrics::set_mounted(self.table.len().await);
            }
            Binding::Updated(proxy) => {
                if proxy.director().target() != &target {
                    tracing::warn!(
                        prefix = %prefix,
                        mounted = %proxy.director().target(),
                        requested = %target,
                        "Mount keeps its original target"
                    );
                }
                tracing::info!(prefix = %prefix, harness = %resource.resource_type, "Reconfigured proxy");
            }
        }

        Ok(Configured {
            resource_type: resource.resource_type,
            prefix,
            binding,
        })
    }

    pub async fn list(&self) -> Vec<MountInfo> {
        self.table.list().await
    }
}

/// Mount prefix addressed by a control request path.
///
/// Paths no longer than `control_prefix` use `default_mount`; otherwise the
/// remainder after the control prefix, slashes trimmed, becomes `/<remainder>`.
pub fn mount_prefix(control_prefix: &str, default_mount: &str, path: &str) -> String {
    if path.len() <= control_prefix.len() {
        return default_mount.to_string();
    }
    match path.strip_prefix(control_prefix).map(|rest| rest.trim_matches('/')) {
        Some(rest) if !rest.is_empty() => format!("/{}", rest),
        _ => default_mount.to_string(),
    }
}
