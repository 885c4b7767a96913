//! Upstream HTTP client.
//!
//! Plain `http` targets go straight over the TCP connector; `https` targets
//! are wrapped in rustls with the bundled webpki roots. HTTP/1.1 only.

use axum::body::Body;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::UpstreamConfig;

/// Target schemes the client can reach.
pub const SUPPORTED_SCHEMES: [&str; 2] = ["http", "https"];

/// Client used to reach origins.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build a client from the upstream settings.
pub fn build_client(config: &UpstreamConfig) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
    connector.set_nodelay(true);
    connector.enforce_http(false);

    let connector = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(connector);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .pool_timer(TokioTimer::new())
        .build(connector)
}

/// Process-wide client with default settings, built on first use.
pub fn shared_client() -> UpstreamClient {
    static SHARED: OnceLock<UpstreamClient> = OnceLock::new();
    SHARED.get_or_init(|| build_client(&UpstreamConfig::default())).clone()
}

/// Whether the client can reach targets using `scheme`.
pub fn supports_scheme(scheme: &str) -> bool {
    SUPPORTED_SCHEMES.contains(&scheme)
}
