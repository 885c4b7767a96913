//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the control routes and the proxy fallback
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener and stop on the shutdown signal
//! - Dispatch proxied requests to the mount that covers their path

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::DangerRoomConfig;
use crate::control::{handlers, ControlServer, ProxyTable};
use crate::harness::HarnessRegistry;
use crate::http::request::{request_id, MakeRequestUuid};
use crate::proxy::build_client;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub control: Arc<ControlServer>,
}

/// HTTP server hosting the control endpoint and every mounted proxy.
pub struct HttpServer {
    router: Router,
    config: DangerRoomConfig,
    control: Arc<ControlServer>,
}

impl HttpServer {
    /// Create a server with the built-in harnesses registered.
    pub fn new(config: DangerRoomConfig) -> Self {
        Self::with_registry(config, HarnessRegistry::with_builtins())
    }

    /// Create a server resolving resource types through `registry`.
    pub fn with_registry(config: DangerRoomConfig, registry: HarnessRegistry) -> Self {
        tracing::debug!(harnesses = ?registry.names(), "Harness registry ready");

        let control = Arc::new(ControlServer::new(
            Arc::new(registry),
            Arc::new(ProxyTable::new()),
            build_client(&config.upstream),
            config.control.clone(),
            config.upstream.clone(),
        ));

        let state = AppState {
            control: control.clone(),
        };
        let router = Self::build_router(&config, state);

        Self { router, config, control }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &DangerRoomConfig, state: AppState) -> Router {
        let prefix = config.control.prefix.as_str();
        let root = prefix.trim_end_matches('/');

        Router::new()
            .route(root, any(handlers::control))
            .route(prefix, any(handlers::control))
            .route(&format!("{}{{*mount}}", prefix), any(handlers::control))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = request_id(request.headers()).unwrap_or("-"),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server until `shutdown` fires, accepting connections on the
    /// given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            control_prefix = %self.config.control.prefix,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &DangerRoomConfig {
        &self.config
    }

    /// The control endpoint, for mounting proxies without going through HTTP.
    pub fn control(&self) -> &Arc<ControlServer> {
        &self.control
    }
}

/// Forward a request to the mount covering its path.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let Some(proxy) = state.control.table().resolve(request.uri().path()).await else {
        tracing::debug!(path = %request.uri().path(), "No mount covers path");
        return (StatusCode::NOT_FOUND, "404 page not found\n").into_response();
    };

    match proxy.serve(request, remote).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(upstream = %proxy.director().target(), error = %e.diagnostic(), "Upstream error");
            e.into_response()
        }
    }
}
