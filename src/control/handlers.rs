//! Axum handlers for the control prefix.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    Json,
};

use crate::control::{Binding, ControlError, MountInfo};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Entry point for every request under the control prefix.
pub async fn control(State(state): State<AppState>, method: Method, uri: Uri, headers: HeaderMap, body: Body) -> Response {
    match method {
        Method::GET | Method::HEAD => list_mounts(state).await.into_response(),
        Method::POST | Method::PUT => configure(state, uri, headers, body).await,
        _ => reject(ControlError::MethodNotAllowed),
    }
}

async fn list_mounts(state: AppState) -> Json<Vec<MountInfo>> {
    metrics::record_control("listed");
    Json(state.control.list().await)
}

async fn configure(state: AppState, uri: Uri, headers: HeaderMap, body: Body) -> Response {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());

    // Unknown types are answered without touching the body.
    let (resource_type, factory) = match state.control.factory_for(content_type) {
        Ok(found) => found,
        Err(e) => return reject(e),
    };

    let limit = state.control.config().max_body_bytes;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => return reject(ControlError::Body(e)),
    };

    match state.control.apply(uri.path(), resource_type, factory, &body).await {
        Ok(configured) => {
            metrics::record_control(match configured.binding {
                Binding::Created(_) => "created",
                Binding::Updated(_) => "updated",
            });
            configured.into_response()
        }
        Err(e) => reject(e),
    }
}

fn reject(error: ControlError) -> Response {
    tracing::warn!(error = %error, status = %error.status(), "Rejected control request");
    metrics::record_control(error.outcome());
    error.into_response()
}
