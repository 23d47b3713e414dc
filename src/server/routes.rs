//! HTTP routes relaying bridge messages

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::{get, post}, Json, Router};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bridge::{BridgeHandle, Request, Response};
use crate::error::WalletError;

#[derive(Clone)]
pub struct AppState { pub bridge: BridgeHandle, pub app_name: String }

impl AppState {
    pub fn new(bridge: BridgeHandle, app_name: impl Into<String>) -> Self {
        Self { bridge, app_name: app_name.into() }
    }
}

pub fn create_router(bridge: BridgeHandle) -> Router { create_router_with_name(bridge, "driftwallet") }

pub fn create_router_with_name(bridge: BridgeHandle, app_name: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/bridge", post(relay))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(bridge, app_name))
}

async fn health(State(s): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": s.app_name}))
}

async fn relay(State(s): State<AppState>, Json(message): Json<Value>) -> Result<Json<Response>, (StatusCode, Json<Value>)> {
    let request = Request::from_message(message).map_err(|e| reject(StatusCode::BAD_REQUEST, e))?;
    s.bridge.request(request).await.map(Json).map_err(|e| reject(StatusCode::SERVICE_UNAVAILABLE, e))
}

fn reject(status: StatusCode, err: WalletError) -> (StatusCode, Json<Value>) {
    (status, Json(serde_json::json!({"error": err.to_string()})))
}
