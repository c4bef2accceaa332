//! HTTP surface of the relay.

use crate::proxy::{Relay, RelayError, Relayed};
use crate::upstream::Upstream;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use raceline_core::ActionSubmission;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

pub fn router<U: Upstream>(relay: Arc<Relay<U>>) -> Router {
    Router::new()
        .route("/api/ready", post(ready::<U>))
        .route("/api/instruction", get(instruction::<U>))
        .route("/api/action", post(action::<U>))
        .with_state(relay)
}

pub async fn serve<U: Upstream>(listener: TcpListener, relay: Relay<U>) -> std::io::Result<()> {
    tracing::info!("Relay listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(Arc::new(relay))).await
}

async fn ready<U: Upstream>(State(relay): State<Arc<Relay<U>>>) -> Result<Json<Value>, RelayError> {
    relay.handle_ready().await.map(Json)
}

async fn instruction<U: Upstream>(
    State(relay): State<Arc<Relay<U>>>,
) -> Result<Json<Relayed>, RelayError> {
    relay.handle_instruction().await.map(Json)
}

async fn action<U: Upstream>(
    State(relay): State<Arc<Relay<U>>>,
    Json(submission): Json<ActionSubmission>,
) -> Result<Json<Relayed>, RelayError> {
    relay.handle_action(&submission).await.map(Json)
}
