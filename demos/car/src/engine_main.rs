//! Mock race engine.
//!
//! Stands in for the engine behind the car relay: `/ready` rewinds the
//! Grenoble route, `/next-instruction` hands out its steps in order then
//! `null`, and `/checkpoint` logs and acknowledges.
//!
//! Run:
//!   cargo run -p raceline-demo-car --bin mock-engine -- --port 8000

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use raceline_core::{Instruction, route};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mock-engine", about = "Serves the Grenoble route to the car relay")]
struct Args {
    #[arg(long, env = "ENGINE_BIND", default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, env = "ENGINE_PORT", default_value_t = 8000)]
    port: u16,
}

type Route = Arc<Mutex<VecDeque<Instruction>>>;

fn app(route: Route) -> Router {
    Router::new()
        .route("/ready", post(ready))
        .route("/next-instruction", get(next_instruction))
        .route("/checkpoint", post(checkpoint))
        .with_state(route)
}

async fn ready(State(pending): State<Route>) -> Json<Value> {
    let mut pending = pending.lock().await;
    *pending = route::grenoble().into();
    tracing::info!("Route rewound, {} steps", pending.len());
    Json(json!({"status": "ready", "total_instructions": pending.len()}))
}

async fn next_instruction(State(pending): State<Route>) -> Json<Option<Instruction>> {
    let next = pending.lock().await.pop_front();
    match &next {
        Some(instruction) => tracing::info!(action = %instruction.action, "Serving instruction"),
        None => tracing::info!("Route exhausted"),
    }
    Json(next)
}

async fn checkpoint(Json(body): Json<Value>) -> Json<Value> {
    tracing::info!(%body, "Checkpoint");
    Json(json!({"status": "ok"}))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mock_engine=info".parse()?))
        .init();

    let args = Args::parse();
    let route: Route = Arc::new(Mutex::new(route::grenoble().into()));
    let listener = TcpListener::bind((args.bind.as_str(), args.port)).await?;
    tracing::info!("Mock engine on {}", listener.local_addr()?);
    axum::serve(listener, app(route)).await?;
    Ok(())
}
