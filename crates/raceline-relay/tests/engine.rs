//! Relay against a real HTTP engine stand-in.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use raceline_relay::{Relay, RelayConfig};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Default)]
struct Engine {
    checkpoints: Mutex<Vec<Value>>,
    fetches: Mutex<u32>,
    reject_checkpoints: bool,
}

async fn checkpoint(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    engine.checkpoints.lock().unwrap().push(body);
    if engine.reject_checkpoints {
        (StatusCode::CONFLICT, Json(json!({"detail": "out of order"})))
    } else {
        (StatusCode::OK, Json(json!({"ok": true})))
    }
}

async fn next_instruction(State(engine): State<Arc<Engine>>) -> Json<Value> {
    *engine.fetches.lock().unwrap() += 1;
    Json(Value::Null)
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

async fn start(engine: Arc<Engine>) -> String {
    let engine_url = spawn(
        Router::new()
            .route("/checkpoint", post(checkpoint))
            .route("/next-instruction", get(next_instruction))
            .route("/ready", post(|| async { Json(json!({"status": "ready"})) }))
            .with_state(engine),
    )
    .await;

    let config = RelayConfig {
        upstream_url: engine_url,
        upstream_timeout_secs: 5,
        ..RelayConfig::default()
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(raceline_relay::serve(listener, Relay::from_config(&config)));
    format!("http://{addr}")
}

fn submission() -> Value {
    json!({
        "action": "left",
        "instruction": {"type": "instruction", "id": "4", "step": "4", "action": "turn_left", "target": "Campus"}
    })
}

#[tokio::test]
async fn null_from_engine_reaches_console_as_finish() {
    let engine = Arc::new(Engine::default());
    let relay = start(engine.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{relay}/api/action"))
        .json(&submission())
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"action": "finish"}));
    assert_eq!(
        *engine.checkpoints.lock().unwrap(),
        vec![json!({
            "type": "checkpoint",
            "step": "4",
            "id": "4",
            "group_id": "tkfegbl1.testgroup",
            "km_travelled": 265.5
        })]
    );
    assert_eq!(*engine.fetches.lock().unwrap(), 1);
}

#[tokio::test]
async fn rejected_checkpoint_never_fetches() {
    let engine = Arc::new(Engine {
        reject_checkpoints: true,
        ..Engine::default()
    });
    let relay = start(engine.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{relay}/api/action"))
        .json(&submission())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "Error validating instruction");
    assert_eq!(engine.checkpoints.lock().unwrap().len(), 1);
    assert_eq!(*engine.fetches.lock().unwrap(), 0);
}

#[tokio::test]
async fn ready_and_poll_pass_through() {
    let engine = Arc::new(Engine::default());
    let relay = start(engine.clone()).await;
    let http = reqwest::Client::new();

    let ready: Value = http
        .post(format!("{relay}/api/ready"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ready, json!({"status": "ready"}));

    let polled: Value = http
        .get(format!("{relay}/api/instruction"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(polled, json!({"action": "finish"}));
    assert!(engine.checkpoints.lock().unwrap().is_empty());
}
