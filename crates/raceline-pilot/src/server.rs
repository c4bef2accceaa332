//! Pilot HTTP surface: the push channel and the control endpoints.

use crate::pilot::Pilot;
use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::{get, post},
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use raceline_core::{ApiReply, ClientMessage, PushMessage, StatusSnapshot, decode_client, encode_push};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

pub fn router(pilot: Pilot) -> Router {
    Router::new()
        .route("/ws", get(push_upgrade))
        .route("/api/start-race", post(start_race))
        .route("/api/stop", post(stop))
        .route("/api/reset", post(reset))
        .route("/api/test-connectivity", get(test_connectivity))
        .route("/api/status", get(status))
        .with_state(pilot)
}

pub async fn serve(listener: TcpListener, pilot: Pilot) -> std::io::Result<()> {
    info!("Pilot listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(pilot)).await
}

async fn start_race(State(pilot): State<Pilot>) -> Json<ApiReply> {
    let bound = pilot.config().start_timeout;
    let reply = match tokio::time::timeout(bound, pilot.start_race()).await {
        Ok(Ok(())) => ApiReply::ok("Race started"),
        Ok(Err(e)) => {
            warn!("race start refused: {e}");
            ApiReply::failed(format!("Failed to start race: {e}"))
        }
        Err(_) => ApiReply::failed("Race start timeout - check upstream connectivity"),
    };
    Json(reply)
}

async fn stop(State(pilot): State<Pilot>) -> Json<ApiReply> {
    pilot.stop().await;
    Json(ApiReply::ok("Service stopped"))
}

async fn reset(State(pilot): State<Pilot>) -> Json<ApiReply> {
    pilot.reset().await;
    Json(ApiReply::ok("Service reset"))
}

async fn test_connectivity(State(pilot): State<Pilot>) -> Json<ApiReply> {
    let passed = pilot.test_connectivity().await;
    Json(ApiReply {
        success: passed,
        message: format!(
            "Connectivity test {}",
            if passed { "passed" } else { "failed" }
        ),
    })
}

async fn status(State(pilot): State<Pilot>) -> Json<StatusSnapshot> {
    Json(pilot.snapshot().await)
}

async fn push_upgrade(upgrade: WebSocketUpgrade, State(pilot): State<Pilot>) -> Response {
    upgrade.on_upgrade(move |socket| push_channel(socket, pilot))
}

type PushSink = SplitSink<WebSocket, Message>;

async fn send(sink: &mut PushSink, message: &PushMessage) -> Result<(), axum::Error> {
    let text = encode_push(message).map_err(axum::Error::new)?;
    sink.send(Message::Text(text.into())).await
}

async fn push_channel(socket: WebSocket, pilot: Pilot) {
    let (mut sink, mut stream) = socket.split();
    // Subscribe first so nothing published after the snapshot is missed.
    let mut events = pilot.subscribe();

    let initial = PushMessage::Status {
        data: pilot.snapshot().await,
    };
    if send(&mut sink, &initial).await.is_err() {
        return;
    }
    info!("push subscriber connected");

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match decode_client(text.as_str()) {
                    Ok(ClientMessage::Ping) => {
                        let pong = PushMessage::Pong { data: pilot.snapshot().await };
                        if send(&mut sink, &pong).await.is_err() {
                            break;
                        }
                        debug!("pong sent");
                    }
                    Err(e) => warn!("ignoring client frame: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("push channel error: {e}");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(message) => {
                    if send(&mut sink, &message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "push subscriber lagging, resending status");
                    let status = PushMessage::Status { data: pilot.snapshot().await };
                    if send(&mut sink, &status).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    info!("push subscriber disconnected");
}
