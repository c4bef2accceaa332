//! The pilot's push channel over a real socket.

use futures_util::{SinkExt, StreamExt};
use raceline_client::{Dashboard, PushClient, PushConfig, PushEvent, WsTransport};
use raceline_core::{ConnectionState, PushMessage, RaceStatus, decode_push};
use raceline_pilot::{Pilot, PilotConfig};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

async fn start(pilot: Pilot) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(raceline_pilot::serve(listener, pilot));
    format!("ws://{addr}/ws")
}

fn fast() -> PilotConfig {
    PilotConfig {
        feed_tick: Duration::from_millis(20),
        ..PilotConfig::default()
    }
}

#[tokio::test]
async fn snapshot_on_connect_and_pong_on_ping() {
    let url = start(Pilot::simulation(fast())).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let first = ws.next().await.unwrap().unwrap();
    let first = decode_push(first.to_text().unwrap()).unwrap();
    assert!(matches!(&first, PushMessage::Status { data } if data.status == RaceStatus::Idle));

    ws.send(Message::Text(r#"{"type":"ping"}"#.into())).await.unwrap();
    let reply = ws.next().await.unwrap().unwrap();
    let reply = decode_push(reply.to_text().unwrap()).unwrap();
    assert_eq!(reply.kind(), "pong");
    assert_eq!(reply.snapshot().unwrap().total_instructions, 6);
}

#[tokio::test]
async fn garbage_frames_do_not_close_the_channel() {
    let url = start(Pilot::simulation(fast())).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    ws.next().await.unwrap().unwrap();

    ws.send(Message::Text("{not json".into())).await.unwrap();
    ws.send(Message::Text(r#"{"type":"ping"}"#.into())).await.unwrap();

    let reply = ws.next().await.unwrap().unwrap();
    assert_eq!(decode_push(reply.to_text().unwrap()).unwrap().kind(), "pong");
}

#[tokio::test]
async fn dashboard_follows_a_race_to_completion() {
    let pilot = Pilot::simulation(fast());
    let url = start(pilot.clone()).await;

    let (tx, mut rx) = mpsc::channel(256);
    let push = tokio::spawn(PushClient::new(WsTransport::new(url), PushConfig::default(), tx).run());
    let mut dashboard = Dashboard::new();

    let showing = |dashboard: &Dashboard, status: RaceStatus| {
        dashboard.view().badge_text == status.as_str()
    };

    while !showing(&dashboard, RaceStatus::Idle) {
        dashboard.handle(rx.recv().await.unwrap());
    }
    assert_eq!(dashboard.view().connection, ConnectionState::Connected);
    assert!(dashboard.view().controls.start);

    pilot.start_race().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !showing(&dashboard, RaceStatus::Completed) {
            let event = rx.recv().await.unwrap();
            if let PushEvent::Message(PushMessage::Instruction { .. }) = &event {
                assert!(dashboard.view().controls.stop);
            }
            dashboard.handle(event);
        }
    })
    .await
    .unwrap();

    let view = dashboard.view();
    assert_eq!(view.counter, "6/6");
    assert_eq!(view.distance, "1.00 km");
    assert_eq!(view.trail.len(), 6);
    assert!(view.controls.reset);
    push.abort();
}
