//! Terminal pilot dashboard.
//!
//! Follows the pilot server's push channel and prints what the dashboard
//! would show. Type `start`, `stop`, `reset`, `test` or `status` to call the
//! control surface, `quit` to leave.
//!
//! Run:
//!   cargo run -p raceline-demo-pilot --bin pilot-dashboard -- --server http://localhost:8000

use clap::Parser;
use raceline_client::view::{LogLevel, PilotView};
use raceline_client::{
    ApiReply, ClientError, Dashboard, DashboardClient, DashboardConfig, Operation, PushClient,
    PushConfig, WsTransport,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pilot-dashboard", about = "Terminal dashboard for the pilot server")]
struct Args {
    #[arg(long, env = "PILOT_URL", default_value = "http://localhost:8000")]
    server: String,

    /// Push channel URL; defaults to the server's `/ws`
    #[arg(long, env = "PILOT_PUSH_URL")]
    push_url: Option<String>,
}

fn push_url(server: &str) -> String {
    let base = server.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/ws")
}

fn command(line: &str) -> Option<Operation> {
    match line.trim() {
        "start" => Some(Operation::StartRace),
        "stop" => Some(Operation::Stop),
        "reset" => Some(Operation::Reset),
        "test" => Some(Operation::TestConnectivity),
        "status" => Some(Operation::Status),
        _ => None,
    }
}

/// Prints only what changed since the last render.
#[derive(Default)]
struct Screen {
    status: String,
    instruction: Option<String>,
    logs_seen: u64,
}

impl Screen {
    fn render(&mut self, view: &PilotView) {
        let controls = [
            ("start", view.controls.start),
            ("stop", view.controls.stop),
            ("reset", view.controls.reset),
        ]
        .iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(",");
        let mut status = format!(
            "[{}] {} | {} | {} | controls: {}",
            view.connection, view.badge_text, view.distance, view.counter, controls
        );
        if let Some(loading) = &view.loading {
            status.push_str(&format!(" | {loading}..."));
        }
        if let Some(connectivity) = &view.connectivity {
            status.push_str(&format!(" | {connectivity}"));
        }
        if status != self.status {
            println!("{status}");
            self.status = status;
        }

        let card = view.instruction.as_ref().map(|card| {
            format!(
                "{} {} -> {} ({}) @ {:.4},{:.4}",
                card.icon, card.title, card.target, card.km_gain, view.position.0, view.position.1
            )
        });
        if card != self.instruction {
            if let Some(card) = &card {
                println!("  {card}");
            }
            self.instruction = card;
        }

        for entry in view.logs_since(self.logs_seen) {
            let marker = match entry.level {
                LogLevel::Info => " ",
                LogLevel::Success => "+",
                LogLevel::Warning => "!",
                LogLevel::Error => "x",
            };
            println!("  {marker} {}", entry.text);
        }
        self.logs_seen = view.logged;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("pilot_dashboard=info".parse()?))
        .init();

    let args = Args::parse();
    let push = args.push_url.unwrap_or_else(|| push_url(&args.server));
    tracing::info!("Following {}", push);

    let (events_tx, mut events) = mpsc::channel(64);
    tokio::spawn(PushClient::new(WsTransport::new(push), PushConfig::default(), events_tx).run());

    let api = Arc::new(DashboardClient::new(DashboardConfig::new(args.server)));
    let (done_tx, mut done) = mpsc::channel::<(Operation, Result<ApiReply, ClientError>)>(8);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut dashboard = Dashboard::new();
    let mut screen = Screen::default();

    println!("commands: start | stop | reset | test | status | quit");
    loop {
        tokio::select! {
            Some(event) = events.recv() => dashboard.handle(event),
            Some((operation, result)) = done.recv() => dashboard.finish(operation, result),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim() == "quit" {
                    break;
                }
                match command(&line) {
                    Some(operation) => {
                        dashboard.begin(operation);
                        let api = api.clone();
                        let done = done_tx.clone();
                        tokio::spawn(async move {
                            let result = api.run(operation).await;
                            let _ = done.send((operation, result)).await;
                        });
                    }
                    None => println!("unknown command: {}", line.trim()),
                }
            }
        }
        screen.render(dashboard.view());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_url_follows_scheme() {
        assert_eq!(push_url("http://localhost:8000/"), "ws://localhost:8000/ws");
        assert_eq!(push_url("https://pilot.example"), "wss://pilot.example/ws");
    }

    #[test]
    fn commands_map_to_operations() {
        assert_eq!(command(" start "), Some(Operation::StartRace));
        assert_eq!(command("test"), Some(Operation::TestConnectivity));
        assert_eq!(command("launch"), None);
    }
}
