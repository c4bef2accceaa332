//! In-car console.
//!
//! Polls the relay for instructions and confirms them from the keyboard:
//! `s` starts the session, `l`/`r`/`f` confirm left/right/forward and `ack`
//! dismisses an unsupported instruction.
//!
//! Run:
//!   cargo run -p raceline-demo-car --bin car-console -- --relay http://localhost:3001

use clap::Parser;
use raceline_client::{CarConsole, ConsoleView, Control, Operator, Outcome, PollConfig, RelayClient};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "car-console", about = "Instruction console for the car")]
struct Args {
    #[arg(long, env = "CONSOLE_RELAY_URL", default_value = "http://localhost:3001")]
    relay: String,

    #[arg(long, env = "CONSOLE_POLL_MS", default_value_t = 2000)]
    poll_ms: u64,

    #[arg(long, env = "CONSOLE_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,
}

fn operator(line: &str) -> Option<Operator> {
    match line.trim() {
        "s" | "start" => Some(Operator::Start),
        "l" | "left" => Some(Operator::Control(Control::Left)),
        "r" | "right" => Some(Operator::Control(Control::Right)),
        "f" | "forward" => Some(Operator::Control(Control::Forward)),
        "ack" => Some(Operator::AcknowledgeFault),
        _ => None,
    }
}

fn describe(view: &ConsoleView) -> String {
    if view.finished {
        return "Finish: the race is over".to_string();
    }
    let mut line = match &view.actionable {
        Some(control) => format!("{} -> {} [press {}]", view.action_label, view.target, key(*control)),
        None if view.action_label.is_empty() => "waiting for an instruction".to_string(),
        None => format!("{} -> {}", view.action_label, view.target),
    };
    if let Some(error) = &view.error {
        line.push_str(&format!(" | error: {error}"));
    }
    line
}

fn key(control: Control) -> &'static str {
    match control {
        Control::Left => "l",
        Control::Right => "r",
        Control::Forward => "f",
    }
}

async fn show(mut view: watch::Receiver<ConsoleView>) {
    while view.changed().await.is_ok() {
        let line = describe(&view.borrow_and_update());
        println!("{line}");
    }
}

async fn keyboard(operator_tx: mpsc::Sender<Operator>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "quit" {
            break;
        }
        match operator(&line) {
            Some(input) => {
                if operator_tx.send(input).await.is_err() {
                    break;
                }
            }
            None => println!("unknown input: {}", line.trim()),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("car_console=info".parse()?)
                .add_directive("raceline_client=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let relay = RelayClient::new(args.relay, Duration::from_secs(args.timeout_secs));
    let config = PollConfig {
        interval: Duration::from_millis(args.poll_ms),
    };
    let (mut console, view) = CarConsole::new(relay, config);
    tokio::spawn(show(view));

    let (operator_tx, mut operator_rx) = mpsc::channel(16);
    tokio::spawn(async move {
        if let Err(e) = keyboard(operator_tx).await {
            tracing::warn!("stdin closed: {e}");
        }
    });

    println!("s = start, l/r/f = confirm, ack = dismiss, quit = leave");
    match console.run(&mut operator_rx).await {
        Outcome::Finished => println!("Race finished"),
        Outcome::OperatorGone => println!("Console closed"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_operator_input() {
        assert_eq!(operator("s"), Some(Operator::Start));
        assert_eq!(operator(" l "), Some(Operator::Control(Control::Left)));
        assert_eq!(operator("ack"), Some(Operator::AcknowledgeFault));
        assert_eq!(operator("x"), None);
    }

    #[test]
    fn finished_view_ignores_stale_error() {
        let view = ConsoleView {
            finished: true,
            error: Some("old".into()),
            ..ConsoleView::default()
        };
        assert_eq!(describe(&view), "Finish: the race is over");
    }

    #[test]
    fn actionable_view_names_the_key() {
        let view = ConsoleView {
            action_label: "Turn right".into(),
            target: "Rue Félix Poulat".into(),
            actionable: Some(Control::Right),
            ..ConsoleView::default()
        };
        assert_eq!(describe(&view), "Turn right -> Rue Félix Poulat [press r]");
    }
}
