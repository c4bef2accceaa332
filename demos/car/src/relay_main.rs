//! Car relay.
//!
//! Sits between the in-car console and the race engine.
//!
//! Run:
//!   cargo run -p raceline-demo-car --bin car-relay -- --upstream http://localhost:8000
//!
//! Optional TOML config (every key may be omitted):
//!   upstream_url = "http://engine:8000"
//!   group_id = "tkfegbl1.testgroup"
//!   km_travelled = 265.5
//!   upstream_timeout_secs = 10

use clap::Parser;
use raceline_relay::{Relay, RelayConfig};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "car-relay", about = "Relay between the in-car console and the race engine")]
struct Args {
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "RELAY_BIND", default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, env = "RELAY_PORT", default_value_t = 3001)]
    port: u16,

    /// Overrides `upstream_url` from the config file
    #[arg(long, env = "RELAY_UPSTREAM")]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("car_relay=info".parse()?)
                .add_directive("raceline_relay=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };
    if let Some(upstream) = args.upstream {
        config.upstream_url = upstream;
    }
    tracing::info!(
        group = %config.group_id,
        "Relaying to {} (timeout {}s)",
        config.upstream_url,
        config.upstream_timeout_secs
    );

    let listener = TcpListener::bind((args.bind.as_str(), args.port)).await?;
    raceline_relay::serve(listener, Relay::from_config(&config)).await?;
    Ok(())
}
