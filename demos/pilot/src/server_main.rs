//! Pilot server.
//!
//! Serves the push channel on `/ws` and the race controls under `/api`.
//! Without `--engine-addr` it replays the built-in Grenoble route.
//!
//! Run:
//!   cargo run -p raceline-demo-pilot --bin pilot-server -- --port 8000
//!
//! Then:
//!   curl -X POST localhost:8000/api/start-race
//!   curl localhost:8000/api/status

use clap::Parser;
use raceline_pilot::{Pilot, PilotConfig};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pilot-server", about = "Race session, push channel and control surface")]
struct Args {
    #[arg(long, env = "PILOT_BIND", default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, env = "PILOT_PORT", default_value_t = 8000)]
    port: u16,

    /// `host:port` of the race engine, checked by the connectivity test
    #[arg(long, env = "PILOT_ENGINE_ADDR")]
    engine_addr: Option<String>,

    /// Delay between two instructions of the feed
    #[arg(long, env = "PILOT_FEED_TICK_MS", default_value_t = 3000)]
    feed_tick_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pilot_server=info".parse()?)
                .add_directive("raceline_pilot=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = PilotConfig {
        feed_tick: Duration::from_millis(args.feed_tick_ms),
        engine_addr: args.engine_addr,
        ..PilotConfig::default()
    };
    match &config.engine_addr {
        Some(addr) => tracing::info!("Engine connectivity target: {}", addr),
        None => tracing::info!("No engine configured, simulation feed only"),
    }

    let listener = TcpListener::bind((args.bind.as_str(), args.port)).await?;
    raceline_pilot::serve(listener, Pilot::simulation(config)).await?;
    Ok(())
}
