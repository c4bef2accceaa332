//! Shared pilot state: the race session, its subscribers and the feed task.

use crate::session::{RaceSession, SessionError, Step};
use raceline_core::{Instruction, PushMessage, StatusSnapshot, route};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PilotConfig {
    /// Delay between two instructions of the feed.
    pub feed_tick: Duration,
    /// Bound on `POST /api/start-race`.
    pub start_timeout: Duration,
    /// `host:port` of the engine to check for connectivity. `None` runs the simulation feed.
    pub engine_addr: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            feed_tick: Duration::from_secs(3),
            start_timeout: Duration::from_secs(15),
            engine_addr: None,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

struct Inner {
    session: RwLock<RaceSession>,
    events: broadcast::Sender<PushMessage>,
    config: PilotConfig,
}

/// Cheap handle to the pilot; clone it into handlers and tasks.
#[derive(Clone)]
pub struct Pilot {
    inner: Arc<Inner>,
}

impl Pilot {
    pub fn new(route: Vec<Instruction>, config: PilotConfig) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(Inner {
                session: RwLock::new(RaceSession::new(route)),
                events,
                config,
            }),
        }
    }

    /// A pilot replaying the built-in Grenoble route.
    pub fn simulation(config: PilotConfig) -> Self {
        Self::new(route::grenoble(), config)
    }

    pub fn config(&self) -> &PilotConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushMessage> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.session.read().await.snapshot()
    }

    /// IDLE -> READY -> DRIVING, then start feeding instructions.
    pub async fn start_race(&self) -> Result<(), SessionError> {
        let run = {
            let mut session = self.inner.session.write().await;
            session.begin()?;
            self.status_changed(&session);
            session.drive()?;
            self.status_changed(&session);
            session.run()
        };
        self.log("Starting instruction feed");
        tokio::spawn(self.clone().feed(run));
        Ok(())
    }

    pub async fn stop(&self) {
        let mut session = self.inner.session.write().await;
        session.stop();
        self.status_changed(&session);
        self.log("Feed stopped");
    }

    pub async fn reset(&self) {
        let mut session = self.inner.session.write().await;
        session.reset();
        self.status_changed(&session);
        self.log("Session reset");
    }

    /// Probe the engine over TCP. Without an engine the simulation is healthy.
    pub async fn test_connectivity(&self) -> bool {
        let Some(addr) = self.inner.config.engine_addr.as_deref() else {
            self.log("Simulation feed active, no engine to check");
            return true;
        };
        self.log(format!("Testing TCP connection to {addr}"));
        let attempt = TcpStream::connect(addr);
        match tokio::time::timeout(self.inner.config.connect_timeout, attempt).await {
            Ok(Ok(_)) => {
                self.log("TCP connection successful");
                true
            }
            Ok(Err(e)) => {
                warn!(%addr, "engine connectivity check failed: {e}");
                self.log(format!("TCP connection failed: {e}"));
                false
            }
            Err(_) => {
                warn!(%addr, "engine connectivity check timed out");
                self.log("TCP connection timed out");
                false
            }
        }
    }

    async fn feed(self, run: u64) {
        loop {
            let step = {
                let mut session = self.inner.session.write().await;
                let step = session.advance(run);
                match &step {
                    Step::Instruction(instruction) => {
                        self.publish(PushMessage::Instruction {
                            data: instruction.clone(),
                        });
                        self.publish(PushMessage::Status {
                            data: session.snapshot(),
                        });
                    }
                    Step::Completed => self.status_changed(&session),
                    Step::Stale => {}
                }
                step
            };

            match step {
                Step::Instruction(instruction) => {
                    debug!(action = %instruction.action, "instruction fed");
                    self.log(format!(
                        "Processed instruction {}: {} -> {}",
                        instruction.checkpoint_key().map(|k| k.as_str()).unwrap_or("?"),
                        instruction.action,
                        instruction.target.as_deref().unwrap_or_default()
                    ));
                }
                Step::Completed => {
                    self.log("All instructions completed");
                    return;
                }
                Step::Stale => {
                    debug!(run, "feed cancelled");
                    return;
                }
            }
            tokio::time::sleep(self.inner.config.feed_tick).await;
        }
    }

    fn status_changed(&self, session: &RaceSession) {
        let snapshot = session.snapshot();
        info!(status = %snapshot.status, "pilot status updated");
        self.publish(PushMessage::Status { data: snapshot });
        self.log(format!("Pilot status updated: {}", session.status()));
    }

    fn log(&self, message: impl Into<String>) {
        self.publish(PushMessage::Log {
            message: message.into(),
        });
    }

    fn publish(&self, message: PushMessage) {
        // No subscriber is not an error.
        let _ = self.inner.events.send(message);
    }
}
