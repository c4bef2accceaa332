//! Push-channel connection manager.
//!
//! [`Link`] is the bookkeeping: connection state, whether an attempt is
//! outstanding and whether a reconnection is already scheduled. [`PushClient`]
//! drives it over a [`Transport`], decodes inbound frames and forwards them as
//! [`PushEvent`]s. It retries forever and never returns.

use crate::TransportError;
use crate::retry::{Attempt, Backoff, RetryPolicy, retry};
use crate::transport::Transport;
use futures_util::{SinkExt, StreamExt};
use raceline_core::{ClientMessage, ConnectionState, PushMessage, decode_push, encode_client};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Push-channel timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConfig {
    /// Delay between a close and the next connection attempt.
    pub reconnect_delay: Duration,
    /// Ping period while connected.
    pub heartbeat_interval: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// What the push client reports to its display.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Connection(ConnectionState),
    Message(PushMessage),
}

/// Connection bookkeeping, free of I/O.
///
/// At most one attempt is outstanding and at most one reconnection is
/// scheduled at any time; the heartbeat runs exactly while connected.
#[derive(Debug, Clone)]
pub struct Link {
    state: ConnectionState,
    attempt_in_flight: bool,
    reconnect_pending: bool,
}

impl Link {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            attempt_in_flight: false,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn heartbeat_active(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Start a connection attempt, consuming any scheduled reconnection.
    ///
    /// Returns `false` (and changes nothing) when an attempt is already
    /// outstanding or the channel is open.
    pub fn begin_attempt(&mut self) -> bool {
        if self.attempt_in_flight || self.state == ConnectionState::Connected {
            return false;
        }
        self.attempt_in_flight = true;
        self.reconnect_pending = false;
        self.state = ConnectionState::Connecting;
        true
    }

    pub fn on_opened(&mut self) {
        self.attempt_in_flight = false;
        self.state = ConnectionState::Connected;
    }

    /// Record a close or a failed attempt.
    ///
    /// Returns `true` when this call scheduled the reconnection, `false` when
    /// one was already pending.
    pub fn on_closed(&mut self) -> bool {
        self.attempt_in_flight = false;
        self.state = ConnectionState::Disconnected;
        if self.reconnect_pending {
            false
        } else {
            self.reconnect_pending = true;
            true
        }
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one live push channel open and forwards what it receives.
pub struct PushClient<T> {
    transport: T,
    config: PushConfig,
    link: Link,
    events: mpsc::Sender<PushEvent>,
}

impl<T: Transport> PushClient<T> {
    pub fn new(transport: T, config: PushConfig, events: mpsc::Sender<PushEvent>) -> Self {
        Self {
            transport,
            config,
            link: Link::new(),
            events,
        }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Connect, serve, and reconnect forever.
    pub async fn run(mut self) {
        let mut backoff = Backoff::new(RetryPolicy::Fixed(self.config.reconnect_delay));
        let never: Infallible = retry(&mut self, &mut backoff, "push").await;
        match never {}
    }

    async fn connect_and_serve(&mut self) -> Result<Infallible, TransportError> {
        if !self.link.begin_attempt() {
            return Err(TransportError::AttemptInFlight);
        }
        self.emit(PushEvent::Connection(ConnectionState::Connecting))
            .await;

        let (mut sink, mut stream) = match self.transport.connect().await {
            Ok(channel) => channel,
            Err(e) => {
                self.closed().await;
                return Err(e);
            }
        };
        self.link.on_opened();
        info!("push channel connected");
        self.emit(PushEvent::Connection(ConnectionState::Connected))
            .await;

        let period = self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let error = loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.dispatch(&text).await,
                    Some(Err(e)) => break e,
                    None => break TransportError::Closed,
                },
                _ = heartbeat.tick() => {
                    let ping = match encode_client(&ClientMessage::Ping) {
                        Ok(ping) => ping,
                        Err(e) => break e.into(),
                    };
                    if let Err(e) = sink.send(ping).await {
                        break e;
                    }
                    debug!("heartbeat sent");
                }
            }
        };

        self.closed().await;
        Err(error)
    }

    async fn dispatch(&mut self, text: &str) {
        match decode_push(text) {
            Ok(message) => {
                debug!(kind = message.kind(), "push message received");
                self.emit(PushEvent::Message(message)).await;
            }
            Err(e) => warn!("dropping push message: {e}"),
        }
    }

    async fn closed(&mut self) {
        if self.link.on_closed() {
            debug!(
                delay_ms = self.config.reconnect_delay.as_millis() as u64,
                "reconnection scheduled"
            );
        }
        self.emit(PushEvent::Connection(ConnectionState::Disconnected))
            .await;
    }

    async fn emit(&mut self, event: PushEvent) {
        // A display that went away does not stop the channel.
        let _ = self.events.send(event).await;
    }
}

impl<T: Transport> Attempt for PushClient<T> {
    type Output = Infallible;
    type Error = TransportError;

    async fn attempt(&mut self) -> Result<Infallible, TransportError> {
        self.connect_and_serve().await
    }

    fn progressed(&self, error: &TransportError) -> bool {
        matches!(error, TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FrameSink, FrameStream};
    use futures_util::{sink, stream};
    use raceline_core::RaceStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Copy)]
    enum Event {
        Attempt,
        Open,
        Close,
    }

    fn apply(link: &mut Link, event: Event) {
        match event {
            Event::Attempt => {
                link.begin_attempt();
            }
            Event::Open => {
                if link.state() == ConnectionState::Connecting {
                    link.on_opened();
                }
            }
            Event::Close => {
                link.on_closed();
            }
        }
    }

    #[test]
    fn link_invariants_hold_for_all_short_sequences() {
        let events = [Event::Attempt, Event::Open, Event::Close];
        for len in 1..=6u32 {
            for code in 0..3usize.pow(len) {
                let mut link = Link::new();
                let mut code = code;
                for _ in 0..len {
                    apply(&mut link, events[code % 3]);
                    code /= 3;
                    assert_eq!(
                        link.heartbeat_active(),
                        link.state() == ConnectionState::Connected
                    );
                    if link.reconnect_pending() {
                        assert_eq!(link.state(), ConnectionState::Disconnected);
                    }
                }
            }
        }
    }

    #[test]
    fn second_close_does_not_schedule_again() {
        let mut link = Link::new();
        assert!(link.begin_attempt());
        assert!(link.on_closed());
        assert!(!link.on_closed());
        assert!(link.reconnect_pending());
        assert!(link.begin_attempt());
        assert!(!link.reconnect_pending());
        assert_eq!(link.state(), ConnectionState::Connecting);
    }

    #[test]
    fn attempt_is_suppressed_while_outstanding_or_open() {
        let mut link = Link::new();
        assert!(link.begin_attempt());
        assert!(!link.begin_attempt());
        link.on_opened();
        assert!(!link.begin_attempt());
    }

    /// What a scripted connection does once open.
    enum Script {
        /// Deliver these frames, then close.
        Frames(Vec<String>),
        /// Stay open forever.
        Hold,
        /// Refuse the connection.
        Refuse,
    }

    struct FakeTransport {
        scripts: Vec<Script>,
        attempts: Arc<AtomicUsize>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl Transport for FakeTransport {
        async fn connect(&mut self) -> Result<(FrameSink, FrameStream), TransportError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            let script = if n < self.scripts.len() {
                std::mem::replace(&mut self.scripts[n], Script::Hold)
            } else {
                Script::Refuse
            };
            let sent = self.sent.clone();
            let sink: FrameSink = Box::pin(sink::unfold((), move |(), frame: String| {
                let sent = sent.clone();
                async move {
                    sent.lock().unwrap().push(frame);
                    Ok::<_, TransportError>(())
                }
            }));
            match script {
                Script::Frames(frames) => {
                    Ok((sink, stream::iter(frames.into_iter().map(Ok)).boxed()))
                }
                Script::Hold => Ok((sink, stream::pending().boxed())),
                Script::Refuse => Err(TransportError::Closed),
            }
        }
    }

    fn client(
        scripts: Vec<Script>,
    ) -> (
        PushClient<FakeTransport>,
        mpsc::Receiver<PushEvent>,
        Arc<AtomicUsize>,
        Arc<Mutex<Vec<String>>>,
    ) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel(64);
        let transport = FakeTransport {
            scripts,
            attempts: attempts.clone(),
            sent: sent.clone(),
        };
        (
            PushClient::new(transport, PushConfig::default(), tx),
            rx,
            attempts,
            sent,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_exactly_once_after_three_seconds() {
        let (client, mut rx, attempts, _) = client(vec![Script::Frames(vec![]), Script::Hold]);
        let task = tokio::spawn(client.run());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(2_980)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        let mut states = Vec::new();
        while let Ok(PushEvent::Connection(state)) = rx.try_recv() {
            states.push(state);
        }
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn refused_attempts_keep_retrying() {
        let (client, _rx, attempts, _) = client(vec![]);
        let task = tokio::spawn(client.run());

        tokio::time::sleep(Duration::from_millis(9_010)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_only_while_connected() {
        let (client, _rx, _, sent) = client(vec![Script::Hold]);
        let task = tokio::spawn(client.run());

        tokio::time::sleep(Duration::from_millis(29_990)).await;
        assert!(sent.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(
            *sent.lock().unwrap(),
            vec![r#"{"type":"ping"}"#.to_string(); 2]
        );
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_stops_on_disconnect() {
        // The first channel closes immediately; later attempts are refused.
        let (client, _rx, _, sent) = client(vec![Script::Frames(vec![])]);
        let task = tokio::spawn(client.run());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(sent.lock().unwrap().is_empty());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_frames_are_dropped_without_closing() {
        let frames = vec![
            "{garbage".to_string(),
            r#"{"type":"weather"}"#.to_string(),
            r#"{"type":"status","data":{"status":"DRIVING","total_km_travelled":1.5,"instructions_processed":2,"total_instructions":6}}"#.to_string(),
        ];
        let (client, mut rx, attempts, _) = client(vec![Script::Frames(frames)]);
        let task = tokio::spawn(client.run());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut messages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let PushEvent::Message(message) = event {
                messages.push(message);
            }
        }
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].snapshot().unwrap().status, RaceStatus::Driving);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        task.abort();
    }
}
