// file: src/session.rs
// description: reconnect-resilient tracking session for one seller/shopkeeper pair
//
// One driver task per started pair owns the socket, the heartbeat interval and the
// retry timer. Every input (caller commands, connect completion, socket events, timer
// ticks) is handled by a single select loop, so transitions never interleave.

use crate::{
    config::{Config, ReconnectPolicy},
    error::TrackingError,
    events::{ClientEvent, EventSender},
    monitoring::{
        CONNECTED_GAUGE, FRAMES_DROPPED_COUNTER, FRAMES_RECEIVED_COUNTER, HEARTBEAT_COUNTER,
        RECONNECT_COUNTER,
    },
    tracking_state::{FrameOutcome, TrackingReducer, TrackingSnapshot},
    transport::{Connector, Transport, TransportEvent, redact},
    types::{OutboundFrame, TrackingPair},
};
use futures_util::future::BoxFuture;
use std::{fmt, pin::Pin, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior, Sleep, interval_at, sleep},
};
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Shown once the retry budget is spent.
pub const RECONNECT_EXHAUSTED_MESSAGE: &str =
    "Unable to reconnect to live tracking. Please reload to try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityState {
    Connecting,
    Connected,
    Reconnecting,
    Failed,
    #[default]
    Closed,
}

impl ConnectivityState {
    /// A socket exists or is being (re)established.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ConnectivityState::Connecting
                | ConnectivityState::Connected
                | ConnectivityState::Reconnecting
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityState::Connecting => "connecting",
            ConnectivityState::Connected => "connected",
            ConnectivityState::Reconnecting => "reconnecting",
            ConnectivityState::Failed => "failed",
            ConnectivityState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable session slot, replaced wholesale on every transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub state: ConnectivityState,
    pub pair: Option<TrackingPair>,
    /// Consecutive failures since the last successful open.
    pub failures: u32,
    /// Delay of the pending retry while `reconnecting`.
    pub retry_in: Option<Duration>,
    pub connection_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug)]
enum Command {
    Reconnect,
    Stop,
}

struct ActiveSession {
    pair: TrackingPair,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Live tracking for one pair at a time.
///
/// `start` on mount or pair change, `stop` on unmount; `reconnect` is the manual
/// override once the session has given up. Dropping the session aborts its driver.
pub struct TrackingSession {
    config: Arc<Config>,
    connector: Arc<dyn Connector>,
    event_sender: EventSender,
    status: Arc<watch::Sender<SessionStatus>>,
    reducer: Arc<TrackingReducer>,
    last_pair: Option<TrackingPair>,
    active: Option<ActiveSession>,
}

impl TrackingSession {
    pub fn new(
        config: Arc<Config>,
        connector: Arc<dyn Connector>,
        event_sender: EventSender,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            config,
            connector,
            event_sender,
            status: Arc::new(status),
            reducer: Arc::new(TrackingReducer::new()),
            last_pair: None,
            active: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        self.reducer.snapshot()
    }

    pub fn subscribe_tracking(&self) -> watch::Receiver<TrackingSnapshot> {
        self.reducer.subscribe()
    }

    /// The pair most recently started, if any.
    pub fn pair(&self) -> Option<&TrackingPair> {
        self.last_pair.as_ref()
    }

    /// Begins tracking `seller_id` → `shopkeeper_id`.
    ///
    /// Missing identifiers are rejected with a warning and leave everything as it was.
    /// A different pair (or a terminal session) is fully stopped before the new driver
    /// spawns; the pair already being tracked is left alone.
    pub async fn start(&mut self, seller_id: &str, shopkeeper_id: &str) {
        let pair = match TrackingPair::new(seller_id, shopkeeper_id) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Tracking not started: {}", e);
                let _ = self.event_sender.try_send(ClientEvent::StartIgnored {
                    reason: e.to_string(),
                });
                return;
            }
        };

        if let Some(active) = &self.active
            && active.pair == pair
            && self.status.borrow().state.is_live()
        {
            debug!("Tracking already running for {}", pair);
            return;
        }

        self.stop().await;
        if self.last_pair.as_ref() != Some(&pair) {
            self.reducer.reset();
        }
        self.spawn(pair);
    }

    /// Cancels timers, closes the socket and waits for the driver to exit. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            info!("Stopping tracking for {}", active.pair);
            let _ = active.commands.send(Command::Stop);
            if let Err(e) = active.task.await
                && e.is_panic()
            {
                error!("Tracking driver for {} panicked: {}", active.pair, e);
            }
        }
        // Also covers a session that failed before any driver was spawned.
        self.status.send_if_modified(|status| {
            let closed = SessionStatus::default();
            if *status == closed {
                return false;
            }
            *status = closed;
            true
        });
    }

    /// Connects again right away with a fresh retry budget, replacing any pending retry.
    pub fn reconnect(&mut self) {
        if let Some(active) = &self.active
            && active.commands.send(Command::Reconnect).is_ok()
        {
            info!("Manual reconnect requested for {}", active.pair);
            return;
        }

        match self.last_pair.clone() {
            Some(pair) => {
                info!("Manual reconnect restarting tracking for {}", pair);
                self.active = None;
                self.spawn(pair);
            }
            None => warn!("Reconnect requested before any tracking pair was started"),
        }
    }

    fn spawn(&mut self, pair: TrackingPair) {
        self.last_pair = Some(pair.clone());

        let url = match self.config.websocket.endpoint_for(&pair) {
            Ok(url) => url,
            Err(e) => {
                error!("Cannot build tracking endpoint for {}: {}", pair, e);
                self.status.send_replace(SessionStatus {
                    state: ConnectivityState::Failed,
                    pair: Some(pair),
                    message: Some(e.to_string()),
                    ..SessionStatus::default()
                });
                let _ = self.event_sender.try_send(ClientEvent::Failed {
                    message: e.to_string(),
                });
                return;
            }
        };

        self.status.send_replace(SessionStatus {
            state: ConnectivityState::Connecting,
            pair: Some(pair.clone()),
            ..SessionStatus::default()
        });

        let (commands, command_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            pair: pair.clone(),
            url,
            policy: self.config.reconnect,
            heartbeat_interval: self.config.heartbeat.interval,
            log_frames: self.config.logging.log_frames,
            connector: Arc::clone(&self.connector),
            commands: command_rx,
            status: Arc::clone(&self.status),
            reducer: Arc::clone(&self.reducer),
            events: self.event_sender.clone(),
            state: ConnectivityState::Connecting,
            failures: 0,
            connection_id: None,
            connecting: None,
            transport: None,
            heartbeat: None,
            retry: None,
        };

        let task = tokio::spawn(driver.run());
        self.active = Some(ActiveSession {
            pair,
            commands,
            task,
        });
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

type ConnectFuture = BoxFuture<'static, Result<Transport, TrackingError>>;

enum Wake {
    Command(Option<Command>),
    Opened(Result<Transport, TrackingError>),
    Transport(TransportEvent),
    Heartbeat,
    RetryDue,
}

struct Driver {
    pair: TrackingPair,
    url: Url,
    policy: ReconnectPolicy,
    heartbeat_interval: Duration,
    log_frames: bool,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    status: Arc<watch::Sender<SessionStatus>>,
    reducer: Arc<TrackingReducer>,
    events: EventSender,

    state: ConnectivityState,
    failures: u32,
    connection_id: Option<String>,

    // At most one of each; replacing or clearing the Option cancels it.
    connecting: Option<ConnectFuture>,
    transport: Option<Transport>,
    heartbeat: Option<Interval>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    async fn run(mut self) {
        self.begin_connect();

        loop {
            match self.next_wake().await {
                Wake::Command(Some(Command::Reconnect)) => {
                    self.drop_connection();
                    self.failures = 0;
                    self.begin_connect();
                }
                Wake::Command(Some(Command::Stop)) | Wake::Command(None) => {
                    self.teardown();
                    break;
                }
                Wake::Opened(Ok(transport)) => self.on_open(transport),
                Wake::Opened(Err(e)) => {
                    warn!("Connection attempt for {} failed: {}", self.pair, e);
                    self.on_close(Some(e.to_string()));
                }
                Wake::Transport(TransportEvent::Frame(text)) => self.on_frame(&text),
                Wake::Transport(TransportEvent::Error(e)) => {
                    debug!("Transport error for {}: {}", self.pair, e);
                }
                Wake::Transport(TransportEvent::Closed { reason }) => self.on_close(reason),
                Wake::Heartbeat => self.on_heartbeat(),
                Wake::RetryDue => self.begin_connect(),
            }
        }
    }

    async fn next_wake(&mut self) -> Wake {
        let Driver {
            commands,
            connecting,
            transport,
            heartbeat,
            retry,
            ..
        } = self;

        tokio::select! {
            biased;
            command = commands.recv() => Wake::Command(command),
            event = next_transport_event(transport), if transport.is_some() => Wake::Transport(event),
            opened = finish_connect(connecting), if connecting.is_some() => Wake::Opened(opened),
            _ = next_tick(heartbeat), if heartbeat.is_some() => Wake::Heartbeat,
            _ = retry_elapsed(retry), if retry.is_some() => Wake::RetryDue,
        }
    }

    fn begin_connect(&mut self) {
        self.retry = None;
        self.state = ConnectivityState::Connecting;
        self.publish(None, None);

        let shown = redact(&self.url);
        info!("Connecting to {} for {}", shown, self.pair);
        self.emit(ClientEvent::Connecting {
            url: shown,
            attempt: self.failures,
        });
        self.connecting = Some(self.connector.connect(&self.url));
    }

    fn on_open(&mut self, transport: Transport) {
        self.connecting = None;
        self.transport = Some(transport);
        self.failures = 0;

        let mut heartbeat = interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(heartbeat);

        let connection_id = uuid::Uuid::new_v4().to_string();
        self.connection_id = Some(connection_id.clone());
        self.state = ConnectivityState::Connected;
        CONNECTED_GAUGE.set(1.0);

        info!(connection_id = %connection_id, "Tracking live for {}", self.pair);
        self.publish(None, None);
        self.emit(ClientEvent::Connected { connection_id });
    }

    fn on_close(&mut self, reason: Option<String>) {
        let was_connected = self.state == ConnectivityState::Connected;
        self.drop_connection();

        if was_connected {
            warn!(
                "Tracking connection for {} closed: {}",
                self.pair,
                reason.as_deref().unwrap_or("no reason given")
            );
            self.emit(ClientEvent::Disconnected { reason });
        }

        if !self.policy.allows_retry(self.failures) {
            self.state = ConnectivityState::Failed;
            error!(
                "Giving up on {} after {} reconnection attempts",
                self.pair, self.failures
            );
            self.publish(None, Some(RECONNECT_EXHAUSTED_MESSAGE.to_string()));
            self.emit(ClientEvent::Failed {
                message: RECONNECT_EXHAUSTED_MESSAGE.to_string(),
            });
            return;
        }

        let delay = self.policy.delay_for(self.failures);
        self.failures += 1;
        self.retry = Some(Box::pin(sleep(delay)));
        self.state = ConnectivityState::Reconnecting;
        RECONNECT_COUNTER.increment(1);

        warn!(
            "Reconnecting {} in {}ms (attempt {}/{})",
            self.pair,
            delay.as_millis(),
            self.failures,
            self.policy.max_attempts
        );
        self.publish(Some(delay), None);
        self.emit(ClientEvent::ReconnectScheduled {
            attempt: self.failures,
            delay,
        });
    }

    fn on_frame(&mut self, text: &str) {
        FRAMES_RECEIVED_COUNTER.increment(1);
        if self.log_frames {
            debug!("Received frame: {}", text);
        }

        match self.reducer.apply(text) {
            FrameOutcome::Malformed(reason) => {
                FRAMES_DROPPED_COUNTER.increment(1);
                self.emit(ClientEvent::FrameDropped { reason });
            }
            outcome => self.emit(ClientEvent::FrameApplied {
                kind: outcome.kind(),
            }),
        }
    }

    fn on_heartbeat(&mut self) {
        let Some(transport) = self
            .transport
            .as_ref()
            .filter(|_| self.state == ConnectivityState::Connected)
        else {
            trace!("Heartbeat skipped: not connected");
            return;
        };

        let ping = match OutboundFrame::Ping.to_text() {
            Ok(ping) => ping,
            Err(e) => {
                error!("Failed to serialize heartbeat: {}", e);
                return;
            }
        };

        // The close event, not a failed send, decides about reconnecting.
        match transport.try_send(ping) {
            Ok(()) => {
                HEARTBEAT_COUNTER.increment(1);
                trace!("Heartbeat sent for {}", self.pair);
                self.emit(ClientEvent::HeartbeatSent);
            }
            Err(e) => debug!("Heartbeat not sent: {}", e),
        }
    }

    fn drop_connection(&mut self) {
        self.connecting = None;
        self.transport = None;
        self.heartbeat = None;
        self.retry = None;
        self.connection_id = None;
        CONNECTED_GAUGE.set(0.0);
    }

    fn teardown(&mut self) {
        self.drop_connection();
        self.failures = 0;
        self.state = ConnectivityState::Closed;
        debug!("Tracking driver for {} stopped", self.pair);
        self.emit(ClientEvent::Closed);
    }

    fn publish(&self, retry_in: Option<Duration>, message: Option<String>) {
        self.status.send_replace(SessionStatus {
            state: self.state,
            pair: Some(self.pair.clone()),
            failures: self.failures,
            retry_in,
            connection_id: self.connection_id.clone(),
            message,
        });
    }

    fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.events.try_send(event) {
            trace!("Event dropped: {}", e);
        }
    }
}

async fn finish_connect(
    connecting: &mut Option<ConnectFuture>,
) -> Result<Transport, TrackingError> {
    match connecting {
        Some(connect) => connect.await,
        None => std::future::pending().await,
    }
}

async fn next_transport_event(transport: &mut Option<Transport>) -> TransportEvent {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(heartbeat) => {
            heartbeat.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(retry) => retry.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_states_are_live() {
        assert!(ConnectivityState::Connecting.is_live());
        assert!(ConnectivityState::Connected.is_live());
        assert!(ConnectivityState::Reconnecting.is_live());
        assert!(!ConnectivityState::Failed.is_live());
        assert!(!ConnectivityState::Closed.is_live());
    }

    #[test]
    fn default_status_is_closed_and_empty() {
        let status = SessionStatus::default();
        assert_eq!(status.state, ConnectivityState::Closed);
        assert!(status.pair.is_none());
        assert_eq!(status.failures, 0);
        assert_eq!(status.state.to_string(), "closed");
    }
}
