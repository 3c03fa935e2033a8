// file: src/events.rs
// description: event bus decoupling the tracking session from presentation
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StartIgnored { reason: String },
    /// `attempt` is the retry number; 0 for a fresh connect.
    Connecting { url: String, attempt: u32 },
    Connected { connection_id: String },
    HeartbeatSent,
    FrameApplied { kind: &'static str },
    FrameDropped { reason: String },
    Disconnected { reason: Option<String> },
    /// The retry that `Connecting { attempt }` will carry once `delay` elapses.
    ReconnectScheduled { attempt: u32, delay: Duration },
    Failed { message: String },
    Closed,
}

// When full, the session drops events instead of waiting.
const EVENT_CHANNEL_CAPACITY: usize = 1_024;

pub type EventSender = mpsc::Sender<ClientEvent>;
pub type EventReceiver = mpsc::Receiver<ClientEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}
