// file: src/tracking_state.rs
// description: reduces inbound tracking frames into the snapshot the UI observes
use crate::types::{InboundFrame, LocationSample, TrackingMetrics};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Everything the UI knows about the tracked seller, replaced wholesale per frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingSnapshot {
    pub location: Option<LocationSample>,
    pub metrics: Option<TrackingMetrics>,
    pub last_error: Option<String>,
    pub status_message: Option<String>,
    /// Arrival counter of the `location_update` that produced `location`.
    pub location_seq: u64,
    /// Arrival counter of the `location_update` that produced `metrics`.
    pub metrics_seq: u64,
    pub received_at: Option<DateTime<Utc>>,
}

impl TrackingSnapshot {
    /// True when location and metrics were delivered by the same frame.
    pub fn metrics_are_current(&self) -> bool {
        self.metrics.is_some() && self.metrics_seq == self.location_seq
    }

    /// Server-reported moving flag when current, otherwise derived from speed.
    pub fn is_moving(&self) -> Option<bool> {
        if self.metrics_are_current() {
            return self.metrics.as_ref().map(|m| m.is_moving);
        }
        self.location.as_ref().map(|l| l.speed > 0.0)
    }
}

/// Result of handing one raw frame to the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Location { with_metrics: bool },
    Status(String),
    ServerError(String),
    Ignored(&'static str),
    Malformed(String),
}

impl FrameOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            FrameOutcome::Location { .. } => "location_update",
            FrameOutcome::Status(_) => "connection_status",
            FrameOutcome::ServerError(_) => "error",
            FrameOutcome::Ignored(kind) => *kind,
            FrameOutcome::Malformed(_) => "malformed",
        }
    }
}

/// Applies one frame to `current`. `None` leaves the published snapshot untouched.
pub fn reduce(current: &TrackingSnapshot, frame: InboundFrame) -> Option<TrackingSnapshot> {
    match frame {
        InboundFrame::LocationUpdate { location, tracking } => {
            let seq = current.location_seq + 1;
            let (metrics, metrics_seq) = match tracking {
                Some(metrics) => (Some(metrics), seq),
                None => (current.metrics.clone(), current.metrics_seq),
            };
            Some(TrackingSnapshot {
                location: Some(location),
                metrics,
                last_error: None,
                status_message: current.status_message.clone(),
                location_seq: seq,
                metrics_seq,
                received_at: Some(Utc::now()),
            })
        }
        InboundFrame::ConnectionStatus { message } => Some(TrackingSnapshot {
            status_message: Some(message),
            ..current.clone()
        }),
        InboundFrame::Error { message } => Some(TrackingSnapshot {
            last_error: Some(message),
            ..current.clone()
        }),
        InboundFrame::Pong | InboundFrame::Unknown => None,
    }
}

/// Owns the published snapshot. Only the session driver writes to it.
#[derive(Debug)]
pub struct TrackingReducer {
    snapshot: watch::Sender<TrackingSnapshot>,
}

impl Default for TrackingReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingReducer {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(TrackingSnapshot::default());
        Self { snapshot }
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackingSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Parses `text` and publishes the resulting snapshot. Parse failures never escape.
    pub fn apply(&self, text: &str) -> FrameOutcome {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(
                    "Dropping malformed frame: {}. Frame: {}",
                    e,
                    text.chars().take(100).collect::<String>()
                );
                return FrameOutcome::Malformed(e.to_string());
            }
        };

        let outcome = match &frame {
            InboundFrame::LocationUpdate { tracking, .. } => FrameOutcome::Location {
                with_metrics: tracking.is_some(),
            },
            InboundFrame::ConnectionStatus { message } => {
                info!("Tracking server status: {}", message);
                FrameOutcome::Status(message.clone())
            }
            InboundFrame::Error { message } => {
                warn!("Tracking server error: {}", message);
                FrameOutcome::ServerError(message.clone())
            }
            InboundFrame::Pong | InboundFrame::Unknown => {
                trace!("Ignoring {} frame", frame.kind());
                FrameOutcome::Ignored(frame.kind())
            }
        };

        self.snapshot.send_if_modified(|current| match reduce(current, frame) {
            Some(next) => {
                *current = next;
                true
            }
            None => false,
        });

        outcome
    }

    /// Forgets everything observed for the previous pair.
    pub fn reset(&self) {
        self.snapshot.send_replace(TrackingSnapshot::default());
    }
}
