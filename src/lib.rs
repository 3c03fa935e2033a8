#![doc = include_str!("../docs/rustdoc.md")]

/// Command-line argument definitions.
pub mod cli;
/// Runtime configuration model and reconnection policy.
pub mod config;
/// Error types used across the crate.
pub mod error;
/// Event bus messages between session and UI.
pub mod events;
/// Terminal output formatters.
pub mod formatter;
/// Metrics counters and the Prometheus exporter.
pub mod monitoring;
/// Tracking session lifecycle, heartbeat and reconnection.
pub mod session;
/// Reducer turning inbound frames into the observable tracking snapshot.
pub mod tracking_state;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// Socket seam and the WebSocket connector.
pub mod transport;
/// Tracking protocol frames and value types.
pub mod types;
/// UI controller and presentation loop.
pub mod ui;

/// Primary crate error type.
pub use error::TrackingError;
pub use session::{ConnectivityState, SessionStatus, TrackingSession};
pub use tracking_state::TrackingSnapshot;
