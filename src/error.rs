// file: src/error.rs
// description: error taxonomy shared by the tracking transport, session and reducer
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("WebSocket connection error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Connection timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Missing tracking identifier: {field}")]
    MissingIdentifier { field: &'static str },

    #[error("Invalid location sample: {0}")]
    InvalidSample(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Metrics server error: {0}")]
    MetricsError(String),
}
