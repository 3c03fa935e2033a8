// file: src/tracing_setup.rs
// description: log filter and subscriber installation for the tracking client

use crate::error::TrackingError;
use anyhow::Result;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Handshake and frame chatter from the socket stack stays at `warn` unless `RUST_LOG` says otherwise.
const QUIET_DEPENDENCIES: &[&str] = &["tungstenite=warn", "tokio_tungstenite=warn", "rustls=warn"];

/// Directive string for `level`, scoped to this crate.
pub fn filter_directives(log_level: &str) -> Result<String, TrackingError> {
    let level = Level::from_str(log_level.trim())
        .map_err(|_| TrackingError::InvalidConfig(format!("unknown log level `{log_level}`")))?;

    let mut directives = vec![format!(
        "seller_tracking={}",
        level.as_str().to_ascii_lowercase()
    )];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));
    Ok(directives.join(","))
}

pub fn setup_tracing(log_level: &str, json_logs: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(log_level)?)?,
    };

    let fmt_layer = if json_logs {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().compact().with_target(false).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
