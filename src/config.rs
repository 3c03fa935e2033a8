// file: src/config.rs
// description: runtime configuration for the tracking endpoint, reconnection policy and heartbeat
use crate::{cli::Args, error::TrackingError, types::TrackingPair};
use anyhow::Result;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(45);
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub websocket: WebSocketConfig,
    pub reconnect: ReconnectPolicy,
    pub heartbeat: HeartbeatConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Base URL; the tracked pair is appended as `/{seller}/{shopkeeper}`.
    pub url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Bounded exponential backoff between reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub log_frames: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_delay: DEFAULT_RECONNECT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry `failures` (zero-based count of consecutive failures).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether another retry may be scheduled after `failures` consecutive failures.
    pub fn allows_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl WebSocketConfig {
    /// Builds the connection URL scoped to one tracking pair.
    pub fn endpoint_for(&self, pair: &TrackingPair) -> Result<Url, TrackingError> {
        let mut url = self.url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                TrackingError::InvalidConfig(format!("{} cannot carry path segments", self.url))
            })?;
            segments
                .pop_if_empty()
                .push(&pair.seller_id)
                .push(&pair.shopkeeper_id);
        }
        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}

impl Config {
    /// Default settings against the given base URL.
    pub fn with_endpoint(url: Url) -> Self {
        Config {
            websocket: WebSocketConfig {
                url,
                token: None,
                timeout: DEFAULT_CONNECT_TIMEOUT,
            },
            reconnect: ReconnectPolicy::default(),
            heartbeat: HeartbeatConfig::default(),
            metrics: MetricsConfig {
                enabled: false,
                port: 9090,
            },
            logging: LoggingConfig::default(),
        }
    }

    pub fn from_args(args: &Args) -> Result<Self> {
        let url = Url::parse(&args.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TrackingError::InvalidConfig(format!(
                "tracking URL must use ws or wss, got {}",
                url.scheme()
            ))
            .into());
        }
        if url.cannot_be_a_base() {
            return Err(
                TrackingError::InvalidConfig(format!("{url} cannot carry path segments")).into(),
            );
        }
        if args.heartbeat_interval == 0 {
            return Err(
                TrackingError::InvalidConfig("heartbeat interval must be positive".into()).into(),
            );
        }
        if args.reconnect_max_ms < args.reconnect_base_ms {
            return Err(TrackingError::InvalidConfig(format!(
                "reconnect max delay ({}ms) is below base delay ({}ms)",
                args.reconnect_max_ms, args.reconnect_base_ms
            ))
            .into());
        }

        Ok(Config {
            websocket: WebSocketConfig {
                url,
                token: args.token.clone().filter(|t| !t.is_empty()),
                timeout: Duration::from_secs(args.timeout),
            },
            reconnect: ReconnectPolicy {
                base_delay: Duration::from_millis(args.reconnect_base_ms),
                max_delay: Duration::from_millis(args.reconnect_max_ms),
                max_attempts: args.max_reconnects,
            },
            heartbeat: HeartbeatConfig {
                interval: Duration::from_secs(args.heartbeat_interval),
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
            logging: LoggingConfig {
                log_frames: args.log_frames,
            },
        })
    }
}
