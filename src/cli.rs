use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "seller-tracking",
    about = "live location tracking client for a seller travelling to a shopkeeper",
    version
)]
pub struct Args {
    /// Seller whose position is streamed
    #[arg(short, long)]
    pub seller: Option<String>,

    /// Shopkeeper the seller is travelling to
    #[arg(short = 'k', long)]
    pub shopkeeper: Option<String>,

    /// Tracking WebSocket base URL; seller and shopkeeper ids are appended as path segments
    #[arg(short, long, default_value = "ws://localhost:8000/ws/tracking")]
    pub url: String,

    /// Access token appended to the tracking URL as a `token` query parameter
    #[arg(long)]
    pub token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, default_value = "9090")]
    pub metrics_port: u16,

    /// Connection handshake timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Keep-alive ping interval in seconds
    #[arg(long, default_value = "45")]
    pub heartbeat_interval: u64,

    /// Delay before the first reconnection attempt in milliseconds (doubles per failure)
    #[arg(long, default_value = "1000")]
    pub reconnect_base_ms: u64,

    /// Upper bound for the reconnection delay in milliseconds
    #[arg(long, default_value = "30000")]
    pub reconnect_max_ms: u64,

    /// Maximum number of consecutive reconnection attempts before giving up
    #[arg(long, default_value = "5")]
    pub max_reconnects: u32,

    /// Log every raw inbound frame at debug level
    #[arg(long)]
    pub log_frames: bool,

    /// Output format: table, json, minimal
    #[arg(long, default_value = "table")]
    pub format: String,

    /// Disable colored output (useful for piping to files)
    #[arg(long)]
    pub no_color: bool,

    /// Quiet mode - only location updates and errors are printed
    #[arg(long)]
    pub quiet: bool,
}
