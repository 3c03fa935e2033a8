// file: src/ui.rs
// description: terminal presentation of session events and tracking snapshots
use crate::{
    events::{ClientEvent, EventReceiver},
    formatter::{Colors, LocationFormatter, OutputFormat},
    tracking_state::TrackingSnapshot,
};
use tokio::sync::watch;
use tracing::{debug, info};

pub struct UIController {
    event_receiver: EventReceiver,
    snapshots: watch::Receiver<TrackingSnapshot>,
    formatter: LocationFormatter,
    quiet_mode: bool,
    header_printed: bool,
    last_error: Option<String>,
}

pub struct UIOptions {
    pub colored: bool,
    pub quiet: bool,
}

impl UIController {
    pub fn new(
        event_receiver: EventReceiver,
        snapshots: watch::Receiver<TrackingSnapshot>,
        format: OutputFormat,
        options: UIOptions,
    ) -> Self {
        Self {
            event_receiver,
            snapshots,
            formatter: LocationFormatter::new(format, options.colored, options.quiet),
            quiet_mode: options.quiet,
            header_printed: false,
            last_error: None,
        }
    }

    /// Runs until the session's event channel closes.
    pub async fn run(&mut self) {
        self.print_startup_banner();
        let mut snapshots_open = true;

        loop {
            tokio::select! {
                event = self.event_receiver.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                changed = self.snapshots.changed(), if snapshots_open => {
                    if changed.is_err() {
                        snapshots_open = false;
                        continue;
                    }
                    let snapshot = self.snapshots.borrow_and_update().clone();
                    self.render_snapshot(&snapshot);
                }
            }
        }

        debug!("UI loop finished after {} updates", self.formatter.update_count());
    }

    fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::StartIgnored { reason } => {
                self.print_error("NOT STARTED", &reason);
            }
            ClientEvent::Connecting { url, attempt } => {
                let detail = match attempt {
                    0 => url,
                    n => format!("{url} (retry {n})"),
                };
                self.print_connection_status("CONNECTING", &detail);
            }
            ClientEvent::Connected { connection_id } => {
                self.print_connection_status("CONNECTED", &format!("ID: {connection_id}"));
                if !self.header_printed {
                    self.formatter.print_header();
                    self.header_printed = true;
                }
            }
            ClientEvent::HeartbeatSent => {
                debug!("Heartbeat sent");
            }
            ClientEvent::FrameApplied { kind } => {
                debug!("Applied {} frame", kind);
            }
            ClientEvent::FrameDropped { reason } => {
                debug!("Dropped frame: {}", reason);
            }
            ClientEvent::Disconnected { reason } => {
                self.print_connection_status(
                    "DISCONNECTED",
                    reason.as_deref().unwrap_or("Connection closed"),
                );
            }
            ClientEvent::ReconnectScheduled { attempt, delay } => {
                self.print_reconnect_info(delay.as_millis(), attempt);
            }
            ClientEvent::Failed { message } => {
                self.print_error("CONNECTION FAILED", &message);
                self.print_connection_status("HINT", "type `r` + Enter to reconnect, `q` to quit");
            }
            ClientEvent::Closed => {
                info!("Tracking session closed");
                self.print_connection_status("STOPPING", "Tracking stopped");
            }
        }
    }

    fn render_snapshot(&mut self, snapshot: &TrackingSnapshot) {
        if snapshot.last_error != self.last_error {
            if let Some(error) = &snapshot.last_error {
                self.print_error("TRACKING ERROR", error);
            }
            self.last_error = snapshot.last_error.clone();
        }

        if !self.header_printed {
            self.formatter.print_header();
            self.header_printed = true;
        }
        self.formatter.print_snapshot(snapshot);
    }

    fn print_startup_banner(&self) {
        if self.quiet_mode {
            return;
        }

        println!();
        println!(
            "{}{}╔══════════════════════════════════════════════════════════════════════════════╗{}",
            Colors::BOLD,
            Colors::BRIGHT_CYAN,
            Colors::RESET
        );
        println!(
            "{}{}║                           SELLER LIVE TRACKING                               ║{}",
            Colors::BOLD,
            Colors::BRIGHT_CYAN,
            Colors::RESET
        );
        println!(
            "{}{}╚══════════════════════════════════════════════════════════════════════════════╝{}",
            Colors::BOLD,
            Colors::BRIGHT_CYAN,
            Colors::RESET
        );
        println!(
            "{}Version {}{}",
            Colors::DIM,
            env!("CARGO_PKG_VERSION"),
            Colors::RESET
        );
        println!();
    }

    fn print_connection_status(&self, status: &str, message: &str) {
        if self.quiet_mode {
            return;
        }

        let (color, symbol) = match status {
            "CONNECTING" => (Colors::BRIGHT_YELLOW, "*"),
            "CONNECTED" => (Colors::BRIGHT_GREEN, "+"),
            "DISCONNECTED" => (Colors::BRIGHT_RED, "X"),
            "STOPPING" => (Colors::BRIGHT_MAGENTA, "!"),
            "HINT" => (Colors::BRIGHT_BLUE, "?"),
            _ => (Colors::WHITE, "-"),
        };

        println!(
            "{}{}[{}]{} {} {}{}{}",
            Colors::BOLD,
            color,
            status,
            Colors::RESET,
            symbol,
            Colors::WHITE,
            message,
            Colors::RESET
        );
    }

    fn print_error(&self, error_type: &str, message: &str) {
        println!(
            "{}{}[{}]{} ! {}{}{}",
            Colors::BOLD,
            Colors::BRIGHT_RED,
            error_type,
            Colors::RESET,
            Colors::RED,
            message,
            Colors::RESET
        );
    }

    fn print_reconnect_info(&self, delay_ms: u128, attempt: u32) {
        println!(
            "{}{}[RECONNECTING]{} > Attempt {} in {}ms...",
            Colors::BOLD,
            Colors::BRIGHT_YELLOW,
            Colors::RESET,
            attempt,
            delay_ms
        );
    }
}
