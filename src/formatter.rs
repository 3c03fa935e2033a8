use crate::tracking_state::TrackingSnapshot;

// ANSI color codes
pub struct Colors;

impl Colors {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";

    pub const RED: &'static str = "\x1b[31m";
    pub const WHITE: &'static str = "\x1b[37m";
    pub const GRAY: &'static str = "\x1b[90m";

    // Bright colors
    pub const BRIGHT_RED: &'static str = "\x1b[91m";
    pub const BRIGHT_GREEN: &'static str = "\x1b[92m";
    pub const BRIGHT_YELLOW: &'static str = "\x1b[93m";
    pub const BRIGHT_BLUE: &'static str = "\x1b[94m";
    pub const BRIGHT_MAGENTA: &'static str = "\x1b[95m";
    pub const BRIGHT_CYAN: &'static str = "\x1b[96m";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Minimal,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "minimal" => OutputFormat::Minimal,
            _ => OutputFormat::Table,
        }
    }
}

pub struct LocationFormatter {
    format: OutputFormat,
    colored: bool,
    quiet: bool,
    update_count: u64,
    last_location_seq: u64,
}

impl LocationFormatter {
    pub fn new(format: OutputFormat, colored: bool, quiet: bool) -> Self {
        Self {
            format,
            colored,
            quiet,
            update_count: 0,
            last_location_seq: 0,
        }
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn print_header(&self) {
        if self.quiet || self.format != OutputFormat::Table {
            return;
        }

        let (gray, bold, reset) = self.palette();
        println!(
            "{bold}{gray}┌────────┬────────────┬─────────────┬─────────┬──────────┬──────────┬─────────┬──────────┐{reset}"
        );
        println!(
            "{gray}│{reset} {:<6} {gray}│{reset} {:<10} {gray}│{reset} {:<11} {gray}│{reset} {:<7} {gray}│{reset} {:<8} {gray}│{reset} {:<8} {gray}│{reset} {:<7} {gray}│{reset} {:<8} {gray}│{reset}",
            "UPDATE", "LATITUDE", "LONGITUDE", "KM/H", "STATUS", "DIST KM", "ETA MIN", "TIME"
        );
        println!(
            "{bold}{gray}├────────┼────────────┼─────────────┼─────────┼──────────┼──────────┼─────────┼──────────┤{reset}"
        );
    }

    /// Prints a row when the snapshot carries a location not printed before.
    pub fn print_snapshot(&mut self, snapshot: &TrackingSnapshot) {
        if let Some(line) = self.next_line(snapshot) {
            println!("{line}");
        }
    }

    /// Renders the snapshot only if its location changed since the last call.
    ///
    /// Status and error frames republish the same location; those yield `None`.
    pub fn next_line(&mut self, snapshot: &TrackingSnapshot) -> Option<String> {
        // A reset snapshot restarts the sequence at zero.
        if snapshot.location_seq == self.last_location_seq {
            return None;
        }
        self.last_location_seq = snapshot.location_seq;
        snapshot.location.as_ref()?;
        self.update_count += 1;
        self.render(snapshot)
    }

    pub fn render(&self, snapshot: &TrackingSnapshot) -> Option<String> {
        let location = snapshot.location.as_ref()?;
        // Metrics from an older frame are not shown next to a newer position.
        let metrics = snapshot
            .metrics
            .as_ref()
            .filter(|_| snapshot.metrics_are_current());
        let distance = metrics.and_then(|m| m.distance_to_shopkeeper_km);
        let eta = metrics.and_then(|m| m.estimated_arrival_minutes);
        let moving = snapshot.is_moving().unwrap_or(false);

        let line = match self.format {
            OutputFormat::Json => serde_json::json!({
                "update": self.update_count,
                "latitude": location.latitude,
                "longitude": location.longitude,
                "speed": location.speed,
                "heading": location.heading,
                "status": location.status.as_str(),
                "battery_level": location.battery_level,
                "timestamp": location.timestamp.to_rfc3339(),
                "distance_to_shopkeeper_km": distance,
                "estimated_arrival_minutes": eta,
                "is_moving": moving,
            })
            .to_string(),
            OutputFormat::Minimal => format!(
                "{:.5},{:.5} {:.1}km/h {} {} eta={}",
                location.latitude,
                location.longitude,
                location.speed,
                location.status.as_str(),
                if moving { "moving" } else { "stopped" },
                eta.map(|m| format!("{m:.0}m"))
                    .unwrap_or_else(|| "-".to_string())
            ),
            OutputFormat::Table => {
                let (gray, _, reset) = self.palette();
                let status_color = if !self.colored {
                    ""
                } else if moving {
                    Colors::BRIGHT_GREEN
                } else {
                    Colors::BRIGHT_YELLOW
                };
                format!(
                    "{gray}│{reset} {:<6} {gray}│{reset} {:<10.5} {gray}│{reset} {:<11.5} {gray}│{reset} {:<7.1} {gray}│{reset} {status_color}{:<8}{reset} {gray}│{reset} {:<8} {gray}│{reset} {:<7} {gray}│{reset} {:<8} {gray}│{reset}",
                    self.update_count,
                    location.latitude,
                    location.longitude,
                    location.speed,
                    location.status.as_str(),
                    distance
                        .map(|d| format!("{d:.2}"))
                        .unwrap_or_else(|| "-".to_string()),
                    eta.map(|m| format!("{m:.0}"))
                        .unwrap_or_else(|| "-".to_string()),
                    location.datetime_local().format("%H:%M:%S"),
                )
            }
        };
        Some(line)
    }

    fn palette(&self) -> (&'static str, &'static str, &'static str) {
        if self.colored {
            (Colors::GRAY, Colors::BOLD, Colors::RESET)
        } else {
            ("", "", "")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LocationSample, SellerStatus, TrackingMetrics};
    use chrono::{TimeZone, Utc};

    fn snapshot(with_current_metrics: bool) -> TrackingSnapshot {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 15, 0).unwrap();
        TrackingSnapshot {
            location: Some(LocationSample {
                latitude: 4.71,
                longitude: -74.07,
                speed: 12.0,
                heading: Some(90.0),
                status: SellerStatus::Active,
                battery_level: Some(80.0),
                timestamp: at,
            }),
            metrics: Some(TrackingMetrics {
                distance_to_shopkeeper_km: Some(2.5),
                estimated_arrival_minutes: Some(12.0),
                is_moving: true,
                last_update: at,
            }),
            location_seq: 2,
            metrics_seq: if with_current_metrics { 2 } else { 1 },
            ..TrackingSnapshot::default()
        }
    }

    #[test]
    fn parses_format_names() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("minimal"), OutputFormat::Minimal);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Table);
    }

    #[test]
    fn minimal_line_includes_eta_from_current_metrics() {
        let formatter = LocationFormatter::new(OutputFormat::Minimal, false, false);
        assert_eq!(
            formatter.render(&snapshot(true)).unwrap(),
            "4.71000,-74.07000 12.0km/h active moving eta=12m"
        );
    }

    #[test]
    fn stale_metrics_are_not_rendered() {
        let formatter = LocationFormatter::new(OutputFormat::Json, false, false);
        let line = formatter.render(&snapshot(false)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert!(value["distance_to_shopkeeper_km"].is_null());
        assert_eq!(value["is_moving"], true);
        assert_eq!(value["status"], "active");
    }

    #[test]
    fn repeated_location_prints_once() {
        let mut formatter = LocationFormatter::new(OutputFormat::Minimal, false, false);
        let first = snapshot(true);
        assert!(formatter.next_line(&first).is_some());

        let status_only = TrackingSnapshot {
            status_message: Some("Connected to tracking".into()),
            last_error: Some("seller paused sharing".into()),
            ..first.clone()
        };
        assert!(formatter.next_line(&status_only).is_none());
        assert_eq!(formatter.update_count(), 1);

        let newer = TrackingSnapshot {
            location_seq: 3,
            ..first
        };
        assert!(formatter.next_line(&newer).is_some());
        assert_eq!(formatter.update_count(), 2);
    }

    #[test]
    fn sequence_restart_after_reset_prints_again() {
        let mut formatter = LocationFormatter::new(OutputFormat::Minimal, false, false);
        assert!(formatter.next_line(&snapshot(true)).is_some());

        assert!(formatter.next_line(&TrackingSnapshot::default()).is_none());
        let restarted = TrackingSnapshot {
            location_seq: 1,
            metrics_seq: 1,
            ..snapshot(true)
        };
        assert!(formatter.next_line(&restarted).is_some());
        assert_eq!(formatter.update_count(), 2);
    }

    #[test]
    fn nothing_to_render_without_location() {
        let formatter = LocationFormatter::new(OutputFormat::Table, false, false);
        assert!(formatter.render(&TrackingSnapshot::default()).is_none());
    }
}
