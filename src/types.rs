// file: src/types.rs
// description: wire frames and value types exchanged over the tracking WebSocket
use crate::error::TrackingError;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// Producers emit either RFC 3339 or naive ISO-8601 timestamps; naive values are UTC.
mod lenient_timestamp {
    use super::*;

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}")))
    }
}

// Absent or `null` numbers read as zero.
fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

/// The (seller, shopkeeper) pair a tracking session is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackingPair {
    pub seller_id: String,
    pub shopkeeper_id: String,
}

impl TrackingPair {
    pub fn new(seller_id: &str, shopkeeper_id: &str) -> Result<Self, TrackingError> {
        let seller_id = seller_id.trim();
        let shopkeeper_id = shopkeeper_id.trim();
        if seller_id.is_empty() {
            return Err(TrackingError::MissingIdentifier { field: "seller_id" });
        }
        if shopkeeper_id.is_empty() {
            return Err(TrackingError::MissingIdentifier {
                field: "shopkeeper_id",
            });
        }
        Ok(Self {
            seller_id: seller_id.to_string(),
            shopkeeper_id: shopkeeper_id.to_string(),
        })
    }
}

impl fmt::Display for TrackingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seller {} -> shopkeeper {}", self.seller_id, self.shopkeeper_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SellerStatus {
    Active,
    Inactive,
    Offline,
}

impl SellerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SellerStatus::Active => "active",
            SellerStatus::Inactive => "inactive",
            SellerStatus::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub speed: f64, // km/h
    #[serde(default)]
    pub heading: Option<f64>, // compass bearing in degrees
    pub status: SellerStatus,
    #[serde(default)]
    pub battery_level: Option<f64>, // percent
    #[serde(deserialize_with = "lenient_timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingMetrics {
    #[serde(default)]
    pub distance_to_shopkeeper_km: Option<f64>,
    #[serde(default)]
    pub estimated_arrival_minutes: Option<f64>,
    pub is_moving: bool,
    #[serde(deserialize_with = "lenient_timestamp::deserialize")]
    pub last_update: DateTime<Utc>,
}

/// Frames pushed by the tracking server, discriminated by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    LocationUpdate {
        location: LocationSample,
        #[serde(default)]
        tracking: Option<TrackingMetrics>,
    },
    ConnectionStatus {
        message: String,
    },
    Error {
        message: String,
    },
    Pong,
    #[serde(other)]
    Unknown,
}

/// Frames sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Ping,
}

impl InboundFrame {
    /// Parses and validates a raw text frame.
    pub fn parse(text: &str) -> Result<Self, TrackingError> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        if let InboundFrame::LocationUpdate { location, tracking } = &frame {
            location.validate()?;
            if let Some(tracking) = tracking {
                tracking.validate()?;
            }
        }
        Ok(frame)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundFrame::LocationUpdate { .. } => "location_update",
            InboundFrame::ConnectionStatus { .. } => "connection_status",
            InboundFrame::Error { .. } => "error",
            InboundFrame::Pong => "pong",
            InboundFrame::Unknown => "unknown",
        }
    }
}

impl OutboundFrame {
    pub fn to_text(&self) -> Result<String, TrackingError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl LocationSample {
    pub fn validate(&self) -> Result<(), TrackingError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(TrackingError::InvalidSample(format!(
                "latitude {} out of range",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(TrackingError::InvalidSample(format!(
                "longitude {} out of range",
                self.longitude
            )));
        }
        if !self.speed.is_finite() || self.speed < 0.0 {
            return Err(TrackingError::InvalidSample(format!(
                "speed {} must be non-negative",
                self.speed
            )));
        }
        if let Some(level) = self.battery_level
            && !(0.0..=100.0).contains(&level)
        {
            return Err(TrackingError::InvalidSample(format!(
                "battery level {level} outside 0..=100"
            )));
        }
        Ok(())
    }

    /// Get timestamp as Local DateTime
    pub fn datetime_local(&self) -> DateTime<Local> {
        self.timestamp.with_timezone(&Local)
    }
}

impl TrackingMetrics {
    pub fn validate(&self) -> Result<(), TrackingError> {
        if let Some(distance) = self.distance_to_shopkeeper_km
            && (!distance.is_finite() || distance < 0.0)
        {
            return Err(TrackingError::InvalidSample(format!(
                "distance {distance} must be non-negative"
            )));
        }
        if let Some(eta) = self.estimated_arrival_minutes
            && (!eta.is_finite() || eta < 0.0)
        {
            return Err(TrackingError::InvalidSample(format!(
                "estimated arrival {eta} must be non-negative"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_location_update_with_tracking() {
        let text = r#"{
            "type": "location_update",
            "location": {
                "latitude": 4.71, "longitude": -74.07, "speed": 12.0, "heading": 90.0,
                "status": "active", "battery_level": 80,
                "timestamp": "2026-03-01T10:15:00Z"
            },
            "tracking": {
                "distance_to_shopkeeper_km": 2.5, "estimated_arrival_minutes": 12.5,
                "is_moving": true, "last_update": "2026-03-01T10:15:00Z"
            }
        }"#;

        match InboundFrame::parse(text).unwrap() {
            InboundFrame::LocationUpdate { location, tracking } => {
                assert_eq!(location.latitude, 4.71);
                assert_eq!(location.status, SellerStatus::Active);
                assert_eq!(location.battery_level, Some(80.0));
                let tracking = tracking.unwrap();
                assert_eq!(tracking.distance_to_shopkeeper_km, Some(2.5));
                assert!(tracking.is_moving);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn optional_location_fields_default() {
        let text = r#"{"type":"location_update","location":{
            "latitude":1.0,"longitude":2.0,"status":"offline",
            "heading":null,"battery_level":null,"timestamp":"2026-03-01T10:15:00"}}"#;

        let InboundFrame::LocationUpdate { location, tracking } = InboundFrame::parse(text).unwrap()
        else {
            panic!("expected location update");
        };
        assert_eq!(location.speed, 0.0);
        assert_eq!(location.heading, None);
        assert_eq!(location.battery_level, None);
        assert!(tracking.is_none());
        assert_eq!(
            location.timestamp,
            Utc.with_ymd_and_hms(2026, 3, 1, 10, 15, 0).unwrap()
        );
    }

    #[test]
    fn parses_status_error_and_unknown_frames() {
        assert!(matches!(
            InboundFrame::parse(r#"{"type":"connection_status","message":"connected"}"#),
            Ok(InboundFrame::ConnectionStatus { message }) if message == "connected"
        ));
        assert!(matches!(
            InboundFrame::parse(r#"{"type":"error","message":"seller not sharing"}"#),
            Ok(InboundFrame::Error { .. })
        ));
        assert!(matches!(
            InboundFrame::parse(r#"{"type":"pong"}"#),
            Ok(InboundFrame::Pong)
        ));
        assert!(matches!(
            InboundFrame::parse(r#"{"type":"route_changed","route":[]}"#),
            Ok(InboundFrame::Unknown)
        ));
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse(r#"{"message":"no type"}"#).is_err());
        assert!(InboundFrame::parse(r#"{"type":"location_update"}"#).is_err());
        assert!(InboundFrame::parse(
            r#"{"type":"location_update","location":{"latitude":1.0,"longitude":2.0,
                "status":"active","timestamp":"yesterday"}}"#
        )
        .is_err());
    }

    #[test]
    fn rejects_out_of_range_samples() {
        let frame = |lat: f64, speed: f64| {
            format!(
                r#"{{"type":"location_update","location":{{"latitude":{lat},"longitude":0.0,
                    "speed":{speed},"status":"active","timestamp":"2026-03-01T10:15:00Z"}}}}"#
            )
        };
        assert!(InboundFrame::parse(&frame(91.0, 1.0)).is_err());
        assert!(InboundFrame::parse(&frame(10.0, -1.0)).is_err());
        assert!(InboundFrame::parse(&frame(10.0, 0.0)).is_ok());
    }

    #[test]
    fn battery_level_accepts_fractions_within_percent_range() {
        let frame = |battery: f64| {
            format!(
                r#"{{"type":"location_update","location":{{"latitude":1.0,"longitude":2.0,
                    "status":"active","battery_level":{battery},"timestamp":"2026-03-01T10:15:00Z"}}}}"#
            )
        };
        let InboundFrame::LocationUpdate { location, .. } = InboundFrame::parse(&frame(87.5)).unwrap()
        else {
            panic!("expected location update");
        };
        assert_eq!(location.battery_level, Some(87.5));
        assert!(InboundFrame::parse(&frame(100.5)).is_err());
        assert!(InboundFrame::parse(&frame(-1.0)).is_err());
    }

    #[test]
    fn ping_serializes_as_type_tag() {
        assert_eq!(OutboundFrame::Ping.to_text().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn pair_requires_both_identifiers() {
        assert!(matches!(
            TrackingPair::new("", "2"),
            Err(TrackingError::MissingIdentifier { field: "seller_id" })
        ));
        assert!(matches!(
            TrackingPair::new("1", "   "),
            Err(TrackingError::MissingIdentifier {
                field: "shopkeeper_id"
            })
        ));
        let pair = TrackingPair::new(" 1 ", "2").unwrap();
        assert_eq!(pair.seller_id, "1");
    }
}
