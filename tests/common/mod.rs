//! Shared fixtures for session tests: a scripted in-memory connector.

#![allow(dead_code)]

use futures_util::future::BoxFuture;
use seller_tracking::{
    TrackingError, TrackingSession,
    config::Config,
    events::{ClientEvent, EventReceiver, create_event_channel},
    transport::{Connector, Transport, TransportEvent},
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use url::Url;

pub const BASE_URL: &str = "ws://tracking.test/ws/tracking";

/// How the next connection attempt ends.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Accept,
    Refuse,
}

/// Server side of an accepted in-memory connection.
pub struct MockServer {
    pub to_client: mpsc::Sender<TransportEvent>,
    pub from_client: mpsc::Receiver<String>,
}

impl MockServer {
    pub async fn send_text(&self, text: impl Into<String>) {
        self.to_client
            .send(TransportEvent::Frame(text.into()))
            .await
            .expect("client transport dropped");
    }

    pub async fn close(self) {
        let _ = self
            .to_client
            .send(TransportEvent::Closed {
                reason: Some("1006 abnormal closure".into()),
            })
            .await;
    }
}

/// Replays `script` for successive attempts; refuses once it runs out.
pub struct MockConnector {
    script: Mutex<VecDeque<Step>>,
    attempts: AtomicUsize,
    urls: Mutex<Vec<Url>>,
    servers: mpsc::UnboundedSender<MockServer>,
}

impl MockConnector {
    pub fn new(
        script: impl IntoIterator<Item = Step>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MockServer>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            attempts: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            servers,
        });
        (connector, accepted)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Transport, TrackingError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.clone());
        let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Refuse);
        let servers = self.servers.clone();

        Box::pin(async move {
            match step {
                Step::Refuse => Err(TrackingError::ConnectionClosed),
                Step::Accept => {
                    let (outbound_tx, outbound_rx) = mpsc::channel(16);
                    let (inbound_tx, inbound_rx) = mpsc::channel(16);
                    let _ = servers.send(MockServer {
                        to_client: inbound_tx,
                        from_client: outbound_rx,
                    });
                    Ok(Transport::new(outbound_tx, inbound_rx))
                }
            }
        })
    }
}

pub struct Harness {
    pub session: TrackingSession,
    pub connector: Arc<MockConnector>,
    pub servers: mpsc::UnboundedReceiver<MockServer>,
    pub events: EventReceiver,
}

pub fn harness(script: impl IntoIterator<Item = Step>) -> Harness {
    harness_at(BASE_URL, script)
}

/// Harness whose session builds endpoints from `base_url`.
pub fn harness_at(base_url: &str, script: impl IntoIterator<Item = Step>) -> Harness {
    let config = Arc::new(Config::with_endpoint(Url::parse(base_url).unwrap()));
    let (connector, servers) = MockConnector::new(script);
    let (event_sender, events) = create_event_channel();
    let session = TrackingSession::new(config, connector.clone(), event_sender);
    Harness {
        session,
        connector,
        servers,
        events,
    }
}

impl Harness {
    pub async fn accepted(&mut self) -> MockServer {
        self.servers.recv().await.expect("connector dropped")
    }

    /// Waits for the first event matching `pred`, returning it.
    pub async fn wait_for(&mut self, pred: impl Fn(&ClientEvent) -> bool) -> ClientEvent {
        loop {
            let event = self.events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    }

    /// Drains events already queued without waiting.
    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub fn location_update(lat: f64, lon: f64, speed: f64, tracking: Option<(f64, bool)>) -> String {
    let mut frame = json!({
        "type": "location_update",
        "location": {
            "latitude": lat,
            "longitude": lon,
            "speed": speed,
            "heading": 270.0,
            "status": "active",
            "battery_level": 76,
            "timestamp": "2026-03-01T10:15:00Z"
        }
    });
    if let Some((distance, moving)) = tracking {
        frame["tracking"] = json!({
            "distance_to_shopkeeper_km": distance,
            "estimated_arrival_minutes": 9.0,
            "is_moving": moving,
            "last_update": "2026-03-01T10:15:00Z"
        });
    }
    frame.to_string()
}
