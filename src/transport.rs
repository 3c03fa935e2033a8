// file: src/transport.rs
// description: socket abstraction between the session state machine and a concrete WebSocket
use crate::error::TrackingError;
use futures_util::{SinkExt, StreamExt, future::BoxFuture};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const OUTBOUND_CAPACITY: usize = 16;
const INBOUND_CAPACITY: usize = 256;

/// What a live socket reports back to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text frame, in transport order.
    Frame(String),
    /// Socket-level error; informational, always followed by `Closed`.
    Error(String),
    /// The socket is gone. Sole trigger for reconnection.
    Closed { reason: Option<String> },
}

/// One open connection: a text sink towards the server and the event stream coming back.
///
/// Dropping the transport closes the socket.
pub struct Transport {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<TransportEvent>,
    reader: Option<JoinHandle<()>>,
}

impl Transport {
    pub fn new(outbound: mpsc::Sender<String>, inbound: mpsc::Receiver<TransportEvent>) -> Self {
        Self {
            outbound,
            inbound,
            reader: None,
        }
    }

    fn with_reader(mut self, reader: JoinHandle<()>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Queues a text frame without waiting. Fails when the socket is no longer open.
    pub fn try_send(&self, text: String) -> Result<(), TrackingError> {
        self.outbound
            .try_send(text)
            .map_err(|_| TrackingError::ConnectionClosed)
    }

    /// Next event; a vanished socket task reads as a close.
    pub async fn recv(&mut self) -> TransportEvent {
        self.inbound
            .recv()
            .await
            .unwrap_or(TransportEvent::Closed { reason: None })
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Opens transports. The session owns one and calls it for every attempt.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Transport, TrackingError>>;
}

/// `tokio-tungstenite` backed connector.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn open(url: Url, timeout: Duration) -> Result<Transport, TrackingError> {
        let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| TrackingError::Timeout(timeout))??;

        info!("WebSocket connection established to {}", redact(&url));

        let (write, read) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        tokio::spawn(Self::write_loop(write, outbound_rx));
        let reader = tokio::spawn(Self::read_loop(read, inbound_tx));

        Ok(Transport::new(outbound_tx, inbound_rx).with_reader(reader))
    }

    async fn write_loop(
        mut write: futures_util::stream::SplitSink<WsStream, Message>,
        mut outbound: mpsc::Receiver<String>,
    ) {
        while let Some(text) = outbound.recv().await {
            trace!("Sending frame: {}", text);
            if let Err(e) = write.send(Message::Text(text.into())).await {
                debug!("WebSocket send failed: {}", e);
                return;
            }
        }
        // Session dropped the transport.
        if let Err(e) = write.send(Message::Close(None)).await {
            debug!("WebSocket close frame not sent: {}", e);
        }
        let _ = write.close().await;
        debug!("WebSocket writer finished");
    }

    async fn read_loop(
        mut read: futures_util::stream::SplitStream<WsStream>,
        inbound: mpsc::Sender<TransportEvent>,
    ) {
        let mut reason = None;

        while let Some(message) = read.next().await {
            let event = match message {
                Ok(Message::Text(text)) => TransportEvent::Frame(text.as_str().to_string()),
                Ok(Message::Binary(data)) => {
                    warn!(
                        "Binary frame of {} bytes ignored; tracking frames are JSON text",
                        data.len()
                    );
                    continue;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Ok(Message::Close(frame)) => {
                    debug!("Received close frame: {:?}", frame);
                    reason = frame.map(|f| format!("{} {}", f.code, f.reason.as_str()));
                    break;
                }
                Err(e) => {
                    warn!("WebSocket stream error: {}", e);
                    let _ = inbound.send(TransportEvent::Error(e.to_string())).await;
                    reason = Some(e.to_string());
                    break;
                }
            };

            if inbound.send(event).await.is_err() {
                // Session no longer listening.
                return;
            }
        }

        let _ = inbound.send(TransportEvent::Closed { reason }).await;
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Transport, TrackingError>> {
        Box::pin(Self::open(url.clone(), self.timeout))
    }
}

/// URL without its query string, which may carry the access token.
pub fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_strips_token() {
        let url = Url::parse("wss://api.example.com/ws/tracking/1/2?token=secret").unwrap();
        assert_eq!(redact(&url), "wss://api.example.com/ws/tracking/1/2");
    }

    #[tokio::test]
    async fn dropped_peer_reads_as_close() {
        let (outbound, _server_rx) = mpsc::channel(1);
        let (server_tx, inbound) = mpsc::channel(1);
        let mut transport = Transport::new(outbound, inbound);
        drop(server_tx);
        assert_eq!(
            transport.recv().await,
            TransportEvent::Closed { reason: None }
        );
    }

    #[tokio::test]
    async fn send_fails_once_peer_is_gone() {
        let (outbound, server_rx) = mpsc::channel(1);
        let (_server_tx, inbound) = mpsc::channel(1);
        let transport = Transport::new(outbound, inbound);
        assert!(transport.try_send("{}".to_string()).is_ok());
        drop(server_rx);
        assert!(transport.try_send("{}".to_string()).is_err());
    }
}
