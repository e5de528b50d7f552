use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{error, info, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::broadcast::hub::BroadcastHub;
use crate::broadcast::snapshot::KEEPALIVE_MESSAGE;
use crate::config::{KEEPALIVE_INTERVAL_SECS, WRITE_TIMEOUT_SECS};

/// One viewer connection. Receives a full snapshot on connect, then
/// change-triggered snapshots or keep-alive pings. Any write failure closes
/// the session and removes it from the registry; the client reconnects on its
/// own schedule.
pub struct SubscriberSession {
    hub: Arc<BroadcastHub>,
    peer_addr: String,
    keepalive: Duration,
}

impl SubscriberSession {
    pub fn new(hub: Arc<BroadcastHub>, peer_addr: String) -> Self {
        Self {
            hub,
            peer_addr,
            keepalive: Duration::from_secs(KEEPALIVE_INTERVAL_SECS),
        }
    }

    /// Overrides the idle window before a keep-alive ping is sent.
    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive = interval;
        self
    }

    /// Performs the WebSocket handshake (only path `/ws` is served) and runs
    /// the session to completion.
    pub async fn run(self, stream: TcpStream) {
        let peer_addr = self.peer_addr.clone();

        let ws_stream = match accept_hdr_async(stream, |req: &Request, response: Response| {
            let path = req.uri().path();
            if path == "/ws" {
                Ok(response)
            } else {
                warn!("Unknown WebSocket path '{}' from {}", path, peer_addr);
                Err(Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .body(Some("Invalid WebSocket path".to_string()))
                    .unwrap())
            }
        })
        .await
        {
            Ok(ws) => ws,
            Err(e) => {
                error!("WebSocket handshake failed for {}: {:?}", peer_addr, e);
                return;
            }
        };

        self.run_established(ws_stream).await;
    }

    async fn run_established(self, ws_stream: WebSocketStream<TcpStream>) {
        // Subscribe before building the initial snapshot: anything that
        // changes from here on arrives through the receiver, so the first
        // message reflects state no older than registration.
        let mut rx = self.hub.subscribe();
        let initial = self.hub.current_snapshot();

        let connection_id = self.hub.registry().register(self.peer_addr.clone());
        let (mut write, read) = ws_stream.split();

        if let Err(e) = send_with_timeout(&mut write, initial.as_str().to_string()).await {
            error!("Error sending initial snapshot to {}: {}", self.peer_addr, e);
            self.hub.registry().deregister(connection_id);
            return;
        }

        let (close_tx, mut close_rx) = mpsc::channel::<()>(1);
        let read_task = spawn_read_task(read, close_tx, self.peer_addr.clone());

        let keepalive = self.keepalive;
        let mut shutdown_rx = self.hub.shutdown_watch();

        loop {
            tokio::select! {
                result = timeout(keepalive, rx.recv()) => {
                    let outgoing = match result {
                        Ok(Ok(snapshot)) => snapshot.as_str().to_string(),
                        Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped))) => {
                            // The socket cannot keep up with the broadcast
                            // rate; dropping it protects the hub and peers.
                            warn!(
                                "Subscriber #{} from {} lagged by {} messages, closing",
                                connection_id, self.peer_addr, skipped
                            );
                            break;
                        }
                        Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                            info!("Broadcast channel closed, ending session #{}", connection_id);
                            break;
                        }
                        // Idle window elapsed with no data change.
                        Err(_) => KEEPALIVE_MESSAGE.to_string(),
                    };

                    if let Err(e) = send_with_timeout(&mut write, outgoing).await {
                        warn!(
                            "Delivery to subscriber #{} from {} failed: {}",
                            connection_id, self.peer_addr, e
                        );
                        break;
                    }
                }
                _ = close_rx.recv() => {
                    info!("Subscriber #{} from {} closed the connection", connection_id, self.peer_addr);
                    break;
                }
                _ = shutdown_rx.changed() => {
                    info!("Shutdown requested, closing subscriber #{}", connection_id);
                    let _ = timeout(
                        Duration::from_secs(WRITE_TIMEOUT_SECS),
                        write.send(Message::Close(None)),
                    )
                    .await;
                    break;
                }
            }
        }

        read_task.abort();
        self.hub.registry().deregister(connection_id);
        info!(
            "WebSocket session ended for subscriber #{} from {}",
            connection_id, self.peer_addr
        );
    }
}

/// Bounded socket write so one stalled subscriber never blocks its session
/// task indefinitely.
async fn send_with_timeout(
    write: &mut futures::stream::SplitSink<WebSocketStream<TcpStream>, Message>,
    text: String,
) -> Result<(), String> {
    match timeout(Duration::from_secs(WRITE_TIMEOUT_SECS), write.send(Message::Text(text))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("write error: {}", e)),
        Err(_) => Err("write timed out".to_string()),
    }
}

/// Drains incoming frames. Viewers do not send data; the task only watches
/// for close frames and transport errors, then signals the write loop.
fn spawn_read_task(
    mut read: futures::stream::SplitStream<WebSocketStream<TcpStream>>,
    close_tx: mpsc::Sender<()>,
    peer_addr: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Close(close_frame)) => {
                    info!("Received close frame from {}: {:?}", peer_addr, close_frame);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(other) => {
                    info!("Ignoring {} bytes of client data from {}", other.len(), peer_addr);
                }
                Err(e) => {
                    warn!("Error reading from {}: {:?}", peer_addr, e);
                    break;
                }
            }
        }

        if close_tx.send(()).await.is_err() {
            // Write loop already gone; nothing to signal.
        }
    })
}
