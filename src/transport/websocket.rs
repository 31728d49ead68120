//! WebSocket transport
//!
//! A minimal WebSocket server shared by the posts and users services.
//! Responsibilities:
//! - Accept TCP/WebSocket connections
//! - Give each connection an id, a bounded outbound queue and a send loop
//! - Parse text frames into the service's request type and hand them over
//!   on the blocking pool, one request at a time, since services call into
//!   the store synchronously
//! - On disconnect, drop the `Connection`, which stops every subscription it
//!   still tracks
//!
//! Services never touch the socket directly; they reply through
//! `Connection::reply`, which queues onto the outbound channel. A client
//! that stops reading fills its queue, and further frames are dropped for it.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::transport::message::ServerMessage;

/// A request/response service mounted on a WebSocket listener.
pub trait Service: Send + Sync + 'static {
    type Request: DeserializeOwned + Send + 'static;

    fn name(&self) -> &'static str;

    fn handle(&self, conn: &mut Connection, request: Self::Request);
}

/// Per-connection state owned by the read loop.
#[derive(Debug)]
pub struct Connection {
    id: String,
    outbound: mpsc::Sender<WsMessage>,
    // Dropping a sender tells the subscription task its client is gone.
    subscriptions: HashMap<String, oneshot::Sender<()>>,
}

impl Connection {
    pub fn new(outbound: mpsc::Sender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", Uuid::new_v4()),
            outbound,
            subscriptions: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue a message for this client. Returns `false` if it was dropped.
    pub fn reply(&self, msg: &ServerMessage) -> bool {
        send(&self.outbound, msg)
    }

    pub fn outbound(&self) -> mpsc::Sender<WsMessage> {
        self.outbound.clone()
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.contains_key(topic)
    }

    pub fn track_subscription(&mut self, topic: String, stop: oneshot::Sender<()>) {
        self.subscriptions.insert(topic, stop);
    }

    pub fn untrack_subscription(&mut self, topic: &str) -> Option<oneshot::Sender<()>> {
        self.subscriptions.remove(topic)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

/// Serialize `msg` onto an outbound queue without waiting. Returns `false`
/// when the queue is full or the client is gone.
pub fn send(outbound: &mpsc::Sender<WsMessage>, msg: &ServerMessage) -> bool {
    let text = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize message: {e}");
            return false;
        }
    };
    match outbound.try_send(WsMessage::text(text)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Outbound queue full, frame dropped");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

pub async fn bind(addr: &str) -> std::io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

/// Accept connections on `listener` forever, one task per connection.
/// Each client may have at most `queue_capacity` frames waiting to be sent.
pub async fn start_websocket_server<S: Service>(
    listener: TcpListener,
    service: Arc<S>,
    queue_capacity: usize,
) {
    // mpsc::channel panics on zero
    let queue_capacity = queue_capacity.max(1);

    match listener.local_addr() {
        Ok(addr) => info!("{} service listening on ws://{addr}", service.name()),
        Err(e) => warn!("{} service listening on unknown address: {e}", service.name()),
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept failed on {} service: {e}", service.name());
                continue;
            }
        };
        debug!("TCP connection from {peer}");
        tokio::spawn(handle_connection(stream, service.clone(), queue_capacity));
    }
}

async fn handle_connection<S: Service>(
    stream: TcpStream,
    service: Arc<S>,
    queue_capacity: usize,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<WsMessage>(queue_capacity);
    let mut conn = Connection::new(tx);
    let client_id = conn.id().to_string();
    info!("{client_id} connected to {} service", service.name());

    {
        let client_id = client_id.clone();
        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("Failed to send message to {client_id}: {e}");
                    break;
                }
            }
            debug!("Send loop closed for {client_id}");
        });
    }

    while let Some(frame) = ws_receiver.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                debug!("Read error from {client_id}: {e}");
                break;
            }
        };

        match msg {
            WsMessage::Text(text) => match serde_json::from_str::<S::Request>(text.as_str()) {
                Ok(request) => {
                    let service = service.clone();
                    let handled = task::spawn_blocking(move || {
                        service.handle(&mut conn, request);
                        conn
                    })
                    .await;
                    conn = match handled {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("Request handler for {client_id} failed: {e}");
                            return;
                        }
                    };
                }
                Err(err) => {
                    warn!(
                        "Invalid message from {client_id}: {err} | {}",
                        text.chars().take(100).collect::<String>()
                    );
                    conn.reply(&ServerMessage::error(format!("invalid request: {err}")));
                }
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    info!(
        "{client_id} disconnected from {} service, ending {} subscription(s)",
        service.name(),
        conn.subscription_count()
    );
}
