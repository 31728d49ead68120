//! Client side of the posts service.
//!
//! `watch` keeps a live view of all posts. It never applies an event's
//! payload to the view: every `event` frame only triggers a fresh `posts`
//! query, and the view is whatever that query returns. Missed or duplicated
//! notifications therefore cannot leave the view stale for longer than one
//! round trip.

use std::ops::ControlFlow;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::bus::POST_CREATED;
use crate::store::Post;
use crate::transport::message::{PostRequest, ServerMessage};
use crate::utils::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn send_json<T: Serialize>(ws: &mut WsStream, msg: &T) -> Result<(), ClientError> {
    let text = serde_json::to_string(msg)?;
    ws.send(WsMessage::text(text)).await?;
    Ok(())
}

async fn next_message(ws: &mut WsStream) -> Result<Option<ServerMessage>, ClientError> {
    while let Some(frame) = ws.next().await {
        match frame? {
            WsMessage::Text(text) => return Ok(Some(serde_json::from_str(text.as_str())?)),
            WsMessage::Close(_) => return Ok(None),
            _ => continue,
        }
    }
    Ok(None)
}

/// Send one request and wait for its reply, skipping notifications.
pub async fn request<T: Serialize>(url: &str, msg: &T) -> Result<ServerMessage, ClientError> {
    let (mut ws, _) = connect_async(url).await?;
    send_json(&mut ws, msg).await?;

    let reply = loop {
        match next_message(&mut ws).await? {
            Some(ServerMessage::Error { message }) => return Err(ClientError::Server(message)),
            Some(reply) if reply.is_event() => continue,
            Some(reply) => break reply,
            None => return Err(ClientError::Closed),
        }
    };

    if let Err(e) = ws.close(None).await {
        debug!("Close after request failed: {e}");
    }
    Ok(reply)
}

/// Show the posts on `url` and refetch them whenever a post is created.
///
/// `render` receives every fresh result, starting with the initial query;
/// returning `ControlFlow::Break` ends the watch.
pub async fn watch<F>(url: &str, mut render: F) -> Result<(), ClientError>
where
    F: FnMut(&[Post]) -> ControlFlow<()>,
{
    let (mut ws, _) = connect_async(url).await?;
    info!("Watching posts on {url}");

    // Subscribe before the first query so no creation falls between them.
    send_json(
        &mut ws,
        &PostRequest::Subscribe {
            topic: POST_CREATED.to_string(),
        },
    )
    .await?;
    send_json(&mut ws, &PostRequest::Posts).await?;

    while let Some(msg) = next_message(&mut ws).await? {
        match msg {
            ServerMessage::Posts { posts } => {
                if render(&posts).is_break() {
                    if let Err(e) = ws.close(None).await {
                        debug!("Close after watch failed: {e}");
                    }
                    return Ok(());
                }
            }
            ServerMessage::Event { topic, event } => {
                debug!("Notification on {topic}: {event:?}");
                send_json(&mut ws, &PostRequest::Posts).await?;
            }
            ServerMessage::Subscribed { topic } => info!("Subscribed to {topic}"),
            ServerMessage::Error { message } => warn!("Server error: {message}"),
            other => debug!("Ignoring {other:?}"),
        }
    }

    info!("Posts service closed the connection");
    Ok(())
}
