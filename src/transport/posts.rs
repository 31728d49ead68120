//! The posts service: post queries, post mutations through the gateway, and
//! topic subscriptions backed by `SubscriptionSession`s.

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::gateway::MutationGateway;
use crate::session::{CloseReason, SubscriptionSession};
use crate::store::{NewPost, PostPatch, PostStore};
use crate::transport::message::{PostRequest, ServerMessage};
use crate::transport::websocket::{Connection, Service, send};

#[derive(Debug)]
pub struct PostsService<S> {
    gateway: MutationGateway<S>,
}

impl<S: PostStore> PostsService<S> {
    pub fn new(gateway: MutationGateway<S>) -> Self {
        Self { gateway }
    }

    fn subscribe(&self, conn: &mut Connection, topic: String) {
        if conn.is_subscribed(&topic) {
            conn.reply(&ServerMessage::error(format!(
                "already subscribed to {topic}"
            )));
            return;
        }

        let session = match SubscriptionSession::open(self.gateway.bus().clone(), &topic) {
            Ok(session) => session,
            Err(e) => {
                warn!("{} could not subscribe to {topic}: {e}", conn.id());
                conn.reply(&ServerMessage::error(e));
                return;
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        conn.track_subscription(topic.clone(), stop_tx);
        // Queued before the forwarder exists, so it precedes every event frame.
        conn.reply(&ServerMessage::Subscribed {
            topic: topic.clone(),
        });

        let outbound = conn.outbound();
        let client_id = conn.id().to_string();
        tokio::spawn(async move {
            let stop = async move {
                match stop_rx.await {
                    Ok(()) => CloseReason::Unsubscribed,
                    Err(_) => CloseReason::Disconnected,
                }
            };

            let reason = session
                .run_until(stop, |event| {
                    let frame = ServerMessage::Event {
                        topic: topic.clone(),
                        event: event.clone(),
                    };
                    if send(&outbound, &frame) {
                        Ok(())
                    } else {
                        Err("client outbound queue full or closed")
                    }
                })
                .await;

            // The session is closed and unregistered by now, so this is the
            // last frame the forwarder sends.
            if reason == CloseReason::Unsubscribed {
                send(&outbound, &ServerMessage::Unsubscribed { topic: topic.clone() });
            }
            debug!("{client_id} subscription to {topic} ended: {reason:?}");
        });
    }

    /// A tracked subscription is acknowledged by its forwarder once the
    /// session has closed; anything else is acknowledged at once.
    fn unsubscribe(&self, conn: &mut Connection, topic: String) {
        if let Some(stop) = conn.untrack_subscription(&topic) {
            if stop.send(()).is_ok() {
                return;
            }
        } else {
            debug!("{} was not subscribed to {topic}", conn.id());
        }
        conn.reply(&ServerMessage::Unsubscribed { topic });
    }
}

impl<S: PostStore> Service for PostsService<S> {
    type Request = PostRequest;

    fn name(&self) -> &'static str {
        "posts"
    }

    fn handle(&self, conn: &mut Connection, request: PostRequest) {
        let store = self.gateway.store();
        let result = match request {
            PostRequest::Subscribe { topic } => return self.subscribe(conn, topic),
            PostRequest::Unsubscribe { topic } => return self.unsubscribe(conn, topic),
            PostRequest::Posts => store.posts().map(|posts| ServerMessage::Posts { posts }),
            PostRequest::Post { id } => store.post(&id).map(|post| ServerMessage::Post { post }),
            PostRequest::CreatePost {
                title,
                content,
                owner_id,
            } => self
                .gateway
                .create_post(NewPost::new(title, content, owner_id))
                .map(|post| ServerMessage::Post { post }),
            PostRequest::UpdatePost { id, title, content } => self
                .gateway
                .update_post(&id, PostPatch { title, content })
                .map(|post| ServerMessage::Post { post }),
            PostRequest::DeletePost { id } => self
                .gateway
                .delete_post(&id)
                .map(|post| ServerMessage::Post { post }),
        };

        let reply = result.unwrap_or_else(|e| {
            warn!("Request from {} failed: {e}", conn.id());
            ServerMessage::error(e)
        });
        conn.reply(&reply);
    }
}
