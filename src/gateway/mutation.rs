use std::sync::Arc;

use tracing::{debug, info};

use crate::bus::{Event, EventBus, POST_CREATED};
use crate::store::{NewPost, Post, PostPatch, PostStore};
use crate::utils::error::StoreError;

/// Entry point for state-changing post operations.
///
/// Store errors come back unchanged and nothing is published for them. A
/// successful create is announced on `post-created` only after the store
/// has returned, so whoever is woken by the event can already read the post.
#[derive(Debug)]
pub struct MutationGateway<S> {
    store: Arc<S>,
    bus: Arc<EventBus>,
}

impl<S> Clone for MutationGateway<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<S: PostStore> MutationGateway<S> {
    pub fn new(store: Arc<S>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn create_post(&self, draft: NewPost) -> Result<Post, StoreError> {
        let post = self.store.create_post(draft)?;
        info!("Post {} created by {}", post.id, post.owner_id);

        let delivered = self.bus.publish(POST_CREATED, Event::from(post.clone()));
        debug!("Post {} announced to {delivered} listener(s)", post.id);

        Ok(post)
    }

    /// Not announced; listeners only learn about creations.
    pub fn update_post(&self, id: &str, patch: PostPatch) -> Result<Post, StoreError> {
        self.store.update_post(id, patch)
    }

    pub fn delete_post(&self, id: &str) -> Result<Post, StoreError> {
        self.store.delete_post(id)
    }
}
