//! Events carried by the bus.
//!
//! Each variant belongs to exactly one topic and carries a snapshot of the
//! entity as the store returned it. Consumers are expected to treat an event
//! as a wake-up signal and re-read the store, not as authoritative state.

use serde::{Deserialize, Serialize};

use crate::bus::topic::POST_CREATED;
use crate::store::Post;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    PostCreated(Post),
}

impl Event {
    /// The topic this event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            Event::PostCreated(_) => POST_CREATED,
        }
    }
}

impl From<Post> for Event {
    fn from(post: Post) -> Self {
        Event::PostCreated(post)
    }
}
