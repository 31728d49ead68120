//! Wire messages. Every frame is a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::bus::Event;
use crate::store::{NewPost, NewUser, Post, User};

/// Requests understood by the posts service. The tag tells a query
/// (`posts`, `post`) from a mutation (`create_post`, ...) from a
/// subscription (`subscribe`, `unsubscribe`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostRequest {
    Posts,
    Post {
        id: String,
    },
    CreatePost {
        title: String,
        content: String,
        #[serde(rename = "ownerId")]
        owner_id: String,
    },
    UpdatePost {
        id: String,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        content: Option<String>,
    },
    DeletePost {
        id: String,
    },
    Subscribe {
        topic: String,
    },
    Unsubscribe {
        topic: String,
    },
}

impl PostRequest {
    pub fn create(draft: NewPost) -> Self {
        PostRequest::CreatePost {
            title: draft.title,
            content: draft.content,
            owner_id: draft.owner_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserRequest {
    Users,
    User {
        id: String,
    },
    CreateUser {
        name: String,
        email: String,
    },
    UpdateUser {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
    },
    DeleteUser {
        id: String,
    },
}

impl UserRequest {
    pub fn create(draft: NewUser) -> Self {
        UserRequest::CreateUser {
            name: draft.name,
            email: draft.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Posts { posts: Vec<Post> },
    Post { post: Post },
    Users { users: Vec<User> },
    User { user: User },
    Subscribed { topic: String },
    Unsubscribed { topic: String },
    Event { topic: String, event: Event },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl ToString) -> Self {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, ServerMessage::Event { .. })
    }
}
