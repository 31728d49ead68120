//! Error types shared across `postbus`.
//!
//! Store errors travel unchanged from the store up to whoever issued the
//! mutation or query. Bus errors only reach subscribers. Delivery errors never
//! leave the bus or the session that produced them; they are logged and the
//! event is dropped for that one listener.

use thiserror::Error;

use crate::bus::RegistrationId;

/// Failures reported by a `PostStore` / `UserStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is missing or blank.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The underlying write or read failed.
    #[error("store commit failed: {0}")]
    Commit(#[from] sled::Error),

    #[error("corrupt record: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Failures of `EventBus::subscribe`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("registration table full ({limit} registrations)")]
    Capacity { limit: usize },

    #[error("event bus is shut down")]
    ShutDown,
}

/// A single listener failed to take an event. Logged, never propagated.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("listener {0} is lagging, event dropped")]
    Lagging(RegistrationId),

    #[error("listener {0} is gone, event dropped")]
    Disconnected(RegistrationId),

    #[error("reconciliation failed in session {session}: {reason}")]
    Callback { session: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("session {0} is closed")]
    Closed(String),
}

/// Errors seen by the viewer and the one-shot CLI requests.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server error: {0}")]
    Server(String),

    #[error("connection closed before a reply arrived")]
    Closed,
}
