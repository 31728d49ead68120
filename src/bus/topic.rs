//! Topic management
//!
//! A `Topic` holds the listeners registered on one topic name. Listeners are
//! kept in a `BTreeMap` keyed by registration id; ids are handed out in
//! `subscribe` order, so iteration order is registration order.
//!
//! Concurrency note: callers must synchronize access to `Topic` (the bus keeps
//! every topic behind its registry lock).

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::bus::RegistrationId;
use crate::bus::event::Event;
use crate::utils::error::DeliveryError;

/// Topic on which the posts service announces newly created posts.
pub const POST_CREATED: &str = "post-created";

#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub listeners: BTreeMap<RegistrationId, mpsc::Sender<Event>>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            listeners: BTreeMap::new(),
        }
    }

    pub fn subscribe(&mut self, id: RegistrationId, sender: mpsc::Sender<Event>) {
        self.listeners.insert(id, sender);
    }

    /// Returns whether the listener was still registered.
    pub fn unsubscribe(&mut self, id: RegistrationId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Offer `event` to every listener without waiting on any of them.
    ///
    /// Returns the number of listeners that accepted the event and the
    /// failures, in registration order.
    pub fn fan_out(&self, event: &Event) -> (usize, Vec<DeliveryError>) {
        let mut delivered = 0;
        let mut failures = Vec::new();

        for (id, sender) in &self.listeners {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => failures.push(DeliveryError::Lagging(*id)),
                Err(TrySendError::Closed(_)) => {
                    failures.push(DeliveryError::Disconnected(*id))
                }
            }
        }

        (delivered, failures)
    }
}
