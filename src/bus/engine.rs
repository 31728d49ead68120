//! Event bus engine
//!
//! The in-memory bus responsible for:
//! - managing topics and their listener registrations
//! - fanning published events out to every listener on the topic
//! - enforcing the registration limit
//! - forced shutdown, which ends every listener's stream
//!
//! Concurrency and usage notes:
//! - The registry (topic name -> `Topic`) is the only shared mutable state and
//!   sits behind one `Mutex`. `subscribe`, `unsubscribe` and `publish` each hold
//!   it for their whole duration, so they are linearizable with one another.
//!   Once `unsubscribe` returns, the listener's sender is gone and no later
//!   publish can reach it.
//! - `publish` never awaits: every listener has a bounded channel and the bus
//!   uses `try_send`. A full or closed channel is a `DeliveryError` for that
//!   listener only; it is logged and the event is dropped for it (no retry,
//!   since a retried stale event could overtake a newer one).
//! - The bus is shared as `Arc<EventBus>`; there is no process-wide instance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::event::Event;
use crate::bus::topic::Topic;
use crate::config::BusSettings;
use crate::utils::error::{BusError, DeliveryError};

pub type RegistrationId = u64;

/// Identifies one listener registration. Cheap to clone; unsubscribing with
/// a stale handle is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationHandle {
    id: RegistrationId,
    topic: String,
}

impl RegistrationHandle {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// What `subscribe` hands back: the handle used to unsubscribe and the
/// receiving end of the listener's channel.
#[derive(Debug)]
pub struct Registration {
    pub handle: RegistrationHandle,
    pub events: mpsc::Receiver<Event>,
}

#[derive(Debug, Default)]
struct Registry {
    topics: HashMap<String, Topic>,
    registrations: usize,
    shut_down: bool,
}

#[derive(Debug)]
pub struct EventBus {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    max_registrations: usize,
    channel_capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(&BusSettings::default())
    }
}

impl EventBus {
    pub fn new(settings: &BusSettings) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
            max_registrations: settings.max_registrations,
            // mpsc::channel panics on zero
            channel_capacity: settings.channel_capacity.max(1),
        }
    }

    // A panic while holding the lock cannot leave the table half-updated:
    // every mutation is a single insert/remove.
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new listener on `topic`, creating the topic if needed.
    pub fn subscribe(&self, topic: &str) -> Result<Registration, BusError> {
        let mut registry = self.registry();

        if registry.shut_down {
            return Err(BusError::ShutDown);
        }
        if registry.registrations >= self.max_registrations {
            warn!(
                "Refusing subscription to {topic}: {} registrations in use",
                registry.registrations
            );
            return Err(BusError::Capacity {
                limit: self.max_registrations,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        registry
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(id, tx);
        registry.registrations += 1;

        debug!("Listener {id} subscribed to {topic}");

        Ok(Registration {
            handle: RegistrationHandle {
                id,
                topic: topic.to_string(),
            },
            events: rx,
        })
    }

    /// Remove a registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: &RegistrationHandle) -> bool {
        let mut registry = self.registry();

        let Some(topic) = registry.topics.get_mut(&handle.topic) else {
            return false;
        };
        let removed = topic.unsubscribe(handle.id);
        if topic.is_empty() {
            registry.topics.remove(&handle.topic);
        }
        if removed {
            registry.registrations -= 1;
            debug!("Listener {} unsubscribed from {}", handle.id, handle.topic);
        }
        removed
    }

    /// Deliver `event` to every listener currently on `topic`, in
    /// registration order. Returns how many listeners accepted it.
    pub fn publish(&self, topic: &str, event: Event) -> usize {
        let mut registry = self.registry();

        let Some(listeners) = registry.topics.get(topic) else {
            debug!("No listeners on {topic}, event dropped");
            return 0;
        };

        let (delivered, failures) = listeners.fan_out(&event);

        let mut gone = Vec::new();
        for failure in failures {
            warn!("Delivery on {topic} failed: {failure}");
            if let DeliveryError::Disconnected(id) = failure {
                gone.push(id);
            }
        }

        // Receivers dropped without unsubscribing; reclaim their slots.
        if !gone.is_empty() {
            let pruned = registry
                .topics
                .get_mut(topic)
                .map(|t| gone.iter().filter(|id| t.unsubscribe(**id)).count())
                .unwrap_or(0);
            registry.registrations -= pruned;
            if registry.topics.get(topic).is_some_and(Topic::is_empty) {
                registry.topics.remove(topic);
            }
        }

        debug!("Published {} on {topic} to {delivered} listener(s)", event.topic());
        delivered
    }

    /// Drop every registration and refuse new ones. Each session sees its
    /// stream end and closes itself.
    pub fn shutdown(&self) {
        let mut registry = self.registry();
        if registry.shut_down {
            return;
        }
        registry.shut_down = true;
        let dropped = registry.registrations;
        registry.topics.clear();
        registry.registrations = 0;
        info!("Event bus shut down, {dropped} registration(s) dropped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.registry().shut_down
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.registry()
            .topics
            .get(topic)
            .map_or(0, |t| t.listeners.len())
    }

    pub fn registration_count(&self) -> usize {
        self.registry().registrations
    }
}
