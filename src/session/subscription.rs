//! Subscription session
//!
//! `SubscriptionSession` bridges one long-lived client interest to one bus
//! registration. Its lifecycle is `Connecting -> Active -> Closed`:
//! - `activate` registers on the bus and moves to `Active`;
//! - `close` (explicit unsubscribe, transport disconnect, or the end of the
//!   bus stream after a forced shutdown) unsubscribes exactly once and moves
//!   to `Closed`. Closing again is a no-op, and dropping the session closes it.
//!
//! A closed session never yields another event, even if some were still
//! queued in its channel when it closed.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{Event, EventBus, Registration, RegistrationHandle};
use crate::utils::error::{DeliveryError, SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client asked to stop receiving events.
    Unsubscribed,
    /// The transport noticed the client went away.
    Disconnected,
    /// The bus was shut down underneath the session.
    Shutdown,
}

#[derive(Debug)]
pub struct SubscriptionSession {
    id: String,
    topic: String,
    bus: Arc<EventBus>,
    state: SessionState,
    handle: Option<RegistrationHandle>,
    events: Option<mpsc::Receiver<Event>>,
    close_reason: Option<CloseReason>,
}

impl SubscriptionSession {
    /// A session in `Connecting` state; nothing is registered yet.
    pub fn new(bus: Arc<EventBus>, topic: &str) -> Self {
        Self {
            id: format!("session-{}", Uuid::new_v4()),
            topic: topic.to_string(),
            bus,
            state: SessionState::Connecting,
            handle: None,
            events: None,
            close_reason: None,
        }
    }

    /// Create and activate in one step.
    pub fn open(bus: Arc<EventBus>, topic: &str) -> Result<Self, SessionError> {
        let mut session = Self::new(bus, topic);
        session.activate()?;
        Ok(session)
    }

    /// `Connecting -> Active`. Activating an active session does nothing;
    /// a closed session cannot be reopened.
    pub fn activate(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Active => Ok(()),
            SessionState::Closed => Err(SessionError::Closed(self.id.clone())),
            SessionState::Connecting => {
                let Registration { handle, events } = self.bus.subscribe(&self.topic)?;
                self.handle = Some(handle);
                self.events = Some(events);
                self.state = SessionState::Active;
                info!("{} subscribed to {}", self.id, self.topic);
                Ok(())
            }
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// Next event, or `None` once the session is closed. If the bus ends the
    /// stream the session closes itself with `CloseReason::Shutdown`.
    ///
    /// Cancel safe: an event is never lost when the future is dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        if self.state != SessionState::Active {
            return None;
        }
        let next = match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => return None,
        };
        if next.is_none() {
            self.close(CloseReason::Shutdown);
        }
        next
    }

    /// Enter `Closed`. Returns `false` if the session was already closed.
    pub fn close(&mut self, reason: CloseReason) -> bool {
        match self.state {
            SessionState::Closed => false,
            SessionState::Connecting => {
                self.state = SessionState::Closed;
                self.close_reason = Some(reason);
                true
            }
            SessionState::Active => {
                self.state = SessionState::Closed;
                self.close_reason = Some(reason);
                // Dropping the receiver discards anything still queued.
                self.events = None;
                if let Some(handle) = self.handle.take() {
                    self.bus.unsubscribe(&handle);
                }
                info!("{} closed ({reason:?}) on {}", self.id, self.topic);
                true
            }
        }
    }

    /// Drive the session until `stop` resolves or the bus ends the stream,
    /// invoking `reconcile` for each event. A failing `reconcile` drops that
    /// event and the session carries on.
    pub async fn run_until<S, F, E>(mut self, stop: S, mut reconcile: F) -> CloseReason
    where
        S: Future<Output = CloseReason>,
        F: FnMut(&Event) -> Result<(), E>,
        E: Display,
    {
        tokio::pin!(stop);

        loop {
            tokio::select! {
                biased;
                reason = &mut stop => {
                    self.close(reason);
                    return reason;
                }
                event = self.recv() => match event {
                    Some(event) => {
                        debug!("{} received {:?}", self.id, event.topic());
                        if let Err(e) = reconcile(&event) {
                            let err = DeliveryError::Callback {
                                session: self.id.clone(),
                                reason: e.to_string(),
                            };
                            warn!("{err}");
                        }
                    }
                    None => return self.close_reason.unwrap_or(CloseReason::Shutdown),
                }
            }
        }
    }
}

impl Drop for SubscriptionSession {
    fn drop(&mut self) {
        self.close(CloseReason::Disconnected);
    }
}
