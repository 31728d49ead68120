//! The `bus` module is the in-process publish/subscribe primitive.
//!
//! Public types:
//! - `EventBus`: registers listeners per topic and fans events out to them.
//! - `Event`: the typed payload, one variant per topic.
//! - `Topic`: the ordered listener set of a single topic.

pub mod engine;
pub mod event;
pub mod topic;

pub use engine::{EventBus, Registration, RegistrationHandle, RegistrationId};
pub use event::Event;
pub use topic::{POST_CREATED, Topic};
