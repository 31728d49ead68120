//! The `session` module defines the per-client subscription lifecycle.
//!
//! A `SubscriptionSession` exclusively owns one bus registration and gives it
//! back to the bus on every way out: unsubscribe, disconnect, bus shutdown, or
//! being dropped.

pub mod subscription;

pub use subscription::{CloseReason, SessionState, SubscriptionSession};
