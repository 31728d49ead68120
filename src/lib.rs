//! # postbus
//!
//! `postbus` runs a posts service and a users service over WebSockets, with an
//! in-process event bus that tells subscribed clients when a post is created.
//! Clients never trust the event payload for their view: a notification only
//! prompts them to refetch the list.
//!
//! ## Core Modules
//!
//! - `bus`: topics, registrations and fan-out of events to live listeners.
//! - `session`: one subscription's lifecycle, from connecting to closed.
//! - `gateway`: the mutation entry point; commits to the store, then publishes.
//! - `store`: post and user models and their sled-backed storage.
//! - `transport`: the JSON wire protocol and the WebSocket services.
//! - `viewer`: the client side, a live posts table and one-shot requests.
//! - `config`: loading settings from files and the environment.
//! - `utils`: error types and logging setup.

pub mod bus;
pub mod config;
pub mod gateway;
pub mod session;
pub mod store;
pub mod transport;
pub mod utils;
pub mod viewer;
