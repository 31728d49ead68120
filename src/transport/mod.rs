//! The `transport` module is responsible for network communication with
//! clients over WebSockets.
//!
//! It defines the JSON protocol spoken by both services, a generic WebSocket
//! server, and the two services mounted on it: posts (queries, mutations,
//! subscriptions) and users (queries, mutations).

pub mod message;
pub mod posts;
pub mod users;
pub mod websocket;

pub use posts::PostsService;
pub use users::UsersService;
pub use websocket::{Connection, Service, start_websocket_server};

#[cfg(test)]
mod tests;
