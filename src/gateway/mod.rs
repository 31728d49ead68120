//! The `gateway` module is where post mutations enter the system: write to
//! the store first, announce on the bus second.

pub mod mutation;

pub use mutation::MutationGateway;
