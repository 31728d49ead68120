//! The `viewer` module is the client of the two services: a live posts table
//! that reconciles by refetching, and one-shot requests for the CLI.

pub mod table;
pub mod watch;

pub use table::render_table;
pub use watch::{request, watch};
