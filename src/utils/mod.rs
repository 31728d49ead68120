//! The `utils` module collects the pieces shared by every other module of
//! `postbus`: the error taxonomy and logging initialisation.

pub mod error;
pub mod logging;
