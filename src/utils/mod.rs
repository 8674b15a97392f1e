//! The `utils` module provides the pieces shared by every other module of
//! `udpsub`: the crate error type and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{PubSubError, Result};
