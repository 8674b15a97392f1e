//! The `publisher` module sends topic messages to the registry and enforces
//! the publisher's quality-of-service level.

pub mod publisher;

pub use publisher::{Publisher, RetryPolicy};
