//! The `error` module defines the error types shared across `udpsub`.
//!
//! Per-message problems (malformed datagrams, lost sends) are logged and
//! contained where they happen. Only the failures a caller can act on surface
//! as `PubSubError`: socket acquisition, encoding a message that cannot be
//! framed, or asking for a delivery mode that does not exist yet.

use std::io;

use thiserror::Error;

use crate::protocol::{CodecError, QosLevel};

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("no free port on {host} in {first}..={last}")]
    NoFreePort { host: String, first: u16, last: u16 },

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("quality-of-service level {0} is not supported")]
    UnsupportedQos(QosLevel),

    #[error("node '{0}' already has a subscriber attached")]
    InboxTaken(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, PubSubError>;
