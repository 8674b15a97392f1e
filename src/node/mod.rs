//! The `node` module owns the process-local side of the transport: one UDP
//! socket per node, the single task allowed to receive on it, and the table
//! publishers use to wait for ACKs.

pub mod acks;
pub mod endpoint;

pub use acks::{AckTable, AckWait};
pub use endpoint::{Inbound, Node};

#[cfg(test)]
mod tests;
