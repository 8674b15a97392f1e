//! The `protocol` module defines what travels over the wire: the message
//! model (topic, content, id, priority, timestamp), the QoS levels, and the
//! colon-delimited line codec used for every datagram.

pub mod codec;
pub mod message;

pub use codec::{CodecError, MAX_DATAGRAM_SIZE, Packet, decode, encode};
pub use message::{Message, MessageId, Priority, QosLevel};

#[cfg(test)]
mod tests;
