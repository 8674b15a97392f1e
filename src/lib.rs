//! # udpsub
//!
//! `udpsub` is a small topic-based publish/subscribe system over UDP. A
//! central registry keeps the topic to endpoint directory and relays every
//! PUBLISH to the endpoints subscribed to its topic. Publishers can ask for
//! at-least-once delivery, confirmed by ACKs the registry relays back.
//!
//! ## Core Modules
//!
//! - `protocol`: message model, QoS levels and the line codec used on the wire.
//! - `registry`: endpoint directory, routing engine and the registry's UDP loop.
//! - `node`: a named endpoint owning one socket and the task that reads it.
//! - `publisher`: sends messages for one topic, with ACK/retry for QoS 1.
//! - `subscriber`: registers topics, filters deliveries and ACKs what it accepts.
//! - `config`: layered settings from `config/default.toml`, `.env` and `UDPSUB_*`.
//! - `utils`: shared error type and logging setup.

pub mod config;
pub mod node;
pub mod protocol;
pub mod publisher;
pub mod registry;
pub mod subscriber;
pub mod utils;

#[cfg(test)]
mod tests;
