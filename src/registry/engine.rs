//! Registry engine
//!
//! This module contains the routing state of the registry:
//! - the endpoint directory (topic -> set of subscriber endpoints)
//! - fan-out of every PUBLISH to the endpoints registered for its topic
//! - relay of subscriber ACKs back to the endpoint that published the message
//!
//! The engine does no I/O. Each handler returns the datagrams to send as
//! `Outbound` values and the server loop performs the sends, so routing
//! decisions are testable without sockets and a failed send to one endpoint
//! cannot affect the others.
//!
//! Fan-out is best-effort. Nothing is stored or retried here; reliability is
//! end-to-end between publisher and subscriber.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::RegistrySettings;
use crate::protocol::{Message, MessageId, Packet, codec};
use crate::registry::directory::{EndpointDirectory, SubscriberEndpoint};

/// A datagram the registry wants sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: SocketAddr,
    pub payload: String,
}

#[derive(Debug, Clone, Copy)]
struct Origin {
    endpoint: SocketAddr,
    forwarded_at: Instant,
}

#[derive(Debug)]
pub struct Registry {
    pub directory: EndpointDirectory,
    origins: HashMap<MessageId, Origin>,
    relay_ttl: Duration,
    forward_metadata: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(&RegistrySettings::default())
    }
}

impl Registry {
    pub fn new(settings: &RegistrySettings) -> Self {
        Self {
            directory: EndpointDirectory::new(settings.endpoint_lease()),
            origins: HashMap::new(),
            relay_ttl: settings.ack_relay_ttl(),
            forward_metadata: settings.forward_metadata,
        }
    }

    /// Decode one inbound datagram and route it. Malformed input is logged
    /// and produces nothing.
    pub fn handle_datagram(&mut self, text: &str, from: SocketAddr) -> Vec<Outbound> {
        match codec::decode(text) {
            Ok(Packet::Subscribe { topic }) => {
                self.on_subscribe(&topic, from);
                Vec::new()
            }
            Ok(Packet::Unsubscribe { topic }) => {
                self.on_unsubscribe(&topic, &from);
                Vec::new()
            }
            Ok(Packet::Publish(message)) => self.on_publish(&message, from),
            Ok(Packet::Ack { message_id }) => self.on_ack(message_id, from),
            Err(e) => {
                warn!(%from, error = %e, "dropping malformed datagram");
                Vec::new()
            }
        }
    }

    pub fn on_subscribe(&mut self, topic: &str, endpoint: SubscriberEndpoint) {
        if self.directory.add(topic, endpoint) {
            info!(topic, %endpoint, "subscriber registered");
        } else {
            debug!(topic, %endpoint, "subscriber refreshed");
        }
    }

    pub fn on_unsubscribe(&mut self, topic: &str, endpoint: &SubscriberEndpoint) {
        if self.directory.remove(topic, endpoint) {
            info!(topic, %endpoint, "subscriber removed");
        } else {
            debug!(topic, %endpoint, "unsubscribe for unknown endpoint");
        }
    }

    /// Forward `message` once to every endpoint registered for its topic.
    pub fn on_publish(&mut self, message: &Message, from: SocketAddr) -> Vec<Outbound> {
        let Some(endpoints) = self.directory.endpoints(&message.topic) else {
            info!(topic = %message.topic, id = message.message_id, "no subscribers for topic, dropping");
            return Vec::new();
        };
        if endpoints.is_empty() {
            info!(topic = %message.topic, id = message.message_id, "topic has no live subscribers, dropping");
            return Vec::new();
        }

        let forwarded = if self.forward_metadata {
            message.clone()
        } else {
            message.minimal()
        };
        let payload = match codec::encode(&Packet::Publish(forwarded)) {
            Ok(line) => line,
            Err(e) => {
                warn!(id = message.message_id, error = %e, "cannot re-encode message for forwarding");
                return Vec::new();
            }
        };

        let now = Instant::now();
        self.prune_origins(now);
        self.origins.insert(
            message.message_id,
            Origin {
                endpoint: from,
                forwarded_at: now,
            },
        );

        info!(
            topic = %message.topic,
            id = message.message_id,
            fan_out = endpoints.len(),
            "forwarding message"
        );
        endpoints
            .into_iter()
            .map(|to| Outbound {
                to,
                payload: payload.clone(),
            })
            .collect()
    }

    /// Relay an ACK back to whoever published `message_id`, if still known.
    pub fn on_ack(&mut self, message_id: MessageId, from: SocketAddr) -> Vec<Outbound> {
        self.prune_origins(Instant::now());
        match self.origins.get(&message_id) {
            // an origin acknowledging to itself would loop
            Some(origin) if origin.endpoint != from => {
                debug!(id = message_id, %from, to = %origin.endpoint, "relaying ACK");
                codec::encode(&Packet::Ack { message_id })
                    .map(|payload| {
                        vec![Outbound {
                            to: origin.endpoint,
                            payload,
                        }]
                    })
                    .unwrap_or_default()
            }
            _ => {
                debug!(id = message_id, %from, "ACK for unknown message, ignoring");
                Vec::new()
            }
        }
    }

    pub fn pending_relays(&self) -> usize {
        self.origins.len()
    }

    fn prune_origins(&mut self, now: Instant) {
        let ttl = self.relay_ttl;
        self.origins
            .retain(|_, o| now.saturating_duration_since(o.forwarded_at) <= ttl);
    }
}
