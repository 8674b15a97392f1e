//! Publisher
//!
//! Sends PUBLISH datagrams for one topic to the registry and, depending on
//! its QoS level, waits for the matching ACK:
//! - `AtMostOnce`: send once, report success if the send went out
//! - `AtLeastOnce`: send, wait up to `ack_timeout` for `ACK:<id>`, re-send the
//!   identical datagram on timeout; at most `max_attempts` sends in total
//! - `ExactlyOnce`: rejected with `PubSubError::UnsupportedQos`
//!
//! ACKs are read by the node's receive loop and matched by message id through
//! the node's `AckTable`, so the wait observes real traffic.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::PublisherSettings;
use crate::node::{AckWait, Node};
use crate::protocol::{Message, MessageId, Packet, Priority, QosLevel, codec};
use crate::utils::{PubSubError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total sends allowed for one message, first attempt included.
    pub max_attempts: u32,
    /// How long each attempt waits for its ACK.
    pub ack_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &PublisherSettings) -> Self {
        Self {
            max_attempts: settings.max_retries.max(1),
            ack_timeout: settings.retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&PublisherSettings::default())
    }
}

#[derive(Debug)]
pub struct Publisher {
    node: Arc<Node>,
    registry: SocketAddr,
    topic: String,
    qos: QosLevel,
    retry: RetryPolicy,
    /// Case-insensitive outbound keyword; `None` disables the filter.
    keyword: Option<String>,
    last_sent: Mutex<Option<Message>>,
}

impl Publisher {
    pub fn new(
        node: Arc<Node>,
        registry: SocketAddr,
        topic: &str,
        qos: QosLevel,
        settings: &PublisherSettings,
    ) -> Self {
        info!(node = node.name(), topic, %qos, "publisher created");
        Self {
            node,
            registry,
            topic: topic.to_string(),
            qos,
            retry: RetryPolicy::from_settings(settings),
            keyword: settings.active_keyword().map(|k| k.to_lowercase()),
            last_sent: Mutex::new(None),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: retry.max_attempts.max(1),
            ..retry
        };
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn qos(&self) -> QosLevel {
        self.qos
    }

    /// The most recent message that passed the filter and was sent.
    pub fn last_sent(&self) -> Option<Message> {
        self.last_sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn passes_filter(&self, content: &str) -> bool {
        self.keyword
            .as_ref()
            .is_none_or(|k| content.to_lowercase().contains(k.as_str()))
    }

    /// Publish `content` under `message_id`.
    ///
    /// Returns `Ok(false)` when the outbound filter rejects the content, the
    /// only send fails (`AtMostOnce`), or no ACK arrives within the retry
    /// budget (`AtLeastOnce`). Errors are reserved for messages that cannot
    /// be framed and for unsupported QoS levels.
    pub async fn publish(
        &self,
        content: &str,
        message_id: MessageId,
        priority: Priority,
    ) -> Result<bool> {
        if !self.passes_filter(content) {
            warn!(topic = %self.topic, id = message_id, content, "message failed outbound filter");
            return Ok(false);
        }
        if self.qos == QosLevel::ExactlyOnce {
            return Err(PubSubError::UnsupportedQos(self.qos));
        }

        let message = Message::new(&self.topic, content, message_id, priority);
        let payload = codec::encode(&Packet::Publish(message.clone()))?;
        *self.last_sent.lock().unwrap_or_else(|p| p.into_inner()) = Some(message);

        match self.qos {
            QosLevel::AtLeastOnce => {
                // register before the first send so a fast ACK cannot be missed;
                // the registration is released when `ack` drops, even if this
                // future is cancelled mid-wait
                let ack = self.node.acks().register(message_id);
                self.send_until_acked(&payload, message_id, ack).await
            }
            _ => match self.node.send_raw(&payload, self.registry).await {
                Ok(()) => {
                    info!(topic = %self.topic, id = message_id, %priority, "message sent");
                    Ok(true)
                }
                Err(e) => {
                    error!(topic = %self.topic, id = message_id, error = %e, "failed to send message");
                    Ok(false)
                }
            },
        }
    }

    async fn send_until_acked(
        &self,
        payload: &str,
        message_id: MessageId,
        mut ack: AckWait,
    ) -> Result<bool> {
        let max = self.retry.max_attempts;

        for attempt in 1..=max {
            match self.node.send_raw(payload, self.registry).await {
                Ok(()) if attempt == 1 => info!(topic = %self.topic, id = message_id, "message sent"),
                Ok(()) => info!(id = message_id, attempt, max, "message re-sent"),
                Err(e) => error!(id = message_id, attempt, error = %e, "failed to send message"),
            }

            match tokio::time::timeout(self.retry.ack_timeout, &mut ack).await {
                Ok(Ok(())) => {
                    info!(id = message_id, attempt, "ACK received");
                    return Ok(true);
                }
                Ok(Err(_)) => {
                    warn!(id = message_id, "wait superseded by another publish with the same id");
                    return Ok(false);
                }
                Err(_) => warn!(id = message_id, attempt, max, "no ACK before timeout"),
            }
        }

        error!(id = message_id, attempts = max, "no ACK received, giving up");
        Ok(false)
    }
}
