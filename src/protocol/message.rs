//! Message definitions shared by the registry, publishers and subscribers.
//!
//! Notes on fields:
//! - `topic`: opaque, case-sensitive routing key
//! - `content`: free text body
//! - `message_id`: caller-assigned id used to correlate ACKs; not guaranteed
//!   unique across the system
//! - `priority` / `timestamp`: optional on the wire. The registry's minimal
//!   forward drops them, so subscribers must cope with their absence.
//!   `timestamp` is milliseconds since UNIX epoch, set by the publisher.

use std::fmt;
use std::str::FromStr;

pub type MessageId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            other => Err(other.to_string()),
        }
    }
}

/// Delivery guarantee selected per publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    /// Fire and forget.
    AtMostOnce,
    /// Wait for an ACK, re-send on timeout.
    AtLeastOnce,
    /// Reserved; deduplication semantics are not defined yet.
    ExactlyOnce,
}

impl fmt::Display for QosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QosLevel::AtMostOnce => "AT_MOST_ONCE",
            QosLevel::AtLeastOnce => "AT_LEAST_ONCE",
            QosLevel::ExactlyOnce => "EXACTLY_ONCE",
        };
        f.write_str(name)
    }
}

impl FromStr for QosLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "AT_MOST_ONCE" | "0" => Ok(QosLevel::AtMostOnce),
            "AT_LEAST_ONCE" | "1" => Ok(QosLevel::AtLeastOnce),
            "EXACTLY_ONCE" | "2" => Ok(QosLevel::ExactlyOnce),
            _ => Err(format!("unknown QoS level '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub content: String,
    pub message_id: MessageId,
    pub priority: Option<Priority>,
    pub timestamp: Option<i64>,
}

impl Message {
    /// Build a fully described message stamped with the current time.
    pub fn new(topic: &str, content: &str, message_id: MessageId, priority: Priority) -> Self {
        Self {
            topic: topic.to_string(),
            content: content.to_string(),
            message_id,
            priority: Some(priority),
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
        }
    }

    /// Copy without priority and timestamp, as forwarded by the registry.
    pub fn minimal(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            content: self.content.clone(),
            message_id: self.message_id,
            priority: None,
            timestamp: None,
        }
    }

    /// Age relative to `now_ms`, if the message carries a send timestamp.
    /// Clock skew that puts the timestamp in the future yields zero; a
    /// timestamp far enough in the past saturates at `i64::MAX`.
    pub fn age_ms(&self, now_ms: i64) -> Option<i64> {
        self.timestamp.map(|sent| now_ms.saturating_sub(sent).max(0))
    }
}
