//! Line codec for the datagram protocol.
//!
//! Every datagram is one line of colon-separated fields:
//!
//! ```text
//! SUBSCRIBE:<topic>
//! UNSUBSCRIBE:<topic>
//! PUBLISH:<topic>:<content>:<id>[:<priority>:<timestamp-ms>]
//! ACK:<id>
//! ```
//!
//! Topic and content are escaped on encode (`%` -> `%25`, `:` -> `%3A`) so a
//! delimiter can never leak into a field. Plain text needs no escaping, so
//! colon-free datagrams from peers that do not escape decode unchanged.

use thiserror::Error;

use crate::protocol::message::{Message, MessageId, Priority};

/// Largest datagram payload the protocol carries, in bytes.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

const DELIMITER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Publish(Message),
    Ack { message_id: MessageId },
}

impl Packet {
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Subscribe { .. } => "SUBSCRIBE",
            Packet::Unsubscribe { .. } => "UNSUBSCRIBE",
            Packet::Publish(_) => "PUBLISH",
            Packet::Ack { .. } => "ACK",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown message kind '{0}'")]
    UnknownKind(String),
    #[error("{kind} expects {expected} fields, got {found}")]
    FieldCount {
        kind: &'static str,
        expected: &'static str,
        found: usize,
    },
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("invalid message id '{0}'")]
    InvalidId(String),
    #[error("invalid priority '{0}'")]
    InvalidPriority(String),
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("priority and timestamp must be sent together")]
    PartialMetadata,
    #[error("encoded datagram is {0} bytes, limit is {MAX_DATAGRAM_SIZE}")]
    Oversize(usize),
}

pub fn encode(packet: &Packet) -> Result<String, CodecError> {
    let line = match packet {
        Packet::Subscribe { topic } => format!("SUBSCRIBE:{}", escape(non_empty(topic, "topic")?)),
        Packet::Unsubscribe { topic } => {
            format!("UNSUBSCRIBE:{}", escape(non_empty(topic, "topic")?))
        }
        Packet::Publish(msg) => {
            let mut line = format!(
                "PUBLISH:{}:{}:{}",
                escape(non_empty(&msg.topic, "topic")?),
                escape(&msg.content),
                msg.message_id
            );
            // the trailing pair travels together or not at all
            match (msg.priority, msg.timestamp) {
                (Some(priority), Some(ts)) => line.push_str(&format!(":{priority}:{ts}")),
                (None, None) => {}
                _ => return Err(CodecError::PartialMetadata),
            }
            line
        }
        Packet::Ack { message_id } => format!("ACK:{message_id}"),
    };

    if line.len() > MAX_DATAGRAM_SIZE {
        return Err(CodecError::Oversize(line.len()));
    }
    Ok(line)
}

pub fn decode(line: &str) -> Result<Packet, CodecError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(CodecError::Empty);
    }

    let parts: Vec<&str> = line.split(DELIMITER).collect();
    match parts[0] {
        "SUBSCRIBE" => {
            expect_fields("SUBSCRIBE", "2", parts.len(), &[2])?;
            Ok(Packet::Subscribe {
                topic: unescape(non_empty(parts[1], "topic")?),
            })
        }
        "UNSUBSCRIBE" => {
            expect_fields("UNSUBSCRIBE", "2", parts.len(), &[2])?;
            Ok(Packet::Unsubscribe {
                topic: unescape(non_empty(parts[1], "topic")?),
            })
        }
        "PUBLISH" => {
            expect_fields("PUBLISH", "4 or 6", parts.len(), &[4, 6])?;
            let (priority, timestamp) = if parts.len() == 6 {
                let priority = parts[4]
                    .parse::<Priority>()
                    .map_err(CodecError::InvalidPriority)?;
                let ts = parts[5]
                    .parse::<i64>()
                    .map_err(|_| CodecError::InvalidTimestamp(parts[5].to_string()))?;
                (Some(priority), Some(ts))
            } else {
                (None, None)
            };
            Ok(Packet::Publish(Message {
                topic: unescape(non_empty(parts[1], "topic")?),
                content: unescape(parts[2]),
                message_id: parse_id(parts[3])?,
                priority,
                timestamp,
            }))
        }
        "ACK" => {
            expect_fields("ACK", "2", parts.len(), &[2])?;
            Ok(Packet::Ack {
                message_id: parse_id(parts[1])?,
            })
        }
        other => Err(CodecError::UnknownKind(other.chars().take(32).collect())),
    }
}

fn expect_fields(
    kind: &'static str,
    expected: &'static str,
    found: usize,
    allowed: &[usize],
) -> Result<(), CodecError> {
    if allowed.contains(&found) {
        Ok(())
    } else {
        Err(CodecError::FieldCount {
            kind,
            expected,
            found,
        })
    }
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str, CodecError> {
    if value.is_empty() {
        Err(CodecError::EmptyField(field))
    } else {
        Ok(value)
    }
}

fn parse_id(raw: &str) -> Result<MessageId, CodecError> {
    raw.trim()
        .parse::<MessageId>()
        .map_err(|_| CodecError::InvalidId(raw.to_string()))
}

fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse of `escape`. Any `%` not starting a known escape is kept literally.
fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut rest = field;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = match tail.get(1..3) {
            Some(hex) if hex.eq_ignore_ascii_case("25") => Some('%'),
            Some(hex) if hex.eq_ignore_ascii_case("3A") => Some(':'),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[3..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
