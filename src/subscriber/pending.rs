//! Pending acknowledgments
//!
//! Every ACK a subscriber sends is remembered here and re-sent by the retry
//! loop until it has been retried `max_retries` times; the transport never
//! confirms an ACK, so expiry is the normal end of an entry. Invariants:
//! - an entry's `attempts` only grows and never exceeds `max_retries`
//! - once an entry is removed its id is retired and is never tracked again
//!
//! Entries are keyed by message id, so two in-flight messages sharing an id
//! share one entry.
//!
//! The retired set is the price of the second invariant: it keeps one id per
//! message ever acknowledged and is only released when the subscriber is
//! dropped, so its size is bounded by the number of distinct ids seen (at
//! most the `u32` id space).

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use crate::protocol::MessageId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAck {
    pub message_id: MessageId,
    /// The exact ACK datagram to repeat.
    pub payload: String,
    pub destination: SocketAddr,
    pub attempts: u32,
    pub first_attempt: DateTime<Utc>,
}

/// Outcome of one retry-loop cycle.
#[derive(Debug, Default)]
pub struct RetryCycle {
    /// Entries to re-send, with `attempts` already incremented.
    pub resend: Vec<PendingAck>,
    /// Ids that reached the retry limit and were removed.
    pub expired: Vec<MessageId>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Track {
    /// First time this id is acknowledged.
    New,
    /// Already awaiting retries.
    Pending,
    /// Retries already exhausted for this id.
    Retired,
}

#[derive(Debug)]
pub struct PendingAcks {
    entries: HashMap<MessageId, PendingAck>,
    /// Grows for the life of the subscriber; never pruned.
    retired: HashSet<MessageId>,
    max_retries: u32,
}

impl PendingAcks {
    pub fn new(max_retries: u32) -> Self {
        Self {
            entries: HashMap::new(),
            retired: HashSet::new(),
            max_retries,
        }
    }

    /// Record an ACK that was just sent. Only a `Track::New` id creates an entry.
    pub fn track(&mut self, message_id: MessageId, payload: String, destination: SocketAddr) -> Track {
        if self.retired.contains(&message_id) {
            return Track::Retired;
        }
        if self.entries.contains_key(&message_id) {
            return Track::Pending;
        }
        self.entries.insert(
            message_id,
            PendingAck {
                message_id,
                payload,
                destination,
                attempts: 0,
                first_attempt: Utc::now(),
            },
        );
        Track::New
    }

    /// Advance every entry by one retry. Entries reaching the limit are
    /// re-sent one last time and removed in the same cycle.
    pub fn retry_cycle(&mut self) -> RetryCycle {
        let mut cycle = RetryCycle::default();
        let ids: Vec<MessageId> = self.entries.keys().copied().collect();

        for id in ids {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            if entry.attempts < self.max_retries {
                entry.attempts += 1;
                cycle.resend.push(entry.clone());
            }
            if entry.attempts >= self.max_retries {
                self.entries.remove(&id);
                self.retired.insert(id);
                cycle.expired.push(id);
            }
        }
        cycle
    }

    pub fn get(&self, message_id: MessageId) -> Option<&PendingAck> {
        self.entries.get(&message_id)
    }

    pub fn contains(&self, message_id: MessageId) -> bool {
        self.entries.contains_key(&message_id)
    }

    pub fn is_retired(&self, message_id: MessageId) -> bool {
        self.retired.contains(&message_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
