//! Endpoint directory
//!
//! A `Topic` holds the set of subscriber endpoints registered for one topic
//! name. Endpoints are identified by address + port, so re-subscribing is a
//! no-op apart from refreshing the endpoint's lease.
//!
//! Concurrency note: the directory is owned by the registry loop and is
//! neither `Sync`-shared nor locked; parallel packet handling would need a
//! lock around the whole directory.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub type SubscriberEndpoint = SocketAddr;

#[derive(Debug)]
pub struct Topic {
    pub name: String,
    /// Endpoint -> last time it (re)subscribed.
    pub subscribers: HashMap<SubscriberEndpoint, Instant>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashMap::new(),
        }
    }

    /// Add or refresh an endpoint. Returns `true` if it was not present.
    pub fn subscribe(&mut self, endpoint: SubscriberEndpoint, now: Instant) -> bool {
        self.subscribers.insert(endpoint, now).is_none()
    }

    pub fn unsubscribe(&mut self, endpoint: &SubscriberEndpoint) -> bool {
        self.subscribers.remove(endpoint).is_some()
    }

    /// Drop endpoints whose last subscribe is older than `lease`.
    fn expire(&mut self, lease: Duration, now: Instant) -> usize {
        let before = self.subscribers.len();
        self.subscribers
            .retain(|_, seen| now.saturating_duration_since(*seen) <= lease);
        before - self.subscribers.len()
    }
}

#[derive(Debug, Default)]
pub struct EndpointDirectory {
    topics: HashMap<String, Topic>,
    lease: Option<Duration>,
}

impl EndpointDirectory {
    pub fn new(lease: Option<Duration>) -> Self {
        Self {
            topics: HashMap::new(),
            lease,
        }
    }

    pub fn add(&mut self, topic: &str, endpoint: SubscriberEndpoint) -> bool {
        self.add_at(topic, endpoint, Instant::now())
    }

    pub(crate) fn add_at(&mut self, topic: &str, endpoint: SubscriberEndpoint, now: Instant) -> bool {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(endpoint, now)
    }

    pub fn remove(&mut self, topic: &str, endpoint: &SubscriberEndpoint) -> bool {
        self.topics
            .get_mut(topic)
            .is_some_and(|t| t.unsubscribe(endpoint))
    }

    /// Fan-out lookup. `None` when the topic has never been subscribed to.
    ///
    /// With a lease configured, expired endpoints are pruned first.
    pub fn endpoints(&mut self, topic: &str) -> Option<Vec<SubscriberEndpoint>> {
        self.endpoints_at(topic, Instant::now())
    }

    pub(crate) fn endpoints_at(
        &mut self,
        topic: &str,
        now: Instant,
    ) -> Option<Vec<SubscriberEndpoint>> {
        let lease = self.lease;
        let entry = self.topics.get_mut(topic)?;
        if let Some(lease) = lease {
            let expired = entry.expire(lease, now);
            if expired > 0 {
                tracing::info!(topic, expired, "expired stale subscriber endpoints");
            }
        }
        Some(entry.subscribers.keys().copied().collect())
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |t| t.subscribers.len())
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}
