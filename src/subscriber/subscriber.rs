//! Subscriber
//!
//! A subscriber registers its topics with the registry, then runs two tasks
//! that share one `PendingAcks` map:
//! - the receive loop takes PUBLISH datagrams from the node, applies the
//!   staleness/priority/keyword filters, ACKs accepted messages to their
//!   sender and records each ACK as pending
//! - the retry loop wakes every `ack_retry_interval`, re-sends pending ACKs
//!   and drops those that reached `max_ack_retries`
//!
//! Neither task holds the map's lock across a send: the retry loop takes a
//! snapshot of what to re-send under the lock and sends after releasing it.
//!
//! `stop()` flips the shared running flag; both loops observe it through a
//! `watch` channel and exit without waiting for further traffic.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SubscriberSettings;
use crate::node::{Inbound, Node};
use crate::protocol::{Message, MessageId, Packet, codec};
use crate::subscriber::filter::{SubscriptionFilter, Verdict};
use crate::subscriber::pending::{PendingAcks, Track};
use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct SubscriberOptions {
    pub topics: Vec<String>,
    pub filter: SubscriptionFilter,
    pub ack_retry_interval: Duration,
    pub max_ack_retries: u32,
    /// Re-send SUBSCRIBE this often to keep a registry lease alive.
    pub resubscribe_interval: Option<Duration>,
}

impl SubscriberOptions {
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_settings(topics, &SubscriberSettings::default())
    }

    pub fn from_settings<I, S>(topics: I, settings: &SubscriberSettings) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            filter: SubscriptionFilter::from_settings(settings),
            ack_retry_interval: settings.ack_retry_interval(),
            max_ack_retries: settings.max_ack_retries,
            resubscribe_interval: settings.resubscribe_interval(),
        }
    }

    pub fn filter(mut self, filter: SubscriptionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn ack_retries(mut self, interval: Duration, max: u32) -> Self {
        self.ack_retry_interval = interval;
        self.max_ack_retries = max;
        self
    }

    pub fn resubscribe_every(mut self, interval: Duration) -> Self {
        self.resubscribe_interval = Some(interval);
        self
    }
}

/// State shared by the subscriber handle and its two tasks.
#[derive(Debug)]
struct Shared {
    topics: BTreeSet<String>,
    filter: SubscriptionFilter,
    pending: Mutex<PendingAcks>,
    accepted: Mutex<Vec<Message>>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, PendingAcks> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn accepted(&self) -> MutexGuard<'_, Vec<Message>> {
        self.accepted.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Debug)]
pub struct Subscriber {
    node: Arc<Node>,
    registry: SocketAddr,
    shared: Arc<Shared>,
    running: watch::Sender<bool>,
    receive_task: JoinHandle<()>,
    retry_task: JoinHandle<()>,
}

impl Subscriber {
    /// Register with the registry and start the receive and retry loops.
    ///
    /// Fails only if the node already hosts a subscriber.
    pub async fn start(
        node: Arc<Node>,
        registry: SocketAddr,
        options: SubscriberOptions,
    ) -> Result<Self> {
        let inbox = node.attach_inbox()?;
        let shared = Arc::new(Shared {
            topics: options.topics.into_iter().collect(),
            filter: options.filter,
            pending: Mutex::new(PendingAcks::new(options.max_ack_retries)),
            accepted: Mutex::new(Vec::new()),
        });

        info!(
            node = node.name(),
            topics = ?shared.topics,
            keyword = ?shared.filter.keyword,
            high_priority_only = shared.filter.high_priority_only,
            time_limit = ?shared.filter.time_limit,
            "subscriber created"
        );

        register(&node, registry, &shared.topics).await;

        let (running, _) = watch::channel(true);
        let receive_task = tokio::spawn(receive_loop(
            node.clone(),
            shared.clone(),
            inbox,
            running.subscribe(),
        ));
        let retry_task = tokio::spawn(retry_loop(
            node.clone(),
            registry,
            shared.clone(),
            options.ack_retry_interval,
            options.resubscribe_interval,
            running.subscribe(),
        ));

        Ok(Self {
            node,
            registry,
            shared,
            running,
            receive_task,
            retry_task,
        })
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.node.local_addr()
    }

    pub fn topics(&self) -> Vec<String> {
        self.shared.topics.iter().cloned().collect()
    }

    /// Messages accepted so far, in arrival order. Redeliveries are not repeated.
    pub fn accepted(&self) -> Vec<Message> {
        self.shared.accepted().clone()
    }

    pub fn pending_acks(&self) -> usize {
        self.shared.pending().len()
    }

    /// Retry attempts made so far for a pending ACK.
    pub fn ack_attempts(&self, message_id: MessageId) -> Option<u32> {
        self.shared.pending().get(message_id).map(|p| p.attempts)
    }

    /// Stop both loops, detach from the node and unsubscribe every topic.
    pub async fn stop(&self) {
        if !self.running.send_replace(false) {
            return;
        }
        info!(node = self.node.name(), "stopping subscriber");
        self.node.detach_inbox();

        for topic in &self.shared.topics {
            let packet = Packet::Unsubscribe {
                topic: topic.clone(),
            };
            if let Err(e) = self.node.send_packet(&packet, self.registry).await {
                warn!(node = self.node.name(), topic, error = %e, "failed to unsubscribe");
            }
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.receive_task.abort();
        self.retry_task.abort();
        if self.is_running() {
            self.node.detach_inbox();
        }
    }
}

async fn register(node: &Node, registry: SocketAddr, topics: &BTreeSet<String>) {
    for topic in topics {
        let packet = Packet::Subscribe {
            topic: topic.clone(),
        };
        match node.send_packet(&packet, registry).await {
            Ok(()) => info!(node = node.name(), topic, "registered for topic"),
            Err(e) => error!(node = node.name(), topic, error = %e, "failed to register with registry"),
        }
    }
}

async fn receive_loop(
    node: Arc<Node>,
    shared: Arc<Shared>,
    mut inbox: mpsc::UnboundedReceiver<Inbound>,
    mut running: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            // only ever flipped to false
            _ = running.changed() => break,
            inbound = inbox.recv() => match inbound {
                Some(inbound) => handle_publish(&node, &shared, inbound).await,
                None => break,
            },
        }
    }
    debug!(node = node.name(), "receive loop stopped");
}

async fn handle_publish(node: &Node, shared: &Shared, inbound: Inbound) {
    let Inbound {
        message,
        from,
        received_at,
    } = inbound;
    let id = message.message_id;

    if !shared.topics.contains(&message.topic) {
        debug!(node = node.name(), topic = %message.topic, id, "not subscribed to topic, discarding");
        return;
    }

    match shared.filter.evaluate(&message, received_at) {
        Verdict::Accept => {}
        Verdict::Stale { age_ms } => {
            info!(node = node.name(), id, age_ms, content = %message.content, "skipping stale message");
            return;
        }
        Verdict::LowPriority => {
            warn!(node = node.name(), id, priority = ?message.priority, content = %message.content, "dropping message below HIGH priority");
            return;
        }
        Verdict::KeywordMismatch => {
            warn!(node = node.name(), id, content = %message.content, "rejected message, keyword mismatch");
            return;
        }
    }

    let payload = match codec::encode(&Packet::Ack { message_id: id }) {
        Ok(payload) => payload,
        Err(e) => {
            error!(node = node.name(), id, error = %e, "cannot encode ACK");
            return;
        }
    };

    let track = shared.pending().track(id, payload.clone(), from);
    match track {
        Track::New => {
            info!(
                node = node.name(),
                id,
                priority = ?message.priority,
                content = %message.content,
                "accepted message"
            );
            shared.accepted().push(message);
        }
        Track::Pending | Track::Retired => {
            debug!(node = node.name(), id, "duplicate delivery, re-acknowledging");
        }
    }

    match node.send_raw(&payload, from).await {
        Ok(()) => info!(node = node.name(), id, to = %from, "sent ACK"),
        Err(e) => error!(node = node.name(), id, error = %e, "failed to send ACK"),
    }
}

async fn retry_loop(
    node: Arc<Node>,
    registry: SocketAddr,
    shared: Arc<Shared>,
    period: Duration,
    resubscribe: Option<Duration>,
    mut running: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut registered_at = Instant::now();

    loop {
        tokio::select! {
            _ = running.changed() => break,
            _ = ticker.tick() => {
                retry_pending_acks(&node, &shared).await;

                if let Some(every) = resubscribe {
                    if registered_at.elapsed() >= every {
                        register(&node, registry, &shared.topics).await;
                        registered_at = Instant::now();
                    }
                }
            }
        }
    }
    debug!(node = node.name(), "ACK retry loop stopped");
}

async fn retry_pending_acks(node: &Node, shared: &Shared) {
    let (cycle, max) = {
        let mut pending = shared.pending();
        (pending.retry_cycle(), pending.max_retries())
    };

    for entry in &cycle.resend {
        match node.send_raw(&entry.payload, entry.destination).await {
            Ok(()) => info!(
                node = node.name(),
                id = entry.message_id,
                attempt = entry.attempts,
                max,
                "retrying ACK"
            ),
            Err(e) => error!(node = node.name(), id = entry.message_id, error = %e, "failed to retry ACK"),
        }
    }
    for id in &cycle.expired {
        error!(node = node.name(), id, max, "gave up on ACK after max retries");
    }
}
