//! Node: a named endpoint owning one UDP socket.
//!
//! A publisher and a subscriber living in the same process share their
//! node's socket. Sends may come from any task; `recv_from` is only ever
//! called by the node's dispatcher task, which routes what it reads:
//! - `ACK` datagrams complete the matching entry in the node's `AckTable`
//! - `PUBLISH` datagrams go to the attached subscriber, if any
//! - anything else is logged and dropped

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PublisherSettings;
use crate::node::acks::AckTable;
use crate::protocol::{MAX_DATAGRAM_SIZE, Message, Packet, QosLevel, codec};
use crate::publisher::Publisher;
use crate::subscriber::{Subscriber, SubscriberOptions};
use crate::utils::{PubSubError, Result};

/// A PUBLISH datagram as handed to a subscriber.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub message: Message,
    pub from: SocketAddr,
    /// Receipt time, milliseconds since UNIX epoch.
    pub received_at: i64,
}

type InboxSlot = Arc<Mutex<Option<mpsc::UnboundedSender<Inbound>>>>;

#[derive(Debug)]
pub struct Node {
    name: String,
    socket: Arc<UdpSocket>,
    acks: AckTable,
    inbox: InboxSlot,
    dispatcher: JoinHandle<()>,
}

impl Node {
    /// Bind `addr` and start the receive loop. Must be called inside a tokio runtime.
    pub async fn bind(name: &str, addr: &str) -> Result<Arc<Self>> {
        let socket = UdpSocket::bind(addr).await.map_err(|source| PubSubError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self::from_socket(name, socket))
    }

    /// Bind the first free port in `first..=last` on `host`.
    pub async fn bind_with_fallback(
        name: &str,
        host: &str,
        first: u16,
        last: u16,
    ) -> Result<Arc<Self>> {
        for port in first..=last.max(first) {
            match UdpSocket::bind((host, port)).await {
                Ok(socket) => return Ok(Self::from_socket(name, socket)),
                Err(e) => warn!(node = name, port, error = %e, "port unavailable, trying next"),
            }
        }
        Err(PubSubError::NoFreePort {
            host: host.to_string(),
            first,
            last,
        })
    }

    pub fn from_socket(name: &str, socket: UdpSocket) -> Arc<Self> {
        let socket = Arc::new(socket);
        let acks = AckTable::default();
        let inbox: InboxSlot = Arc::new(Mutex::new(None));

        let dispatcher = tokio::spawn(dispatch_loop(
            name.to_string(),
            socket.clone(),
            acks.clone(),
            inbox.clone(),
        ));

        match socket.local_addr() {
            Ok(addr) => info!(node = name, %addr, "node started"),
            Err(_) => info!(node = name, "node started"),
        }

        Arc::new(Self {
            name: name.to_string(),
            socket,
            acks,
            inbox,
            dispatcher,
        })
    }

    /// A fresh node name, for callers that do not care about identity.
    pub fn generate_name(prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::new_v4())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn acks(&self) -> &AckTable {
        &self.acks
    }

    pub async fn send_packet(&self, packet: &Packet, to: SocketAddr) -> Result<()> {
        let line = codec::encode(packet)?;
        self.send_raw(&line, to).await?;
        Ok(())
    }

    pub async fn send_raw(&self, payload: &str, to: SocketAddr) -> std::io::Result<()> {
        self.socket.send_to(payload.as_bytes(), to).await.map(|_| ())
    }

    /// Route inbound PUBLISH datagrams to the returned channel. One subscriber per node.
    pub fn attach_inbox(&self) -> Result<mpsc::UnboundedReceiver<Inbound>> {
        let mut slot = self.inbox.lock().unwrap_or_else(|p| p.into_inner());
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(PubSubError::InboxTaken(self.name.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        Ok(rx)
    }

    pub fn detach_inbox(&self) {
        self.inbox.lock().unwrap_or_else(|p| p.into_inner()).take();
    }

    pub fn create_publisher(
        self: &Arc<Self>,
        registry: SocketAddr,
        topic: &str,
        qos: QosLevel,
        settings: &PublisherSettings,
    ) -> Publisher {
        Publisher::new(self.clone(), registry, topic, qos, settings)
    }

    pub async fn create_subscriber(
        self: &Arc<Self>,
        registry: SocketAddr,
        options: SubscriberOptions,
    ) -> Result<Subscriber> {
        Subscriber::start(self.clone(), registry, options).await
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

async fn dispatch_loop(name: String, socket: Arc<UdpSocket>, acks: AckTable, inbox: InboxSlot) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE + 1];

    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!(node = %name, error = %e, "receive failed");
                continue;
            }
        };
        if len > MAX_DATAGRAM_SIZE {
            warn!(node = %name, %from, len, "dropping oversized datagram");
            continue;
        }
        let Ok(text) = std::str::from_utf8(&buf[..len]) else {
            warn!(node = %name, %from, "dropping non UTF-8 datagram");
            continue;
        };
        debug!(node = %name, %from, raw = text, "datagram received");

        match codec::decode(text) {
            Ok(Packet::Ack { message_id }) => {
                if !acks.complete(message_id) {
                    debug!(node = %name, id = message_id, "ACK with no waiting publisher");
                }
            }
            Ok(Packet::Publish(message)) => {
                let inbound = Inbound {
                    message,
                    from,
                    received_at: chrono::Utc::now().timestamp_millis(),
                };
                let slot = inbox.lock().unwrap_or_else(|p| p.into_inner());
                match slot.as_ref() {
                    Some(tx) => {
                        if tx.send(inbound).is_err() {
                            debug!(node = %name, "subscriber gone, dropping PUBLISH");
                        }
                    }
                    None => debug!(node = %name, %from, "no subscriber on node, dropping PUBLISH"),
                }
            }
            Ok(other) => debug!(node = %name, kind = other.kind(), "ignoring datagram"),
            Err(e) => warn!(node = %name, %from, error = %e, "dropping malformed datagram"),
        }
    }
}
