use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::protocol::MessageId;

type Waiters = HashMap<MessageId, (u64, oneshot::Sender<()>)>;

/// Publisher-side table of messages waiting for an ACK.
///
/// The node's receive loop completes entries as ACK datagrams arrive; the
/// publisher registers before sending and awaits the returned `AckWait`.
#[derive(Debug, Clone, Default)]
pub struct AckTable {
    waiters: Arc<Mutex<Waiters>>,
    next_token: Arc<AtomicU64>,
}

/// One registration in an `AckTable`.
///
/// Resolves with `Ok(())` when the ACK arrives, or with an error when a later
/// registration for the same id took its place. Dropping it removes the
/// registration, unless that later one has already replaced it.
#[derive(Debug)]
pub struct AckWait {
    table: AckTable,
    message_id: MessageId,
    token: u64,
    rx: oneshot::Receiver<()>,
}

impl AckTable {
    /// Register interest in `message_id`. A second registration for the same
    /// id replaces the first.
    pub fn register(&self, message_id: MessageId) -> AckWait {
        let (tx, rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(message_id, (token, tx));
        AckWait {
            table: self.clone(),
            message_id,
            token,
            rx,
        }
    }

    /// Resolve the waiter for `message_id`. Returns `false` if nobody waits.
    pub fn complete(&self, message_id: MessageId) -> bool {
        match self.lock().remove(&message_id) {
            Some((_, tx)) => tx.send(()).is_ok(),
            None => false,
        }
    }

    pub fn cancel(&self, message_id: MessageId) {
        self.lock().remove(&message_id);
    }

    pub fn is_waiting(&self, message_id: MessageId) -> bool {
        self.lock().contains_key(&message_id)
    }

    fn release(&self, message_id: MessageId, token: u64) {
        let mut waiters = self.lock();
        if waiters.get(&message_id).is_some_and(|(t, _)| *t == token) {
            waiters.remove(&message_id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Waiters> {
        // a panic while holding this lock cannot leave the map inconsistent
        self.waiters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Future for AckWait {
    type Output = Result<(), oneshot::error::RecvError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx)
    }
}

impl Drop for AckWait {
    fn drop(&mut self) {
        self.table.release(self.message_id, self.token);
    }
}
