//! Fixed-capacity call queue with drop-oldest insertion.
//!
//! The queue is split into a [`CallSender`] (held by the fetcher) and a
//! [`CallReceiver`] (held by the player). Neither half is `Clone`, so there is
//! exactly one writer and one reader.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::domain::Call;

/// Errors creating a queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue capacity must be at least 1")]
    ZeroCapacity,
}

/// Outcome of [`CallSender::try_enqueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// There was room; the call was appended
    Enqueued,

    /// The queue was full; the returned head was discarded to make room
    Evicted(Call),
}

impl EnqueueOutcome {
    pub fn evicted(&self) -> Option<&Call> {
        match self {
            Self::Evicted(call) => Some(call),
            Self::Enqueued => None,
        }
    }
}

struct Shared {
    capacity: usize,
    items: Mutex<VecDeque<Call>>,
    available: Notify,
}

impl Shared {
    fn items(&self) -> MutexGuard<'_, VecDeque<Call>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Create a queue holding at most `capacity` pending calls
pub fn bounded(capacity: usize) -> Result<(CallSender, CallReceiver), QueueError> {
    if capacity == 0 {
        return Err(QueueError::ZeroCapacity);
    }

    let shared = Arc::new(Shared {
        capacity,
        items: Mutex::new(VecDeque::with_capacity(capacity)),
        available: Notify::new(),
    });

    Ok((
        CallSender {
            shared: shared.clone(),
        },
        CallReceiver { shared },
    ))
}

/// Write half of the queue
pub struct CallSender {
    shared: Arc<Shared>,
}

impl CallSender {
    /// Append a call, evicting the oldest pending call if the queue is full.
    ///
    /// Never blocks and never grows the queue past its capacity.
    pub fn try_enqueue(&self, call: Call) -> EnqueueOutcome {
        let outcome = {
            let mut items = self.shared.items();
            let outcome = if items.len() >= self.shared.capacity {
                // capacity >= 1, so a full queue always has a head
                match items.pop_front() {
                    Some(oldest) => EnqueueOutcome::Evicted(oldest),
                    None => EnqueueOutcome::Enqueued,
                }
            } else {
                EnqueueOutcome::Enqueued
            };
            items.push_back(call);
            outcome
        };

        self.shared.available.notify_one();
        outcome
    }

    pub fn len(&self) -> usize {
        self.shared.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Copy of the pending calls, head first
    pub fn snapshot(&self) -> Vec<Call> {
        self.shared.items().iter().cloned().collect()
    }
}

/// Read half of the queue
pub struct CallReceiver {
    shared: Arc<Shared>,
}

impl CallReceiver {
    /// Wait for the next call.
    ///
    /// Returns `None` once `shutdown` is cancelled, without taking an item.
    pub async fn dequeue(&mut self, shutdown: &CancellationToken) -> Option<Call> {
        loop {
            if shutdown.is_cancelled() {
                return None;
            }

            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent push cannot be missed.
            notified.as_mut().enable();

            if let Some(call) = self.shared.items().pop_front() {
                return Some(call);
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }

    /// Take the head without waiting
    pub fn try_dequeue(&mut self) -> Option<Call> {
        self.shared.items().pop_front()
    }

    pub fn len(&self) -> usize {
        self.shared.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> Call {
        Call::new(id, format!("https://example.com/{}.m4a", id))
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(bounded(0), Err(QueueError::ZeroCapacity)));
    }

    #[test]
    fn test_enqueue_with_room() {
        let (tx, _rx) = bounded(3).unwrap();
        assert_eq!(tx.try_enqueue(call("a")), EnqueueOutcome::Enqueued);
        assert_eq!(tx.try_enqueue(call("b")), EnqueueOutcome::Enqueued);
        assert_eq!(tx.len(), 2);
        assert_eq!(tx.capacity(), 3);
    }

    #[test]
    fn test_full_queue_evicts_exactly_head() {
        let (tx, _rx) = bounded(2).unwrap();
        tx.try_enqueue(call("A"));
        tx.try_enqueue(call("B"));

        let outcome = tx.try_enqueue(call("C"));
        assert_eq!(outcome.evicted().map(|c| c.id.as_str()), Some("A"));

        let ids: Vec<_> = tx.snapshot().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_dequeue_returns_none_after_shutdown() {
        let (tx, mut rx) = bounded(2).unwrap();
        tx.try_enqueue(call("a"));

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        assert!(rx.dequeue(&shutdown).await.is_none());
        // Item is left in place, not consumed.
        assert_eq!(rx.len(), 1);
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_enqueue() {
        let (tx, mut rx) = bounded(2).unwrap();
        let shutdown = CancellationToken::new();

        let waiter = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { rx.dequeue(&shutdown).await }
        });

        tokio::task::yield_now().await;
        tx.try_enqueue(call("late"));

        let got = waiter.await.unwrap();
        assert_eq!(got.map(|c| c.id), Some("late".to_string()));
    }
}
