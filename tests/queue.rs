//! Bounded Queue Integration Tests
//!
//! Capacity, drop-oldest eviction and FIFO ordering of the call queue.

use openmhz_player::core::{bounded, EnqueueOutcome};
use openmhz_player::Call;
use tokio_util::sync::CancellationToken;

fn call(id: &str) -> Call {
    Call::new(id, format!("https://media.example.com/{}.m4a", id))
}

fn ids(calls: Vec<Call>) -> Vec<String> {
    calls.into_iter().map(|c| c.id).collect()
}

#[test]
fn test_capacity_two_drops_oldest() {
    let (tx, _rx) = bounded(2).unwrap();

    assert_eq!(tx.try_enqueue(call("A")), EnqueueOutcome::Enqueued);
    assert_eq!(tx.try_enqueue(call("B")), EnqueueOutcome::Enqueued);
    assert_eq!(tx.try_enqueue(call("C")), EnqueueOutcome::Evicted(call("A")));

    assert_eq!(ids(tx.snapshot()), vec!["B", "C"]);
}

#[test]
fn test_length_never_exceeds_capacity() {
    for capacity in 1..=6 {
        let (tx, _rx) = bounded(capacity).unwrap();

        for i in 0..20 {
            let outcome = tx.try_enqueue(call(&format!("c{}", i)));
            assert!(tx.len() <= capacity);

            // Exactly one eviction once full, never before
            if i < capacity {
                assert_eq!(outcome, EnqueueOutcome::Enqueued);
            } else {
                let expected = format!("c{}", i - capacity);
                assert_eq!(outcome.evicted().map(|c| c.id.clone()), Some(expected));
            }
        }

        assert_eq!(tx.len(), capacity);
    }
}

#[tokio::test]
async fn test_fifo_order_for_surviving_calls() {
    let (tx, mut rx) = bounded(3).unwrap();
    let shutdown = CancellationToken::new();

    for id in ["1", "2", "3", "4", "5"] {
        tx.try_enqueue(call(id));
    }

    // 1 and 2 were evicted; the rest come out in insertion order
    let mut out = Vec::new();
    while let Some(c) = rx.try_dequeue() {
        out.push(c.id);
    }
    assert_eq!(out, vec!["3", "4", "5"]);

    // Interleaved enqueue/dequeue keeps order too
    tx.try_enqueue(call("6"));
    tx.try_enqueue(call("7"));
    assert_eq!(rx.dequeue(&shutdown).await.unwrap().id, "6");
    tx.try_enqueue(call("8"));
    assert_eq!(rx.dequeue(&shutdown).await.unwrap().id, "7");
    assert_eq!(rx.dequeue(&shutdown).await.unwrap().id, "8");
    assert!(rx.is_empty());
}

#[tokio::test]
async fn test_blocked_dequeue_exits_on_shutdown() {
    let (tx, mut rx) = bounded(2).unwrap();
    let shutdown = CancellationToken::new();

    let waiter = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let got = rx.dequeue(&shutdown).await;
            (got, rx)
        }
    });

    tokio::task::yield_now().await;
    shutdown.cancel();

    let (got, rx) = waiter.await.unwrap();
    assert!(got.is_none());

    // Items queued after shutdown are abandoned, not handed out
    tx.try_enqueue(call("late"));
    let mut rx = rx;
    assert!(rx.dequeue(&shutdown).await.is_none());
    assert_eq!(rx.len(), 1);
}
