//! Bounded fan-out helpers for stage bodies.
//!
//! The executor runs stages strictly sequentially; concurrency inside a
//! stage's `process` is private to the stage. These helpers give stage
//! authors an order-preserving, limit-bounded way to fan out over items
//! (network fetches, per-item conversions) without hand-rolling stream
//! plumbing.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Maps `f` over `items` with at most `limit` futures in flight.
///
/// Output order matches input order regardless of completion order. A
/// `limit` of zero is treated as one.
pub async fn map_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let limit = limit.max(1);
    stream::iter(items).map(f).buffered(limit).collect().await
}

/// Runs `f` over `items` for its side effects with at most `limit`
/// futures in flight, collecting each item's error if any.
pub async fn try_for_each_bounded<T, F, Fut, E>(items: Vec<T>, limit: usize, f: F) -> Vec<E>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    map_bounded(items, limit, f)
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_map_bounded_preserves_order() {
        // Later items finish first; output order must still match input.
        let results = map_bounded(vec![30u64, 20, 10], 3, |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay
        })
        .await;

        assert_eq!(results, vec![30, 20, 10]);
    }

    #[tokio::test]
    async fn test_map_bounded_respects_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let _ = map_bounded((0..16).collect(), 4, |_| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_try_for_each_bounded_collects_errors() {
        let errors = try_for_each_bounded(vec![1, 2, 3, 4], 2, |n| async move {
            if n % 2 == 0 {
                Err(format!("item {n} failed"))
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(errors, vec!["item 2 failed", "item 4 failed"]);
    }
}
