//! TTL Sweeper Task
//!
//! Background task that periodically removes expired cache entries,
//! independent of any caller-issued read.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::Shared;

/// Spawns the sweeper paired with a cache engine.
///
/// Each cycle sleeps for `interval`, then runs a two-phase sweep: mark
/// expired keys under the shared lock, delete them under the exclusive lock
/// with a per-key re-check, and fire eviction hooks once the lock is
/// released. The task runs until the engine's cancellation token fires
/// (engine closed) or the engine itself has been dropped; cancellation is
/// observed at cycle boundaries, an in-flight sweep is never interrupted.
///
/// Returns the task's `JoinHandle`; [`Cache::close`](crate::Cache::close)
/// awaits it so the sweeper has fully stopped before close returns.
pub(crate) fn spawn_sweeper<V>(
    shared: Weak<Shared<V>>,
    cancel: CancellationToken,
    interval: Duration,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        debug!(interval_ms = interval.as_millis() as u64, "sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            // Holding only a Weak keeps a dropped-without-close cache from
            // being kept alive by its own sweeper.
            let Some(shared) = shared.upgrade() else {
                break;
            };

            let removed = shared.sweep().await;
            if removed > 0 {
                info!(removed, "sweeper evicted expired entries");
            } else {
                debug!("sweeper pass found no expired entries");
            }
        }

        debug!("sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::error::CacheError;

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache: Cache<String> = Cache::builder()
            .sweep_interval(Duration::from_millis(10))
            .build();

        cache
            .set("expire_soon", "value".to_string(), Duration::from_millis(1))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        // Removed by the sweeper, not by a read.
        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.stat().evictions, 1);

        cache.close().await;
    }

    #[tokio::test]
    async fn test_sweeper_preserves_valid_entries() {
        let cache: Cache<String> = Cache::builder()
            .sweep_interval(Duration::from_millis(10))
            .build();

        cache
            .set("long_lived", "value".to_string(), Duration::from_secs(3600))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.get("long_lived").await.unwrap(), "value");

        cache.close().await;
    }

    #[tokio::test]
    async fn test_close_stops_sweeper() {
        let cache: Cache<u32> = Cache::builder()
            .sweep_interval(Duration::from_millis(10))
            .build();

        // close awaits the sweeper join handle; returning at all means the
        // task acknowledged shutdown.
        cache.close().await;

        assert!(matches!(cache.get("any").await, Err(CacheError::Closed)));
    }
}
