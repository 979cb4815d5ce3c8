//! Per-room mutual exclusion.
//!
//! One lock per room id serializes every mutation of that room's tournament
//! state. Acquisition is bounded retry-with-backoff rather than indefinite
//! blocking, so a wedged room cannot starve the rest of the service.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use thiserror::Error;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    time::{Instant, sleep},
};

/// Delay between acquisition attempts.
pub const ACQUIRE_RETRY_DELAY: Duration = Duration::from_millis(50);
/// Total time budget for acquiring a room lock.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(1);

/// Error returned when a room lock could not be acquired in time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("room `{code}` is busy; lock not acquired within {}ms", ACQUIRE_TIMEOUT.as_millis())]
pub struct LockTimeout {
    /// Room whose lock was contended.
    pub code: String,
}

/// Registry of per-room locks, created lazily on first use.
#[derive(Default)]
pub struct RoomLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RoomLockRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for the given room, retrying with a short backoff up
    /// to [`ACQUIRE_TIMEOUT`]. The returned guard releases on drop.
    pub async fn acquire(&self, code: &str) -> Result<OwnedMutexGuard<()>, LockTimeout> {
        let lock = self
            .locks
            .entry(code.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let deadline = Instant::now() + ACQUIRE_TIMEOUT;
        loop {
            if let Ok(guard) = lock.clone().try_lock_owned() {
                return Ok(guard);
            }
            if Instant::now() + ACQUIRE_RETRY_DELAY > deadline {
                return Err(LockTimeout {
                    code: code.to_owned(),
                });
            }
            sleep(ACQUIRE_RETRY_DELAY).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lock_is_exclusive_per_room() {
        let registry = RoomLockRegistry::new();

        let guard = registry.acquire("AAAAAA").await.unwrap();
        // Another room is unaffected.
        let other = registry.acquire("BBBBBB").await.unwrap();
        drop(other);

        // Same room blocks until the guard is released.
        let err = registry.acquire("AAAAAA").await.unwrap_err();
        assert_eq!(err.code, "AAAAAA");

        drop(guard);
        registry.acquire("AAAAAA").await.unwrap();
    }

    #[tokio::test]
    async fn contended_acquire_succeeds_once_released() {
        let registry = Arc::new(RoomLockRegistry::new());
        let guard = registry.acquire("CCCCCC").await.unwrap();

        let contender = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.acquire("CCCCCC").await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(guard);

        let acquired = contender.await.unwrap();
        assert!(acquired.is_ok());
    }
}
