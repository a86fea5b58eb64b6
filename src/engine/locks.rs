//! Per-Player Locks
//!
//! One async mutex per player identity. Holding the guard serializes every
//! mutating operation for that player; different players never contend.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::game::player::PlayerId;

/// Guard held for the duration of one mutating operation.
pub type PlayerGuard = OwnedMutexGuard<()>;

/// Lazily populated map of per-player mutexes.
#[derive(Default)]
pub struct PlayerLocks {
    locks: Mutex<BTreeMap<PlayerId, Arc<Mutex<()>>>>,
}

impl PlayerLocks {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: PlayerId) -> PlayerGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        lock.lock_owned().await
    }

    /// Drop entries nobody holds or waits on. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    /// Number of tracked players.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// True when no player is tracked.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_player_serialized() {
        let locks = Arc::new(PlayerLocks::new());
        let guard = locks.acquire(PlayerId(1)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(PlayerId(1)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_players_independent() {
        let locks = PlayerLocks::new();
        let _a = locks.acquire(PlayerId(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(PlayerId(2))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_held_locks() {
        let locks = PlayerLocks::new();
        let held = locks.acquire(PlayerId(1)).await;
        drop(locks.acquire(PlayerId(2)).await);
        drop(locks.acquire(PlayerId(3)).await);

        assert_eq!(locks.len().await, 3);
        assert_eq!(locks.cleanup().await, 2);
        assert_eq!(locks.len().await, 1);

        drop(held);
        assert_eq!(locks.cleanup().await, 1);
        assert!(locks.is_empty().await);
    }
}
