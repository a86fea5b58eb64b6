//! In-Memory Store
//!
//! Players in an ordered map plus an append-only action log. Optionally
//! backed by a [`SnapshotFile`] that is read on open and written on close.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::game::player::{Player, PlayerId, ProfilePatch};
use crate::game::record::GameActionRecord;
use crate::ledger::snapshot::{LedgerSnapshot, SnapshotFile};
use crate::ledger::{
    AggregateStats, LeaderboardEntry, PlayerDelta, Result, StorageError, Store,
};

/// [`Store`] kept entirely in process memory.
pub struct InMemoryStore {
    players: RwLock<BTreeMap<PlayerId, Player>>,
    actions: RwLock<Vec<GameActionRecord>>,
    snapshot: Option<SnapshotFile>,
    closed: AtomicBool,
}

impl InMemoryStore {
    /// Empty store with no persistence.
    pub fn new() -> Self {
        Self::from_snapshot(LedgerSnapshot::default(), None)
    }

    /// Open a store, restoring from `snapshot` when the file exists.
    pub async fn open(snapshot: Option<SnapshotFile>) -> Result<Self> {
        let Some(file) = snapshot else {
            return Ok(Self::new());
        };

        let reader = file.clone();
        let restored = tokio::task::spawn_blocking(move || reader.load())
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))??;

        let contents = restored.unwrap_or_default();
        tracing::info!(
            path = %file.path().display(),
            players = contents.players.len(),
            actions = contents.actions.len(),
            "opened in-memory ledger"
        );

        Ok(Self::from_snapshot(contents, Some(file)))
    }

    fn from_snapshot(contents: LedgerSnapshot, snapshot: Option<SnapshotFile>) -> Self {
        let players = contents
            .players
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        Self {
            players: RwLock::new(players),
            actions: RwLock::new(contents.actions),
            snapshot,
            closed: AtomicBool::new(false),
        }
    }

    /// Copy of the current contents.
    pub async fn export(&self) -> LedgerSnapshot {
        let players = self.players.read().await.values().cloned().collect();
        let actions = self.actions.read().await.clone();
        LedgerSnapshot { players, actions }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Unavailable("store is closed".into()));
        }
        Ok(())
    }

    async fn modify<F>(&self, id: PlayerId, f: F) -> Result<Player>
    where
        F: FnOnce(&mut Player) -> Result<()> + Send,
    {
        self.ensure_open()?;
        let mut players = self.players.write().await;
        let stored = players.get_mut(&id).ok_or(StorageError::NotFound(id))?;

        // Work on a copy so a failed change leaves the stored row intact
        let mut next = stored.clone();
        f(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn load(&self, id: PlayerId) -> Result<Option<Player>> {
        self.ensure_open()?;
        Ok(self.players.read().await.get(&id).cloned())
    }

    async fn insert(&self, player: Player) -> Result<()> {
        self.ensure_open()?;
        let mut players = self.players.write().await;
        if players.contains_key(&player.id) {
            return Err(StorageError::Duplicate(player.id));
        }
        players.insert(player.id, player);
        Ok(())
    }

    async fn commit(&self, id: PlayerId, delta: &PlayerDelta) -> Result<Player> {
        self.modify(id, |player| delta.apply_to(player)).await
    }

    async fn append(&self, record: GameActionRecord) -> Result<()> {
        self.ensure_open()?;
        self.actions.write().await.push(record);
        Ok(())
    }

    async fn remove(&self, id: PlayerId) -> Result<Player> {
        self.ensure_open()?;
        self.players
            .write()
            .await
            .remove(&id)
            .ok_or(StorageError::NotFound(id))
    }

    async fn update_profile(
        &self,
        id: PlayerId,
        patch: &ProfilePatch,
        now: DateTime<Utc>,
    ) -> Result<Player> {
        self.modify(id, |player| {
            if player.profile.apply(patch) {
                player.updated_at = now;
                player.revision += 1;
            }
            Ok(())
        })
        .await
    }

    async fn set_banned(&self, id: PlayerId, banned: bool, now: DateTime<Utc>) -> Result<Player> {
        self.modify(id, |player| {
            if player.banned != banned {
                player.banned = banned;
                player.updated_at = now;
                player.revision += 1;
            }
            Ok(())
        })
        .await
    }

    async fn referral_count(&self, id: PlayerId) -> Result<u64> {
        self.ensure_open()?;
        let players = self.players.read().await;
        Ok(players.values().filter(|p| p.referred_by == Some(id)).count() as u64)
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        self.ensure_open()?;
        let players = self.players.read().await;

        let mut ranked: Vec<&Player> = players.values().filter(|p| !p.banned).collect();
        // Stable sort over id order breaks ties by lowest id
        ranked.sort_by(|a, b| b.total_earnings.cmp(&a.total_earnings));

        Ok(ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: i as u32 + 1,
                player_id: p.id,
                name: p.profile.display_name().to_string(),
                total_earnings: p.total_earnings,
                level: p.level,
            })
            .collect())
    }

    async fn aggregate_stats(&self, active_since: DateTime<Utc>) -> Result<AggregateStats> {
        self.ensure_open()?;
        let players = self.players.read().await;

        Ok(players.values().fold(AggregateStats::default(), |mut acc, p| {
            acc.total_users += 1;
            if p.last_action_time >= active_since {
                acc.active_users += 1;
            }
            acc.total_coins_earned = acc.total_coins_earned.saturating_add(p.total_earnings);
            acc.total_taps = acc.total_taps.saturating_add(p.taps_count);
            acc
        }))
    }

    async fn actions_for(&self, id: PlayerId, limit: usize) -> Result<Vec<GameActionRecord>> {
        self.ensure_open()?;
        let actions = self.actions.read().await;
        Ok(actions
            .iter()
            .rev()
            .filter(|r| r.player_id == id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let Some(file) = self.snapshot.clone() else {
            tracing::info!("closed in-memory ledger");
            return Ok(());
        };

        let contents = self.export().await;
        tokio::task::spawn_blocking(move || file.save(&contents))
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::game::action::ActionKind;
    use crate::game::player::PlayerProfile;
    use crate::game::record::ActionResult;
    use crate::game::reward::{Outcome, OutcomeDetail};
    use crate::game::rules::EconomyRules;

    fn player(id: i64, name: Option<&str>, earnings: u64) -> Player {
        let profile = PlayerProfile {
            first_name: name.map(String::from),
            ..Default::default()
        };
        let mut p = Player::new(PlayerId(id), profile, None, Utc::now(), &EconomyRules::default());
        p.total_earnings = earnings;
        p
    }

    fn tap_record(id: i64, taps: u32) -> GameActionRecord {
        let outcome = Outcome {
            coin_delta: taps as u64,
            premium_delta: 0,
            won: true,
            detail: OutcomeDetail::Tap { taps, coins_per_tap: 1 },
        };
        GameActionRecord::verified(
            PlayerId(id),
            ActionKind::Tap,
            taps as u64,
            ActionResult { outcome, net_change: taps as i64, leveled_up: false },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let store = InMemoryStore::new();
        store.insert(player(1, Some("Alice"), 0)).await.unwrap();

        let loaded = store.load(PlayerId(1)).await.unwrap().unwrap();
        assert_eq!(loaded.profile.display_name(), "Alice");
        assert!(store.load(PlayerId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert() {
        let store = InMemoryStore::new();
        store.insert(player(1, None, 0)).await.unwrap();
        let err = store.insert(player(1, None, 0)).await.unwrap_err();
        assert!(matches!(err, StorageError::Duplicate(PlayerId(1))));
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_row() {
        let store = InMemoryStore::new();
        store.insert(player(1, None, 0)).await.unwrap();

        let stale = PlayerDelta { coins: 50, expected_revision: Some(3), ..Default::default() };
        assert!(store.commit(PlayerId(1), &stale).await.is_err());

        let stored = store.load(PlayerId(1)).await.unwrap().unwrap();
        assert_eq!(stored.coins, 0);
        assert_eq!(stored.revision, 0);

        let fresh = PlayerDelta { coins: 50, ..PlayerDelta::guarded(&stored) };
        let updated = store.commit(PlayerId(1), &fresh).await.unwrap();
        assert_eq!(updated.coins, 50);
        assert_eq!(updated.revision, 1);
    }

    #[tokio::test]
    async fn test_commit_unknown_player() {
        let store = InMemoryStore::new();
        let err = store.commit(PlayerId(9), &PlayerDelta::default()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(PlayerId(9))));
    }

    #[tokio::test]
    async fn test_leaderboard_order_and_ban() {
        let store = InMemoryStore::new();
        store.insert(player(1, Some("Low"), 10)).await.unwrap();
        store.insert(player(2, None, 500)).await.unwrap();
        store.insert(player(3, Some("Mid"), 200)).await.unwrap();
        store.insert(player(4, Some("Cheater"), 9_999)).await.unwrap();
        store.set_banned(PlayerId(4), true, Utc::now()).await.unwrap();

        let board = store.leaderboard(2).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].player_id, PlayerId(2));
        assert_eq!(board[0].name, "Anonymous");
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].name, "Mid");
        assert_eq!(board[1].rank, 2);
    }

    #[tokio::test]
    async fn test_aggregate_stats_window() {
        let store = InMemoryStore::new();
        let mut stale = player(1, None, 100);
        stale.last_action_time = Utc::now() - Duration::days(3);
        stale.taps_count = 7;
        let mut fresh = player(2, None, 50);
        fresh.taps_count = 3;
        store.insert(stale).await.unwrap();
        store.insert(fresh).await.unwrap();

        let stats = store.aggregate_stats(Utc::now() - Duration::hours(24)).await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.total_coins_earned, 150);
        assert_eq!(stats.total_taps, 10);
    }

    #[tokio::test]
    async fn test_referral_count() {
        let store = InMemoryStore::new();
        store.insert(player(1, None, 0)).await.unwrap();
        for id in 2..5 {
            let mut p = player(id, None, 0);
            p.referred_by = Some(PlayerId(1));
            store.insert(p).await.unwrap();
        }
        assert_eq!(store.referral_count(PlayerId(1)).await.unwrap(), 3);
        assert_eq!(store.referral_count(PlayerId(2)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_actions_newest_first() {
        let store = InMemoryStore::new();
        store.append(tap_record(1, 1)).await.unwrap();
        store.append(tap_record(2, 5)).await.unwrap();
        store.append(tap_record(1, 2)).await.unwrap();
        store.append(tap_record(1, 3)).await.unwrap();

        let recent = store.actions_for(PlayerId(1), 2).await.unwrap();
        let amounts: Vec<u64> = recent.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_profile_patch_bumps_revision_only_on_change() {
        let store = InMemoryStore::new();
        store.insert(player(1, Some("Alice"), 0)).await.unwrap();

        let inserted = store.load(PlayerId(1)).await.unwrap().unwrap().updated_at;
        let later = inserted + Duration::hours(1);

        let same = ProfilePatch { first_name: Some("Alice".into()), ..Default::default() };
        let p = store.update_profile(PlayerId(1), &same, later).await.unwrap();
        assert_eq!(p.revision, 0);
        assert_eq!(p.updated_at, inserted);

        let renamed = ProfilePatch { username: Some("alice_k".into()), ..Default::default() };
        let p = store.update_profile(PlayerId(1), &renamed, later).await.unwrap();
        assert_eq!(p.revision, 1);
        assert_eq!(p.updated_at, later);
        assert_eq!(p.profile.username.as_deref(), Some("alice_k"));
    }

    #[tokio::test]
    async fn test_remove_player() {
        let store = InMemoryStore::new();
        store.insert(player(1, Some("Alice"), 0)).await.unwrap();

        let removed = store.remove(PlayerId(1)).await.unwrap();
        assert_eq!(removed.id, PlayerId(1));
        assert!(store.load(PlayerId(1)).await.unwrap().is_none());
        assert!(matches!(store.remove(PlayerId(1)).await, Err(StorageError::NotFound(PlayerId(1)))));

        // The id is free again
        store.insert(player(1, None, 0)).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_store_unavailable() {
        let store = InMemoryStore::new();
        store.close().await.unwrap();
        assert!(matches!(store.ping().await, Err(StorageError::Unavailable(_))));
        assert!(matches!(store.load(PlayerId(1)).await, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("ledger.bin"));

        let store = InMemoryStore::open(Some(file.clone())).await.unwrap();
        store.insert(player(1, Some("Alice"), 42)).await.unwrap();
        store.append(tap_record(1, 4)).await.unwrap();
        store.close().await.unwrap();

        let reopened = InMemoryStore::open(Some(file)).await.unwrap();
        let alice = reopened.load(PlayerId(1)).await.unwrap().unwrap();
        assert_eq!(alice.total_earnings, 42);
        assert_eq!(reopened.actions_for(PlayerId(1), 10).await.unwrap().len(), 1);
    }
}
