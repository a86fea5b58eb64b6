//! Ledger
//!
//! Storage contract for player balances and the audit log. The engine only
//! sees [`Store`]; implementations decide where bytes live.
//!
//! Balance changes go through [`PlayerDelta`]: counters are additive so
//! they commute at the storage layer, progression fields are absolute, and
//! `expected_revision` turns the write into a conditional update.

mod error;
pub mod memory;
pub mod snapshot;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Deserialize};

use crate::game::player::{Player, PlayerId, ProfilePatch};
use crate::game::record::GameActionRecord;

pub use error::{StorageError, Result};
pub use memory::InMemoryStore;
pub use snapshot::{LedgerSnapshot, SnapshotFile};

/// Change set for one committed action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerDelta {
    /// Reject the write unless the stored revision matches
    pub expected_revision: Option<u64>,
    /// Signed coin change
    pub coins: i64,
    /// Premium coins credited
    pub premium_coins: u64,
    /// Taps performed
    pub taps: u64,
    /// Lifetime earnings credited
    pub total_earnings: u64,
    /// Winning spins
    pub spins_won: u64,
    /// Treasures found
    pub treasures_found: u64,
    /// Winning flips
    pub coins_flipped: u64,
    /// Stake placed
    pub total_staked: u64,
    /// Absolute energy
    pub energy: Option<u32>,
    /// Absolute level
    pub level: Option<u32>,
    /// Absolute experience
    pub experience: Option<u64>,
    /// New regeneration timestamp
    pub last_energy_update: Option<DateTime<Utc>>,
    /// New last-action timestamp
    pub last_action_time: Option<DateTime<Utc>>,
    /// Absolute daily streak
    pub daily_streak: Option<u32>,
    /// New daily claim date
    pub last_login_date: Option<NaiveDate>,
    /// When the change happened; `updated_at` is left as is when unset
    pub at: Option<DateTime<Utc>>,
}

impl PlayerDelta {
    /// Delta guarded by the revision `player` was read at.
    pub fn guarded(player: &Player) -> Self {
        Self {
            expected_revision: Some(player.revision),
            ..Default::default()
        }
    }

    /// Stamp the change with the caller's clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.at = Some(now);
        self
    }

    /// Copy the absolute progression fields from a computed state.
    pub fn with_progression(mut self, next: &Player) -> Self {
        self.energy = Some(next.energy);
        self.level = Some(next.level);
        self.experience = Some(next.experience);
        self.last_energy_update = Some(next.last_energy_update);
        self
    }

    /// Apply to a stored player, bumping its revision.
    ///
    /// Fails without touching `player` when the guard does not match or
    /// the coin balance would go negative.
    pub fn apply_to(&self, player: &mut Player) -> Result<()> {
        if let Some(expected) = self.expected_revision {
            if player.revision != expected {
                return Err(StorageError::ConditionFailed(format!(
                    "player {} at revision {}, expected {}",
                    player.id, player.revision, expected
                )));
            }
        }

        let coins = player.coins as i128 + self.coins as i128;
        if coins < 0 {
            return Err(StorageError::ConditionFailed(format!(
                "player {} balance would go negative",
                player.id
            )));
        }

        player.coins = coins.min(u64::MAX as i128) as u64;
        player.premium_coins = player.premium_coins.saturating_add(self.premium_coins);
        player.taps_count = player.taps_count.saturating_add(self.taps);
        player.total_earnings = player.total_earnings.saturating_add(self.total_earnings);

        let stats = &mut player.game_stats;
        stats.spins_won = stats.spins_won.saturating_add(self.spins_won);
        stats.treasures_found = stats.treasures_found.saturating_add(self.treasures_found);
        stats.coins_flipped = stats.coins_flipped.saturating_add(self.coins_flipped);
        stats.total_staked = stats.total_staked.saturating_add(self.total_staked);

        if let Some(energy) = self.energy {
            player.energy = energy;
        }
        if let Some(level) = self.level {
            player.level = level;
        }
        if let Some(experience) = self.experience {
            player.experience = experience;
        }
        if let Some(at) = self.last_energy_update {
            player.last_energy_update = at;
        }
        if let Some(at) = self.last_action_time {
            player.last_action_time = at;
        }
        if let Some(streak) = self.daily_streak {
            player.daily_streak = streak;
        }
        if let Some(day) = self.last_login_date {
            player.last_login_date = Some(day);
        }

        if let Some(at) = self.at {
            player.updated_at = at;
        }
        player.revision += 1;
        Ok(())
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based rank
    pub rank: u32,
    /// Player identity
    pub player_id: PlayerId,
    /// Display name
    pub name: String,
    /// Lifetime earnings
    pub total_earnings: u64,
    /// Current level
    pub level: u32,
}

/// Aggregate counters for operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    /// Players ever created
    pub total_users: u64,
    /// Players active inside the window
    pub active_users: u64,
    /// Sum of lifetime earnings
    pub total_coins_earned: u64,
    /// Sum of lifetime taps
    pub total_taps: u64,
}

/// Storage capability injected into the engine.
///
/// Implementations must be safe to share between tasks. The engine wraps
/// every call in a timeout, so a blocked backend surfaces as
/// [`StorageError::Unavailable`] rather than hanging a request.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch one player.
    async fn load(&self, id: PlayerId) -> Result<Option<Player>>;

    /// Insert a new player; [`StorageError::Duplicate`] if the id exists.
    async fn insert(&self, player: Player) -> Result<()>;

    /// Apply a delta atomically and return the stored result.
    async fn commit(&self, id: PlayerId, delta: &PlayerDelta) -> Result<Player>;

    /// Append an audit record.
    async fn append(&self, record: GameActionRecord) -> Result<()>;

    /// Delete a player; [`StorageError::NotFound`] if the id is unknown.
    ///
    /// Only used to undo an insert whose follow-up write failed.
    async fn remove(&self, id: PlayerId) -> Result<Player>;

    /// Apply a profile patch, stamping `updated_at` with `now` on change.
    async fn update_profile(
        &self,
        id: PlayerId,
        patch: &ProfilePatch,
        now: DateTime<Utc>,
    ) -> Result<Player>;

    /// Set or clear the ban flag, stamping `updated_at` with `now` on change.
    async fn set_banned(&self, id: PlayerId, banned: bool, now: DateTime<Utc>) -> Result<Player>;

    /// Number of players whose `referred_by` is `id`.
    async fn referral_count(&self, id: PlayerId) -> Result<u64>;

    /// Non-banned players by lifetime earnings, descending.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;

    /// Aggregate counters; "active" means acted at or after `active_since`.
    async fn aggregate_stats(&self, active_since: DateTime<Utc>) -> Result<AggregateStats>;

    /// Newest-first audit records for one player.
    async fn actions_for(&self, id: PlayerId, limit: usize) -> Result<Vec<GameActionRecord>>;

    /// Cheap reachability probe.
    async fn ping(&self) -> Result<()>;

    /// Flush and release resources. Further calls fail with `Unavailable`.
    async fn close(&self) -> Result<()>;
}
