//! Game Engine
//!
//! Orchestrates one request end to end:
//!
//! ```text
//! lock(player) → load → regenerate → validate → resolve → progress → commit → append
//! ```
//!
//! Every mutating operation holds the player's lock across the whole
//! sequence, so validation never decides on a stale row. Read-only queries
//! (leaderboard, admin stats, health) take no lock. Every store call and
//! every lock wait is bounded by `store_timeout`.

mod error;
pub mod locks;

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::clock::{Clock, SystemClock};
use crate::core::rng::{DeterministicRng, RandomSource};
use crate::game::action::{ActionKind, GameKind, GameRequest, TapRequest};
use crate::game::daily::validate_claim;
use crate::game::energy::regenerate;
use crate::game::player::{GameStats, Player, PlayerId, PlayerProfile, PlayerView, ProfilePatch};
use crate::game::progression::{apply_experience, check_level_up};
use crate::game::record::{ActionResult, GameActionRecord};
use crate::game::reward::{resolve_game, resolve_tap, Outcome, OutcomeDetail};
use crate::game::rules::EconomyRules;
use crate::game::validate::{check_game_request, check_tap_request, validate_game, validate_tap};
use crate::ledger::{self, AggregateStats, LeaderboardEntry, PlayerDelta, StorageError, Store};

pub use error::{EngineError, Result};
pub use locks::{PlayerGuard, PlayerLocks};

/// Default bound on a single store call or lock wait.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of audit rows returned by [`GameEngine::recent_actions`].
pub const DEFAULT_RECENT_ACTIONS: usize = 20;

// =============================================================================
// RESULTS
// =============================================================================

/// Balances after an accepted tap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TapResult {
    /// Coins credited by this tap
    pub coins_earned: u64,
    /// New coin balance
    pub coins: u64,
    /// New experience
    pub experience: u64,
    /// Remaining energy
    pub energy: u32,
    /// Energy cap at the new level
    pub max_energy: u32,
    /// New level
    pub level: u32,
    /// Lifetime taps
    pub taps_count: u64,
    /// Lifetime earnings
    pub total_earnings: u64,
    /// Whether this tap advanced a level
    pub leveled_up: bool,
}

/// Outcome and balances after an accepted game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    /// Game played
    pub game: GameKind,
    /// Coins wagered
    pub stake: u64,
    /// Resolved payout
    pub outcome: Outcome,
    /// Balance change (`coin_delta - stake`)
    pub net_change: i64,
    /// New coin balance
    pub coins: u64,
    /// New premium balance
    pub premium_coins: u64,
    /// Lifetime earnings
    pub total_earnings: u64,
    /// Updated game counters
    pub game_stats: GameStats,
    /// Current energy (games do not touch it)
    pub energy: u32,
    /// Energy cap
    pub max_energy: u32,
}

/// Reward and streak after a daily claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyClaim {
    /// Consecutive days claimed, including today
    pub streak: u32,
    /// Coins credited
    pub reward: u64,
    /// New coin balance
    pub coins: u64,
    /// Lifetime earnings
    pub total_earnings: u64,
}

/// Result of [`GameEngine::register`].
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Stored player
    pub player: Player,
    /// False when the player already existed and only the profile was refreshed
    pub created: bool,
}

/// Liveness report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Whether the store answered in time
    pub store_reachable: bool,
    /// When the probe ran
    pub checked_at: DateTime<Utc>,
}

// =============================================================================
// ENGINE
// =============================================================================

/// The economy core. Cheap to share behind an `Arc`.
pub struct GameEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn RandomSource + Send>>,
    rules: EconomyRules,
    store_timeout: Duration,
    locks: PlayerLocks,
}

impl GameEngine {
    /// Engine over `store` with the system clock and an entropy-seeded RNG.
    pub fn new(store: Arc<dyn Store>, rules: EconomyRules) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            rng: Mutex::new(Box::new(DeterministicRng::from_entropy())),
            rules,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            locks: PlayerLocks::new(),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the randomness source.
    pub fn with_rng(mut self, rng: impl RandomSource + Send + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    /// Bound store calls and lock waits.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Active economy rules.
    pub fn rules(&self) -> &EconomyRules {
        &self.rules
    }

    /// Per-player lock table.
    pub fn locks(&self) -> &PlayerLocks {
        &self.locks
    }

    /// Flush and close the store.
    pub async fn shutdown(&self) -> Result<()> {
        self.store_call("close", self.store.close()).await
    }

    // =========================================================================
    // PLAYER OPERATIONS
    // =========================================================================

    /// Current balances with energy regenerated up to now.
    ///
    /// Regeneration is written back only when it changed the energy, so
    /// repeated views at the same instant leave the stored row untouched.
    pub async fn get_player_view(&self, id: PlayerId) -> Result<PlayerView> {
        let player = {
            let _guard = self.lock(id).await?;
            let stored = self
                .store_call("load", self.store.load(id))
                .await?
                .ok_or(EngineError::NotFound(id))?;

            let now = self.clock.now();
            let current = regenerate(&stored, now, &self.rules);
            if current.energy != stored.energy {
                let delta = PlayerDelta::guarded(&stored).with_progression(&current).at(now);
                self.store_call("commit", self.store.commit(id, &delta)).await?
            } else {
                stored
            }
        };

        let referrals = self.store_call("referral_count", self.store.referral_count(id)).await?;
        Ok(PlayerView::from_player(&player, referrals, &self.rules))
    }

    /// Spend energy for a deterministic coin payout.
    pub async fn tap(&self, id: PlayerId, req: TapRequest) -> Result<TapResult> {
        check_tap_request(&req, &self.rules)?;

        let _guard = self.lock(id).await?;
        let Some(stored) = self.store_call("load", self.store.load(id)).await? else {
            return Err(EngineError::NotFoundOrBanned);
        };

        let now = self.clock.now();
        let current = regenerate(&stored, now, &self.rules);
        let taps = validate_tap(Some(&current), &req, now, &self.rules)?;

        let outcome = resolve_tap(taps, current.level, &self.rules);
        let mut spent = current;
        spent.energy -= taps;
        let (next, leveled_up) = check_level_up(&apply_experience(&spent, taps as u64), &self.rules);

        let delta = PlayerDelta {
            coins: outcome.coin_delta as i64,
            taps: taps as u64,
            total_earnings: outcome.coin_delta,
            last_action_time: Some(now),
            ..PlayerDelta::guarded(&stored)
        }
        .with_progression(&next)
        .at(now);
        let committed = self.store_call("commit", self.store.commit(id, &delta)).await?;

        let result = ActionResult {
            outcome,
            net_change: outcome.coin_delta as i64,
            leveled_up,
        };
        self.audit(GameActionRecord::verified(id, ActionKind::Tap, taps as u64, result, now))
            .await;

        if leveled_up {
            tracing::info!(player = %id, level = committed.level, "player leveled up");
        }
        tracing::debug!(player = %id, taps, coins = committed.coins, energy = committed.energy, "tap committed");

        Ok(TapResult {
            coins_earned: outcome.coin_delta,
            coins: committed.coins,
            experience: committed.experience,
            energy: committed.energy,
            max_energy: committed.max_energy(&self.rules),
            level: committed.level,
            taps_count: committed.taps_count,
            total_earnings: committed.total_earnings,
            leveled_up,
        })
    }

    /// Stake coins on a chance game.
    pub async fn play_game(&self, id: PlayerId, req: GameRequest) -> Result<GameResult> {
        check_game_request(&req, &self.rules)?;

        let _guard = self.lock(id).await?;
        let Some(stored) = self.store_call("load", self.store.load(id)).await? else {
            return Err(EngineError::NotFoundOrBanned);
        };
        let game = validate_game(Some(&stored), &req, &self.rules)?;

        let now = self.clock.now();
        let outcome = self.draw(|rng| resolve_game(&game, rng))?;
        let net_change = outcome.net_change(game.stake);
        let won = outcome.won as u64;

        let mut delta = PlayerDelta {
            coins: net_change,
            premium_coins: outcome.premium_delta,
            total_earnings: outcome.earnings(game.stake),
            total_staked: game.stake,
            ..PlayerDelta::guarded(&stored)
        }
        .at(now);
        match game.kind {
            GameKind::Spin => delta.spins_won = won,
            GameKind::Treasure => delta.treasures_found = won,
            GameKind::Flip => delta.coins_flipped = won,
        }
        let committed = self.store_call("commit", self.store.commit(id, &delta)).await?;

        let result = ActionResult { outcome, net_change, leveled_up: false };
        self.audit(GameActionRecord::verified(id, game.kind.into(), game.stake, result, now))
            .await;

        tracing::debug!(
            player = %id,
            game = %game.kind,
            stake = game.stake,
            net_change,
            won = outcome.won,
            "game committed"
        );

        Ok(GameResult {
            game: game.kind,
            stake: game.stake,
            outcome,
            net_change,
            coins: committed.coins,
            premium_coins: committed.premium_coins,
            total_earnings: committed.total_earnings,
            game_stats: committed.game_stats,
            energy: committed.energy,
            max_energy: committed.max_energy(&self.rules),
        })
    }

    /// Take today's attendance reward.
    ///
    /// Days are UTC calendar days. The claim neither spends energy nor
    /// counts as a tap, so it leaves `last_action_time` alone.
    pub async fn claim_daily(&self, id: PlayerId) -> Result<DailyClaim> {
        let _guard = self.lock(id).await?;
        let Some(stored) = self.store_call("load", self.store.load(id)).await? else {
            return Err(EngineError::NotFoundOrBanned);
        };

        let now = self.clock.now();
        let claim = validate_claim(Some(&stored), now)?;
        let reward = self.rules.daily_reward;

        let delta = PlayerDelta {
            coins: reward as i64,
            total_earnings: reward,
            daily_streak: Some(claim.streak),
            last_login_date: Some(claim.day),
            ..PlayerDelta::guarded(&stored)
        }
        .at(now);
        let committed = self.store_call("commit", self.store.commit(id, &delta)).await?;

        let outcome = Outcome {
            coin_delta: reward,
            premium_delta: 0,
            won: true,
            detail: OutcomeDetail::Daily { streak: claim.streak },
        };
        let result = ActionResult { outcome, net_change: reward as i64, leveled_up: false };
        self.audit(GameActionRecord::verified(id, ActionKind::DailyClaim, reward, result, now))
            .await;

        tracing::info!(player = %id, streak = claim.streak, day = %claim.day, "daily reward claimed");

        Ok(DailyClaim {
            streak: claim.streak,
            reward,
            coins: committed.coins,
            total_earnings: committed.total_earnings,
        })
    }

    /// Create a player, crediting a valid referrer.
    ///
    /// The referral code is the inviter's id in decimal. Malformed codes,
    /// self-referrals and unknown inviters are ignored. The invitee's lock
    /// is held until the referrer is credited; if that credit fails the
    /// insert is undone and the error returned, so a retry starts clean.
    pub async fn create_player(
        &self,
        id: PlayerId,
        profile: PlayerProfile,
        referral_code: Option<&str>,
    ) -> Result<Player> {
        let candidate = parse_referral(id, referral_code);

        let _guard = self.lock(id).await?;
        if self.store_call("load", self.store.load(id)).await?.is_some() {
            return Err(EngineError::AlreadyExists(id));
        }

        let referrer = match candidate {
            Some(referrer) => match self.store_call("load", self.store.load(referrer)).await? {
                Some(_) => Some(referrer),
                None => {
                    tracing::warn!(player = %id, %referrer, "ignoring referral from unknown player");
                    None
                }
            },
            None => None,
        };

        let now = self.clock.now();
        let mut player = Player::new(id, profile, referrer, now, &self.rules);
        if player.referred_by.is_some() {
            player.coins = self.rules.welcome_bonus;
            player.total_earnings = self.rules.welcome_bonus;
        }
        self.store_call("insert", self.store.insert(player.clone())).await?;

        // The referrer already exists and the invitee did not, so the two
        // locks are always taken in creation order
        if let Some(referrer) = player.referred_by {
            match self.credit_referrer(referrer, now).await {
                Ok(credited) => tracing::info!(
                    %referrer,
                    invitee = %id,
                    coins = credited.coins,
                    "referral bonus credited"
                ),
                Err(err) => {
                    tracing::error!(%referrer, invitee = %id, error = %err, "referral bonus not credited");
                    if let Err(undo) = self.store_call("remove", self.store.remove(id)).await {
                        tracing::error!(player = %id, error = %undo, "failed to undo player insert");
                    }
                    return Err(err);
                }
            }
        }

        tracing::info!(player = %id, referred_by = ?player.referred_by, "player created");
        Ok(player)
    }

    /// First-contact entry point: create, or refresh the profile of an
    /// existing player.
    pub async fn register(
        &self,
        id: PlayerId,
        profile: PlayerProfile,
        referral_code: Option<&str>,
    ) -> Result<Registration> {
        match self.create_player(id, profile.clone(), referral_code).await {
            Ok(player) => Ok(Registration { player, created: true }),
            Err(EngineError::AlreadyExists(_)) => {
                let player = self.update_profile(id, ProfilePatch::from(profile)).await?;
                Ok(Registration { player, created: false })
            }
            Err(err) => Err(err),
        }
    }

    /// Apply a profile patch.
    pub async fn update_profile(&self, id: PlayerId, patch: ProfilePatch) -> Result<Player> {
        let _guard = self.lock(id).await?;
        if patch.is_empty() {
            return self
                .store_call("load", self.store.load(id))
                .await?
                .ok_or(EngineError::NotFound(id));
        }
        let now = self.clock.now();
        self.store_call("update_profile", self.store.update_profile(id, &patch, now)).await
    }

    /// Set or clear a player's ban flag.
    pub async fn set_banned(&self, id: PlayerId, banned: bool) -> Result<Player> {
        let _guard = self.lock(id).await?;
        let now = self.clock.now();
        let player = self.store_call("set_banned", self.store.set_banned(id, banned, now)).await?;
        tracing::info!(player = %id, banned, "ban flag updated");
        Ok(player)
    }

    // =========================================================================
    // READ-ONLY QUERIES
    // =========================================================================

    /// Top players by lifetime earnings. `None` uses the default size.
    pub async fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>> {
        let limit = self.rules.leaderboard_limit(limit);
        self.store_call("leaderboard", self.store.leaderboard(limit)).await
    }

    /// Aggregate counters for operators.
    pub async fn admin_stats(&self) -> Result<AggregateStats> {
        let window = chrono::Duration::from_std(self.rules.active_window)
            .map_err(|_| EngineError::Internal)?;
        let since = self.clock.now() - window;
        self.store_call("aggregate_stats", self.store.aggregate_stats(since)).await
    }

    /// Newest-first audit rows for one player.
    pub async fn recent_actions(
        &self,
        id: PlayerId,
        limit: Option<usize>,
    ) -> Result<Vec<GameActionRecord>> {
        let limit = limit
            .unwrap_or(DEFAULT_RECENT_ACTIONS)
            .clamp(1, self.rules.leaderboard_max_limit);
        self.store_call("actions_for", self.store.actions_for(id, limit)).await
    }

    /// Probe the store.
    pub async fn health(&self) -> HealthReport {
        let store_reachable = self.store_call("ping", self.store.ping()).await.is_ok();
        HealthReport {
            store_reachable,
            checked_at: self.clock.now(),
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn lock(&self, id: PlayerId) -> Result<PlayerGuard> {
        tokio::time::timeout(self.store_timeout, self.locks.acquire(id))
            .await
            .map_err(|_| {
                tracing::warn!(player = %id, "timed out waiting for player lock");
                EngineError::StorageUnavailable
            })
    }

    async fn store_call<T, F>(&self, op: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = ledger::Result<T>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                match &err {
                    StorageError::NotFound(_) | StorageError::Duplicate(_) => {
                        tracing::debug!(op, error = %err, "store refused call");
                    }
                    _ => tracing::error!(op, error = %err, "store call failed"),
                }
                Err(err.into())
            }
            Err(_) => {
                tracing::error!(op, timeout_ms = self.store_timeout.as_millis() as u64, "store call timed out");
                Err(EngineError::StorageUnavailable)
            }
        }
    }

    /// Append without failing the action; the balance is already committed.
    async fn audit(&self, record: GameActionRecord) {
        let player = record.player_id;
        let kind = record.kind;
        let failure = match tokio::time::timeout(self.store_timeout, self.store.append(record)).await {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(_) => "timed out".to_string(),
        };
        tracing::warn!(%player, ?kind, error = %failure, "audit record dropped");
    }

    async fn credit_referrer(&self, referrer: PlayerId, now: DateTime<Utc>) -> Result<Player> {
        let _guard = self.lock(referrer).await?;
        let bonus = self.rules.referral_bonus;
        let delta = PlayerDelta {
            coins: bonus as i64,
            total_earnings: bonus,
            ..Default::default()
        }
        .at(now);
        self.store_call("commit", self.store.commit(referrer, &delta)).await
    }

    fn draw<T>(&self, f: impl FnOnce(&mut dyn RandomSource) -> T) -> Result<T> {
        let mut rng = self.rng.lock().map_err(|_| {
            tracing::error!("random source lock poisoned");
            EngineError::Internal
        })?;
        Ok(f(&mut **rng))
    }
}

fn parse_referral(id: PlayerId, code: Option<&str>) -> Option<PlayerId> {
    let code = code?.trim();
    if code.is_empty() {
        return None;
    }
    match code.parse::<PlayerId>() {
        Ok(referrer) if referrer == id => {
            tracing::warn!(player = %id, "ignoring self-referral");
            None
        }
        Ok(referrer) => Some(referrer),
        Err(_) => {
            tracing::warn!(player = %id, code, "ignoring malformed referral code");
            None
        }
    }
}
