//! Economy Rules
//!
//! Tunable constants for energy, leveling, staking and referrals.
//! Defaults reproduce the live game's balance.

use std::time::Duration;

use serde::{Serialize, Deserialize};

/// Energy cap at level 1.
pub const BASE_MAX_ENERGY: u32 = 1000;

/// Extra energy cap granted per level above 1.
pub const ENERGY_PER_LEVEL: u32 = 100;

/// Energy regenerated per elapsed minute.
pub const ENERGY_REGEN_PER_MINUTE: u32 = 2;

/// Experience needed per level (`level * 1000` to advance).
pub const EXPERIENCE_PER_LEVEL: u64 = 1000;

/// Maximum taps accepted in one request.
pub const MAX_TAPS_PER_REQUEST: u32 = 10;

/// Smallest stake accepted by any game.
pub const MIN_STAKE: u64 = 100;

/// Minimum time between two taps from one player.
pub const MIN_ACTION_INTERVAL_MS: u64 = 100;

/// Coins credited to the inviter when a referral lands.
pub const REFERRAL_BONUS: u64 = 1000;

/// Coins credited to a newly created player who used a referral.
pub const WELCOME_BONUS: u64 = 500;

/// Coins credited for the daily attendance claim.
pub const DAILY_REWARD: u64 = 1000;

/// Configuration for the economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyRules {
    /// Energy cap at level 1
    pub base_max_energy: u32,
    /// Energy cap increase per level
    pub energy_per_level: u32,
    /// Energy regenerated per minute
    pub energy_regen_per_minute: u32,
    /// Experience multiplier for the next level threshold
    pub experience_per_level: u64,
    /// Upper bound on taps per request
    pub max_taps_per_request: u32,
    /// Lower bound on game stakes
    pub min_stake: u64,
    /// Anti-cheat interval between taps
    pub min_action_interval: Duration,
    /// Inviter reward
    pub referral_bonus: u64,
    /// Invitee reward
    pub welcome_bonus: u64,
    /// Daily attendance reward
    pub daily_reward: u64,
    /// Leaderboard size when the caller does not ask for one
    pub leaderboard_default_limit: usize,
    /// Hard cap on leaderboard size
    pub leaderboard_max_limit: usize,
    /// Window used to count active players
    pub active_window: Duration,
}

impl Default for EconomyRules {
    fn default() -> Self {
        Self {
            base_max_energy: BASE_MAX_ENERGY,
            energy_per_level: ENERGY_PER_LEVEL,
            energy_regen_per_minute: ENERGY_REGEN_PER_MINUTE,
            experience_per_level: EXPERIENCE_PER_LEVEL,
            max_taps_per_request: MAX_TAPS_PER_REQUEST,
            min_stake: MIN_STAKE,
            min_action_interval: Duration::from_millis(MIN_ACTION_INTERVAL_MS),
            referral_bonus: REFERRAL_BONUS,
            welcome_bonus: WELCOME_BONUS,
            daily_reward: DAILY_REWARD,
            leaderboard_default_limit: 10,
            leaderboard_max_limit: 100,
            active_window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl EconomyRules {
    /// Energy cap for a level: `1000 + (level - 1) * 100` by default.
    #[inline]
    pub fn max_energy(&self, level: u32) -> u32 {
        let above_first = level.max(1) - 1;
        self.base_max_energy
            .saturating_add(above_first.saturating_mul(self.energy_per_level))
    }

    /// Experience at which `level` advances.
    #[inline]
    pub fn experience_to_next(&self, level: u32) -> u64 {
        level as u64 * self.experience_per_level
    }

    /// Coins paid for a single tap: `floor(level / 3) + 1`.
    #[inline]
    pub fn coins_per_tap(&self, level: u32) -> u64 {
        (level / 3) as u64 + 1
    }

    /// Clamp a requested leaderboard size.
    pub fn leaderboard_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.leaderboard_default_limit)
            .clamp(1, self.leaderboard_max_limit)
    }
}
