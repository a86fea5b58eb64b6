//! Player State Definitions
//!
//! Persisted balances, counters and progression for a single player.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Deserialize};

use crate::game::rules::EconomyRules;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Stable external player identity (the chat platform's numeric user id).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

impl PlayerId {
    /// Create from the raw numeric id.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw numeric id.
    pub fn get(&self) -> i64 {
        self.0
    }

    /// Referral code handed out to this player (the decimal id).
    pub fn referral_code(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlayerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(PlayerId)
    }
}

// =============================================================================
// PROFILE
// =============================================================================

/// Display profile copied from the chat platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Platform handle
    pub username: Option<String>,
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
}

impl PlayerProfile {
    /// Name shown on the leaderboard.
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.username.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("Anonymous")
    }

    /// Apply a patch, returning whether anything changed.
    pub fn apply(&mut self, patch: &ProfilePatch) -> bool {
        let mut changed = false;
        for (field, value) in [
            (&mut self.username, &patch.username),
            (&mut self.first_name, &patch.first_name),
            (&mut self.last_name, &patch.last_name),
        ] {
            if let Some(value) = value {
                if field.as_ref() != Some(value) {
                    *field = Some(value.clone());
                    changed = true;
                }
            }
        }
        changed
    }
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    /// New handle
    pub username: Option<String>,
    /// New given name
    pub first_name: Option<String>,
    /// New family name
    pub last_name: Option<String>,
}

impl ProfilePatch {
    /// True when the patch would not touch any field.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.first_name.is_none() && self.last_name.is_none()
    }
}

impl From<PlayerProfile> for ProfilePatch {
    fn from(profile: PlayerProfile) -> Self {
        Self {
            username: profile.username,
            first_name: profile.first_name,
            last_name: profile.last_name,
        }
    }
}

// =============================================================================
// GAME STATS
// =============================================================================

/// Per-player mini-game counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    /// Winning spins
    pub spins_won: u64,
    /// Successful treasure hunts
    pub treasures_found: u64,
    /// Winning coin flips
    pub coins_flipped: u64,
    /// Sum of every stake ever placed
    pub total_staked: u64,
}

// =============================================================================
// PLAYER
// =============================================================================

/// Complete persisted state of one player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Identity
    pub id: PlayerId,
    /// Display profile
    pub profile: PlayerProfile,
    /// Primary currency
    pub coins: u64,
    /// Secondary currency, only won from spins
    pub premium_coins: u64,
    /// Current level, starts at 1
    pub level: u32,
    /// Experience toward the next level
    pub experience: u64,
    /// Lifetime tap counter
    pub taps_count: u64,
    /// Tap budget, `0..=max_energy(level)`
    pub energy: u32,
    /// When energy was last regenerated
    pub last_energy_update: DateTime<Utc>,
    /// When the last tap or game was accepted
    pub last_action_time: DateTime<Utc>,
    /// Lifetime positive earnings
    pub total_earnings: u64,
    /// Who invited this player
    pub referred_by: Option<PlayerId>,
    /// Mini-game counters
    pub game_stats: GameStats,
    /// Consecutive days with a daily claim
    pub daily_streak: u32,
    /// UTC day of the last daily claim
    pub last_login_date: Option<NaiveDate>,
    /// Soft ban flag
    pub banned: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last committed change
    pub updated_at: DateTime<Utc>,
    /// Incremented on every committed change
    pub revision: u64,
}

impl Player {
    /// Fresh level-1 player with full energy.
    ///
    /// Self-referrals are dropped here so the invariant holds for every
    /// constructed player.
    pub fn new(
        id: PlayerId,
        profile: PlayerProfile,
        referred_by: Option<PlayerId>,
        now: DateTime<Utc>,
        rules: &EconomyRules,
    ) -> Self {
        Self {
            id,
            profile,
            coins: 0,
            premium_coins: 0,
            level: 1,
            experience: 0,
            taps_count: 0,
            energy: rules.max_energy(1),
            last_energy_update: now,
            last_action_time: now,
            total_earnings: 0,
            referred_by: referred_by.filter(|r| *r != id),
            game_stats: GameStats::default(),
            daily_streak: 0,
            last_login_date: None,
            banned: false,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Energy cap at the current level.
    #[inline]
    pub fn max_energy(&self, rules: &EconomyRules) -> u32 {
        rules.max_energy(self.level)
    }
}

/// Read model returned to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Identity
    pub player_id: PlayerId,
    /// Primary currency
    pub coins: u64,
    /// Secondary currency
    pub premium_coins: u64,
    /// Current level
    pub level: u32,
    /// Experience toward the next level
    pub experience: u64,
    /// Experience threshold for the next level
    pub experience_to_next: u64,
    /// Current energy
    pub energy: u32,
    /// Energy cap
    pub max_energy: u32,
    /// Lifetime taps
    pub taps_count: u64,
    /// Lifetime earnings
    pub total_earnings: u64,
    /// Players invited
    pub referrals: u64,
    /// Code to share with friends
    pub referral_code: String,
    /// Mini-game counters
    pub game_stats: GameStats,
    /// Consecutive days with a daily claim
    pub daily_streak: u32,
    /// Soft ban flag
    pub banned: bool,
}

impl PlayerView {
    /// Build the view from persisted state.
    pub fn from_player(player: &Player, referrals: u64, rules: &EconomyRules) -> Self {
        Self {
            player_id: player.id,
            coins: player.coins,
            premium_coins: player.premium_coins,
            level: player.level,
            experience: player.experience,
            experience_to_next: rules.experience_to_next(player.level),
            energy: player.energy,
            max_energy: player.max_energy(rules),
            taps_count: player.taps_count,
            total_earnings: player.total_earnings,
            referrals,
            referral_code: player.id.referral_code(),
            game_stats: player.game_stats,
            daily_streak: player.daily_streak,
            banned: player.banned,
        }
    }
}
