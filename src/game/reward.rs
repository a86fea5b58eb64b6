//! Reward Resolution
//!
//! Turns a validated action into a payout. Taps are deterministic; the
//! three mini-games draw from an injected [`RandomSource`].
//!
//! For games the stake is always forfeited first and `coin_delta` is then
//! credited, so the balance moves by `coin_delta - stake`.

use serde::{Serialize, Deserialize};

use crate::core::rng::RandomSource;
use crate::game::action::{CoinSide, GameKind};
use crate::game::rules::EconomyRules;
use crate::game::validate::ValidGame;

/// Spin payout tiers, best first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinTier {
    /// 10x plus premium coins
    Jackpot,
    /// 5x
    BigWin,
    /// 2x
    GoodWin,
    /// 1.5x
    SmallWin,
    /// Stake returned
    BreakEven,
    /// Nothing returned
    Lose,
}

/// Cumulative thresholds for a single uniform draw.
pub const SPIN_TABLE: [(f64, SpinTier); 5] = [
    (0.02, SpinTier::Jackpot),
    (0.10, SpinTier::BigWin),
    (0.30, SpinTier::GoodWin),
    (0.50, SpinTier::SmallWin),
    (0.70, SpinTier::BreakEven),
];

/// Probability of finding treasure.
pub const TREASURE_FIND_CHANCE: f64 = 0.40;

/// Multiplier bands for a found treasure, checked in order.
pub const TREASURE_MULTIPLIERS: [(f64, u64); 2] = [(0.10, 10), (0.30, 5)];

/// Multiplier when no band matched.
pub const TREASURE_BASE_MULTIPLIER: u64 = 3;

/// Stake divisor for jackpot premium coins.
pub const PREMIUM_STAKE_DIVISOR: u64 = 1000;

impl SpinTier {
    /// Tier for a draw in `[0, 1)`.
    pub fn from_draw(r: f64) -> SpinTier {
        SPIN_TABLE
            .iter()
            .find(|(threshold, _)| r < *threshold)
            .map(|(_, tier)| *tier)
            .unwrap_or(SpinTier::Lose)
    }

    /// Coins credited for this tier.
    pub fn payout(self, stake: u64) -> u64 {
        match self {
            SpinTier::Jackpot => stake.saturating_mul(10),
            SpinTier::BigWin => stake.saturating_mul(5),
            SpinTier::GoodWin => stake.saturating_mul(2),
            SpinTier::SmallWin => stake.saturating_mul(3) / 2,
            SpinTier::BreakEven => stake,
            SpinTier::Lose => 0,
        }
    }

    /// Premium coins credited for this tier.
    pub fn premium(self, stake: u64) -> u64 {
        match self {
            SpinTier::Jackpot => (stake / PREMIUM_STAKE_DIVISOR).max(1),
            _ => 0,
        }
    }

    /// Break-even and losing spins are not wins.
    pub fn is_win(self) -> bool {
        !matches!(self, SpinTier::BreakEven | SpinTier::Lose)
    }
}

/// Per-action detail kept in the audit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeDetail {
    /// Tap payout
    Tap {
        /// Taps paid
        taps: u32,
        /// Coins per tap at the player's level
        coins_per_tap: u64,
    },
    /// Spin result
    Spin {
        /// Tier hit
        tier: SpinTier,
    },
    /// Treasure result
    Treasure {
        /// Whether anything was found
        found: bool,
        /// Applied multiplier, zero when nothing was found
        multiplier: u64,
    },
    /// Flip result
    Flip {
        /// Side the coin landed on
        landed: CoinSide,
        /// Side the player called
        choice: CoinSide,
    },
    /// Daily attendance claim
    Daily {
        /// Streak after the claim
        streak: u32,
    },
}

/// Resolved payout of one action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Coins credited (before the stake is deducted)
    pub coin_delta: u64,
    /// Premium coins credited
    pub premium_delta: u64,
    /// Whether the action counts as a win
    pub won: bool,
    /// Action-specific detail
    pub detail: OutcomeDetail,
}

impl Outcome {
    /// Balance change after forfeiting `stake`.
    #[inline]
    pub fn net_change(&self, stake: u64) -> i64 {
        self.coin_delta as i64 - stake as i64
    }

    /// Positive part of the net change; losses never reduce earnings.
    #[inline]
    pub fn earnings(&self, stake: u64) -> u64 {
        self.coin_delta.saturating_sub(stake)
    }
}

/// Deterministic tap payout: `taps * (floor(level / 3) + 1)`.
pub fn resolve_tap(taps: u32, level: u32, rules: &EconomyRules) -> Outcome {
    let coins_per_tap = rules.coins_per_tap(level);
    Outcome {
        coin_delta: taps as u64 * coins_per_tap,
        premium_delta: 0,
        won: true,
        detail: OutcomeDetail::Tap { taps, coins_per_tap },
    }
}

/// Spin: one draw partitioned by [`SPIN_TABLE`].
pub fn resolve_spin(stake: u64, rng: &mut dyn RandomSource) -> Outcome {
    let tier = SpinTier::from_draw(rng.next_unit());
    Outcome {
        coin_delta: tier.payout(stake),
        premium_delta: tier.premium(stake),
        won: tier.is_win(),
        detail: OutcomeDetail::Spin { tier },
    }
}

/// Treasure: find draw, then an independent multiplier draw.
pub fn resolve_treasure(stake: u64, rng: &mut dyn RandomSource) -> Outcome {
    if rng.next_unit() >= TREASURE_FIND_CHANCE {
        return Outcome {
            coin_delta: 0,
            premium_delta: 0,
            won: false,
            detail: OutcomeDetail::Treasure { found: false, multiplier: 0 },
        };
    }

    let m = rng.next_unit();
    let multiplier = TREASURE_MULTIPLIERS
        .iter()
        .find(|(threshold, _)| m < *threshold)
        .map(|(_, mult)| *mult)
        .unwrap_or(TREASURE_BASE_MULTIPLIER);

    Outcome {
        coin_delta: stake.saturating_mul(multiplier),
        premium_delta: 0,
        won: true,
        detail: OutcomeDetail::Treasure { found: true, multiplier },
    }
}

/// Flip: fair coin against the called side, double or nothing.
pub fn resolve_flip(stake: u64, choice: CoinSide, rng: &mut dyn RandomSource) -> Outcome {
    let landed = if rng.next_unit() < 0.5 { CoinSide::Heads } else { CoinSide::Tails };
    let won = landed == choice;
    Outcome {
        coin_delta: if won { stake.saturating_mul(2) } else { 0 },
        premium_delta: 0,
        won,
        detail: OutcomeDetail::Flip { landed, choice },
    }
}

/// Resolve a validated game.
pub fn resolve_game(game: &ValidGame, rng: &mut dyn RandomSource) -> Outcome {
    match game.kind {
        GameKind::Spin => resolve_spin(game.stake, rng),
        GameKind::Treasure => resolve_treasure(game.stake, rng),
        // Validation guarantees a choice; default keeps this total
        GameKind::Flip => resolve_flip(game.stake, game.choice.unwrap_or(CoinSide::Heads), rng),
    }
}
