//! Action Validation
//!
//! Structural, existence, resource and timing checks, evaluated in that
//! order; the first failure wins. Nothing here mutates state.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::game::action::{CoinSide, GameKind, GameRequest, TapRequest};
use crate::game::player::Player;
use crate::game::rules::EconomyRules;

/// Resource a request ran short of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Tap energy
    Energy,
    /// Coin balance
    Coins,
}

/// Reason a request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Malformed or out-of-range request.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Unknown identity or banned player.
    #[error("player not found or banned")]
    NotFoundOrBanned,

    /// Not enough energy or coins.
    #[error("insufficient {0:?}")]
    InsufficientResource(Resource),

    /// Second action inside the minimum interval.
    #[error("tapping too fast")]
    TooFast,

    /// Daily reward already taken today.
    #[error("daily reward already claimed")]
    AlreadyClaimed,
}

/// A game request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidGame {
    /// Which game
    pub kind: GameKind,
    /// Stake as an unsigned amount
    pub stake: u64,
    /// Called side (flips only)
    pub choice: Option<CoinSide>,
}

/// Structural tap check.
pub fn check_tap_request(req: &TapRequest, rules: &EconomyRules) -> Result<u32, Rejection> {
    if req.taps < 1 || req.taps > rules.max_taps_per_request as i64 {
        return Err(Rejection::InvalidInput("taps out of range"));
    }
    Ok(req.taps as u32)
}

/// Structural game check.
pub fn check_game_request(req: &GameRequest, rules: &EconomyRules) -> Result<ValidGame, Rejection> {
    if req.stake <= 0 || (req.stake as u64) < rules.min_stake {
        return Err(Rejection::InvalidInput("stake below minimum"));
    }
    if req.kind == GameKind::Flip && req.choice.is_none() {
        return Err(Rejection::InvalidInput("flip requires a choice"));
    }
    Ok(ValidGame {
        kind: req.kind,
        stake: req.stake as u64,
        choice: if req.kind == GameKind::Flip { req.choice } else { None },
    })
}

/// Validate a tap against an already-regenerated player.
///
/// Elapsed time since the last action below the interval (including a
/// negative interval from clock skew) counts as too fast.
pub fn validate_tap(
    player: Option<&Player>,
    req: &TapRequest,
    now: DateTime<Utc>,
    rules: &EconomyRules,
) -> Result<u32, Rejection> {
    let taps = check_tap_request(req, rules)?;

    let player = match player {
        Some(p) if !p.banned => p,
        _ => return Err(Rejection::NotFoundOrBanned),
    };

    if player.energy < taps {
        return Err(Rejection::InsufficientResource(Resource::Energy));
    }

    let since_last = (now - player.last_action_time).to_std().unwrap_or_default();
    if since_last < rules.min_action_interval {
        return Err(Rejection::TooFast);
    }

    Ok(taps)
}

/// Validate a game request.
pub fn validate_game(
    player: Option<&Player>,
    req: &GameRequest,
    rules: &EconomyRules,
) -> Result<ValidGame, Rejection> {
    let game = check_game_request(req, rules)?;

    let player = match player {
        Some(p) if !p.banned => p,
        _ => return Err(Rejection::NotFoundOrBanned),
    };

    if player.coins < game.stake {
        return Err(Rejection::InsufficientResource(Resource::Coins));
    }

    Ok(game)
}
