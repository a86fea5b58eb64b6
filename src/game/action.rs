//! Action Requests
//!
//! What a caller asks the economy to do. Raw numeric inputs stay signed
//! so out-of-range values reach the validator instead of failing a cast.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

/// Chance-based mini-games.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// Wheel of fortune with six payout tiers
    Spin,
    /// Treasure hunt with a random multiplier
    Treasure,
    /// Double-or-nothing coin flip
    Flip,
}

impl GameKind {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            GameKind::Spin => "spin",
            GameKind::Treasure => "treasure",
            GameKind::Flip => "flip",
        }
    }
}

impl FromStr for GameKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spin" => Ok(GameKind::Spin),
            "treasure" => Ok(GameKind::Treasure),
            "flip" => Ok(GameKind::Flip),
            other => Err(format!("unknown game '{}'", other)),
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of a coin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinSide {
    /// Heads
    Heads,
    /// Tails
    Tails,
}

/// Every action that lands in the audit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Deterministic tap payout
    Tap,
    /// Spin game
    Spin,
    /// Treasure game
    Treasure,
    /// Flip game
    Flip,
    /// Daily attendance reward
    DailyClaim,
}

impl From<GameKind> for ActionKind {
    fn from(kind: GameKind) -> Self {
        match kind {
            GameKind::Spin => ActionKind::Spin,
            GameKind::Treasure => ActionKind::Treasure,
            GameKind::Flip => ActionKind::Flip,
        }
    }
}

/// Tap request as received.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapRequest {
    /// Taps batched into this request
    pub taps: i64,
}

/// Game request as received.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRequest {
    /// Which game
    pub kind: GameKind,
    /// Coins wagered
    pub stake: i64,
    /// Called side, required for flips
    pub choice: Option<CoinSide>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_kind_parse() {
        assert_eq!("spin".parse::<GameKind>().unwrap(), GameKind::Spin);
        assert_eq!("treasure".parse::<GameKind>().unwrap(), GameKind::Treasure);
        assert_eq!("flip".parse::<GameKind>().unwrap(), GameKind::Flip);
        assert!("roulette".parse::<GameKind>().is_err());
    }

    #[test]
    fn test_game_request_json() {
        let json = r#"{"kind":"flip","stake":250,"choice":"heads"}"#;
        let req: GameRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.kind, GameKind::Flip);
        assert_eq!(req.stake, 250);
        assert_eq!(req.choice, Some(CoinSide::Heads));
    }

    #[test]
    fn test_action_kind_from_game() {
        assert_eq!(ActionKind::from(GameKind::Treasure), ActionKind::Treasure);
    }
}
