//! Action Records
//!
//! Immutable audit entries written after every tap and game.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::game::action::ActionKind;
use crate::game::player::PlayerId;
use crate::game::reward::Outcome;

/// Structured result payload of a recorded action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Resolved payout
    pub outcome: Outcome,
    /// Coin balance change actually applied
    pub net_change: i64,
    /// Whether the action triggered a level-up
    pub leveled_up: bool,
}

/// One audit log row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameActionRecord {
    /// Row identifier
    pub id: Uuid,
    /// Acting player
    pub player_id: PlayerId,
    /// What was done
    pub kind: ActionKind,
    /// Taps or stake
    pub amount: u64,
    /// Result payload
    pub result: ActionResult,
    /// When the action was accepted
    pub timestamp: DateTime<Utc>,
    /// Set when the server resolved the outcome itself
    pub verified: bool,
}

impl GameActionRecord {
    /// Record a server-resolved action.
    pub fn verified(
        player_id: PlayerId,
        kind: ActionKind,
        amount: u64,
        result: ActionResult,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id,
            kind,
            amount,
            result,
            timestamp,
            verified: true,
        }
    }
}
