//! Game Logic Module
//!
//! Pure state-transition rules. Nothing here touches storage or the clock;
//! time and randomness come in as arguments.
//!
//! ## Module Structure
//!
//! - `rules`: Tunable economy constants
//! - `player`: Player state, profile, read model
//! - `action`: Incoming tap and game requests
//! - `energy`: Energy regeneration over elapsed time
//! - `validate`: Structural, resource and rate checks
//! - `reward`: Payout resolution for taps and mini-games
//! - `progression`: Experience and level-ups
//! - `daily`: Daily attendance streak
//! - `record`: Audit log entries

pub mod rules;
pub mod player;
pub mod action;
pub mod energy;
pub mod validate;
pub mod reward;
pub mod progression;
pub mod daily;
pub mod record;

// Re-export key types
pub use rules::EconomyRules;
pub use player::{Player, PlayerId, PlayerProfile, PlayerView, ProfilePatch, GameStats};
pub use action::{ActionKind, CoinSide, GameKind, GameRequest, TapRequest};
pub use validate::{Rejection, Resource, ValidGame};
pub use reward::{Outcome, OutcomeDetail, SpinTier};
pub use record::{ActionResult, GameActionRecord};
pub use daily::ValidClaim;
