//! Experience and Leveling
//!
//! One experience point per tap. Reaching `level * 1000` experience
//! advances exactly one level per check, resets experience to zero and
//! refills energy to the new cap.

use crate::game::player::Player;
use crate::game::rules::EconomyRules;

/// Add experience without checking for a level-up.
pub fn apply_experience(player: &Player, gained: u64) -> Player {
    let mut next = player.clone();
    next.experience = next.experience.saturating_add(gained);
    next
}

/// Apply at most one level-up.
///
/// A gain large enough to cover several thresholds still advances a single
/// level; the remainder is discarded with the experience reset.
pub fn check_level_up(player: &Player, rules: &EconomyRules) -> (Player, bool) {
    let mut next = player.clone();
    if next.experience < rules.experience_to_next(next.level) {
        return (next, false);
    }

    next.level = next.level.saturating_add(1);
    next.experience = 0;
    next.energy = rules.max_energy(next.level);
    (next, true)
}
