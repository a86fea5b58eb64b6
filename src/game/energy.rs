//! Energy Regeneration
//!
//! Energy refills at a fixed rate per elapsed minute up to the level cap.
//! Must run before any energy-consuming check.

use chrono::{DateTime, Utc};

use crate::game::player::Player;
use crate::game::rules::EconomyRules;

/// Energy earned over `elapsed_ms` milliseconds: `floor(minutes * rate)`.
///
/// Negative elapsed time (clock skew) earns nothing.
#[inline]
pub fn energy_gain(elapsed_ms: i64, rules: &EconomyRules) -> u64 {
    if elapsed_ms <= 0 {
        return 0;
    }
    (elapsed_ms as u64).saturating_mul(rules.energy_regen_per_minute as u64) / 60_000
}

/// Regenerate energy up to `now`.
///
/// Always moves `last_energy_update` to `now`, even when nothing was added.
pub fn regenerate(player: &Player, now: DateTime<Utc>, rules: &EconomyRules) -> Player {
    let elapsed_ms = (now - player.last_energy_update).num_milliseconds();
    let gain = energy_gain(elapsed_ms, rules);
    let cap = player.max_energy(rules) as u64;

    let mut next = player.clone();
    next.energy = (player.energy as u64).saturating_add(gain).min(cap) as u32;
    next.last_energy_update = now;
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    use crate::game::player::{PlayerId, PlayerProfile};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn player_with_energy(energy: u32, level: u32) -> Player {
        let rules = EconomyRules::default();
        let mut player = Player::new(PlayerId(1), PlayerProfile::default(), None, start(), &rules);
        player.energy = energy;
        player.level = level;
        player
    }

    #[test]
    fn test_two_per_minute() {
        let rules = EconomyRules::default();
        let player = player_with_energy(100, 1);
        let next = regenerate(&player, start() + Duration::minutes(10), &rules);
        assert_eq!(next.energy, 120);
        assert_eq!(next.last_energy_update, start() + Duration::minutes(10));
    }

    #[test]
    fn test_under_thirty_seconds_adds_nothing() {
        let rules = EconomyRules::default();
        let player = player_with_energy(500, 1);
        let now = start() + Duration::seconds(29);
        let next = regenerate(&player, now, &rules);
        assert_eq!(next.energy, 500);
        // Timestamp still advances
        assert_eq!(next.last_energy_update, now);
    }

    #[test]
    fn test_thirty_seconds_adds_one() {
        let rules = EconomyRules::default();
        let player = player_with_energy(500, 1);
        let next = regenerate(&player, start() + Duration::seconds(30), &rules);
        assert_eq!(next.energy, 501);
    }

    #[test]
    fn test_capped_at_level_max() {
        let rules = EconomyRules::default();
        let player = player_with_energy(1190, 3);
        let next = regenerate(&player, start() + Duration::hours(5), &rules);
        assert_eq!(next.energy, 1200);
    }

    #[test]
    fn test_clock_skew_adds_nothing() {
        let rules = EconomyRules::default();
        let player = player_with_energy(400, 1);
        let now = start() - Duration::minutes(30);
        let next = regenerate(&player, now, &rules);
        assert_eq!(next.energy, 400);
        assert_eq!(next.last_energy_update, now);
    }

    #[test]
    fn test_regenerate_same_instant_is_noop() {
        let rules = EconomyRules::default();
        let player = player_with_energy(321, 2);
        let next = regenerate(&player, start(), &rules);
        assert_eq!(next, player);
    }

    proptest! {
        #[test]
        fn prop_gain_is_floor_of_twice_minutes(elapsed_ms in 0i64..10_000_000_000) {
            let rules = EconomyRules::default();
            let expected = (elapsed_ms as u128 * 2 / 60_000) as u64;
            prop_assert_eq!(energy_gain(elapsed_ms, &rules), expected);
        }

        #[test]
        fn prop_negative_elapsed_gains_nothing(elapsed_ms in i64::MIN..0i64) {
            prop_assert_eq!(energy_gain(elapsed_ms, &EconomyRules::default()), 0);
        }

        #[test]
        fn prop_energy_stays_within_cap(
            level in 1u32..200,
            energy_frac in 0.0f64..=1.0,
            elapsed_secs in -100_000i64..1_000_000,
        ) {
            let rules = EconomyRules::default();
            let cap = rules.max_energy(level);
            let player = player_with_energy((cap as f64 * energy_frac) as u32, level);
            let next = regenerate(&player, start() + Duration::seconds(elapsed_secs), &rules);
            prop_assert!(next.energy <= cap);
            prop_assert!(next.energy >= player.energy);
        }
    }
}
