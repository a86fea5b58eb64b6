//! Daily Attendance
//!
//! One reward per UTC calendar day. Claiming on the day after the previous
//! claim extends the streak; a missed day restarts it at 1.

use chrono::{DateTime, NaiveDate, Utc};

use crate::game::player::Player;
use crate::game::validate::Rejection;

/// Accepted claim, ready to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidClaim {
    /// Calendar day being claimed
    pub day: NaiveDate,
    /// Streak after this claim
    pub streak: u32,
}

/// Streak after claiming on `today`.
pub fn next_streak(last_claim: Option<NaiveDate>, streak: u32, today: NaiveDate) -> u32 {
    match last_claim {
        Some(last) if last.succ_opt() == Some(today) => streak.saturating_add(1),
        _ => 1,
    }
}

/// Validate a claim at `now`.
///
/// A stored claim date at or after today (including one ahead of a skewed
/// clock) counts as already claimed.
pub fn validate_claim(player: Option<&Player>, now: DateTime<Utc>) -> Result<ValidClaim, Rejection> {
    let player = match player {
        Some(p) if !p.banned => p,
        _ => return Err(Rejection::NotFoundOrBanned),
    };

    let today = now.date_naive();
    if matches!(player.last_login_date, Some(last) if last >= today) {
        return Err(Rejection::AlreadyClaimed);
    }

    Ok(ValidClaim {
        day: today,
        streak: next_streak(player.last_login_date, player.daily_streak, today),
    })
}
