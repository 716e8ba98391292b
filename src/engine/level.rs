//! Level math: cumulative XP to level, level boundaries, and level-up
//! bonuses. Everything here is pure; the reward engine calls in during its
//! apply transaction.

use crate::engine::types::Reward;

/// XP required to advance one level.
pub const XP_PER_LEVEL: u64 = 100;

/// Level for a cumulative XP total. `calculate_level(0) == 1`.
pub fn calculate_level(total_xp: u64) -> u32 {
    (total_xp / XP_PER_LEVEL) as u32 + 1
}

/// Cumulative XP at which `level` begins. Inverse boundary of
/// [`calculate_level`]: `calculate_level(required_xp(l)) == l`.
pub fn required_xp(level: u32) -> u64 {
    (level.saturating_sub(1)) as u64 * XP_PER_LEVEL
}

/// XP still needed to reach the next level.
pub fn xp_to_next_level(total_xp: u64) -> u64 {
    calculate_level(total_xp) as u64 * XP_PER_LEVEL - total_xp
}

/// Percentage progress within the current level, 0.0-100.0.
pub fn level_progress(total_xp: u64) -> f64 {
    (total_xp % XP_PER_LEVEL) as f64 / XP_PER_LEVEL as f64 * 100.0
}

/// Bonus granted on reaching `new_level`.
///
/// Coins only; level-ups never grant XP, which would feed back into further
/// level-ups. Milestone levels override the base coin amount and attach
/// exactly one badge.
pub fn level_up_reward(new_level: u32) -> Reward {
    let milestone = match new_level {
        5 => Some((100, "Novice Reader")),
        10 => Some((200, "Book Lover")),
        15 => Some((300, "Avid Reader")),
        20 => Some((500, "Book Master")),
        25 => Some((750, "Reading Legend")),
        30 => Some((1000, "Ultimate Reader")),
        _ => None,
    };

    match milestone {
        Some((coins, badge)) => Reward::new(0, coins).with_badge(badge),
        None => Reward::new(0, new_level * 25),
    }
}
