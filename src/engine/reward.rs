//! Reward computation and the single apply-reward mutation point.
//!
//! All calculators here are pure. The one side-effecting operation,
//! [`apply_reward`], folds every bonus owed for a triggering event (streak
//! milestone, level-up) into a single atomic store transaction so a user's
//! totals can never be observed half-updated.

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};

use crate::engine::errors::EngineError;
use crate::engine::level;
use crate::engine::storage::GameStore;
use crate::engine::types::{
    CompletionQuality, GrantedReward, Reward, RewardSource, UserProgress,
};

/// Quest completion reward: difficulty-scaled base, quality-scaled payout.
pub fn quest_reward(difficulty: u8, quality: CompletionQuality) -> Reward {
    let base_xp = difficulty as f64 * 20.0;
    let base_coins = difficulty as f64 * 10.0;
    let factor = quality.factor();
    Reward::new(
        (base_xp * factor).floor() as u32,
        (base_coins * factor).floor() as u32,
    )
}

/// Reading session reward: time-capped XP plus page bonus, focus-scaled.
pub fn reading_reward(duration_minutes: u32, focus_score: u32, pages_read: u32) -> Reward {
    let time_xp = duration_minutes.min(120) as f64;
    let focus_bonus = if focus_score >= 70 { 1.2 } else { 1.0 };
    let page_bonus = pages_read as f64 * 2.0;
    let xp = ((time_xp + page_bonus) * focus_bonus).floor() as u32;
    let coins = (xp as f64 * 0.4).floor() as u32;
    Reward::new(xp, coins)
}

/// Streak milestone bonus. Returns `None` for non-milestone day counts;
/// streak bonuses are opportunistic, not guaranteed every day.
pub fn streak_bonus(streak_days: u32) -> Option<Reward> {
    let (xp, coins, badge) = match streak_days {
        7 => (100, 50, "Week Streak"),
        14 => (250, 125, "Fortnight Streak"),
        30 => (500, 250, "Month Streak"),
        60 => (1000, 500, "Two Month Streak"),
        100 => (2000, 1000, "Hundred Day Streak"),
        _ => return None,
    };
    Some(Reward::new(xp, coins).with_badge(badge))
}

/// Reward for finishing a book, proportional to its length.
pub fn book_completion_reward(page_count: u32) -> Reward {
    Reward::new(
        (page_count as f64 * 0.5).floor() as u32,
        (page_count as f64 * 0.2).floor() as u32,
    )
}

/// One-time bonus for registering the first book.
pub fn first_book_reward() -> Reward {
    Reward::new(50, 25).with_badge("First Book")
}

/// Dynamic payout scaling based on account age, inactivity and level.
///
/// New accounts (≤7 days) get 1.5×; returning users (≥7 days inactive) get
/// 2.0× — the two cannot co-occur since a week-old account cannot have been
/// inactive a week. High-level users are tapered. Result is clamped to
/// [0.5, 3.0].
pub struct RewardBalancer;

impl RewardBalancer {
    pub fn multiplier(progress: &UserProgress, now: DateTime<Utc>) -> f64 {
        let mut multiplier: f64 = 1.0;

        let account_age_days = (now - progress.created_at).num_days();
        if account_age_days <= 7 {
            multiplier *= 1.5;
        }

        if let Some(last_activity) = progress.last_activity_date {
            let inactive_days = (now.date_naive() - last_activity).num_days();
            if inactive_days >= 7 {
                multiplier *= 2.0;
            }
        }

        let level = progress.level();
        if level > 50 {
            multiplier *= 0.8;
        } else if level > 20 {
            multiplier *= 0.9;
        }

        multiplier.clamp(0.5, 3.0)
    }

    /// Scale a computed reward's payouts by the balancer multiplier.
    pub fn scale(reward: &Reward, multiplier: f64) -> Reward {
        let mut scaled = Reward::new(
            (reward.xp as f64 * multiplier).floor() as u32,
            (reward.coins as f64 * multiplier).floor() as u32,
        );
        scaled.badges = reward.badges.clone();
        scaled
    }
}

/// Activity attribution for an apply-reward call: which local calendar day
/// the event belongs to, and whether it was a perfect quest completion
/// (drives the consecutive-perfect counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityContext {
    pub date: NaiveDate,
    pub perfect_completion: Option<bool>,
}

impl ActivityContext {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date,
            perfect_completion: None,
        }
    }

    pub fn with_perfect(mut self, perfect: bool) -> Self {
        self.perfect_completion = Some(perfect);
        self
    }
}

/// Result of folding a reward into a user's progress: the updated row and
/// what was actually granted.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldOutcome {
    pub updated: UserProgress,
    pub granted: GrantedReward,
}

/// Pure fold of one reward event into a user-progress row.
///
/// Order matters: the daily streak advances first (its milestone bonus joins
/// the XP total), then level-up is detected against the combined XP, and the
/// level-up coin bonus is folded on top. Called from inside the store's
/// apply transaction; must stay deterministic.
pub fn fold_reward(
    current: &UserProgress,
    reward: &Reward,
    activity: Option<&ActivityContext>,
    now: DateTime<Utc>,
) -> FoldOutcome {
    let mut updated = current.clone();
    let mut combined = reward.clone();

    if let Some(activity) = activity {
        let advanced = advance_streak(&mut updated, activity.date);
        if advanced {
            if let Some(bonus) = streak_bonus(updated.current_streak) {
                debug!(
                    "streak milestone for {}: day {}",
                    updated.user_id, updated.current_streak
                );
                combined.merge(bonus);
            }
        }

        match activity.perfect_completion {
            Some(true) => updated.consecutive_perfect += 1,
            Some(false) => updated.consecutive_perfect = 0,
            None => {}
        }
    }

    let old_level = level::calculate_level(updated.total_xp);
    updated.total_xp += combined.xp as u64;
    let new_level = level::calculate_level(updated.total_xp);

    let mut leveled_up = false;
    if new_level > old_level {
        leveled_up = true;
        let bonus = level::level_up_reward(new_level);
        combined.merge(bonus);
    }

    updated.total_coins += combined.coins as u64;
    updated.updated_at = now;

    FoldOutcome {
        updated,
        granted: GrantedReward {
            xp: combined.xp,
            coins: combined.coins,
            badges: combined.badges,
            leveled_up,
            new_level: leveled_up.then_some(new_level),
        },
    }
}

/// Advance the daily streak for an activity on `date`. Returns true when the
/// streak value changed (same-day repeat activity is a no-op).
fn advance_streak(progress: &mut UserProgress, date: NaiveDate) -> bool {
    let new_streak = match progress.last_activity_date {
        None => 1,
        Some(last) => {
            let day_gap = (date - last).num_days();
            match day_gap {
                0 => return false,
                1 => progress.current_streak + 1,
                _ => 1,
            }
        }
    };
    progress.current_streak = new_streak;
    progress.longest_streak = progress.longest_streak.max(new_streak);
    progress.last_activity_date = Some(date);
    true
}

/// The single state-mutating reward operation.
///
/// Runs as one atomic store transaction keyed by `(user, source)`: a retried
/// call with the same source observes the ledger row and grants nothing new.
pub fn apply_reward(
    store: &GameStore,
    user_id: &str,
    reward: &Reward,
    source: &RewardSource,
    activity: Option<ActivityContext>,
    now: DateTime<Utc>,
) -> Result<GrantedReward, EngineError> {
    let granted = store.apply_reward_atomic(user_id, reward, source, activity, now)?;
    if granted.leveled_up {
        info!(
            "user {} leveled up to {} ({} xp, {} coins granted)",
            user_id,
            granted.new_level.unwrap_or_default(),
            granted.xp,
            granted.coins
        );
    } else {
        debug!(
            "reward applied for {}: {} xp, {} coins from {}:{}",
            user_id,
            granted.xp,
            granted.coins,
            source.kind.as_str(),
            source.source_id
        );
    }
    Ok(granted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn user_at(total_xp: u64) -> UserProgress {
        let mut progress = UserProgress::new("alice", now() - chrono::Duration::days(30));
        progress.total_xp = total_xp;
        progress
    }

    #[test]
    fn quest_reward_scales_with_difficulty_and_quality() {
        let reward = quest_reward(3, CompletionQuality::Normal);
        assert_eq!((reward.xp, reward.coins), (60, 30));

        let reward = quest_reward(5, CompletionQuality::Perfect);
        assert_eq!((reward.xp, reward.coins), (150, 75));

        let reward = quest_reward(2, CompletionQuality::Poor);
        assert_eq!((reward.xp, reward.coins), (32, 16));
    }

    #[test]
    fn reading_reward_caps_time_and_applies_focus() {
        // 200 minutes caps at 120; 10 pages -> +20; focus 80 -> x1.2
        let reward = reading_reward(200, 80, 10);
        assert_eq!(reward.xp, 168);
        assert_eq!(reward.coins, 67);

        // Below the focus threshold there is no bonus.
        let reward = reading_reward(30, 69, 0);
        assert_eq!(reward.xp, 30);
        assert_eq!(reward.coins, 12);
    }

    #[test]
    fn streak_bonus_only_at_milestones() {
        assert!(streak_bonus(6).is_none());
        assert!(streak_bonus(8).is_none());
        let bonus = streak_bonus(7).unwrap();
        assert_eq!((bonus.xp, bonus.coins), (100, 50));
        assert_eq!(bonus.badges, vec!["Week Streak".to_string()]);
        assert_eq!(streak_bonus(100).unwrap().xp, 2000);
    }

    #[test]
    fn book_completion_scales_with_pages() {
        let reward = book_completion_reward(300);
        assert_eq!((reward.xp, reward.coins), (150, 60));
        let reward = book_completion_reward(5);
        assert_eq!((reward.xp, reward.coins), (2, 1));
    }

    #[test]
    fn balancer_new_account_bonus() {
        let mut progress = UserProgress::new("bob", now() - chrono::Duration::days(3));
        progress.last_activity_date = Some(now().date_naive());
        assert_eq!(RewardBalancer::multiplier(&progress, now()), 1.5);
    }

    #[test]
    fn balancer_return_user_bonus() {
        let mut progress = user_at(0);
        progress.last_activity_date = Some(now().date_naive() - chrono::Duration::days(10));
        assert_eq!(RewardBalancer::multiplier(&progress, now()), 2.0);
    }

    #[test]
    fn balancer_tapers_high_levels_and_clamps() {
        let mut progress = user_at(2500); // level 26
        progress.last_activity_date = Some(now().date_naive());
        assert_eq!(RewardBalancer::multiplier(&progress, now()), 0.9);

        let mut progress = user_at(6000); // level 61
        progress.last_activity_date = Some(now().date_naive());
        assert_eq!(RewardBalancer::multiplier(&progress, now()), 0.8);

        // Return bonus on a high-level account still clamps below 3.0.
        let mut progress = user_at(6000);
        progress.last_activity_date = Some(now().date_naive() - chrono::Duration::days(30));
        assert_eq!(RewardBalancer::multiplier(&progress, now()), 1.6);
    }

    #[test]
    fn fold_detects_level_up_and_adds_coin_bonus() {
        let progress = user_at(90);
        let outcome = fold_reward(&progress, &Reward::new(30, 10), None, now());
        assert!(outcome.granted.leveled_up);
        assert_eq!(outcome.granted.new_level, Some(2));
        assert_eq!(outcome.granted.xp, 30);
        // 10 quest coins + level 2 bonus of 50.
        assert_eq!(outcome.granted.coins, 60);
        assert_eq!(outcome.updated.total_xp, 120);
        assert_eq!(outcome.updated.total_coins, 60);
    }

    #[test]
    fn fold_without_level_up_keeps_reward_as_is() {
        let progress = user_at(10);
        let outcome = fold_reward(&progress, &Reward::new(20, 10), None, now());
        assert!(!outcome.granted.leveled_up);
        assert_eq!(outcome.granted.new_level, None);
        assert_eq!((outcome.granted.xp, outcome.granted.coins), (20, 10));
    }

    #[test]
    fn streak_advances_once_per_day() {
        let mut progress = user_at(0);
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let first = fold_reward(
            &progress,
            &Reward::new(10, 0),
            Some(&ActivityContext::on(day)),
            now(),
        );
        assert_eq!(first.updated.current_streak, 1);
        progress = first.updated;

        // Same-day activity does not advance the streak.
        let again = fold_reward(
            &progress,
            &Reward::new(10, 0),
            Some(&ActivityContext::on(day)),
            now(),
        );
        assert_eq!(again.updated.current_streak, 1);
        progress = again.updated;

        let next_day = day + chrono::Duration::days(1);
        let second = fold_reward(
            &progress,
            &Reward::new(10, 0),
            Some(&ActivityContext::on(next_day)),
            now(),
        );
        assert_eq!(second.updated.current_streak, 2);

        // A gap resets to 1.
        let later = next_day + chrono::Duration::days(5);
        let reset = fold_reward(
            &second.updated,
            &Reward::new(10, 0),
            Some(&ActivityContext::on(later)),
            now(),
        );
        assert_eq!(reset.updated.current_streak, 1);
        assert_eq!(reset.updated.longest_streak, 2);
    }

    #[test]
    fn streak_milestone_folds_into_same_grant() {
        let mut progress = user_at(0);
        progress.current_streak = 6;
        progress.last_activity_date = Some(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());

        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let outcome = fold_reward(
            &progress,
            &Reward::new(10, 5),
            Some(&ActivityContext::on(day)),
            now(),
        );
        assert_eq!(outcome.updated.current_streak, 7);
        // 10 base + 100 milestone xp; coins include the milestone 50 plus
        // the level-up bonus for crossing level 2 (coins 50).
        assert_eq!(outcome.granted.xp, 110);
        assert!(outcome.granted.badges.contains(&"Week Streak".to_string()));
        assert!(outcome.granted.leveled_up);
    }

    #[test]
    fn perfect_completions_drive_consecutive_counter() {
        let progress = user_at(0);
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let outcome = fold_reward(
            &progress,
            &Reward::default(),
            Some(&ActivityContext::on(day).with_perfect(true)),
            now(),
        );
        assert_eq!(outcome.updated.consecutive_perfect, 1);

        let outcome = fold_reward(
            &outcome.updated,
            &Reward::default(),
            Some(&ActivityContext::on(day).with_perfect(false)),
            now(),
        );
        assert_eq!(outcome.updated.consecutive_perfect, 0);
    }
}
