//! Achievement evaluation: one generic interpreter over the condition
//! vocabulary, driven by a fresh stats snapshot per check.

use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, info};

use crate::engine::catalog::AchievementCatalog;
use crate::engine::errors::EngineError;
use crate::engine::reward;
use crate::engine::storage::GameStore;
use crate::engine::types::{
    AchievementAward, AchievementCondition, AchievementDefinition, AchievementProgress,
    GrantedReward, Reward, RewardKind, RewardSource, StatsSnapshot, Timeframe,
};

/// Progress of one condition against a snapshot, as `(current, required)`.
/// Satisfied when `current >= required`.
pub fn condition_progress(condition: &AchievementCondition, stats: &StatsSnapshot) -> (u64, u64) {
    match condition {
        AchievementCondition::BooksRead { count } => (stats.books_count as u64, *count as u64),
        AchievementCondition::PagesRead { count, timeframe } => {
            let current = match timeframe {
                Timeframe::AllTime => stats.total_pages,
                Timeframe::BestDay => stats.max_daily_pages,
            };
            (current, *count)
        }
        AchievementCondition::QuestsCompleted { count } => {
            (stats.quests_completed as u64, *count as u64)
        }
        AchievementCondition::StreakDays { days } => (stats.longest_streak as u64, *days as u64),
        AchievementCondition::LevelReached { level } => (stats.level as u64, *level as u64),
        AchievementCondition::GenreDiversity { count } => {
            (stats.genre_count as u64, *count as u64)
        }
        AchievementCondition::SpeedReading { pages_per_hour } => {
            (stats.max_pages_per_hour as u64, *pages_per_hour as u64)
        }
        AchievementCondition::EarlyBird { before_hour } => {
            (stats.sessions_before_hour(*before_hour) as u64, 1)
        }
        AchievementCondition::NightOwl { after_hour } => {
            (stats.sessions_from_hour(*after_hour) as u64, 1)
        }
        AchievementCondition::Perfectionist { consecutive } => {
            (stats.consecutive_perfect as u64, *consecutive as u64)
        }
    }
}

pub fn condition_met(condition: &AchievementCondition, stats: &StatsSnapshot) -> bool {
    let (current, required) = condition_progress(condition, stats);
    current >= required
}

/// Outcome of one evaluation pass over the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    /// Definitions whose conditions the snapshot now satisfies but which the
    /// user has not earned yet.
    pub unlocked: Vec<AchievementDefinition>,
    /// Progress toward everything still unmet.
    pub progress: Vec<AchievementProgress>,
}

/// Evaluate every not-yet-earned definition (secret ones included) against a
/// fresh stats snapshot.
pub fn check_user_achievements(
    store: &GameStore,
    catalog: &AchievementCatalog,
    user_id: &str,
    tz: FixedOffset,
) -> Result<EvaluationReport, EngineError> {
    let stats = store.read_aggregate_stats(user_id, tz)?;
    let earned: std::collections::HashSet<String> = store
        .awards_for_user(user_id)?
        .into_iter()
        .map(|award| award.achievement_id)
        .collect();

    let mut report = EvaluationReport::default();
    for definition in catalog.iter() {
        if earned.contains(&definition.id) {
            continue;
        }
        let (current, required) = condition_progress(&definition.condition, &stats);
        if current >= required {
            report.unlocked.push(definition.clone());
        } else {
            report.progress.push(AchievementProgress {
                definition: definition.clone(),
                current,
                required,
            });
        }
    }
    debug!(
        "achievement check for {}: {} unlocked, {} in progress",
        user_id,
        report.unlocked.len(),
        report.progress.len()
    );
    Ok(report)
}

/// Grant one achievement. Idempotent: a second call for the same
/// `(user, achievement)` pair observes the existing award row and grants
/// nothing, reported as `Ok(None)` rather than an error.
pub fn unlock_achievement(
    store: &GameStore,
    catalog: &AchievementCatalog,
    user_id: &str,
    achievement_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<GrantedReward>, EngineError> {
    let definition = catalog
        .get(achievement_id)
        .ok_or_else(|| EngineError::UnknownAchievement(achievement_id.to_string()))?;

    if !store.record_award(user_id, achievement_id, now)? {
        debug!(
            "achievement {} already earned by {}, skipping grant",
            achievement_id, user_id
        );
        return Ok(None);
    }

    let mut payload = Reward::new(definition.rewards.xp, definition.rewards.coins);
    if let Some(title) = &definition.rewards.title {
        payload = payload.with_badge(title);
    }
    let source = RewardSource::new(RewardKind::Achievement, achievement_id);
    let granted = reward::apply_reward(store, user_id, &payload, &source, None, now)?;
    info!(
        "achievement {} unlocked by {}: {} xp, {} coins",
        achievement_id, user_id, granted.xp, granted.coins
    );
    Ok(Some(granted))
}

/// Unlock everything a fresh evaluation says is due. Returns the definitions
/// actually granted this pass.
pub fn unlock_pending(
    store: &GameStore,
    catalog: &AchievementCatalog,
    user_id: &str,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<Vec<AchievementDefinition>, EngineError> {
    let report = check_user_achievements(store, catalog, user_id, tz)?;
    let mut granted = Vec::new();
    for definition in report.unlocked {
        if unlock_achievement(store, catalog, user_id, &definition.id, now)?.is_some() {
            granted.push(definition);
        }
    }
    Ok(granted)
}

/// Read-only composition of the award table and a fresh evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserAchievements {
    pub earned: Vec<AchievementAward>,
    /// Not-yet-earned, non-secret definitions. Secret achievements are
    /// withheld until earned.
    pub available: Vec<AchievementDefinition>,
    pub progress: Vec<AchievementProgress>,
}

pub fn user_achievements(
    store: &GameStore,
    catalog: &AchievementCatalog,
    user_id: &str,
    tz: FixedOffset,
) -> Result<UserAchievements, EngineError> {
    let earned = store.awards_for_user(user_id)?;
    let earned_ids: std::collections::HashSet<&str> =
        earned.iter().map(|award| award.achievement_id.as_str()).collect();

    let report = check_user_achievements(store, catalog, user_id, tz)?;
    let available = catalog
        .iter()
        .filter(|definition| !definition.is_secret && !earned_ids.contains(definition.id.as_str()))
        .cloned()
        .collect();
    let progress = report
        .progress
        .into_iter()
        .filter(|entry| !entry.definition.is_secret)
        .collect();

    Ok(UserAchievements {
        earned,
        available,
        progress,
    })
}
