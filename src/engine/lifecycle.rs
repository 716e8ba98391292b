//! Quest state machine: legal status edges, expiry and renewal schedules,
//! and the completion multiplier.
//!
//! Temporal rules are pure over an explicit `(now, tz)` pair; the sweep entry
//! points take the store and write through
//! [`GameStore::write_quest_transition`] so status and audit rows stay
//! consistent.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use log::{debug, info};

use crate::engine::errors::EngineError;
use crate::engine::reward::{self, ActivityContext};
use crate::engine::storage::GameStore;
use crate::engine::types::{
    CompletionQuality, GrantedReward, Quest, QuestMetadata, QuestStatus, QuestType,
    RenewalInterval, RenewalPattern, Reward, RewardKind, RewardSource, ScheduleDay,
    StatusHistoryEntry, HISTORY_SCHEMA_VERSION,
};

/// Actor recorded on sweep-driven transitions.
pub const SYSTEM_ACTOR: &str = "system";

/// Legal outgoing edges for each status. Any edge not listed is illegal.
pub fn valid_transitions(from: QuestStatus) -> &'static [QuestStatus] {
    use QuestStatus::*;
    match from {
        Pending => &[Active, Locked],
        Active => &[Paused, Completed, Failed],
        Paused => &[Active, Failed],
        Completed => &[ReadyToClaim],
        ReadyToClaim => &[Completed],
        Failed => &[Pending],
        Expired => &[Pending],
        Locked => &[Pending],
        Legendary => &[Completed],
        Streak => &[Active, Completed],
    }
}

pub fn can_transition(from: QuestStatus, to: QuestStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// What a successful transition produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub quest: Quest,
    /// Present when the transition paid out (entering `completed` or
    /// `ready_to_claim` for the first time).
    pub granted: Option<GrantedReward>,
}

/// Validate and perform a status transition.
///
/// Entering `completed` requires `progress >= target_value` and a deadline
/// that has not lapsed past its grace window. Entering `completed` or
/// `ready_to_claim` computes the completion reward, scales it by
/// [`reward_multiplier`], and applies it through the reward ledger; the
/// ledger key is the quest ID, so the `completed <-> ready_to_claim` pair can
/// never pay twice.
pub fn transition(
    store: &GameStore,
    quest_id: &str,
    new_status: QuestStatus,
    actor: &str,
    reason: &str,
    quality: Option<CompletionQuality>,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<TransitionOutcome, EngineError> {
    let mut quest = store.get_quest(quest_id)?;
    let from_status = quest.status;

    if !can_transition(from_status, new_status) {
        return Err(EngineError::InvalidTransition {
            from: from_status,
            to: new_status,
        });
    }

    let entering_completion =
        matches!(new_status, QuestStatus::Completed | QuestStatus::ReadyToClaim);

    if new_status == QuestStatus::Completed && !quest.target_reached() {
        return Err(EngineError::IncompleteProgress {
            progress: quest.progress,
            target: quest.target_value,
        });
    }

    if entering_completion {
        if let Some(expires_at) = quest.expires_at {
            let grace = Duration::minutes(quest.grace_period_minutes as i64);
            if expires_at + grace < now {
                return Err(EngineError::AlreadyExpired);
            }
        }
    }

    // The completed <-> ready_to_claim claim cycle re-enters Completed;
    // streak accounting must fire only the first time.
    let first_completion = quest.completed_at.is_none();

    quest.status = new_status;
    match new_status {
        QuestStatus::Active => {
            if quest.started_at.is_none() {
                quest.started_at = Some(now);
            }
        }
        QuestStatus::Paused => quest.paused_at = Some(now),
        QuestStatus::Completed => {
            if quest.completed_at.is_none() {
                quest.completed_at = Some(now);
            }
        }
        QuestStatus::Failed => quest.failed_at = Some(now),
        _ => {}
    }

    let entry = StatusHistoryEntry {
        quest_id: quest.id.clone(),
        from_status,
        to_status: new_status,
        actor: actor.to_string(),
        reason: reason.to_string(),
        created_at: now,
        schema_version: HISTORY_SCHEMA_VERSION,
    };
    store.write_quest_transition(&quest, &entry)?;
    debug!(
        "quest {} transitioned {:?} -> {:?} by {}",
        quest.id, from_status, new_status, actor
    );

    let mut granted = None;
    if entering_completion {
        let streak_count = match store.get_metadata(&quest.id) {
            Ok(mut metadata) => {
                if new_status == QuestStatus::Completed
                    && first_completion
                    && matches!(quest.quest_type, QuestType::Daily | QuestType::Streak)
                {
                    metadata.streak_count += 1;
                    metadata.updated_at = now;
                    let count = metadata.streak_count;
                    store.put_metadata(metadata)?;
                    count
                } else {
                    metadata.streak_count
                }
            }
            Err(EngineError::NotFound(_)) => 0,
            Err(e) => return Err(e),
        };

        let quality = quality.unwrap_or(CompletionQuality::Normal);
        let multiplier = reward_multiplier(&quest, now, streak_count);
        let base = completion_reward(&quest, quality);
        let scaled = Reward::new(
            (base.xp as f64 * multiplier).floor() as u32,
            (base.coins as f64 * multiplier).floor() as u32,
        );

        let local_date = now.with_timezone(&tz).date_naive();
        let activity = ActivityContext::on(local_date)
            .with_perfect(quality == CompletionQuality::Perfect);
        let source = RewardSource::new(RewardKind::Quest, &quest.id);
        let applied = reward::apply_reward(
            store,
            &quest.user_id,
            &scaled,
            &source,
            Some(activity),
            now,
        )?;
        info!(
            "quest {} completed by {} (x{:.2}): {} xp, {} coins",
            quest.id, quest.user_id, multiplier, applied.xp, applied.coins
        );
        granted = Some(applied);
    }

    Ok(TransitionOutcome { quest, granted })
}

/// Base reward for completing a quest: explicit per-quest amounts scaled by
/// quality when present, otherwise the difficulty-based formula.
fn completion_reward(quest: &Quest, quality: CompletionQuality) -> Reward {
    if quest.xp_reward > 0 || quest.coin_reward > 0 {
        let factor = quality.factor();
        Reward::new(
            (quest.xp_reward as f64 * factor).floor() as u32,
            (quest.coin_reward as f64 * factor).floor() as u32,
        )
    } else {
        reward::quest_reward(quest.difficulty, quality)
    }
}

/// Completion multiplier: streak bonus capped at +1.0, an early-completion
/// bonus over the quest's active window, and a high-difficulty bump.
/// Rounded to two decimals; pure, touches no storage.
pub fn reward_multiplier(quest: &Quest, completion_time: DateTime<Utc>, streak_count: u32) -> f64 {
    let mut multiplier = 1.0;

    multiplier += (streak_count as f64 * 0.10).min(1.00);

    if let Some(expires_at) = quest.expires_at {
        let start = quest.started_at.unwrap_or(quest.created_at);
        let window = (expires_at - start).num_seconds();
        if window > 0 {
            let elapsed = (completion_time - start).num_seconds().max(0);
            let fraction = elapsed as f64 / window as f64;
            if fraction <= 0.50 {
                multiplier += 0.50;
            } else if fraction <= 0.75 {
                multiplier += 0.25;
            }
        }
    }

    if quest.difficulty >= 4 {
        multiplier += 0.20;
    }

    (multiplier * 100.0).round() / 100.0
}

fn local_datetime_to_utc(naive: chrono::NaiveDateTime, tz: FixedOffset) -> DateTime<Utc> {
    let shifted = naive - Duration::seconds(tz.local_minus_utc() as i64);
    Utc.from_utc_datetime(&shifted)
}

fn next_local_midnight(now: DateTime<Utc>, tz: FixedOffset) -> DateTime<Utc> {
    let local_date = now.with_timezone(&tz).date_naive();
    let next = local_date + Duration::days(1);
    local_datetime_to_utc(next.and_time(NaiveTime::MIN), tz)
}

fn next_weekday_midnight(now: DateTime<Utc>, tz: FixedOffset, day: ScheduleDay) -> DateTime<Utc> {
    let local_date = now.with_timezone(&tz).date_naive();
    let current = local_date.weekday().num_days_from_monday();
    let target = day.to_weekday().num_days_from_monday();
    let mut ahead = (target + 7 - current) % 7;
    if ahead == 0 {
        ahead = 7;
    }
    let next = local_date + Duration::days(ahead as i64);
    local_datetime_to_utc(next.and_time(NaiveTime::MIN), tz)
}

fn first_of_next_month_midnight(now: DateTime<Utc>, tz: FixedOffset) -> DateTime<Utc> {
    let local_date = now.with_timezone(&tz).date_naive();
    let (year, month) = if local_date.month() == 12 {
        (local_date.year() + 1, 1)
    } else {
        (local_date.year(), local_date.month() + 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(local_date);
    local_datetime_to_utc(first.and_time(NaiveTime::MIN), tz)
}

/// Deadline for a freshly created or renewed quest of the given type.
/// Deterministic given `(now, tz)`.
pub fn expiry_time(
    quest_type: QuestType,
    day_of_week: Option<ScheduleDay>,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> DateTime<Utc> {
    match quest_type {
        QuestType::Daily | QuestType::Streak => next_local_midnight(now, tz),
        QuestType::Weekly => {
            next_weekday_midnight(now, tz, day_of_week.unwrap_or(ScheduleDay::Monday))
        }
        QuestType::Monthly => first_of_next_month_midnight(now, tz),
        QuestType::Event => now + Duration::days(7),
        QuestType::Adaptive => now + Duration::days(3),
    }
}

/// Next activation instant for a renewal pattern, strictly after `now`.
pub fn next_renewal_time(
    pattern: &RenewalPattern,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> DateTime<Utc> {
    let local = now.with_timezone(&tz);
    let time = NaiveTime::from_hms_opt(pattern.hour.min(23), pattern.minute.min(59), 0)
        .unwrap_or(NaiveTime::MIN);

    match pattern.interval {
        RenewalInterval::Daily => {
            let mut candidate = local.date_naive().and_time(time);
            if local_datetime_to_utc(candidate, tz) <= now {
                candidate += Duration::days(1);
            }
            local_datetime_to_utc(candidate, tz)
        }
        RenewalInterval::Weekly => {
            let day = pattern.day_of_week.unwrap_or(ScheduleDay::Monday);
            let target = day.to_weekday().num_days_from_monday();
            let current = local.date_naive().weekday().num_days_from_monday();
            let ahead = (target + 7 - current) % 7;
            let mut candidate = (local.date_naive() + Duration::days(ahead as i64)).and_time(time);
            if local_datetime_to_utc(candidate, tz) <= now {
                candidate += Duration::days(7);
            }
            local_datetime_to_utc(candidate, tz)
        }
        RenewalInterval::Monthly => {
            let day = pattern.day_of_month.unwrap_or(1);
            let date = local.date_naive();
            let this_month = clamped_day(date.year(), date.month(), day);
            let mut candidate = this_month.and_time(time);
            if local_datetime_to_utc(candidate, tz) <= now {
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                candidate = clamped_day(year, month, day).and_time(time);
            }
            local_datetime_to_utc(candidate, tz)
        }
    }
}

fn clamped_day(year: i32, month: u32, day: u32) -> NaiveDate {
    let mut day = day.clamp(1, 31);
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return date;
        }
        day -= 1;
    }
}

/// Outcome of an expiry check on one quest.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpiryAction {
    /// Deadline not reached, or still inside the grace window.
    Untouched,
    Expired(Quest),
    /// Old instance retired (expired or left completed), new instance created
    /// for the next cycle.
    Renewed { retired: Quest, renewed: Quest },
}

/// Expire or renew one quest if its deadline (plus grace) has lapsed.
///
/// Mid-grace quests are left untouched: no state change, no notification.
/// Completed recurring quests are not expired, only renewed for the next
/// cycle once their deadline passes.
pub fn check_expiry(
    store: &GameStore,
    quest: &Quest,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<ExpiryAction, EngineError> {
    let Some(expires_at) = quest.expires_at else {
        return Ok(ExpiryAction::Untouched);
    };

    let renewable = quest.auto_renew && quest.quest_type.is_scheduled();

    if quest.status == QuestStatus::Completed {
        if renewable && expires_at <= now {
            let renewed = renew(store, quest, now, tz)?;
            let retired = store.get_quest(&quest.id)?;
            return Ok(ExpiryAction::Renewed { retired, renewed });
        }
        return Ok(ExpiryAction::Untouched);
    }

    if quest.status.is_terminal() {
        return Ok(ExpiryAction::Untouched);
    }

    let grace = Duration::minutes(quest.grace_period_minutes as i64);
    if now <= expires_at + grace {
        return Ok(ExpiryAction::Untouched);
    }

    let mut expired = quest.clone();
    expired.status = QuestStatus::Expired;
    // Renewal marker: a retired instance is never picked up by later sweeps.
    expired.auto_renew = false;
    let entry = StatusHistoryEntry {
        quest_id: expired.id.clone(),
        from_status: quest.status,
        to_status: QuestStatus::Expired,
        actor: SYSTEM_ACTOR.to_string(),
        reason: "deadline and grace period elapsed".to_string(),
        created_at: now,
        schema_version: HISTORY_SCHEMA_VERSION,
    };
    store.write_quest_transition(&expired, &entry)?;
    info!("quest {} expired for {}", expired.id, expired.user_id);

    if renewable {
        let renewed = renew(store, &expired, now, tz)?;
        return Ok(ExpiryAction::Renewed {
            retired: expired,
            renewed,
        });
    }
    Ok(ExpiryAction::Expired(expired))
}

/// Create the next cycle's instance of a recurring quest.
///
/// The new quest copies the template fields with progress reset to zero and
/// a deadline from the persisted renewal pattern. The metadata streak counter
/// carries over when the prior cycle was completed and resets when it lapsed.
/// The old instance's `auto_renew` flag is cleared so it hands off to the new
/// one.
pub fn renew(
    store: &GameStore,
    quest: &Quest,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<Quest, EngineError> {
    let metadata = match store.get_metadata(&quest.id) {
        Ok(metadata) => metadata,
        Err(EngineError::NotFound(_)) => QuestMetadata::new(&quest.id, quest.created_at),
        Err(e) => return Err(e),
    };
    let pattern = metadata
        .renewal_pattern
        .clone()
        .unwrap_or_else(RenewalPattern::daily_midnight);

    let expires_at = match pattern.interval {
        RenewalInterval::Daily => expiry_time(QuestType::Daily, None, now, tz),
        RenewalInterval::Weekly => {
            expiry_time(QuestType::Weekly, pattern.day_of_week, now, tz)
        }
        RenewalInterval::Monthly => expiry_time(QuestType::Monthly, None, now, tz),
    };

    let mut renewed = Quest::new(
        &quest.user_id,
        &quest.title,
        quest.quest_type,
        quest.difficulty,
        quest.target_value,
        now,
    )
    .with_description(&quest.description)
    .with_category(&quest.category)
    .with_rewards(quest.xp_reward, quest.coin_reward)
    .with_expiry(expires_at)
    .with_auto_renew(quest.grace_period_minutes);
    renewed.status = QuestStatus::Pending;

    let streak_count = if quest.status == QuestStatus::Completed {
        metadata.streak_count
    } else {
        0
    };
    let mut new_metadata = QuestMetadata::new(&renewed.id, now).with_renewal_pattern(pattern);
    new_metadata.streak_count = streak_count;
    new_metadata.bonus_multiplier = metadata.bonus_multiplier;

    store.put_quest(renewed.clone())?;
    store.put_metadata(new_metadata)?;

    // Retire the old instance's renewal claim.
    let mut retired = quest.clone();
    retired.auto_renew = false;
    store.put_quest(retired)?;

    info!(
        "quest {} renewed as {} for {} (streak {})",
        quest.id, renewed.id, renewed.user_id, streak_count
    );
    Ok(renewed)
}

/// Run the expiry sweep over every quest with a lapsed deadline.
pub fn sweep_expirations(
    store: &GameStore,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<Vec<ExpiryAction>, EngineError> {
    let mut actions = Vec::new();
    for quest in store.quests_due(now)? {
        let action = check_expiry(store, &quest, now, tz)?;
        if action != ExpiryAction::Untouched {
            actions.push(action);
        }
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::storage::GameStoreBuilder;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, GameStore) {
        let dir = TempDir::new().unwrap();
        let store = GameStoreBuilder::new(dir.path().join("game")).open().unwrap();
        (dir, store)
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn seoul() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn utc_tz() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn transition_table_edges() {
        use QuestStatus::*;
        assert!(can_transition(Pending, Active));
        assert!(can_transition(Pending, Locked));
        assert!(can_transition(Active, Completed));
        assert!(can_transition(Completed, ReadyToClaim));
        assert!(can_transition(ReadyToClaim, Completed));
        assert!(can_transition(Legendary, Completed));
        assert!(can_transition(Streak, Active));

        assert!(!can_transition(Pending, Completed));
        assert!(!can_transition(Completed, Active));
        assert!(!can_transition(Expired, Active));
        assert!(!can_transition(Active, Legendary));
    }

    #[test]
    fn illegal_edge_is_typed_error() {
        let (_dir, store) = open_store();
        let quest = Quest::new("alice", "q", QuestType::Daily, 1, 10, utc(2024, 1, 1, 0, 0));
        let id = quest.id.clone();
        store.put_quest(quest).unwrap();

        let err = transition(
            &store,
            &id,
            QuestStatus::Completed,
            "alice",
            "skip ahead",
            None,
            utc(2024, 1, 1, 1, 0),
            utc_tz(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: QuestStatus::Pending,
                to: QuestStatus::Completed
            }
        ));
    }

    #[test]
    fn completion_requires_target_reached() {
        let (_dir, store) = open_store();
        let mut quest = Quest::new("alice", "q", QuestType::Daily, 1, 10, utc(2024, 1, 1, 0, 0));
        quest.status = QuestStatus::Active;
        quest.progress = 5;
        let id = quest.id.clone();
        store.put_quest(quest).unwrap();

        let err = transition(
            &store,
            &id,
            QuestStatus::Completed,
            "alice",
            "done",
            None,
            utc(2024, 1, 1, 1, 0),
            utc_tz(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::IncompleteProgress {
                progress: 5,
                target: 10
            }
        ));
    }

    #[test]
    fn completion_rejected_after_grace_lapses() {
        let (_dir, store) = open_store();
        let mut quest = Quest::new("alice", "q", QuestType::Daily, 1, 10, utc(2024, 1, 1, 0, 0))
            .with_expiry(utc(2024, 1, 1, 12, 0))
            .with_grace_period(30);
        quest.status = QuestStatus::Active;
        quest.progress = 10;
        let id = quest.id.clone();
        store.put_quest(quest).unwrap();

        // Inside grace: allowed.
        let outcome = transition(
            &store,
            &id,
            QuestStatus::Completed,
            "alice",
            "done",
            None,
            utc(2024, 1, 1, 12, 15),
            utc_tz(),
        )
        .unwrap();
        assert_eq!(outcome.quest.status, QuestStatus::Completed);

        // Past grace on a fresh quest: rejected.
        let mut late = Quest::new("bob", "q", QuestType::Daily, 1, 10, utc(2024, 1, 1, 0, 0))
            .with_expiry(utc(2024, 1, 1, 12, 0))
            .with_grace_period(30);
        late.status = QuestStatus::Active;
        late.progress = 10;
        let late_id = late.id.clone();
        store.put_quest(late).unwrap();
        let err = transition(
            &store,
            &late_id,
            QuestStatus::Completed,
            "bob",
            "done",
            None,
            utc(2024, 1, 1, 12, 31),
            utc_tz(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExpired));
    }

    #[test]
    fn completion_pays_once_across_claim_cycle() {
        let (_dir, store) = open_store();
        let mut quest = Quest::new("alice", "q", QuestType::Event, 1, 10, utc(2024, 1, 1, 0, 0))
            .with_rewards(20, 10);
        quest.status = QuestStatus::Active;
        quest.progress = 10;
        let id = quest.id.clone();
        store.put_quest(quest).unwrap();

        let done = transition(
            &store,
            &id,
            QuestStatus::Completed,
            "alice",
            "done",
            None,
            utc(2024, 1, 1, 1, 0),
            utc_tz(),
        )
        .unwrap();
        let first = done.granted.unwrap();
        assert_eq!((first.xp, first.coins), (20, 10));

        // completed -> ready_to_claim -> completed must not pay again.
        transition(
            &store,
            &id,
            QuestStatus::ReadyToClaim,
            "alice",
            "hold",
            None,
            utc(2024, 1, 1, 2, 0),
            utc_tz(),
        )
        .unwrap();
        let reclaimed = transition(
            &store,
            &id,
            QuestStatus::Completed,
            "alice",
            "claim",
            None,
            utc(2024, 1, 1, 3, 0),
            utc_tz(),
        )
        .unwrap();
        // Ledger echoes the original grant.
        let again = reclaimed.granted.unwrap();
        assert_eq!((again.xp, again.coins), (20, 10));

        let progress = store.get_user("alice").unwrap();
        assert_eq!(progress.total_xp, 20);
    }

    #[test]
    fn claim_cycle_does_not_inflate_streak_counter() {
        let (_dir, store) = open_store();
        let mut quest = Quest::new("alice", "daily", QuestType::Daily, 2, 10, utc(2024, 1, 1, 0, 0));
        quest.status = QuestStatus::Active;
        quest.progress = 10;
        let id = quest.id.clone();
        store.put_quest(quest.clone()).unwrap();
        store
            .put_metadata(QuestMetadata::new(&id, quest.created_at))
            .unwrap();

        let completed_at = utc(2024, 1, 1, 10, 0);
        transition(
            &store,
            &id,
            QuestStatus::Completed,
            "alice",
            "done",
            None,
            completed_at,
            utc_tz(),
        )
        .unwrap();
        assert_eq!(store.get_metadata(&id).unwrap().streak_count, 1);

        transition(
            &store,
            &id,
            QuestStatus::ReadyToClaim,
            "alice",
            "hold",
            None,
            utc(2024, 1, 1, 11, 0),
            utc_tz(),
        )
        .unwrap();
        transition(
            &store,
            &id,
            QuestStatus::Completed,
            "alice",
            "claim",
            None,
            utc(2024, 1, 1, 12, 0),
            utc_tz(),
        )
        .unwrap();

        // Re-entering Completed through the claim cycle is not a new cycle.
        assert_eq!(store.get_metadata(&id).unwrap().streak_count, 1);
        // The original completion instant survives the round trip.
        assert_eq!(
            store.get_quest(&id).unwrap().completed_at,
            Some(completed_at)
        );
    }

    #[test]
    fn multiplier_baseline_is_exactly_one() {
        let mut quest = Quest::new("alice", "q", QuestType::Daily, 3, 10, utc(2024, 1, 1, 0, 0))
            .with_expiry(utc(2024, 1, 2, 0, 0));
        quest.started_at = Some(utc(2024, 1, 1, 0, 0));
        // Completed at 90% of the window: no early bonus.
        let completion = utc(2024, 1, 1, 21, 36);
        assert_eq!(reward_multiplier(&quest, completion, 0), 1.0);
    }

    #[test]
    fn multiplier_never_decreases_with_streak() {
        let quest = Quest::new("alice", "q", QuestType::Daily, 3, 10, utc(2024, 1, 1, 0, 0));
        let completion = utc(2024, 1, 1, 12, 0);
        let mut previous = 0.0;
        for streak in 0..30 {
            let multiplier = reward_multiplier(&quest, completion, streak);
            assert!(multiplier >= previous);
            assert!(multiplier >= 1.0);
            previous = multiplier;
        }
        // Streak contribution caps at +1.0.
        assert_eq!(
            reward_multiplier(&quest, completion, 10),
            reward_multiplier(&quest, completion, 50)
        );
    }

    #[test]
    fn multiplier_full_stack_scenario() {
        // difficulty 5, streak 10, completed at 40% of the window:
        // 1.0 + 1.0 + 0.5 + 0.2 = 2.70
        let mut quest = Quest::new("alice", "q", QuestType::Daily, 5, 10, utc(2024, 1, 1, 0, 0))
            .with_expiry(utc(2024, 1, 2, 0, 0));
        quest.started_at = Some(utc(2024, 1, 1, 0, 0));
        let completion = utc(2024, 1, 1, 9, 36);
        assert_eq!(reward_multiplier(&quest, completion, 10), 2.70);
    }

    #[test]
    fn daily_expiry_is_next_local_midnight() {
        // 2024-01-01T23:59+09:00 -> 2024-01-02T00:00+09:00
        let now = utc(2024, 1, 1, 14, 59);
        let expiry = expiry_time(QuestType::Daily, None, now, seoul());
        assert_eq!(expiry, utc(2024, 1, 1, 15, 0));
        assert_eq!(
            expiry.with_timezone(&seoul()).to_rfc3339(),
            "2024-01-02T00:00:00+09:00"
        );
    }

    #[test]
    fn weekly_expiry_lands_on_configured_weekday() {
        // 2024-01-01 is a Monday.
        let now = utc(2024, 1, 1, 3, 0);
        let expiry = expiry_time(QuestType::Weekly, Some(ScheduleDay::Thursday), now, utc_tz());
        assert_eq!(expiry, utc(2024, 1, 4, 0, 0));

        // Same weekday advances a full week.
        let expiry = expiry_time(QuestType::Weekly, Some(ScheduleDay::Monday), now, utc_tz());
        assert_eq!(expiry, utc(2024, 1, 8, 0, 0));
    }

    #[test]
    fn monthly_event_and_adaptive_expiry() {
        let now = utc(2024, 12, 15, 10, 0);
        assert_eq!(
            expiry_time(QuestType::Monthly, None, now, utc_tz()),
            utc(2025, 1, 1, 0, 0)
        );
        assert_eq!(expiry_time(QuestType::Event, None, now, utc_tz()), now + Duration::days(7));
        assert_eq!(
            expiry_time(QuestType::Adaptive, None, now, utc_tz()),
            now + Duration::days(3)
        );
    }

    #[test]
    fn renewal_time_respects_pattern() {
        let pattern = RenewalPattern {
            interval: RenewalInterval::Daily,
            hour: 6,
            minute: 30,
            day_of_week: None,
            day_of_month: None,
        };
        // Before today's slot: today.
        let now = utc(2024, 1, 1, 4, 0);
        assert_eq!(next_renewal_time(&pattern, now, utc_tz()), utc(2024, 1, 1, 6, 30));
        // After today's slot: tomorrow.
        let now = utc(2024, 1, 1, 7, 0);
        assert_eq!(next_renewal_time(&pattern, now, utc_tz()), utc(2024, 1, 2, 6, 30));
    }

    #[test]
    fn monthly_renewal_clamps_day() {
        let pattern = RenewalPattern {
            interval: RenewalInterval::Monthly,
            hour: 0,
            minute: 0,
            day_of_week: None,
            day_of_month: Some(31),
        };
        // February 2024 has 29 days.
        let now = utc(2024, 2, 1, 0, 0);
        assert_eq!(next_renewal_time(&pattern, now, utc_tz()), utc(2024, 2, 29, 0, 0));
    }

    #[test]
    fn grace_window_is_a_no_op() {
        let (_dir, store) = open_store();
        let mut quest = Quest::new("alice", "q", QuestType::Daily, 1, 10, utc(2024, 1, 1, 0, 0))
            .with_expiry(utc(2024, 1, 1, 12, 0))
            .with_grace_period(60);
        quest.status = QuestStatus::Active;
        store.put_quest(quest.clone()).unwrap();

        let action = check_expiry(&store, &quest, utc(2024, 1, 1, 12, 30), utc_tz()).unwrap();
        assert_eq!(action, ExpiryAction::Untouched);
        assert_eq!(store.get_quest(&quest.id).unwrap().status, QuestStatus::Active);
        assert!(store.history_for_quest(&quest.id).unwrap().is_empty());
    }

    #[test]
    fn lapsed_quest_expires_with_system_history_row() {
        let (_dir, store) = open_store();
        let mut quest = Quest::new("alice", "q", QuestType::Event, 1, 10, utc(2024, 1, 1, 0, 0))
            .with_expiry(utc(2024, 1, 1, 12, 0))
            .with_grace_period(60);
        quest.status = QuestStatus::Active;
        store.put_quest(quest.clone()).unwrap();

        let action = check_expiry(&store, &quest, utc(2024, 1, 1, 13, 1), utc_tz()).unwrap();
        match action {
            ExpiryAction::Expired(expired) => {
                assert_eq!(expired.status, QuestStatus::Expired)
            }
            other => panic!("expected expiry, got {:?}", other),
        }
        let history = store.history_for_quest(&quest.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].actor, SYSTEM_ACTOR);
    }

    #[test]
    fn lapsed_auto_renew_quest_is_replaced() {
        let (_dir, store) = open_store();
        let mut quest = Quest::new("alice", "daily", QuestType::Daily, 2, 30, utc(2024, 1, 1, 0, 0))
            .with_rewards(30, 15)
            .with_expiry(utc(2024, 1, 2, 0, 0))
            .with_auto_renew(0);
        quest.status = QuestStatus::Active;
        quest.progress = 10;
        store.put_quest(quest.clone()).unwrap();
        store
            .put_metadata(
                QuestMetadata::new(&quest.id, quest.created_at)
                    .with_renewal_pattern(RenewalPattern::daily_midnight()),
            )
            .unwrap();

        let action = check_expiry(&store, &quest, utc(2024, 1, 2, 0, 1), utc_tz()).unwrap();
        let ExpiryAction::Renewed { retired, renewed } = action else {
            panic!("expected renewal");
        };
        assert_eq!(retired.status, QuestStatus::Expired);
        assert_eq!(renewed.status, QuestStatus::Pending);
        assert_eq!(renewed.progress, 0);
        assert_eq!(renewed.title, "daily");
        assert_eq!((renewed.xp_reward, renewed.coin_reward), (30, 15));
        assert_eq!(renewed.expires_at, Some(utc(2024, 1, 3, 0, 0)));

        // Lapsed cycle resets the metadata streak.
        let metadata = store.get_metadata(&renewed.id).unwrap();
        assert_eq!(metadata.streak_count, 0);

        // The retired instance no longer claims renewal.
        assert!(!store.get_quest(&quest.id).unwrap().auto_renew);
    }

    #[test]
    fn completed_cycle_carries_streak_into_renewal() {
        let (_dir, store) = open_store();
        let mut quest = Quest::new("alice", "daily", QuestType::Daily, 2, 10, utc(2024, 1, 1, 0, 0))
            .with_expiry(utc(2024, 1, 2, 0, 0))
            .with_auto_renew(0);
        quest.status = QuestStatus::Active;
        quest.progress = 10;
        store.put_quest(quest.clone()).unwrap();
        let mut metadata = QuestMetadata::new(&quest.id, quest.created_at)
            .with_renewal_pattern(RenewalPattern::daily_midnight());
        metadata.streak_count = 3;
        store.put_metadata(metadata).unwrap();

        // Complete, then sweep past the deadline.
        transition(
            &store,
            &quest.id,
            QuestStatus::Completed,
            "alice",
            "done",
            None,
            utc(2024, 1, 1, 10, 0),
            utc_tz(),
        )
        .unwrap();
        let completed = store.get_quest(&quest.id).unwrap();
        let action = check_expiry(&store, &completed, utc(2024, 1, 2, 0, 1), utc_tz()).unwrap();
        let ExpiryAction::Renewed { retired, renewed } = action else {
            panic!("expected renewal");
        };
        // A completed instance stays completed; only its successor is new.
        assert_eq!(retired.status, QuestStatus::Completed);
        // Completion bumped the streak to 4, and the successor inherits it.
        assert_eq!(store.get_metadata(&renewed.id).unwrap().streak_count, 4);
    }

    #[test]
    fn sweep_covers_all_due_quests() {
        let (_dir, store) = open_store();
        let base = utc(2024, 1, 1, 0, 0);

        let mut lapsed = Quest::new("alice", "lapsed", QuestType::Event, 1, 10, base)
            .with_expiry(utc(2024, 1, 1, 6, 0));
        lapsed.status = QuestStatus::Active;
        store.put_quest(lapsed).unwrap();

        let mut fresh = Quest::new("alice", "fresh", QuestType::Event, 1, 10, base)
            .with_expiry(utc(2024, 1, 3, 0, 0));
        fresh.status = QuestStatus::Active;
        store.put_quest(fresh).unwrap();

        let actions = sweep_expirations(&store, utc(2024, 1, 2, 0, 0), utc_tz()).unwrap();
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], ExpiryAction::Expired(_)));
    }
}
