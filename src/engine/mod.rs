//! Gamification engine for reading-habit tracking.
//! Quests move through a fixed lifecycle state machine, completions and
//! reading sessions pay out through a single atomic reward operation, and a
//! declarative achievement catalog is evaluated against fresh per-user stats.

pub mod achievement;
pub mod catalog;
pub mod clock;
pub mod errors;
pub mod level;
pub mod lifecycle;
pub mod reward;
pub mod storage;
pub mod template;
pub mod types;

pub use achievement::{
    check_user_achievements, condition_met, condition_progress, unlock_achievement,
    unlock_pending, user_achievements, EvaluationReport, UserAchievements,
};
pub use catalog::{
    achievement_catalog_from_dir, load_achievements_from_json, load_templates_from_json,
    starter_achievements, starter_templates, template_catalog_from_dir, AchievementCatalog,
    TemplateCatalog,
};
pub use clock::{parse_offset, Clock, FixedClock, SystemClock};
pub use errors::EngineError;
pub use level::{
    calculate_level, level_progress, level_up_reward, required_xp, xp_to_next_level,
    XP_PER_LEVEL,
};
pub use lifecycle::{
    can_transition, check_expiry, expiry_time, next_renewal_time, renew, reward_multiplier,
    sweep_expirations, transition, valid_transitions, ExpiryAction, TransitionOutcome,
    SYSTEM_ACTOR,
};
pub use reward::{
    apply_reward, book_completion_reward, first_book_reward, fold_reward, quest_reward,
    reading_reward, streak_bonus, ActivityContext, FoldOutcome, RewardBalancer,
};
pub use storage::{GameStore, GameStoreBuilder};
pub use template::QuestTemplate;
pub use types::*;

use chrono::{DateTime, FixedOffset, Utc};
use log::info;

/// Result of one inbound event: what the event itself granted plus any
/// achievements it tipped over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOutcome {
    pub granted: Option<GrantedReward>,
    pub achievements: Vec<AchievementDefinition>,
}

/// Facade tying the store, catalogs and clock together. One instance per
/// process; callers feed it discrete events and read back outcomes.
pub struct GameEngine {
    store: GameStore,
    achievements: AchievementCatalog,
    templates: TemplateCatalog,
    clock: Box<dyn Clock>,
    /// Scale session payouts by the per-user balancer multiplier.
    dynamic_balancing: bool,
}

impl GameEngine {
    pub fn new(
        store: GameStore,
        achievements: AchievementCatalog,
        templates: TemplateCatalog,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            store,
            achievements,
            templates,
            clock,
            dynamic_balancing: false,
        }
    }

    pub fn with_dynamic_balancing(mut self, enabled: bool) -> Self {
        self.dynamic_balancing = enabled;
        self
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    pub fn achievements(&self) -> &AchievementCatalog {
        &self.achievements
    }

    pub fn templates(&self) -> &TemplateCatalog {
        &self.templates
    }

    fn now_and_tz(&self, user_id: &str) -> (DateTime<Utc>, FixedOffset) {
        (self.clock.now(), self.clock.timezone_of(user_id))
    }

    /// Stamp out a quest instance from a template and persist it with its
    /// metadata row.
    pub fn create_quest_from_template(
        &self,
        template_id: &str,
        user_id: &str,
    ) -> Result<Quest, EngineError> {
        let template = self.templates.require(template_id)?;
        let (now, tz) = self.now_and_tz(user_id);
        let (quest, metadata) = template.generate(user_id, now, tz);
        self.store.put_quest(quest.clone())?;
        self.store.put_metadata(metadata)?;
        info!(
            "created quest {} from template {} for {}",
            quest.id, template_id, user_id
        );
        Ok(quest)
    }

    /// Perform a caller-driven status transition.
    pub fn transition_quest(
        &self,
        quest_id: &str,
        new_status: QuestStatus,
        actor: &str,
        reason: &str,
        quality: Option<CompletionQuality>,
    ) -> Result<TransitionOutcome, EngineError> {
        let (now, tz) = self.now_and_tz(actor);
        lifecycle::transition(
            &self.store,
            quest_id,
            new_status,
            actor,
            reason,
            quality,
            now,
            tz,
        )
    }

    /// A user finished a quest: validate and perform the completion
    /// transition, then re-evaluate achievements.
    pub fn quest_completed(
        &self,
        quest_id: &str,
        quality: CompletionQuality,
    ) -> Result<EventOutcome, EngineError> {
        let quest = self.store.get_quest(quest_id)?;
        let (now, tz) = self.now_and_tz(&quest.user_id);
        let outcome = lifecycle::transition(
            &self.store,
            quest_id,
            QuestStatus::Completed,
            &quest.user_id,
            "completed by user",
            Some(quality),
            now,
            tz,
        )?;
        let achievements =
            achievement::unlock_pending(&self.store, &self.achievements, &quest.user_id, now, tz)?;
        Ok(EventOutcome {
            granted: outcome.granted,
            achievements,
        })
    }

    /// A reading session ended: record it, pay out the session reward and
    /// re-evaluate achievements.
    pub fn reading_session_ended(
        &self,
        user_id: &str,
        session_id: &str,
        duration_minutes: u32,
        focus_score: u32,
        pages_read: u32,
    ) -> Result<EventOutcome, EngineError> {
        let (now, tz) = self.now_and_tz(user_id);
        let session = SessionRecord {
            id: session_id.to_string(),
            user_id: user_id.to_string(),
            book_id: None,
            duration_minutes,
            focus_score,
            pages_read,
            started_at: now - chrono::Duration::minutes(duration_minutes as i64),
            ended_at: now,
            schema_version: LIBRARY_SCHEMA_VERSION,
        };
        self.store.put_session(session)?;

        let mut payload = reward::reading_reward(duration_minutes, focus_score, pages_read);
        if self.dynamic_balancing {
            let progress = self.store.ensure_user(user_id, now)?;
            let multiplier = RewardBalancer::multiplier(&progress, now);
            payload = RewardBalancer::scale(&payload, multiplier);
        }

        let source = RewardSource::new(RewardKind::Reading, session_id);
        let activity = ActivityContext::on(now.with_timezone(&tz).date_naive());
        let granted =
            reward::apply_reward(&self.store, user_id, &payload, &source, Some(activity), now)?;
        let achievements =
            achievement::unlock_pending(&self.store, &self.achievements, user_id, now, tz)?;
        Ok(EventOutcome {
            granted: Some(granted),
            achievements,
        })
    }

    /// A book was registered: store it, grant the one-time first-book bonus
    /// when applicable, and re-evaluate achievements.
    pub fn book_registered(
        &self,
        user_id: &str,
        book: BookRecord,
        is_first: bool,
    ) -> Result<EventOutcome, EngineError> {
        let (now, tz) = self.now_and_tz(user_id);
        let book_id = book.id.clone();
        self.store.put_book(book)?;

        let granted = if is_first {
            let source = RewardSource::new(RewardKind::FirstBook, &book_id);
            let payload = reward::first_book_reward();
            Some(reward::apply_reward(
                &self.store,
                user_id,
                &payload,
                &source,
                None,
                now,
            )?)
        } else {
            None
        };

        let achievements =
            achievement::unlock_pending(&self.store, &self.achievements, user_id, now, tz)?;
        Ok(EventOutcome {
            granted,
            achievements,
        })
    }

    /// A book was finished: mark it complete, pay the page-proportional
    /// reward and re-evaluate achievements.
    pub fn book_completed(&self, user_id: &str, book_id: &str) -> Result<EventOutcome, EngineError> {
        let (now, tz) = self.now_and_tz(user_id);
        let mut book = self.store.get_book(user_id, book_id)?;
        if book.completed_at.is_none() {
            book.completed_at = Some(now);
            self.store.put_book(book.clone())?;
        }

        let payload = reward::book_completion_reward(book.page_count);
        let source = RewardSource::new(RewardKind::BookCompletion, book_id);
        let activity = ActivityContext::on(now.with_timezone(&tz).date_naive());
        let granted =
            reward::apply_reward(&self.store, user_id, &payload, &source, Some(activity), now)?;
        let achievements =
            achievement::unlock_pending(&self.store, &self.achievements, user_id, now, tz)?;
        Ok(EventOutcome {
            granted: Some(granted),
            achievements,
        })
    }

    /// Expire or renew every quest whose deadline has lapsed. Driven by an
    /// external timer; each pass is independent.
    pub fn sweep(&self) -> Result<Vec<ExpiryAction>, EngineError> {
        let now = self.clock.now();
        let tz = self.clock.timezone_of(SYSTEM_ACTOR);
        lifecycle::sweep_expirations(&self.store, now, tz)
    }

    /// Read-only achievement view for one user.
    pub fn achievements_for(&self, user_id: &str) -> Result<UserAchievements, EngineError> {
        let tz = self.clock.timezone_of(user_id);
        achievement::user_achievements(&self.store, &self.achievements, user_id, tz)
    }

    /// Progress summary for one user.
    pub fn user_summary(&self, user_id: &str) -> Result<UserSummary, EngineError> {
        let now = self.clock.now();
        let progress = self.store.ensure_user(user_id, now)?;
        let badges = self.store.badges_for_user(user_id)?;
        Ok(UserSummary {
            level: progress.level(),
            xp_to_next_level: level::xp_to_next_level(progress.total_xp),
            level_progress_percent: level::level_progress(progress.total_xp),
            badges,
            progress,
        })
    }
}

/// Snapshot of one user's standing for display.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub progress: UserProgress,
    pub level: u32,
    pub xp_to_next_level: u64,
    pub level_progress_percent: f64,
    pub badges: Vec<String>,
}
