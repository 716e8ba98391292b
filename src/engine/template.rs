//! Quest templates: declarative blueprints that stamp out quest instances
//! with a sampled target and a schedule-derived deadline.

use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::lifecycle;
use crate::engine::types::{Quest, QuestMetadata, QuestType, RenewalPattern, ScheduleDay};

/// Blueprint for generating quest instances. Ships as engine configuration
/// alongside the achievement catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub quest_type: QuestType,
    pub difficulty: u8,
    pub xp_reward: u32,
    pub coin_reward: u32,
    /// Inclusive range the instance target is sampled from.
    pub target_min: u32,
    pub target_max: u32,
    #[serde(default)]
    pub auto_renew: bool,
    #[serde(default)]
    pub grace_period_minutes: u32,
    #[serde(default)]
    pub renewal_pattern: Option<RenewalPattern>,
    /// Weekday anchor for weekly quests.
    #[serde(default)]
    pub day_of_week: Option<ScheduleDay>,
}

fn default_category() -> String {
    "challenge".to_string()
}

impl QuestTemplate {
    /// Stamp out a quest instance for `user_id` with a deterministic RNG.
    ///
    /// The target is sampled uniformly from `[target_min, target_max]` and
    /// the deadline follows the temporal rules for the template's type.
    pub fn generate_with_rng<R: Rng>(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        tz: FixedOffset,
        rng: &mut R,
    ) -> (Quest, QuestMetadata) {
        let low = self.target_min.min(self.target_max).max(1);
        let high = self.target_max.max(low);
        let target = rng.gen_range(low..=high);

        let expires_at = lifecycle::expiry_time(self.quest_type, self.day_of_week, now, tz);
        let mut quest = Quest::new(
            user_id,
            &self.title,
            self.quest_type,
            self.difficulty,
            target,
            now,
        )
        .with_description(&self.description)
        .with_category(&self.category)
        .with_rewards(self.xp_reward, self.coin_reward)
        .with_expiry(expires_at);
        if self.auto_renew {
            quest = quest.with_auto_renew(self.grace_period_minutes);
        } else {
            quest = quest.with_grace_period(self.grace_period_minutes);
        }

        let mut metadata = QuestMetadata::new(&quest.id, now);
        if let Some(pattern) = &self.renewal_pattern {
            metadata = metadata.with_renewal_pattern(pattern.clone());
        } else if self.auto_renew {
            metadata = metadata.with_renewal_pattern(RenewalPattern::daily_midnight());
        }

        (quest, metadata)
    }

    /// Stamp out a quest instance with the thread-local RNG.
    pub fn generate(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        tz: FixedOffset,
    ) -> (Quest, QuestMetadata) {
        self.generate_with_rng(user_id, now, tz, &mut rand::thread_rng())
    }
}
