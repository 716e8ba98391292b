use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const QUEST_SCHEMA_VERSION: u8 = 1;
pub const METADATA_SCHEMA_VERSION: u8 = 1;
pub const HISTORY_SCHEMA_VERSION: u8 = 1;
pub const USER_SCHEMA_VERSION: u8 = 1;
pub const AWARD_SCHEMA_VERSION: u8 = 1;
pub const LIBRARY_SCHEMA_VERSION: u8 = 1;

/// Quest lifecycle status.
///
/// `Completed`, `Expired` and `Legendary` are terminal: the engine recognizes
/// no further transitions out of them. The legal edges live in
/// [`crate::engine::lifecycle::valid_transitions`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    /// Created but not yet started.
    Pending,
    /// In progress, accumulating progress toward the target.
    Active,
    /// Temporarily halted by the user.
    Paused,
    /// Target reached, rewards granted.
    Completed,
    /// Completed but rewards held until explicitly claimed.
    ReadyToClaim,
    /// Abandoned or failed before reaching the target.
    Failed,
    /// Deadline plus grace period elapsed without completion.
    Expired,
    /// Prerequisites not yet met.
    Locked,
    /// Special showcase state for exceptional completions.
    Legendary,
    /// Streak-chain quest awaiting its daily cycle.
    Streak,
}

impl QuestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Legendary)
    }
}

/// Temporal category deciding a quest's expiry and renewal schedule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestType {
    Daily,
    Weekly,
    Monthly,
    Event,
    Adaptive,
    Streak,
}

impl QuestType {
    /// Types that renew on a fixed calendar schedule and therefore qualify
    /// for auto-renewal.
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Daily | Self::Weekly | Self::Monthly | Self::Streak)
    }
}

/// A time-bounded task instance with a progress target and a status.
///
/// Title and description are opaque to the engine; only the numeric and
/// temporal fields participate in lifecycle decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quest {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    /// Presentation category (timer, summary, challenge, ...). Opaque here.
    pub category: String,
    pub quest_type: QuestType,
    /// Difficulty rating, clamped to 1-5.
    pub difficulty: u8,
    pub xp_reward: u32,
    pub coin_reward: u32,
    pub target_value: u32,
    pub progress: u32,
    pub status: QuestStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub grace_period_minutes: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
    pub schema_version: u8,
}

impl Quest {
    pub fn new(
        user_id: &str,
        title: &str,
        quest_type: QuestType,
        difficulty: u8,
        target_value: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            description: String::new(),
            category: "challenge".to_string(),
            quest_type,
            difficulty: difficulty.clamp(1, 5),
            xp_reward: 0,
            coin_reward: 0,
            target_value,
            progress: 0,
            status: QuestStatus::Pending,
            expires_at: None,
            auto_renew: false,
            grace_period_minutes: 0,
            created_at,
            started_at: None,
            paused_at: None,
            completed_at: None,
            failed_at: None,
            schema_version: QUEST_SCHEMA_VERSION,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_rewards(mut self, xp: u32, coins: u32) -> Self {
        self.xp_reward = xp;
        self.coin_reward = coins;
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_auto_renew(mut self, grace_period_minutes: u32) -> Self {
        self.auto_renew = true;
        self.grace_period_minutes = grace_period_minutes;
        self
    }

    pub fn with_grace_period(mut self, minutes: u32) -> Self {
        self.grace_period_minutes = minutes;
        self
    }

    /// Record progress toward the target. Progress is monotone while the
    /// quest is active or paused and never exceeds the target.
    pub fn record_progress(&mut self, amount: u32) {
        if matches!(self.status, QuestStatus::Active | QuestStatus::Paused | QuestStatus::Streak) {
            self.progress = self.progress.saturating_add(amount).min(self.target_value);
        }
    }

    pub fn target_reached(&self) -> bool {
        self.progress >= self.target_value
    }

    /// Whether the nominal deadline has passed (grace period not considered).
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at < now).unwrap_or(false)
    }
}

/// Renewal cadence for recurring quests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenewalInterval {
    Daily,
    Weekly,
    Monthly,
}

/// Day-of-week anchor for weekly renewal schedules. Kept crate-local so the
/// persisted encoding stays stable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl ScheduleDay {
    pub fn to_weekday(self) -> chrono::Weekday {
        match self {
            Self::Monday => chrono::Weekday::Mon,
            Self::Tuesday => chrono::Weekday::Tue,
            Self::Wednesday => chrono::Weekday::Wed,
            Self::Thursday => chrono::Weekday::Thu,
            Self::Friday => chrono::Weekday::Fri,
            Self::Saturday => chrono::Weekday::Sat,
            Self::Sunday => chrono::Weekday::Sun,
        }
    }
}

/// Schedule used to regenerate a recurring quest: interval plus local
/// time-of-day, with optional weekday/day-of-month anchors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenewalPattern {
    pub interval: RenewalInterval,
    pub hour: u32,
    pub minute: u32,
    #[serde(default)]
    pub day_of_week: Option<ScheduleDay>,
    #[serde(default)]
    pub day_of_month: Option<u32>,
}

impl RenewalPattern {
    pub fn daily_midnight() -> Self {
        Self {
            interval: RenewalInterval::Daily,
            hour: 0,
            minute: 0,
            day_of_week: None,
            day_of_month: None,
        }
    }
}

/// 1:1 companion row for a quest: renewal schedule, streak counter and the
/// persisted multiplier carry-over. Created alongside the quest, mutated on
/// renewal and completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestMetadata {
    pub quest_id: String,
    #[serde(default)]
    pub renewal_pattern: Option<RenewalPattern>,
    /// Consecutive successful renewal cycles.
    pub streak_count: u32,
    pub bonus_multiplier: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl QuestMetadata {
    pub fn new(quest_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            quest_id: quest_id.to_string(),
            renewal_pattern: None,
            streak_count: 0,
            bonus_multiplier: 1.0,
            created_at,
            updated_at: created_at,
            schema_version: METADATA_SCHEMA_VERSION,
        }
    }

    pub fn with_renewal_pattern(mut self, pattern: RenewalPattern) -> Self {
        self.renewal_pattern = Some(pattern);
        self
    }
}

/// Append-only audit row for a status transition. Written once, never
/// mutated; also consulted to suppress duplicate expiry notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistoryEntry {
    pub quest_id: String,
    pub from_status: QuestStatus,
    pub to_status: QuestStatus,
    /// User ID or `"system"` for sweeps.
    pub actor: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

/// Per-user aggregate mutated exclusively through the reward engine's
/// apply-reward operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProgress {
    pub user_id: String,
    pub total_xp: u64,
    pub total_coins: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default)]
    pub last_activity_date: Option<NaiveDate>,
    /// Run length of consecutive perfect-quality quest completions.
    #[serde(default)]
    pub consecutive_perfect: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl UserProgress {
    pub fn new(user_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_xp: 0,
            total_coins: 0,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            consecutive_perfect: 0,
            created_at,
            updated_at: created_at,
            schema_version: USER_SCHEMA_VERSION,
        }
    }

    pub fn level(&self) -> u32 {
        crate::engine::level::calculate_level(self.total_xp)
    }
}

/// Self-reported quality of a quest completion; scales the base reward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CompletionQuality {
    Perfect,
    Good,
    Normal,
    Poor,
}

impl CompletionQuality {
    pub fn factor(&self) -> f64 {
        match self {
            Self::Perfect => 1.5,
            Self::Good => 1.2,
            Self::Normal => 1.0,
            Self::Poor => 0.8,
        }
    }
}

/// A computed reward before it is applied to a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reward {
    pub xp: u32,
    pub coins: u32,
    #[serde(default)]
    pub badges: Vec<String>,
}

impl Reward {
    pub fn new(xp: u32, coins: u32) -> Self {
        Self {
            xp,
            coins,
            badges: Vec::new(),
        }
    }

    pub fn with_badge(mut self, badge: &str) -> Self {
        self.badges.push(badge.to_string());
        self
    }

    /// Fold another reward into this one (xp/coins summed, badges appended).
    pub fn merge(&mut self, other: Reward) {
        self.xp = self.xp.saturating_add(other.xp);
        self.coins = self.coins.saturating_add(other.coins);
        self.badges.extend(other.badges);
    }

    pub fn is_empty(&self) -> bool {
        self.xp == 0 && self.coins == 0 && self.badges.is_empty()
    }
}

/// What a single apply-reward call actually granted, after level-up and
/// streak bonuses were folded in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantedReward {
    pub xp: u32,
    pub coins: u32,
    pub badges: Vec<String>,
    pub leveled_up: bool,
    #[serde(default)]
    pub new_level: Option<u32>,
}

/// Which kind of event produced a reward. Paired with a source ID it forms
/// the idempotency key for the reward ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Quest,
    Reading,
    BookCompletion,
    FirstBook,
    Streak,
    Achievement,
    Manual,
}

impl RewardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quest => "quest",
            Self::Reading => "reading",
            Self::BookCompletion => "book_completion",
            Self::FirstBook => "first_book",
            Self::Streak => "streak",
            Self::Achievement => "achievement",
            Self::Manual => "manual",
        }
    }
}

/// Reward provenance: kind plus the triggering entity's ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardSource {
    pub kind: RewardKind,
    pub source_id: String,
}

impl RewardSource {
    pub fn new(kind: RewardKind, source_id: &str) -> Self {
        Self {
            kind,
            source_id: source_id.to_string(),
        }
    }
}

/// Append-only ledger row recording one applied reward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardHistoryEntry {
    pub user_id: String,
    pub source: RewardSource,
    pub xp: u32,
    pub coins: u32,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

/// Achievement category for organization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Reading,
    Quests,
    Social,
    Time,
    Special,
}

/// Rarity tier, display-only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AchievementRarity {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

/// Which window a counting condition looks at.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[default]
    AllTime,
    /// Best single calendar day.
    BestDay,
}

/// Typed predicate over a [`StatsSnapshot`]. One generic interpreter
/// evaluates the whole catalog; no per-achievement code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AchievementCondition {
    /// Registered at least `count` books.
    BooksRead { count: u32 },
    /// Read at least `count` pages (all-time or best single day).
    PagesRead {
        count: u64,
        #[serde(default)]
        timeframe: Timeframe,
    },
    /// Completed at least `count` quests.
    QuestsCompleted { count: u32 },
    /// Reached a reading streak of at least `days` consecutive days.
    StreakDays { days: u32 },
    /// Reached at least this level.
    LevelReached { level: u32 },
    /// Read books from at least `count` distinct genres.
    GenreDiversity { count: u32 },
    /// Hit a reading rate of at least `pages_per_hour` in one session.
    SpeedReading { pages_per_hour: u32 },
    /// Started a session before this local hour.
    EarlyBird { before_hour: u32 },
    /// Started a session at or after this local hour.
    NightOwl { after_hour: u32 },
    /// Completed `consecutive` quests in a row at perfect quality.
    Perfectionist { consecutive: u32 },
}

/// Fixed payload granted when an achievement unlocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AchievementRewards {
    pub xp: u32,
    pub coins: u32,
    /// Optional title badge granted alongside xp/coins.
    #[serde(default)]
    pub title: Option<String>,
}

/// Static, immutable catalog entry. Ships as engine configuration; not
/// user-owned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AchievementDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: AchievementCategory,
    pub rarity: AchievementRarity,
    pub condition: AchievementCondition,
    pub rewards: AchievementRewards,
    /// Secret achievements are evaluated but withheld from listings until
    /// earned.
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default)]
    pub unlock_message: String,
}

impl AchievementDefinition {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        category: AchievementCategory,
        rarity: AchievementRarity,
        condition: AchievementCondition,
        xp: u32,
        coins: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            category,
            rarity,
            condition,
            rewards: AchievementRewards {
                xp,
                coins,
                title: None,
            },
            is_secret: false,
            unlock_message: String::new(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.rewards.title = Some(title.to_string());
        self
    }

    pub fn with_unlock_message(mut self, message: &str) -> Self {
        self.unlock_message = message.to_string();
        self
    }

    pub fn as_secret(mut self) -> Self {
        self.is_secret = true;
        self
    }
}

/// Per-user award row. Created exactly once per `(user, achievement)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AchievementAward {
    pub user_id: String,
    pub achievement_id: String,
    pub earned_at: DateTime<Utc>,
    pub schema_version: u8,
}

/// Progress toward a not-yet-earned achievement.
#[derive(Debug, Clone, PartialEq)]
pub struct AchievementProgress {
    pub definition: AchievementDefinition,
    pub current: u64,
    pub required: u64,
}

/// A registered book. Substrate for the aggregate stats snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub genre: Option<String>,
    pub page_count: u32,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub schema_version: u8,
}

impl BookRecord {
    pub fn new(user_id: &str, title: &str, page_count: u32, registered_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            genre: None,
            page_count,
            registered_at,
            completed_at: None,
            schema_version: LIBRARY_SCHEMA_VERSION,
        }
    }

    pub fn with_genre(mut self, genre: &str) -> Self {
        self.genre = Some(genre.to_string());
        self
    }
}

/// A finished reading session as reported by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub book_id: Option<String>,
    pub duration_minutes: u32,
    /// Focus score 0-100 as measured by the host application.
    pub focus_score: u32,
    pub pages_read: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub schema_version: u8,
}

/// One fresh aggregate view of a user's activity, computed by the store and
/// consumed by the achievement evaluator. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub books_count: u32,
    pub quests_completed: u32,
    pub reading_days: u32,
    pub total_pages: u64,
    pub max_daily_pages: u64,
    pub genre_count: u32,
    pub max_pages_per_hour: u32,
    /// Session starts bucketed by local hour of day.
    pub sessions_by_hour: [u32; 24],
    pub current_streak: u32,
    pub longest_streak: u32,
    pub level: u32,
    pub consecutive_perfect: u32,
}

impl StatsSnapshot {
    /// Count of sessions started strictly before the given local hour.
    pub fn sessions_before_hour(&self, hour: u32) -> u32 {
        self.sessions_by_hour
            .iter()
            .take((hour as usize).min(24))
            .sum()
    }

    /// Count of sessions started at or after the given local hour.
    pub fn sessions_from_hour(&self, hour: u32) -> u32 {
        self.sessions_by_hour
            .iter()
            .skip((hour as usize).min(24))
            .sum()
    }
}
