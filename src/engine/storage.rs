use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{IVec, Transactional};

use crate::engine::errors::EngineError;
use crate::engine::reward::{fold_reward, ActivityContext};
use crate::engine::types::{
    AchievementAward, BookRecord, GrantedReward, Quest, QuestMetadata, QuestStatus, Reward,
    RewardHistoryEntry, RewardSource, SessionRecord, StatsSnapshot, StatusHistoryEntry,
    UserProgress, AWARD_SCHEMA_VERSION, HISTORY_SCHEMA_VERSION, LIBRARY_SCHEMA_VERSION,
    METADATA_SCHEMA_VERSION, QUEST_SCHEMA_VERSION, USER_SCHEMA_VERSION,
};

const TREE_QUESTS: &str = "quests";
const TREE_USERS: &str = "users";
const TREE_HISTORY: &str = "history";
const TREE_AWARDS: &str = "awards";
const TREE_REWARDS: &str = "rewards";
const TREE_LIBRARY: &str = "library";

fn next_timestamp_nanos(now: DateTime<Utc>) -> i64 {
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1000)
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct GameStoreBuilder {
    path: PathBuf,
}

impl GameStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<GameStore, EngineError> {
        GameStore::open(self.path)
    }
}

/// Sled-backed persistence for quests, user progress, the reward ledger and
/// the library substrate behind aggregate stats.
pub struct GameStore {
    db: sled::Db,
    quests: sled::Tree,
    users: sled::Tree,
    history: sled::Tree,
    awards: sled::Tree,
    rewards: sled::Tree,
    library: sled::Tree,
}

impl GameStore {
    /// Open (or create) the game store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let quests = db.open_tree(TREE_QUESTS)?;
        let users = db.open_tree(TREE_USERS)?;
        let history = db.open_tree(TREE_HISTORY)?;
        let awards = db.open_tree(TREE_AWARDS)?;
        let rewards = db.open_tree(TREE_REWARDS)?;
        let library = db.open_tree(TREE_LIBRARY)?;
        Ok(Self {
            db,
            quests,
            users,
            history,
            awards,
            rewards,
            library,
        })
    }

    fn quest_key(quest_id: &str) -> Vec<u8> {
        format!("quests:{}", quest_id).into_bytes()
    }

    fn metadata_key(quest_id: &str) -> Vec<u8> {
        format!("meta:{}", quest_id).into_bytes()
    }

    fn user_key(user_id: &str) -> Vec<u8> {
        format!("users:{}", user_id).into_bytes()
    }

    // Sequence suffix keeps entries unique when transitions share a timestamp.
    fn history_key(quest_id: &str, nanos: i64, seq: u64) -> Vec<u8> {
        format!("history:{}:{:020}:{:010}", quest_id, nanos, seq).into_bytes()
    }

    fn award_key(user_id: &str, achievement_id: &str) -> Vec<u8> {
        format!("awards:{}:{}", user_id, achievement_id).into_bytes()
    }

    fn badge_key(user_id: &str, badge: &str) -> Vec<u8> {
        format!("badges:{}:{}", user_id, badge).into_bytes()
    }

    fn reward_key(user_id: &str, source: &RewardSource) -> Vec<u8> {
        format!(
            "rewards:{}:{}:{}",
            user_id,
            source.kind.as_str(),
            source.source_id
        )
        .into_bytes()
    }

    fn book_key(user_id: &str, book_id: &str) -> Vec<u8> {
        format!("books:{}:{}", user_id, book_id).into_bytes()
    }

    fn session_key(user_id: &str, session_id: &str) -> Vec<u8> {
        format!("sessions:{}:{}", user_id, session_id).into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, EngineError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, EngineError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    /// Insert or update a quest record.
    pub fn put_quest(&self, mut quest: Quest) -> Result<(), EngineError> {
        quest.schema_version = QUEST_SCHEMA_VERSION;
        let key = Self::quest_key(&quest.id);
        let bytes = Self::serialize(&quest)?;
        self.quests.insert(key, bytes)?;
        self.quests.flush()?;
        Ok(())
    }

    /// Fetch a quest by ID.
    pub fn get_quest(&self, quest_id: &str) -> Result<Quest, EngineError> {
        let key = Self::quest_key(quest_id);
        let Some(bytes) = self.quests.get(&key)? else {
            return Err(EngineError::NotFound(format!("quest: {}", quest_id)));
        };
        let record: Quest = Self::deserialize(bytes)?;
        if record.schema_version != QUEST_SCHEMA_VERSION {
            return Err(EngineError::SchemaMismatch {
                entity: "quest",
                expected: QUEST_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    /// Insert or update a quest's companion metadata row.
    pub fn put_metadata(&self, mut metadata: QuestMetadata) -> Result<(), EngineError> {
        metadata.schema_version = METADATA_SCHEMA_VERSION;
        let key = Self::metadata_key(&metadata.quest_id);
        let bytes = Self::serialize(&metadata)?;
        self.quests.insert(key, bytes)?;
        self.quests.flush()?;
        Ok(())
    }

    /// Fetch a quest's metadata row.
    pub fn get_metadata(&self, quest_id: &str) -> Result<QuestMetadata, EngineError> {
        let key = Self::metadata_key(quest_id);
        let Some(bytes) = self.quests.get(&key)? else {
            return Err(EngineError::NotFound(format!(
                "quest metadata: {}",
                quest_id
            )));
        };
        let record: QuestMetadata = Self::deserialize(bytes)?;
        if record.schema_version != METADATA_SCHEMA_VERSION {
            return Err(EngineError::SchemaMismatch {
                entity: "quest metadata",
                expected: METADATA_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    /// Persist a status transition: the updated quest row and its audit entry
    /// land atomically so the history can never disagree with the status.
    pub fn write_quest_transition(
        &self,
        quest: &Quest,
        entry: &StatusHistoryEntry,
    ) -> Result<(), EngineError> {
        let mut quest = quest.clone();
        quest.schema_version = QUEST_SCHEMA_VERSION;
        let mut entry = entry.clone();
        entry.schema_version = HISTORY_SCHEMA_VERSION;

        let quest_key = Self::quest_key(&quest.id);
        let quest_bytes = Self::serialize(&quest)?;
        let seq = self.db.generate_id()?;
        let history_key = Self::history_key(&quest.id, next_timestamp_nanos(entry.created_at), seq);
        let history_bytes = Self::serialize(&entry)?;

        let result = (&self.quests, &self.history).transaction(|(quests, history)| {
            quests.insert(quest_key.as_slice(), quest_bytes.as_slice())?;
            history.insert(history_key.as_slice(), history_bytes.as_slice())?;
            Ok::<(), ConflictableTransactionError<EngineError>>(())
        });
        Self::unwrap_transaction(result)?;
        self.quests.flush()?;
        self.history.flush()?;
        Ok(())
    }

    /// Audit trail for one quest, oldest first.
    pub fn history_for_quest(&self, quest_id: &str) -> Result<Vec<StatusHistoryEntry>, EngineError> {
        let prefix = format!("history:{}:", quest_id);
        let mut entries = Vec::new();
        for item in self.history.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item?;
            entries.push(Self::deserialize::<StatusHistoryEntry>(bytes)?);
        }
        Ok(entries)
    }

    /// All quests belonging to one user.
    pub fn quests_for_user(&self, user_id: &str) -> Result<Vec<Quest>, EngineError> {
        let mut quests = Vec::new();
        for item in self.quests.scan_prefix(b"quests:") {
            let (_, bytes) = item?;
            let quest: Quest = Self::deserialize(bytes)?;
            if quest.user_id == user_id {
                quests.push(quest);
            }
        }
        Ok(quests)
    }

    /// Candidates for the expiry sweep: quests with a deadline at or before
    /// `cutoff` that can still be expired or renewed. Completed recurring
    /// quests stay candidates until their successor is created.
    pub fn quests_due(&self, cutoff: DateTime<Utc>) -> Result<Vec<Quest>, EngineError> {
        let mut due = Vec::new();
        for item in self.quests.scan_prefix(b"quests:") {
            let (_, bytes) = item?;
            let quest: Quest = Self::deserialize(bytes)?;
            if matches!(quest.status, QuestStatus::Expired | QuestStatus::Legendary) {
                continue;
            }
            if quest.status == QuestStatus::Completed && !quest.auto_renew {
                continue;
            }
            if let Some(expires_at) = quest.expires_at {
                if expires_at <= cutoff {
                    due.push(quest);
                }
            }
        }
        Ok(due)
    }

    /// Fetch a user's progress row, creating a fresh one if absent.
    pub fn ensure_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserProgress, EngineError> {
        match self.get_user(user_id) {
            Ok(progress) => Ok(progress),
            Err(EngineError::NotFound(_)) => {
                let progress = UserProgress::new(user_id, now);
                self.put_user(progress.clone())?;
                Ok(progress)
            }
            Err(e) => Err(e),
        }
    }

    pub fn get_user(&self, user_id: &str) -> Result<UserProgress, EngineError> {
        let key = Self::user_key(user_id);
        let Some(bytes) = self.users.get(&key)? else {
            return Err(EngineError::NotFound(format!("user: {}", user_id)));
        };
        let record: UserProgress = Self::deserialize(bytes)?;
        if record.schema_version != USER_SCHEMA_VERSION {
            return Err(EngineError::SchemaMismatch {
                entity: "user",
                expected: USER_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    pub fn put_user(&self, mut progress: UserProgress) -> Result<(), EngineError> {
        progress.schema_version = USER_SCHEMA_VERSION;
        let key = Self::user_key(&progress.user_id);
        let bytes = Self::serialize(&progress)?;
        self.users.insert(key, bytes)?;
        self.users.flush()?;
        Ok(())
    }

    /// Apply a reward atomically: the user totals, the idempotency ledger row
    /// and any badge rows commit together or not at all.
    ///
    /// A second call with the same `(user, source)` key observes the ledger
    /// row and returns what was granted the first time, with no new effects.
    /// Callers reach this through [`crate::engine::reward::apply_reward`].
    pub fn apply_reward_atomic(
        &self,
        user_id: &str,
        reward: &Reward,
        source: &RewardSource,
        activity: Option<ActivityContext>,
        now: DateTime<Utc>,
    ) -> Result<GrantedReward, EngineError> {
        let ledger_key = Self::reward_key(user_id, source);
        let user_key = Self::user_key(user_id);

        let result = (&self.users, &self.rewards, &self.awards).transaction(
            |(users, rewards, awards)| {
                // Idempotency: a ledger row means this source already paid out.
                if let Some(bytes) = rewards.get(ledger_key.as_slice())? {
                    let prior: RewardHistoryEntry =
                        bincode::deserialize(&bytes).map_err(abort_bincode)?;
                    return Ok(GrantedReward {
                        xp: prior.xp,
                        coins: prior.coins,
                        badges: Vec::new(),
                        leveled_up: false,
                        new_level: None,
                    });
                }

                let current: UserProgress = match users.get(user_key.as_slice())? {
                    Some(bytes) => bincode::deserialize(&bytes).map_err(abort_bincode)?,
                    None => UserProgress::new(user_id, now),
                };

                let outcome = fold_reward(&current, reward, activity.as_ref(), now);

                let user_bytes =
                    bincode::serialize(&outcome.updated).map_err(abort_bincode)?;
                users.insert(user_key.as_slice(), user_bytes)?;

                let ledger_entry = RewardHistoryEntry {
                    user_id: user_id.to_string(),
                    source: source.clone(),
                    xp: outcome.granted.xp,
                    coins: outcome.granted.coins,
                    created_at: now,
                    schema_version: HISTORY_SCHEMA_VERSION,
                };
                let ledger_bytes =
                    bincode::serialize(&ledger_entry).map_err(abort_bincode)?;
                rewards.insert(ledger_key.as_slice(), ledger_bytes)?;

                // Badges are set-valued: only first grants survive into the
                // returned reward.
                let mut granted = outcome.granted.clone();
                let mut new_badges = Vec::new();
                for badge in &granted.badges {
                    let badge_key = Self::badge_key(user_id, badge);
                    if awards.get(badge_key.as_slice())?.is_none() {
                        let row = bincode::serialize(&now).map_err(abort_bincode)?;
                        awards.insert(badge_key, row)?;
                        new_badges.push(badge.clone());
                    }
                }
                granted.badges = new_badges;

                Ok(granted)
            },
        );

        let granted = Self::unwrap_transaction(result)?;
        self.users.flush()?;
        self.rewards.flush()?;
        self.awards.flush()?;
        Ok(granted)
    }

    /// Record an achievement award exactly once. Returns false when the
    /// `(user, achievement)` pair already has a row.
    pub fn record_award(
        &self,
        user_id: &str,
        achievement_id: &str,
        earned_at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let key = Self::award_key(user_id, achievement_id);
        let award = AchievementAward {
            user_id: user_id.to_string(),
            achievement_id: achievement_id.to_string(),
            earned_at,
            schema_version: AWARD_SCHEMA_VERSION,
        };
        let bytes = Self::serialize(&award)?;
        let swapped = self
            .awards
            .compare_and_swap(key, None as Option<IVec>, Some(bytes))?;
        self.awards.flush()?;
        Ok(swapped.is_ok())
    }

    /// Achievement IDs a user has earned.
    pub fn awards_for_user(&self, user_id: &str) -> Result<Vec<AchievementAward>, EngineError> {
        let prefix = format!("awards:{}:", user_id);
        let mut awards = Vec::new();
        for item in self.awards.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item?;
            awards.push(Self::deserialize::<AchievementAward>(bytes)?);
        }
        Ok(awards)
    }

    /// Badge names a user holds, in key order.
    pub fn badges_for_user(&self, user_id: &str) -> Result<Vec<String>, EngineError> {
        let prefix = format!("badges:{}:", user_id);
        let mut badges = Vec::new();
        for item in self.awards.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            let text = String::from_utf8_lossy(&key);
            if let Some(badge) = text.strip_prefix(&format!("badges:{}:", user_id)) {
                badges.push(badge.to_string());
            }
        }
        Ok(badges)
    }

    /// Whether a reward from this source was already applied.
    pub fn reward_applied(&self, user_id: &str, source: &RewardSource) -> Result<bool, EngineError> {
        let key = Self::reward_key(user_id, source);
        Ok(self.rewards.get(&key)?.is_some())
    }

    /// Register a book in the user's library.
    pub fn put_book(&self, mut book: BookRecord) -> Result<(), EngineError> {
        book.schema_version = LIBRARY_SCHEMA_VERSION;
        let key = Self::book_key(&book.user_id, &book.id);
        let bytes = Self::serialize(&book)?;
        self.library.insert(key, bytes)?;
        self.library.flush()?;
        Ok(())
    }

    pub fn get_book(&self, user_id: &str, book_id: &str) -> Result<BookRecord, EngineError> {
        let key = Self::book_key(user_id, book_id);
        let Some(bytes) = self.library.get(&key)? else {
            return Err(EngineError::NotFound(format!("book: {}", book_id)));
        };
        Self::deserialize(bytes)
    }

    /// Record a finished reading session.
    pub fn put_session(&self, mut session: SessionRecord) -> Result<(), EngineError> {
        session.schema_version = LIBRARY_SCHEMA_VERSION;
        let key = Self::session_key(&session.user_id, &session.id);
        let bytes = Self::serialize(&session)?;
        self.library.insert(key, bytes)?;
        self.library.flush()?;
        Ok(())
    }

    fn books_for_user(&self, user_id: &str) -> Result<Vec<BookRecord>, EngineError> {
        let prefix = format!("books:{}:", user_id);
        let mut books = Vec::new();
        for item in self.library.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item?;
            books.push(Self::deserialize::<BookRecord>(bytes)?);
        }
        Ok(books)
    }

    fn sessions_for_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, EngineError> {
        let prefix = format!("sessions:{}:", user_id);
        let mut sessions = Vec::new();
        for item in self.library.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item?;
            sessions.push(Self::deserialize::<SessionRecord>(bytes)?);
        }
        Ok(sessions)
    }

    /// Build a fresh aggregate view of a user's activity for achievement
    /// evaluation. Session hours are bucketed in the user's local timezone.
    pub fn read_aggregate_stats(
        &self,
        user_id: &str,
        tz: FixedOffset,
    ) -> Result<StatsSnapshot, EngineError> {
        let mut snapshot = StatsSnapshot::default();

        if let Ok(progress) = self.get_user(user_id) {
            snapshot.current_streak = progress.current_streak;
            snapshot.longest_streak = progress.longest_streak;
            snapshot.level = progress.level();
            snapshot.consecutive_perfect = progress.consecutive_perfect;
        }

        let books = self.books_for_user(user_id)?;
        snapshot.books_count = books.len() as u32;
        let genres: HashSet<&str> = books
            .iter()
            .filter_map(|book| book.genre.as_deref())
            .collect();
        snapshot.genre_count = genres.len() as u32;

        let mut pages_by_day: std::collections::HashMap<chrono::NaiveDate, u64> =
            std::collections::HashMap::new();
        for session in self.sessions_for_user(user_id)? {
            snapshot.total_pages += session.pages_read as u64;

            let local_start = session.started_at.with_timezone(&tz);
            snapshot.sessions_by_hour[local_start.hour() as usize] += 1;
            *pages_by_day.entry(local_start.date_naive()).or_default() +=
                session.pages_read as u64;

            if session.duration_minutes > 0 {
                let rate =
                    (session.pages_read as f64 / session.duration_minutes as f64 * 60.0) as u32;
                snapshot.max_pages_per_hour = snapshot.max_pages_per_hour.max(rate);
            }
        }
        snapshot.reading_days = pages_by_day.len() as u32;
        snapshot.max_daily_pages = pages_by_day.values().copied().max().unwrap_or(0);

        for quest in self.quests_for_user(user_id)? {
            if matches!(quest.status, QuestStatus::Completed | QuestStatus::Legendary) {
                snapshot.quests_completed += 1;
            }
        }

        Ok(snapshot)
    }

    fn unwrap_transaction<T>(
        result: Result<T, TransactionError<EngineError>>,
    ) -> Result<T, EngineError> {
        match result {
            Ok(value) => Ok(value),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(EngineError::Sled(e)),
        }
    }
}

fn abort_bincode(e: bincode::Error) -> ConflictableTransactionError<EngineError> {
    ConflictableTransactionError::Abort(EngineError::Bincode(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{QuestType, RewardKind};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, GameStore) {
        let dir = TempDir::new().unwrap();
        let store = GameStoreBuilder::new(dir.path().join("game")).open().unwrap();
        (dir, store)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn quest_round_trip() {
        let (_dir, store) = open_store();
        let quest = Quest::new("alice", "Read 30 minutes", QuestType::Daily, 2, 30, now());
        let id = quest.id.clone();
        store.put_quest(quest.clone()).unwrap();
        let fetched = store.get_quest(&id).unwrap();
        assert_eq!(fetched, quest);

        assert!(matches!(
            store.get_quest("missing"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn metadata_round_trip() {
        let (_dir, store) = open_store();
        let metadata = QuestMetadata::new("q-1", now());
        store.put_metadata(metadata.clone()).unwrap();
        assert_eq!(store.get_metadata("q-1").unwrap(), metadata);
    }

    #[test]
    fn transition_writes_quest_and_history_together() {
        let (_dir, store) = open_store();
        let mut quest = Quest::new("alice", "q", QuestType::Daily, 1, 10, now());
        let id = quest.id.clone();
        store.put_quest(quest.clone()).unwrap();

        quest.status = QuestStatus::Active;
        let entry = StatusHistoryEntry {
            quest_id: id.clone(),
            from_status: QuestStatus::Pending,
            to_status: QuestStatus::Active,
            actor: "alice".to_string(),
            reason: "started".to_string(),
            created_at: now(),
            schema_version: HISTORY_SCHEMA_VERSION,
        };
        store.write_quest_transition(&quest, &entry).unwrap();

        assert_eq!(store.get_quest(&id).unwrap().status, QuestStatus::Active);
        let history = store.history_for_quest(&id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to_status, QuestStatus::Active);
    }

    #[test]
    fn apply_reward_is_idempotent() {
        let (_dir, store) = open_store();
        let source = RewardSource::new(RewardKind::Quest, "q-1");
        let reward = Reward::new(40, 20);

        let first = store
            .apply_reward_atomic("alice", &reward, &source, None, now())
            .unwrap();
        assert_eq!((first.xp, first.coins), (40, 20));

        let second = store
            .apply_reward_atomic("alice", &reward, &source, None, now())
            .unwrap();
        assert_eq!((second.xp, second.coins), (40, 20));

        // Totals reflect exactly one application.
        let progress = store.get_user("alice").unwrap();
        assert_eq!(progress.total_xp, 40);
        assert_eq!(progress.total_coins, 20);
        assert!(store.reward_applied("alice", &source).unwrap());
    }

    #[test]
    fn apply_reward_folds_level_up() {
        let (_dir, store) = open_store();
        let mut progress = UserProgress::new("alice", now());
        progress.total_xp = 90;
        store.put_user(progress).unwrap();

        let granted = store
            .apply_reward_atomic(
                "alice",
                &Reward::new(30, 0),
                &RewardSource::new(RewardKind::Reading, "s-1"),
                None,
                now(),
            )
            .unwrap();
        assert!(granted.leveled_up);
        assert_eq!(granted.new_level, Some(2));
        assert_eq!(granted.coins, 50);

        let progress = store.get_user("alice").unwrap();
        assert_eq!(progress.total_xp, 120);
        assert_eq!(progress.total_coins, 50);
    }

    #[test]
    fn duplicate_badges_are_not_regranted() {
        let (_dir, store) = open_store();
        let reward = Reward::new(0, 0).with_badge("First Book");

        let first = store
            .apply_reward_atomic(
                "alice",
                &reward,
                &RewardSource::new(RewardKind::FirstBook, "b-1"),
                None,
                now(),
            )
            .unwrap();
        assert_eq!(first.badges, vec!["First Book".to_string()]);

        let second = store
            .apply_reward_atomic(
                "alice",
                &reward,
                &RewardSource::new(RewardKind::FirstBook, "b-2"),
                None,
                now(),
            )
            .unwrap();
        assert!(second.badges.is_empty());
        assert_eq!(
            store.badges_for_user("alice").unwrap(),
            vec!["First Book".to_string()]
        );
    }

    #[test]
    fn award_recorded_exactly_once() {
        let (_dir, store) = open_store();
        assert!(store.record_award("alice", "first_book", now()).unwrap());
        assert!(!store.record_award("alice", "first_book", now()).unwrap());
        let awards = store.awards_for_user("alice").unwrap();
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].achievement_id, "first_book");
    }

    #[test]
    fn aggregate_stats_from_library() {
        let (_dir, store) = open_store();
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();

        store
            .put_book(
                BookRecord::new("alice", "Dune", 400, now()).with_genre("scifi"),
            )
            .unwrap();
        store
            .put_book(
                BookRecord::new("alice", "Emma", 300, now()).with_genre("classic"),
            )
            .unwrap();

        // Started 2024-03-10T21:30Z = 06:30 local (+09:00) the next day.
        let started = Utc.with_ymd_and_hms(2024, 3, 10, 21, 30, 0).unwrap();
        store
            .put_session(SessionRecord {
                id: "s-1".to_string(),
                user_id: "alice".to_string(),
                book_id: None,
                duration_minutes: 30,
                focus_score: 80,
                pages_read: 40,
                started_at: started,
                ended_at: started + chrono::Duration::minutes(30),
                schema_version: LIBRARY_SCHEMA_VERSION,
            })
            .unwrap();

        let snapshot = store.read_aggregate_stats("alice", tz).unwrap();
        assert_eq!(snapshot.books_count, 2);
        assert_eq!(snapshot.genre_count, 2);
        assert_eq!(snapshot.total_pages, 40);
        assert_eq!(snapshot.max_daily_pages, 40);
        assert_eq!(snapshot.reading_days, 1);
        assert_eq!(snapshot.sessions_by_hour[6], 1);
        // 40 pages in 30 minutes is 80 pages per hour.
        assert_eq!(snapshot.max_pages_per_hour, 80);
    }

    #[test]
    fn quests_due_skips_terminal_and_undated() {
        let (_dir, store) = open_store();
        let base = now();

        let due = Quest::new("alice", "due", QuestType::Daily, 1, 10, base)
            .with_expiry(base - chrono::Duration::hours(1));
        let future = Quest::new("alice", "future", QuestType::Daily, 1, 10, base)
            .with_expiry(base + chrono::Duration::hours(1));
        let mut done = Quest::new("alice", "done", QuestType::Daily, 1, 10, base)
            .with_expiry(base - chrono::Duration::hours(1));
        done.status = QuestStatus::Completed;
        let undated = Quest::new("alice", "undated", QuestType::Event, 1, 10, base);

        for quest in [&due, &future, &done, &undated] {
            store.put_quest(quest.clone()).unwrap();
        }

        let found = store.quests_due(base).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "due");
    }
}
