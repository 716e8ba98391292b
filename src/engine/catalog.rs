//! Catalog loading for data-driven content.
//!
//! Achievements and quest templates ship as JSON under data/seeds/ so
//! operators can customize content without recompiling. Both catalogs are
//! loaded once at startup into immutable structures; a compiled-in starter
//! set backs the engine when no seed files are present.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::info;

use crate::engine::errors::EngineError;
use crate::engine::template::QuestTemplate;
use crate::engine::types::{
    AchievementCategory::*, AchievementCondition, AchievementDefinition, AchievementRarity::*,
    QuestType, RenewalPattern, Timeframe,
};

/// Immutable, ordered achievement catalog with ID lookup.
#[derive(Debug, Clone, Default)]
pub struct AchievementCatalog {
    definitions: Vec<AchievementDefinition>,
    index: HashMap<String, usize>,
}

impl AchievementCatalog {
    pub fn from_definitions(definitions: Vec<AchievementDefinition>) -> Self {
        let index = definitions
            .iter()
            .enumerate()
            .map(|(i, definition)| (definition.id.clone(), i))
            .collect();
        Self { definitions, index }
    }

    pub fn get(&self, id: &str) -> Option<&AchievementDefinition> {
        self.index.get(id).map(|&i| &self.definitions[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &AchievementDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Immutable quest template catalog with ID lookup.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<QuestTemplate>,
    index: HashMap<String, usize>,
}

impl TemplateCatalog {
    pub fn from_templates(templates: Vec<QuestTemplate>) -> Self {
        let index = templates
            .iter()
            .enumerate()
            .map(|(i, template)| (template.id.clone(), i))
            .collect();
        Self { templates, index }
    }

    /// Look up a template, failing with `UnknownTemplate` when absent.
    pub fn require(&self, id: &str) -> Result<&QuestTemplate, EngineError> {
        self.index
            .get(id)
            .map(|&i| &self.templates[i])
            .ok_or_else(|| EngineError::UnknownTemplate(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&QuestTemplate> {
        self.index.get(id).map(|&i| &self.templates[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Load achievement definitions from a JSON seed file.
pub fn load_achievements_from_json<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<AchievementDefinition>, EngineError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let definitions: Vec<AchievementDefinition> = serde_json::from_str(&contents).map_err(|e| {
        EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to parse {}: {}", path.display(), e),
        ))
    })?;
    Ok(definitions)
}

/// Load quest templates from a JSON seed file.
pub fn load_templates_from_json<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<QuestTemplate>, EngineError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let templates: Vec<QuestTemplate> = serde_json::from_str(&contents).map_err(|e| {
        EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to parse {}: {}", path.display(), e),
        ))
    })?;
    Ok(templates)
}

/// Load the achievement catalog from a seeds directory, falling back to the
/// compiled-in starter set when no file exists.
pub fn achievement_catalog_from_dir<P: AsRef<Path>>(
    dir: P,
) -> Result<AchievementCatalog, EngineError> {
    let path = dir.as_ref().join("achievements.json");
    let definitions = if path.exists() {
        let definitions = load_achievements_from_json(&path)?;
        info!(
            "loaded {} achievements from {}",
            definitions.len(),
            path.display()
        );
        definitions
    } else {
        info!("no achievement seed file, using starter catalog");
        starter_achievements()
    };
    Ok(AchievementCatalog::from_definitions(definitions))
}

/// Load the template catalog from a seeds directory, falling back to the
/// compiled-in starter set when no file exists.
pub fn template_catalog_from_dir<P: AsRef<Path>>(dir: P) -> Result<TemplateCatalog, EngineError> {
    let path = dir.as_ref().join("templates.json");
    let templates = if path.exists() {
        let templates = load_templates_from_json(&path)?;
        info!(
            "loaded {} quest templates from {}",
            templates.len(),
            path.display()
        );
        templates
    } else {
        info!("no template seed file, using starter catalog");
        starter_templates()
    };
    Ok(TemplateCatalog::from_templates(templates))
}

/// Compiled-in starter achievements.
pub fn starter_achievements() -> Vec<AchievementDefinition> {
    use AchievementCondition::*;

    let mut achievements = Vec::new();

    // Reading milestones
    achievements.push(
        AchievementDefinition::new(
            "first_book",
            "First Book",
            "Register your first book",
            Reading,
            Bronze,
            BooksRead { count: 1 },
            50,
            25,
        )
        .with_unlock_message("Your reading journey begins!"),
    );

    achievements.push(AchievementDefinition::new(
        "bookworm",
        "Bookworm",
        "Register 10 books",
        Reading,
        Silver,
        BooksRead { count: 10 },
        200,
        100,
    ));

    achievements.push(
        AchievementDefinition::new(
            "library_builder",
            "Library Builder",
            "Register 50 books",
            Reading,
            Gold,
            BooksRead { count: 50 },
            1000,
            500,
        )
        .with_title("the Collector"),
    );

    achievements.push(AchievementDefinition::new(
        "page_turner",
        "Page Turner",
        "Read 1,000 pages in total",
        Reading,
        Silver,
        PagesRead {
            count: 1000,
            timeframe: Timeframe::AllTime,
        },
        300,
        150,
    ));

    achievements.push(
        AchievementDefinition::new(
            "marathon_reader",
            "Marathon Reader",
            "Read 300 pages in a single day",
            Reading,
            Gold,
            PagesRead {
                count: 300,
                timeframe: Timeframe::BestDay,
            },
            500,
            250,
        )
        .as_secret(),
    );

    achievements.push(AchievementDefinition::new(
        "genre_explorer",
        "Genre Explorer",
        "Read books from 5 different genres",
        Reading,
        Silver,
        GenreDiversity { count: 5 },
        250,
        125,
    ));

    // Quest milestones
    achievements.push(AchievementDefinition::new(
        "quest_novice",
        "Quest Novice",
        "Complete 10 quests",
        Quests,
        Bronze,
        QuestsCompleted { count: 10 },
        150,
        75,
    ));

    achievements.push(
        AchievementDefinition::new(
            "quest_master",
            "Quest Master",
            "Complete 100 quests",
            Quests,
            Platinum,
            QuestsCompleted { count: 100 },
            1500,
            750,
        )
        .with_title("the Dedicated"),
    );

    achievements.push(
        AchievementDefinition::new(
            "perfectionist",
            "Perfectionist",
            "Complete 5 quests in a row with perfect quality",
            Quests,
            Gold,
            Perfectionist { consecutive: 5 },
            600,
            300,
        )
        .as_secret(),
    );

    // Streaks
    achievements.push(AchievementDefinition::new(
        "week_of_reading",
        "Week of Reading",
        "Keep a 7-day reading streak",
        Time,
        Bronze,
        StreakDays { days: 7 },
        100,
        50,
    ));

    achievements.push(
        AchievementDefinition::new(
            "unstoppable",
            "Unstoppable",
            "Keep a 30-day reading streak",
            Time,
            Gold,
            StreakDays { days: 30 },
            750,
            375,
        )
        .with_title("the Unstoppable"),
    );

    achievements.push(
        AchievementDefinition::new(
            "hundred_days",
            "Hundred Days",
            "Keep a 100-day reading streak",
            Time,
            Diamond,
            StreakDays { days: 100 },
            3000,
            1500,
        )
        .with_title("the Devoted")
        .as_secret(),
    );

    // Time of day
    achievements.push(AchievementDefinition::new(
        "early_bird",
        "Early Bird",
        "Start a reading session before 6 AM",
        Time,
        Silver,
        EarlyBird { before_hour: 6 },
        200,
        100,
    ));

    achievements.push(AchievementDefinition::new(
        "night_owl",
        "Night Owl",
        "Start a reading session after 11 PM",
        Time,
        Silver,
        NightOwl { after_hour: 23 },
        200,
        100,
    ));

    // Rates and levels
    achievements.push(AchievementDefinition::new(
        "speed_reader",
        "Speed Reader",
        "Read at 60 pages per hour in one session",
        Special,
        Gold,
        SpeedReading { pages_per_hour: 60 },
        400,
        200,
    ));

    achievements.push(AchievementDefinition::new(
        "rising_star",
        "Rising Star",
        "Reach level 10",
        Special,
        Silver,
        LevelReached { level: 10 },
        300,
        150,
    ));

    achievements.push(
        AchievementDefinition::new(
            "living_legend",
            "Living Legend",
            "Reach level 30",
            Special,
            Diamond,
            LevelReached { level: 30 },
            2000,
            1000,
        )
        .with_title("the Legend"),
    );

    achievements
}

/// Compiled-in starter quest templates.
pub fn starter_templates() -> Vec<QuestTemplate> {
    vec![
        QuestTemplate {
            id: "daily_reading_time".to_string(),
            title: "Daily Reading Time".to_string(),
            description: "Read for your daily target of minutes".to_string(),
            category: "timer".to_string(),
            quest_type: QuestType::Daily,
            difficulty: 2,
            xp_reward: 30,
            coin_reward: 15,
            target_min: 20,
            target_max: 45,
            auto_renew: true,
            grace_period_minutes: 60,
            renewal_pattern: Some(RenewalPattern::daily_midnight()),
            day_of_week: None,
        },
        QuestTemplate {
            id: "daily_pages".to_string(),
            title: "Daily Pages".to_string(),
            description: "Read a set number of pages today".to_string(),
            category: "counter".to_string(),
            quest_type: QuestType::Daily,
            difficulty: 2,
            xp_reward: 25,
            coin_reward: 12,
            target_min: 10,
            target_max: 30,
            auto_renew: true,
            grace_period_minutes: 60,
            renewal_pattern: Some(RenewalPattern::daily_midnight()),
            day_of_week: None,
        },
        QuestTemplate {
            id: "weekly_marathon".to_string(),
            title: "Weekly Marathon".to_string(),
            description: "Accumulate reading minutes over the week".to_string(),
            category: "timer".to_string(),
            quest_type: QuestType::Weekly,
            difficulty: 3,
            xp_reward: 120,
            coin_reward: 60,
            target_min: 150,
            target_max: 300,
            auto_renew: true,
            grace_period_minutes: 180,
            renewal_pattern: None,
            day_of_week: Some(crate::engine::types::ScheduleDay::Monday),
        },
        QuestTemplate {
            id: "monthly_books".to_string(),
            title: "Monthly Book Goal".to_string(),
            description: "Finish books this month".to_string(),
            category: "counter".to_string(),
            quest_type: QuestType::Monthly,
            difficulty: 4,
            xp_reward: 400,
            coin_reward: 200,
            target_min: 2,
            target_max: 4,
            auto_renew: false,
            grace_period_minutes: 0,
            renewal_pattern: None,
            day_of_week: None,
        },
        QuestTemplate {
            id: "streak_keeper".to_string(),
            title: "Streak Keeper".to_string(),
            description: "Read every day to keep the chain alive".to_string(),
            category: "streak".to_string(),
            quest_type: QuestType::Streak,
            difficulty: 3,
            xp_reward: 40,
            coin_reward: 20,
            target_min: 1,
            target_max: 1,
            auto_renew: true,
            grace_period_minutes: 120,
            renewal_pattern: Some(RenewalPattern::daily_midnight()),
            day_of_week: None,
        },
    ]
}
