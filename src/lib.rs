//! # PageQuest - Gamification Engine for Reading Habits
//!
//! PageQuest turns daily reading into a game: time-bounded quests with a
//! strict lifecycle state machine, XP/coin rewards with level-ups and streak
//! bonuses, and a declarative achievement catalog evaluated against each
//! user's reading statistics.
//!
//! ## Features
//!
//! - **Quest Lifecycle**: Ten-state machine with a fixed transition table,
//!   grace periods, expiry sweeps, and auto-renewal for recurring quests.
//! - **Reward Engine**: Pure reward calculators plus a single atomic,
//!   idempotent apply operation folding streak milestones and level-ups into
//!   one grant.
//! - **Level System**: Linear XP curve with milestone badges and coin-only
//!   level-up bonuses.
//! - **Achievements**: Data-driven catalog of typed conditions evaluated by
//!   one generic interpreter; secret achievements, idempotent awards.
//! - **Sled Persistence**: Multi-tree transactions guarantee rewards are
//!   never half-applied.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagequest::config::Config;
//! use pagequest::engine::{
//!     achievement_catalog_from_dir, template_catalog_from_dir, CompletionQuality, GameEngine,
//!     GameStore, SystemClock,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = GameStore::open(config.db_path())?;
//!     let achievements = achievement_catalog_from_dir(&config.catalog.seeds_dir)?;
//!     let templates = template_catalog_from_dir(&config.catalog.seeds_dir)?;
//!     let engine = GameEngine::new(
//!         store,
//!         achievements,
//!         templates,
//!         Box::new(SystemClock::default()),
//!     );
//!
//!     let quest = engine.create_quest_from_template("daily_reading_time", "alice")?;
//!     let outcome = engine.quest_completed(&quest.id, CompletionQuality::Good)?;
//!     println!("granted: {:?}", outcome.granted);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - The gamification core: lifecycle, rewards, levels,
//!   achievements, catalogs and storage
//! - [`config`] - TOML configuration loading and validation

pub mod config;
pub mod engine;
