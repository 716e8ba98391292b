//! Binary entrypoint for the PageQuest CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml` and export the seed catalogs
//! - `quest new --user <id> --template <id>` - stamp out a quest instance
//! - `quest complete --id <quest> [--quality <q>]` - complete a quest
//! - `quest list --user <id>` - list a user's quests
//! - `session --user <id> --duration <min> --focus <0-100> --pages <n>` - record a session
//! - `book --user <id> --title <t> --pages <n> [--genre <g>] [--first]` - register a book
//! - `sweep` - expire/renew every quest with a lapsed deadline
//! - `stats --user <id>` - print a user's progress summary
//! - `achievements --user <id>` - print earned/available achievements
//!
//! See the library crate docs for module-level details: `pagequest::`.
use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;

use pagequest::config::Config;
use pagequest::engine::{
    achievement_catalog_from_dir, parse_offset, starter_achievements, starter_templates,
    template_catalog_from_dir, BookRecord, CompletionQuality, GameEngine, GameStore, QuestStatus,
    SystemClock,
};

#[derive(Parser)]
#[command(name = "pagequest")]
#[command(about = "A gamification engine for reading habits")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and seed catalogs
    Init,
    /// Quest operations
    Quest {
        #[command(subcommand)]
        command: QuestCommands,
    },
    /// Record a finished reading session
    Session {
        #[arg(short, long)]
        user: String,
        /// Session length in minutes
        #[arg(short, long)]
        duration: u32,
        /// Focus score 0-100
        #[arg(short, long, default_value_t = 50)]
        focus: u32,
        /// Pages read during the session
        #[arg(short, long, default_value_t = 0)]
        pages: u32,
    },
    /// Register a book
    Book {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        pages: u32,
        #[arg(short, long)]
        genre: Option<String>,
        /// Grant the one-time first-book bonus
        #[arg(long)]
        first: bool,
    },
    /// Expire or renew every quest with a lapsed deadline
    Sweep,
    /// Show a user's progress summary
    Stats {
        #[arg(short, long)]
        user: String,
    },
    /// Show a user's achievements
    Achievements {
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum QuestCommands {
    /// Create a quest instance from a template
    New {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        template: String,
    },
    /// Complete a quest
    Complete {
        /// Quest ID
        #[arg(short, long)]
        id: String,
        /// Completion quality: perfect, good, normal, poor
        #[arg(short, long, default_value = "normal")]
        quality: String,
    },
    /// Start a pending quest
    Start {
        #[arg(short, long)]
        id: String,
        #[arg(short, long)]
        user: String,
    },
    /// List a user's quests
    List {
        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            let config = Config::load(&cli.config).await?;
            export_seeds(&config)?;
            info!("initialized configuration at {}", cli.config);
            println!("Created {} and seed catalogs in {}", cli.config, config.catalog.seeds_dir);
        }
        Commands::Quest { command } => {
            let config = Config::load(&cli.config).await?;
            let engine = build_engine(&config)?;
            run_quest_command(&engine, command)?;
        }
        Commands::Session {
            user,
            duration,
            focus,
            pages,
        } => {
            let config = Config::load(&cli.config).await?;
            let engine = build_engine(&config)?;
            let session_id = format!("cli-{}", Utc::now().timestamp());
            let outcome =
                engine.reading_session_ended(&user, &session_id, duration, focus, pages)?;
            print_outcome(&outcome.granted, &outcome.achievements);
        }
        Commands::Book {
            user,
            title,
            pages,
            genre,
            first,
        } => {
            let config = Config::load(&cli.config).await?;
            let engine = build_engine(&config)?;
            let mut book = BookRecord::new(&user, &title, pages, Utc::now());
            if let Some(genre) = genre {
                book = book.with_genre(&genre);
            }
            let outcome = engine.book_registered(&user, book, first)?;
            print_outcome(&outcome.granted, &outcome.achievements);
        }
        Commands::Sweep => {
            let config = Config::load(&cli.config).await?;
            let engine = build_engine(&config)?;
            let actions = engine.sweep()?;
            println!("Sweep touched {} quest(s)", actions.len());
            for action in actions {
                println!("  {:?}", action);
            }
        }
        Commands::Stats { user } => {
            let config = Config::load(&cli.config).await?;
            let engine = build_engine(&config)?;
            let summary = engine.user_summary(&user)?;
            println!("User: {}", summary.progress.user_id);
            println!(
                "Level {} ({:.0}% to next, {} xp needed)",
                summary.level, summary.level_progress_percent, summary.xp_to_next_level
            );
            println!(
                "XP: {}  Coins: {}",
                summary.progress.total_xp, summary.progress.total_coins
            );
            println!(
                "Streak: {} (longest {})",
                summary.progress.current_streak, summary.progress.longest_streak
            );
            if !summary.badges.is_empty() {
                println!("Badges: {}", summary.badges.join(", "));
            }
        }
        Commands::Achievements { user } => {
            let config = Config::load(&cli.config).await?;
            let engine = build_engine(&config)?;
            let view = engine.achievements_for(&user)?;
            println!("Earned ({}):", view.earned.len());
            for award in &view.earned {
                println!("  {} ({})", award.achievement_id, award.earned_at.format("%Y-%m-%d"));
            }
            println!("In progress:");
            for entry in &view.progress {
                println!(
                    "  {} - {}/{}",
                    entry.definition.name, entry.current, entry.required
                );
            }
        }
    }

    Ok(())
}

fn build_engine(config: &Config) -> Result<GameEngine> {
    let offset = parse_offset(&config.engine.timezone)
        .ok_or_else(|| anyhow!("Invalid timezone offset '{}'", config.engine.timezone))?;
    let store = GameStore::open(config.db_path())?;
    let achievements = achievement_catalog_from_dir(&config.catalog.seeds_dir)?;
    let templates = template_catalog_from_dir(&config.catalog.seeds_dir)?;
    Ok(GameEngine::new(
        store,
        achievements,
        templates,
        Box::new(SystemClock::new(offset)),
    )
    .with_dynamic_balancing(config.engine.dynamic_balancing))
}

fn run_quest_command(engine: &GameEngine, command: QuestCommands) -> Result<()> {
    match command {
        QuestCommands::New { user, template } => {
            let quest = engine.create_quest_from_template(&template, &user)?;
            println!("Created quest {} ({})", quest.id, quest.title);
            if let Some(expires_at) = quest.expires_at {
                println!("Expires at {}", expires_at.to_rfc3339());
            }
        }
        QuestCommands::Complete { id, quality } => {
            let quality = parse_quality(&quality)?;
            let outcome = engine.quest_completed(&id, quality)?;
            print_outcome(&outcome.granted, &outcome.achievements);
        }
        QuestCommands::Start { id, user } => {
            let outcome = engine.transition_quest(
                &id,
                QuestStatus::Active,
                &user,
                "started by user",
                None,
            )?;
            println!("Quest {} is now {:?}", outcome.quest.id, outcome.quest.status);
        }
        QuestCommands::List { user } => {
            for quest in engine.store().quests_for_user(&user)? {
                println!(
                    "{}  {:?}  {}/{}  {}",
                    quest.id, quest.status, quest.progress, quest.target_value, quest.title
                );
            }
        }
    }
    Ok(())
}

fn parse_quality(value: &str) -> Result<CompletionQuality> {
    match value.to_ascii_lowercase().as_str() {
        "perfect" => Ok(CompletionQuality::Perfect),
        "good" => Ok(CompletionQuality::Good),
        "normal" => Ok(CompletionQuality::Normal),
        "poor" => Ok(CompletionQuality::Poor),
        other => Err(anyhow!(
            "Unknown quality '{}': expected perfect, good, normal or poor",
            other
        )),
    }
}

fn print_outcome(
    granted: &Option<pagequest::engine::GrantedReward>,
    achievements: &[pagequest::engine::AchievementDefinition],
) {
    if let Some(granted) = granted {
        println!("Granted {} xp, {} coins", granted.xp, granted.coins);
        if granted.leveled_up {
            if let Some(level) = granted.new_level {
                println!("Level up! Now level {}", level);
            }
        }
        for badge in &granted.badges {
            println!("New badge: {}", badge);
        }
    }
    for achievement in achievements {
        println!("Achievement unlocked: {}", achievement.name);
        if !achievement.unlock_message.is_empty() {
            println!("  {}", achievement.unlock_message);
        }
    }
}

fn export_seeds(config: &Config) -> Result<()> {
    let seeds_dir = std::path::Path::new(&config.catalog.seeds_dir);
    std::fs::create_dir_all(seeds_dir)?;

    let achievements_path = seeds_dir.join("achievements.json");
    if !achievements_path.exists() {
        let json = serde_json::to_string_pretty(&starter_achievements())?;
        std::fs::write(&achievements_path, json)?;
    }
    let templates_path = seeds_dir.join("templates.json");
    if !templates_path.exists() {
        let json = serde_json::to_string_pretty(&starter_templates())?;
        std::fs::write(&templates_path, json)?;
    }
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .init();
}
