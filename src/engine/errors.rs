use thiserror::Error;

use crate::engine::types::QuestStatus;

/// Errors that can arise in the gamification engine and its storage layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, seed files, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Attempted a status edge that is not in the transition table.
    #[error("invalid quest transition: {from:?} -> {to:?}")]
    InvalidTransition { from: QuestStatus, to: QuestStatus },

    /// Completion attempted before progress reached the target.
    #[error("quest progress {progress} has not reached target {target}")]
    IncompleteProgress { progress: u32, target: u32 },

    /// Transition attempted on a quest whose deadline has already passed.
    #[error("quest is already expired")]
    AlreadyExpired,

    /// Achievement ID not present in the loaded catalog.
    #[error("unknown achievement: {0}")]
    UnknownAchievement(String),

    /// Quest template ID not present in the loaded catalog.
    #[error("unknown quest template: {0}")]
    UnknownTemplate(String),
}
