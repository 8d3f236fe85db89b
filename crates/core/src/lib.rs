//! Core domain types and errors shared by every Earshot crate

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use types::{
    AudioFile, BookId, Chapter, EngineState, FileId, PlaybackSpeed, PrepareProgress,
    ResumeProgress, StoredBook, Timestamp, Validator,
};
