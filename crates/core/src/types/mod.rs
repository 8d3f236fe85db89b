//! Domain types for Earshot
//!
//! This module contains all domain models organized by responsibility:
//! - `book`: Books, their audio files and chapters
//! - `playback`: Speed, resume progress and output engine states
//! - `common`: Shared traits and utilities

mod book;
mod common;
mod playback;

// Re-export all public types
pub use book::{AudioFile, BookId, Chapter, FileId, StoredBook};
pub use common::{Timestamp, Validator};
pub use playback::{EngineState, PlaybackSpeed, PrepareProgress, ResumeProgress};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_types_are_exported() {
        let _book_id: BookId = BookId::from("b");
        let _file_id: FileId = FileId::from("f");
        let _speed: PlaybackSpeed = PlaybackSpeed::default();
        let _state: EngineState = EngineState::Idle;
    }
}
