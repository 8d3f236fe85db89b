//! Book, audio file and chapter domain models

use crate::error::{AppError, Result};
use crate::types::Validator;
use serde::{Deserialize, Serialize};

/// Server-assigned identifier for a book
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    /// Creates a BookId from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BookId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned identifier for one audio file of a book
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Creates a FileId from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One audio file as described by the server's book metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFile {
    pub id: FileId,
    pub filename: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub format: Option<String>,
}

impl AudioFile {
    /// Creates an audio file entry
    pub fn new(id: impl Into<String>, filename: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            id: FileId::new(id),
            filename: filename.into(),
            duration_ms,
            format: None,
        }
    }

    /// Sets the container/codec format (e.g. "mp3", "m4b")
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Parses the JSON audio-file list stored alongside a book
    pub fn parse_list(json: &str) -> serde_json::Result<Vec<AudioFile>> {
        serde_json::from_str(json)
    }
}

impl Validator for AudioFile {
    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.id.as_str().trim().is_empty() {
            errors.push("Audio file id cannot be empty".to_string());
        }

        if self.filename.trim().is_empty() {
            errors.push("Audio file name cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A chapter boundary within a book, in book-relative milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub title: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Chapter {
    /// Creates a new chapter
    pub fn new(title: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            title: title.into(),
            start_ms,
            end_ms,
        }
    }

    /// Returns the chapter duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Checks if a book-relative position falls within this chapter
    pub fn contains(&self, position_ms: u64) -> bool {
        position_ms >= self.start_ms && position_ms < self.end_ms
    }
}

impl Validator for Chapter {
    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("Chapter title cannot be empty".to_string());
        }

        if self.end_ms <= self.start_ms {
            errors.push("End time must be after start time".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A book as kept in local storage
///
/// `audio_files_json` is the raw audio-file list synced from the server. It
/// stays unparsed until playback needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBook {
    pub id: BookId,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub audio_files_json: Option<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl StoredBook {
    /// Creates a stored book without audio metadata
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: BookId::new(id),
            title: title.into(),
            author: None,
            audio_files_json: None,
            chapters: Vec::new(),
        }
    }

    /// Attaches an audio-file list, serialized the way the sync layer stores it
    pub fn with_audio_files(mut self, files: &[AudioFile]) -> Self {
        self.audio_files_json = serde_json::to_string(files).ok();
        self
    }

    /// Attaches chapters
    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = chapters;
        self
    }

    /// Parses the stored audio-file list
    ///
    /// Fails with `NoAudioMetadata` when the book has no list at all and with
    /// `MetadataParseError` when the list is malformed. An empty but
    /// well-formed list is returned as-is.
    pub fn audio_files(&self) -> Result<Vec<AudioFile>> {
        let json = self
            .audio_files_json
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::NoAudioMetadata {
                book_id: self.id.to_string(),
            })?;

        AudioFile::parse_list(json).map_err(|e| AppError::MetadataParseError {
            book_id: self.id.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_and_compare() {
        let book = BookId::from("book-1");
        assert_eq!(book.to_string(), "book-1");
        assert_eq!(book, BookId::new("book-1".to_string()));

        let file = FileId::from("ino-42");
        assert_eq!(file.as_str(), "ino-42");
    }

    #[test]
    fn test_audio_file_json_shape() {
        let json = r#"[{"id":"a","filename":"01.mp3","durationMs":1000,"format":"mp3"},
                       {"id":"b","filename":"02.mp3","durationMs":2000}]"#;
        let files = AudioFile::parse_list(json).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].format.as_deref(), Some("mp3"));
        assert_eq!(files[1].format, None);
        assert_eq!(files[1].duration_ms, 2000);
    }

    #[test]
    fn test_audio_file_validation() {
        assert!(AudioFile::new("a", "01.mp3", 10).is_valid());
        assert!(!AudioFile::new("", "01.mp3", 10).is_valid());
        assert!(!AudioFile::new("a", " ", 10).is_valid());
    }

    #[test]
    fn test_chapter_contains_and_duration() {
        let ch = Chapter::new("One", 100, 200);
        assert!(ch.contains(100));
        assert!(ch.contains(199));
        assert!(!ch.contains(200));
        assert_eq!(ch.duration_ms(), 100);
        assert!(ch.is_valid());
        assert!(!Chapter::new("Bad", 200, 200).is_valid());
    }

    #[test]
    fn test_stored_book_round_trips_audio_files() {
        let files = vec![AudioFile::new("a", "01.mp3", 1000)];
        let book = StoredBook::new("b1", "Title").with_audio_files(&files);
        assert_eq!(book.audio_files().unwrap(), files);
    }

    #[test]
    fn test_stored_book_without_metadata() {
        let book = StoredBook::new("b1", "Title");
        assert!(matches!(
            book.audio_files(),
            Err(AppError::NoAudioMetadata { .. })
        ));
    }

    #[test]
    fn test_stored_book_with_garbage_metadata() {
        let mut book = StoredBook::new("b1", "Title");
        book.audio_files_json = Some("{not json".to_string());
        assert!(matches!(
            book.audio_files(),
            Err(AppError::MetadataParseError { .. })
        ));
    }

    #[test]
    fn test_stored_book_with_empty_list() {
        let book = StoredBook::new("b1", "Title").with_audio_files(&[]);
        assert!(book.audio_files().unwrap().is_empty());
    }
}
