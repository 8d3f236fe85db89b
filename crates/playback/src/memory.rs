//! In-memory collaborators
//!
//! Used by the CLI, which reads its library from a JSON manifest, and by
//! tests.

use crate::services::{BookStore, DownloadService, ProgressStore, SettingsStore, TokenProvider};
use async_trait::async_trait;
use earshot_core::{AppError, BookId, FileId, PlaybackSpeed, Result, ResumeProgress, StoredBook};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Default)]
pub struct MemoryBookStore {
    books: RwLock<HashMap<BookId, StoredBook>>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_books(books: impl IntoIterator<Item = StoredBook>) -> Self {
        let store = Self::new();
        for book in books {
            store.insert(book);
        }
        store
    }

    pub fn insert(&self, book: StoredBook) {
        write(&self.books).insert(book.id.clone(), book);
    }

    /// Every stored book, ordered by id
    pub fn books(&self) -> Vec<StoredBook> {
        let mut books: Vec<_> = read(&self.books).values().cloned().collect();
        books.sort_by(|a, b| a.id.cmp(&b.id));
        books
    }
}

impl BookStore for MemoryBookStore {
    fn book(&self, book_id: &BookId) -> Option<StoredBook> {
        read(&self.books).get(book_id).cloned()
    }
}

/// Progress records keyed by book
///
/// A book with no record resumes at the start at the global default speed.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: RwLock<HashMap<BookId, ResumeProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = (BookId, ResumeProgress)>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().collect()),
        }
    }

    pub fn set(&self, book_id: BookId, progress: ResumeProgress) {
        write(&self.records).insert(book_id, progress);
    }

    /// Every record, ordered by book id
    pub fn records(&self) -> Vec<(BookId, ResumeProgress)> {
        let mut records: Vec<_> = read(&self.records)
            .iter()
            .map(|(id, progress)| (id.clone(), *progress))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        records
    }

    fn modify<F>(&self, book_id: &BookId, f: F)
    where
        F: FnOnce(&mut ResumeProgress),
    {
        let mut records = write(&self.records);
        let entry = records
            .entry(book_id.clone())
            .or_insert_with(|| ResumeProgress::at(0));
        f(entry);
    }
}

impl ProgressStore for MemoryProgressStore {
    fn resume_progress(&self, book_id: &BookId) -> Option<ResumeProgress> {
        read(&self.records).get(book_id).copied()
    }

    fn save_custom_speed(&self, book_id: &BookId, position_ms: i64, speed: f32) -> Result<()> {
        self.modify(book_id, |progress| {
            progress.position_ms = position_ms;
            progress.has_custom_speed = true;
            progress.playback_speed = speed;
        });
        Ok(())
    }

    fn clear_custom_speed(&self, book_id: &BookId, default_speed: f32) -> Result<()> {
        self.modify(book_id, |progress| {
            progress.has_custom_speed = false;
            progress.playback_speed = default_speed;
        });
        Ok(())
    }

    fn save_position(&self, book_id: &BookId, position_ms: i64) -> Result<()> {
        self.modify(book_id, |progress| progress.position_ms = position_ms);
        Ok(())
    }

    fn mark_finished(&self, book_id: &BookId) -> Result<()> {
        self.modify(book_id, |progress| {
            progress.is_finished = true;
            progress.position_ms = 0;
        });
        Ok(())
    }
}

/// Settings held in memory, never persisted
#[derive(Debug)]
pub struct MemorySettings {
    base_url: RwLock<Option<String>>,
    default_speed: RwLock<f32>,
    spatial_audio: bool,
    supported_codecs: Vec<String>,
}

impl MemorySettings {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: RwLock::new(base_url.map(str::to_string)),
            default_speed: RwLock::new(1.0),
            spatial_audio: false,
            supported_codecs: vec!["opus".to_string(), "aac".to_string(), "mp3".to_string()],
        }
    }

    pub fn with_spatial_audio(mut self, enabled: bool) -> Self {
        self.spatial_audio = enabled;
        self
    }

    pub fn with_codecs(mut self, codecs: Vec<String>) -> Self {
        self.supported_codecs = codecs;
        self
    }

    pub fn set_base_url(&self, base_url: Option<&str>) {
        *write(&self.base_url) = base_url.map(str::to_string);
    }
}

impl SettingsStore for MemorySettings {
    fn base_url(&self) -> Option<String> {
        read(&self.base_url).clone()
    }

    fn default_speed(&self) -> f32 {
        *read(&self.default_speed)
    }

    fn set_default_speed(&self, speed: f32) -> Result<()> {
        let speed = PlaybackSpeed::new(speed).map_err(|reason| AppError::InvalidArgument {
            argument: "default_speed".to_string(),
            reason,
        })?;
        *write(&self.default_speed) = speed.value();
        Ok(())
    }

    fn spatial_audio(&self) -> bool {
        self.spatial_audio
    }

    fn supported_codecs(&self) -> Vec<String> {
        self.supported_codecs.clone()
    }
}

/// A fixed token that never needs refreshing
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
    fail_refresh: bool,
}

impl StaticTokenProvider {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: token.map(str::to_string),
            fail_refresh: false,
        }
    }

    /// Every refresh fails, as when the device is offline
    pub fn offline(token: Option<&str>) -> Self {
        Self {
            token: token.map(str::to_string),
            fail_refresh: true,
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn prepare_for_playback(&self) -> Result<()> {
        if self.fail_refresh {
            return Err(AppError::AuthUnavailable {
                reason: "token refresh is unavailable offline".to_string(),
            });
        }
        Ok(())
    }

    fn token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Cached files known up front; download requests are recorded, not run
#[derive(Debug, Default)]
pub struct MemoryDownloads {
    local: RwLock<HashMap<FileId, PathBuf>>,
    deleted: RwLock<HashSet<BookId>>,
    requested: Mutex<Vec<BookId>>,
}

impl MemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_local(&self, file_id: FileId, path: impl Into<PathBuf>) {
        write(&self.local).insert(file_id, path.into());
    }

    /// Marks a book as removed by the user
    pub fn mark_deleted(&self, book_id: BookId) {
        write(&self.deleted).insert(book_id);
    }

    /// Books a background download was requested for, in order
    pub fn requested(&self) -> Vec<BookId> {
        lock(&self.requested).clone()
    }
}

#[async_trait]
impl DownloadService for MemoryDownloads {
    fn local_path(&self, file_id: &FileId) -> Option<PathBuf> {
        read(&self.local).get(file_id).cloned()
    }

    async fn download_book(&self, book_id: &BookId) -> Result<()> {
        lock(&self.requested).push(book_id.clone());
        Ok(())
    }

    fn was_explicitly_deleted(&self, book_id: &BookId) -> bool {
        read(&self.deleted).contains(book_id)
    }
}
