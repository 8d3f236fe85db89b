//! JSON library manifest the CLI plays from
//!
//! ```json
//! {
//!   "books": [{ "id": "b1", "title": "Dune", "audioFiles": [...], "chapters": [...] }],
//!   "progress": { "b1": { "positionMs": 0, "isFinished": false,
//!                         "hasCustomSpeed": false, "playbackSpeed": 1.0 } },
//!   "downloads": { "f1": "/cache/f1.mp3" },
//!   "deleted": []
//! }
//! ```

use anyhow::{Context, Result};
use earshot_core::{BookId, Chapter, FileId, ResumeProgress, StoredBook};
use earshot_playback::memory::{MemoryBookStore, MemoryDownloads, MemoryProgressStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One book entry; `audioFiles` is kept raw so a malformed list only fails
/// when the book is played
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestBook {
    pub id: BookId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_files: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chapters: Vec<Chapter>,
}

impl From<ManifestBook> for StoredBook {
    fn from(book: ManifestBook) -> Self {
        StoredBook {
            id: book.id,
            title: book.title,
            author: book.author,
            audio_files_json: book.audio_files.map(|value| value.to_string()),
            chapters: book.chapters,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LibraryManifest {
    pub books: Vec<ManifestBook>,
    pub progress: BTreeMap<BookId, ResumeProgress>,
    /// Cached files by id
    pub downloads: BTreeMap<FileId, PathBuf>,
    /// Books whose downloads the user removed
    pub deleted: Vec<BookId>,
}

impl LibraryManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read library manifest {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse library manifest {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize library manifest")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write library manifest {}", path.display()))
    }

    pub fn book_store(&self) -> MemoryBookStore {
        MemoryBookStore::from_books(self.books.iter().cloned().map(StoredBook::from))
    }

    pub fn progress_store(&self) -> MemoryProgressStore {
        MemoryProgressStore::from_records(
            self.progress
                .iter()
                .map(|(id, progress)| (id.clone(), *progress)),
        )
    }

    pub fn download_service(&self) -> MemoryDownloads {
        let downloads = MemoryDownloads::new();
        for (file_id, path) in &self.downloads {
            downloads.add_local(file_id.clone(), path.clone());
        }
        for book_id in &self.deleted {
            downloads.mark_deleted(book_id.clone());
        }
        downloads
    }

    /// Copies every progress record from `store` back into the manifest
    pub fn absorb_progress(&mut self, store: &MemoryProgressStore) {
        for (book_id, progress) in store.records() {
            self.progress.insert(book_id, progress);
        }
    }
}
