//! Contracts for the collaborators the playback core depends on
//!
//! Everything outside the timeline/negotiation core (audio output, local
//! storage, downloads, auth, the negotiation endpoint) is reached only
//! through these traits.

use crate::timeline::AudioSegment;
use async_trait::async_trait;
use earshot_core::{BookId, EngineState, FileId, Result, ResumeProgress, StoredBook};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Something the output engine reports while playing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    State(EngineState),
    /// Book-relative position
    Position(i64),
    /// Book-relative duration as the engine measured it
    Duration(u64),
}

/// The audio output engine (decoding, buffering, hardware)
///
/// Positions passed in and reported back are book-relative.
#[async_trait]
pub trait OutputEngine: Send + Sync {
    async fn load(&self, segments: &[AudioSegment]) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn seek_to(&self, book_position_ms: u64) -> Result<()>;
    async fn set_speed(&self, speed: f32) -> Result<()>;
    /// Linear gain in `[0, 1]`
    async fn set_volume(&self, volume: f32) -> Result<()>;
    async fn release(&self) -> Result<()>;
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}

/// Supplies the bearer token used for streaming
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Makes sure the token is fresh enough to start streaming
    async fn prepare_for_playback(&self) -> Result<()>;

    /// Current token, without waiting
    fn token(&self) -> Option<String>;
}

/// Background download and caching of books
#[async_trait]
pub trait DownloadService: Send + Sync {
    fn local_path(&self, file_id: &FileId) -> Option<PathBuf>;

    /// Starts caching a whole book; a no-op for books already cached
    async fn download_book(&self, book_id: &BookId) -> Result<()>;

    /// True when the user removed the book's download on purpose
    fn was_explicitly_deleted(&self, book_id: &BookId) -> bool;
}

/// User-level settings
pub trait SettingsStore: Send + Sync {
    fn base_url(&self) -> Option<String>;
    fn default_speed(&self) -> f32;
    fn set_default_speed(&self, speed: f32) -> Result<()>;
    fn spatial_audio(&self) -> bool;
    /// Codecs this device can decode, in preference order
    fn supported_codecs(&self) -> Vec<String>;
}

/// Per-book listening progress
pub trait ProgressStore: Send + Sync {
    fn resume_progress(&self, book_id: &BookId) -> Option<ResumeProgress>;

    /// Stores a user-chosen speed for the book
    fn save_custom_speed(&self, book_id: &BookId, position_ms: i64, speed: f32) -> Result<()>;

    /// Drops the book's custom speed so it follows the global default again
    fn clear_custom_speed(&self, book_id: &BookId, default_speed: f32) -> Result<()>;

    fn save_position(&self, book_id: &BookId, position_ms: i64) -> Result<()>;

    fn mark_finished(&self, book_id: &BookId) -> Result<()>;
}

/// Local book catalog
pub trait BookStore: Send + Sync {
    fn book(&self, book_id: &BookId) -> Option<StoredBook>;
}

/// Body of a "prepare playback" call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationRequest {
    pub book_id: BookId,
    pub file_id: FileId,
    pub supported_codecs: Vec<String>,
    pub spatial: bool,
}

/// Server answer to a "prepare playback" call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResponse {
    pub ready: bool,
    #[serde(default)]
    pub stream_url: String,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub transcode_job_id: Option<String>,
    /// 0-100
    #[serde(default)]
    pub progress: u8,
}

/// Server-side stream negotiation endpoint
#[async_trait]
pub trait NegotiationApi: Send + Sync {
    async fn prepare(&self, request: &NegotiationRequest) -> Result<NegotiationResponse>;
}
