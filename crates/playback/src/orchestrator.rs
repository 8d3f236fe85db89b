//! Playback orchestration: preparing books and driving the output engine

use crate::chapters::ChapterList;
use crate::negotiator::{CodecProfile, PollPolicy, StreamNegotiator};
use crate::services::{
    BookStore, DownloadService, NegotiationApi, OutputEngine, ProgressStore, SettingsStore,
    TokenProvider,
};
use crate::session::{PlaybackSessionState, PublishGuard, SessionHandle};
use crate::timeline::PlaybackTimeline;
use earshot_core::{AppError, BookId, FileId, PlaybackSpeed, Result};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::watch;

/// The collaborators every orchestrator needs
#[derive(Clone)]
pub struct Services {
    pub books: Arc<dyn BookStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub tokens: Arc<dyn TokenProvider>,
    pub downloads: Arc<dyn DownloadService>,
}

/// What a successful preparation hands back to the caller
#[derive(Debug, Clone)]
pub struct PrepareResult {
    pub timeline: Arc<PlaybackTimeline>,
    pub book_title: String,
    /// As persisted; may lie outside the timeline if upstream data drifted
    pub resume_position_ms: i64,
    pub resume_speed: f32,
}

/// Owns the playback session and mediates between stores, the negotiator
/// and the output engine
pub struct PlaybackOrchestrator {
    services: Services,
    negotiation: Option<Arc<dyn NegotiationApi>>,
    poll_policy: PollPolicy,
    engine: Option<Arc<dyn OutputEngine>>,
    session: SessionHandle,
    /// Bumped by every prepare; only the newest one may publish
    generation: Arc<AtomicU64>,
}

impl PlaybackOrchestrator {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            negotiation: None,
            poll_policy: PollPolicy::default(),
            engine: None,
            session: SessionHandle::new(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Negotiate remote files through `api` instead of using direct URLs
    pub fn with_negotiation(mut self, api: Arc<dyn NegotiationApi>) -> Self {
        self.negotiation = Some(api);
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn OutputEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSessionState> {
        self.session.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackSessionState {
        self.session.snapshot()
    }

    /// Prepares `book_id` for playback, logging and swallowing any failure
    pub async fn prepare_for_playback(&self, book_id: &BookId) -> Option<PrepareResult> {
        match self.prepare(book_id).await {
            Ok(result) => Some(result),
            Err(e) => {
                log::error!("Unable to prepare book {} for playback: {}", book_id, e);
                None
            }
        }
    }

    /// Prepares `book_id` for playback
    ///
    /// Builds the full timeline (negotiating every uncached file) before
    /// anything is published to the session. Negotiation problems degrade
    /// to direct URLs and never fail this call.
    pub async fn prepare(&self, book_id: &BookId) -> Result<PrepareResult> {
        let guard = PublishGuard::issue(&self.generation);
        let settings = &self.services.settings;

        // Cached books still play without a fresh token
        if let Err(e) = self.services.tokens.prepare_for_playback().await {
            log::warn!("Could not refresh token before playing {}: {}", book_id, e);
        }

        let base_url = settings
            .base_url()
            .filter(|url| !url.trim().is_empty())
            .ok_or(AppError::MissingServerConfig)?;
        let book = self
            .services
            .books
            .book(book_id)
            .ok_or_else(|| AppError::BookNotFound {
                book_id: book_id.to_string(),
            })?;
        let files = book.audio_files()?;

        let downloads = &self.services.downloads;
        let resolve_local = |file_id: &FileId| downloads.local_path(file_id);

        let timeline = match &self.negotiation {
            Some(api) => {
                let negotiator = StreamNegotiator::new(Some(Arc::clone(api)), self.session.clone())
                    .with_policy(self.poll_policy)
                    .with_guard(guard.clone());
                let profile = CodecProfile {
                    supported_codecs: settings.supported_codecs(),
                    spatial: settings.spatial_audio(),
                };
                PlaybackTimeline::build_negotiated(
                    book_id,
                    &files,
                    &base_url,
                    resolve_local,
                    &negotiator,
                    &profile,
                )
                .await?
            }
            None => PlaybackTimeline::build_local(book_id, &files, &base_url, resolve_local)?,
        };
        let timeline = Arc::new(timeline);

        let progress = self.services.progress.resume_progress(book_id);
        let resume_position_ms = match progress {
            Some(p) if p.is_finished => 0,
            Some(p) => p.position_ms,
            None => 0,
        };
        let resume_speed = match progress {
            Some(p) if p.has_custom_speed => p.playback_speed,
            _ => settings.default_speed(),
        };

        let total = timeline.total_duration_ms();
        if resume_position_ms < 0 || resume_position_ms as u64 > total {
            log::warn!(
                "Resume position {}ms for book {} is outside 0..={}ms; keeping it",
                resume_position_ms,
                book_id,
                total
            );
        }
        let resolved = timeline.resolve(resume_position_ms);
        log::debug!(
            "Book {} resumes in segment {} at {}ms",
            book_id,
            resolved.segment_index,
            resolved.position_in_segment_ms
        );

        let chapters = Arc::new(ChapterList::new(book.chapters.clone()));
        let published = self.session.update_if(|state| {
            if !guard.is_current() {
                return false;
            }
            *state = PlaybackSessionState {
                book_id: Some(book_id.clone()),
                timeline: Some(Arc::clone(&timeline)),
                chapters: Some(chapters),
                is_playing: false,
                position_ms: resume_position_ms,
                duration_ms: total,
                speed: resume_speed,
                preparing: None,
            };
            true
        });
        if !published {
            log::info!("Preparation of book {} was superseded by a newer request", book_id);
        }

        if !timeline.is_fully_downloaded() && !downloads.was_explicitly_deleted(book_id) {
            self.spawn_background_download(book_id.clone());
        }

        Ok(PrepareResult {
            timeline,
            book_title: book.title,
            resume_position_ms,
            resume_speed,
        })
    }

    fn spawn_background_download(&self, book_id: BookId) {
        let downloads = Arc::clone(&self.services.downloads);
        tokio::spawn(async move {
            log::debug!("Caching book {} in the background", book_id);
            if let Err(e) = downloads.download_book(&book_id).await {
                log::warn!("Background download of book {} failed: {}", book_id, e);
            }
        });
    }

    pub fn set_playing(&self, playing: bool) {
        self.session.set_playing(playing);
    }

    pub fn update_position(&self, position_ms: i64) {
        self.session.set_position(position_ms);
    }

    pub fn update_speed(&self, speed: f32) {
        self.session.set_speed(speed);
    }

    /// Records `speed` as the current book's own speed
    pub fn on_speed_changed(&self, speed: f32) -> Result<()> {
        let state = self.session.snapshot();
        let Some(book_id) = state.book_id else {
            log::debug!("Speed change to {} with no active book", speed);
            return Ok(());
        };
        self.services
            .progress
            .save_custom_speed(&book_id, state.position_ms, speed)
    }

    /// Makes the current book follow the global default speed again
    pub fn on_speed_reset(&self, default_speed: f32) -> Result<()> {
        let Some(book_id) = self.session.current_book() else {
            log::debug!("Speed reset with no active book");
            return Ok(());
        };
        self.services
            .progress
            .clear_custom_speed(&book_id, default_speed)
    }

    /// Resets the whole session to its empty state
    pub fn clear_playback(&self) {
        self.session.clear();
    }

    /// Persists the current position of the active book
    pub fn save_progress(&self) -> Result<()> {
        let state = self.session.snapshot();
        match state.book_id {
            Some(book_id) => self
                .services
                .progress
                .save_position(&book_id, state.position_ms),
            None => Ok(()),
        }
    }

    /// Marks the active book finished and ends the session
    ///
    /// The session is cleared even when the store write fails; that error
    /// is returned afterwards.
    pub fn finish_book(&self) -> Result<()> {
        let saved = match self.session.current_book() {
            Some(book_id) => {
                log::info!("Finished book {}", book_id);
                self.services.progress.mark_finished(&book_id)
            }
            None => Ok(()),
        };
        self.clear_playback();
        saved
    }

    fn engine(&self) -> Result<Arc<dyn OutputEngine>> {
        self.engine.clone().ok_or_else(|| AppError::OutputEngine {
            message: "no output engine attached".to_string(),
        })
    }

    fn active_timeline(&self) -> Result<Arc<PlaybackTimeline>> {
        self.session
            .snapshot()
            .timeline
            .ok_or(AppError::NoActiveBook)
    }

    /// Prepares the book, loads it into the engine and starts playing
    pub async fn start_playback(&self, book_id: &BookId) -> Result<PrepareResult> {
        let engine = self.engine()?;
        let prepared = self.prepare(book_id).await?;

        engine.load(prepared.timeline.segments()).await?;
        engine
            .seek_to(prepared.timeline.clamp(prepared.resume_position_ms))
            .await?;
        engine.set_speed(prepared.resume_speed).await?;
        engine.play().await?;
        self.set_playing(true);

        Ok(prepared)
    }

    pub async fn pause(&self) -> Result<()> {
        self.engine()?.pause().await?;
        self.set_playing(false);
        self.save_progress()
    }

    pub async fn resume(&self) -> Result<()> {
        self.active_timeline()?;
        self.engine()?.play().await?;
        self.set_playing(true);
        Ok(())
    }

    /// Seeks within the active book; returns the clamped target
    pub async fn seek_to(&self, position_ms: i64) -> Result<u64> {
        let timeline = self.active_timeline()?;
        let target = timeline.clamp(position_ms);
        self.engine()?.seek_to(target).await?;
        self.update_position(target as i64);
        Ok(target)
    }

    /// Applies a user-chosen speed and remembers it for the current book
    pub async fn set_speed(&self, speed: f32) -> Result<()> {
        let speed = PlaybackSpeed::new(speed)
            .map_err(|reason| AppError::InvalidArgument {
                argument: "speed".to_string(),
                reason,
            })?
            .value();
        self.active_timeline()?;

        self.engine()?.set_speed(speed).await?;
        self.update_speed(speed);
        self.on_speed_changed(speed)
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.engine()?.set_volume(volume.clamp(0.0, 1.0)).await
    }

    /// Saves progress, releases the engine and clears the session
    ///
    /// Release and clear always happen; a save failure is reported first,
    /// then a release failure.
    pub async fn stop(&self) -> Result<()> {
        let saved = self.save_progress();
        if let Err(e) = &saved {
            log::warn!("Could not save progress while stopping: {}", e);
        }
        let released = match &self.engine {
            Some(engine) => engine.release().await,
            None => Ok(()),
        };
        self.clear_playback();
        saved.and(released)
    }

    /// Where the current chapter ends, or the current file if there are no chapters
    pub fn end_of_chapter_ms(&self) -> Option<u64> {
        let state = self.session.snapshot();
        let timeline = state.timeline?;
        let position = timeline.clamp(state.position_ms);

        state
            .chapters
            .and_then(|chapters| chapters.chapter_end_after(position))
            .or_else(|| {
                let resolved = timeline.resolve(position as i64);
                timeline.segment(resolved.segment_index).map(|s| s.end_ms())
            })
    }
}
