//! Observable playback session state

use crate::chapters::ChapterList;
use crate::timeline::PlaybackTimeline;
use earshot_core::{BookId, PrepareProgress};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Ties writes to the session to one prepare call
///
/// Every prepare takes a new guard from a shared counter; an older guard
/// goes stale as soon as a newer one is issued.
#[derive(Debug, Clone)]
pub struct PublishGuard {
    latest: Arc<AtomicU64>,
    generation: u64,
}

impl PublishGuard {
    /// Issues the newest guard for `counter`, making every earlier one stale
    pub fn issue(counter: &Arc<AtomicU64>) -> Self {
        let generation = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            latest: Arc::clone(counter),
            generation,
        }
    }

    /// A guard nothing can supersede
    pub fn unguarded() -> Self {
        Self {
            latest: Arc::new(AtomicU64::new(0)),
            generation: 0,
        }
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }
}

/// Everything a consumer needs to render the current session
///
/// Published as a whole, so position, duration and speed are always read
/// together.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSessionState {
    pub book_id: Option<BookId>,
    pub timeline: Option<Arc<PlaybackTimeline>>,
    pub chapters: Option<Arc<ChapterList>>,
    pub is_playing: bool,
    pub position_ms: i64,
    pub duration_ms: u64,
    pub speed: f32,
    /// Set while waiting on a server-side transcode
    pub preparing: Option<PrepareProgress>,
}

impl PlaybackSessionState {
    pub fn has_book(&self) -> bool {
        self.book_id.is_some()
    }
}

impl Default for PlaybackSessionState {
    fn default() -> Self {
        Self {
            book_id: None,
            timeline: None,
            chapters: None,
            is_playing: false,
            position_ms: 0,
            duration_ms: 0,
            speed: 1.0,
            preparing: None,
        }
    }
}

/// Shared handle on the session state
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<PlaybackSessionState>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PlaybackSessionState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Receiver that sees every published state
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSessionState> {
        self.tx.subscribe()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> PlaybackSessionState {
        self.tx.borrow().clone()
    }

    pub fn current_book(&self) -> Option<BookId> {
        self.tx.borrow().book_id.clone()
    }

    /// Applies `f` to the state as one atomic update
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut PlaybackSessionState),
    {
        self.tx.send_modify(f);
    }

    /// Like [`update`](Self::update), publishing only when `f` returns true
    ///
    /// `f` runs under the channel's write lock, so a check made inside it
    /// cannot be invalidated by a concurrent publish.
    pub fn update_if<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut PlaybackSessionState) -> bool,
    {
        self.tx.send_if_modified(f)
    }

    pub fn set_playing(&self, playing: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.is_playing != playing;
            state.is_playing = playing;
            changed
        });
    }

    pub fn set_position(&self, position_ms: i64) {
        self.tx.send_if_modified(|state| {
            let changed = state.position_ms != position_ms;
            state.position_ms = position_ms;
            changed
        });
    }

    pub fn set_speed(&self, speed: f32) {
        self.tx.send_if_modified(|state| {
            let changed = state.speed != speed;
            state.speed = speed;
            changed
        });
    }

    /// Sets the transcode indicator unless `guard` has been superseded
    pub fn set_preparing_guarded(
        &self,
        guard: &PublishGuard,
        preparing: Option<PrepareProgress>,
    ) -> bool {
        self.tx.send_if_modified(|state| {
            if !guard.is_current() || state.preparing == preparing {
                return false;
            }
            state.preparing = preparing;
            true
        })
    }

    /// Resets every field to its default in one step
    pub fn clear(&self) {
        self.tx.send_replace(PlaybackSessionState::default());
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}
