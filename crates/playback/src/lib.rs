//! Playback core for Earshot
//!
//! Turns a book's audio files into one continuous timeline, negotiates
//! server-side transcodes for files that are not cached, and keeps an
//! observable session in step with the output engine.

mod chapters;
mod driver;
pub mod memory;
mod negotiator;
mod orchestrator;
mod remote;
mod services;
mod session;
mod settings;
mod sleep_timer;
mod timeline;

pub use chapters::ChapterList;
pub use driver::spawn_engine_driver;
pub use negotiator::{CodecProfile, PollPolicy, StreamNegotiator, StreamPrepareResult};
pub use orchestrator::{PlaybackOrchestrator, PrepareResult, Services};
pub use remote::{HttpNegotiationApi, PREPARE_PATH};
pub use services::{
    BookStore, DownloadService, EngineEvent, NegotiationApi, NegotiationRequest,
    NegotiationResponse, OutputEngine, ProgressStore, SettingsStore, TokenProvider,
};
pub use session::{PlaybackSessionState, PublishGuard, SessionHandle};
pub use settings::ConfigSettings;
pub use sleep_timer::{spawn_sleep_timer, SleepTimer, SleepTimerMode, SleepTimerState, TimerTick};
pub use timeline::{direct_stream_url, AudioSegment, PlaybackTimeline, ResolvedPosition};
