//! Per-file stream negotiation with bounded transcode polling
//!
//! The server may have to transcode a file before the client can decode it.
//! The negotiator asks, polls at a fixed interval while the transcode runs,
//! and falls back to the direct file URL whenever negotiation cannot give an
//! answer. It never fails: some audio beats none.

use crate::services::{NegotiationApi, NegotiationRequest, NegotiationResponse};
use crate::session::{PublishGuard, SessionHandle};
use crate::timeline::direct_stream_url;
use earshot_config::StreamingConfig;
use earshot_core::{AppError, BookId, FileId, PrepareProgress};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of negotiating one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPrepareResult {
    pub stream_url: String,
    /// True on every path; a fallback URL is best effort and may need a
    /// retry when the engine first opens it
    pub ready: bool,
    pub transcode_job_id: Option<String>,
}

/// What this device can decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecProfile {
    pub supported_codecs: Vec<String>,
    pub spatial: bool,
}

/// Poll interval and attempt limit for transcode waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn from_config(config: &StreamingConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.max_poll_attempts.max(1),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
        }
    }
}

/// Turns a file id into a playable stream URL
pub struct StreamNegotiator {
    api: Option<Arc<dyn NegotiationApi>>,
    policy: PollPolicy,
    session: SessionHandle,
    guard: PublishGuard,
}

impl StreamNegotiator {
    /// Creates a negotiator; `None` means every file gets the direct URL
    pub fn new(api: Option<Arc<dyn NegotiationApi>>, session: SessionHandle) -> Self {
        Self {
            api,
            policy: PollPolicy::default(),
            session,
            guard: PublishGuard::unguarded(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stops touching the session's indicator once `guard` is superseded
    pub fn with_guard(mut self, guard: PublishGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Whether a negotiation endpoint is configured
    pub fn is_available(&self) -> bool {
        self.api.is_some()
    }

    /// Negotiates a stream for one file
    ///
    /// Publishes transcode progress into the session while waiting and
    /// clears it before returning.
    pub async fn negotiate(
        &self,
        base_url: &str,
        book_id: &BookId,
        file_id: &FileId,
        profile: &CodecProfile,
    ) -> StreamPrepareResult {
        let Some(api) = &self.api else {
            return fallback(base_url, book_id, file_id);
        };

        let request = NegotiationRequest {
            book_id: book_id.clone(),
            file_id: file_id.clone(),
            supported_codecs: profile.supported_codecs.clone(),
            spatial: profile.spatial,
        };

        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let response = match api.prepare(&request).await {
                Ok(response) => response,
                Err(e) => {
                    let err = AppError::negotiation(file_id.as_str(), e);
                    log::warn!("{}; using direct stream", err);
                    return self.give_up(base_url, book_id, file_id);
                }
            };

            if response.ready {
                if response.stream_url.trim().is_empty() {
                    log::warn!("Server reported file {} ready without a URL", file_id);
                    return self.give_up(base_url, book_id, file_id);
                }
                return self.accept(base_url, file_id, response);
            }

            log::debug!(
                "File {} transcoding ({}%), attempt {}/{}",
                file_id,
                response.progress,
                attempt,
                max_attempts
            );
            self.session.set_preparing_guarded(&self.guard, Some(PrepareProgress::new(
                file_id.clone(),
                response.progress,
                format!("Preparing audio ({}%)", response.progress.min(100)),
            )));

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        let err = AppError::NegotiationTimeout {
            file_id: file_id.to_string(),
            attempts: max_attempts,
        };
        log::warn!("{}; using direct stream", err);
        self.give_up(base_url, book_id, file_id)
    }

    fn accept(
        &self,
        base_url: &str,
        file_id: &FileId,
        response: NegotiationResponse,
    ) -> StreamPrepareResult {
        self.session.set_preparing_guarded(&self.guard, None);

        let stream_url = if response.stream_url.starts_with('/') {
            format!("{}{}", base_url.trim_end_matches('/'), response.stream_url)
        } else {
            response.stream_url
        };

        log::info!(
            "Negotiated stream for file {} (codec: {}, variant: {})",
            file_id,
            response.codec.as_deref().unwrap_or("original"),
            response.variant.as_deref().unwrap_or("default")
        );

        StreamPrepareResult {
            stream_url,
            ready: true,
            transcode_job_id: response.transcode_job_id,
        }
    }

    fn give_up(&self, base_url: &str, book_id: &BookId, file_id: &FileId) -> StreamPrepareResult {
        self.session.set_preparing_guarded(&self.guard, None);
        fallback(base_url, book_id, file_id)
    }
}

/// Direct URL, marked ready on a best-effort basis
fn fallback(base_url: &str, book_id: &BookId, file_id: &FileId) -> StreamPrepareResult {
    StreamPrepareResult {
        stream_url: direct_stream_url(base_url, book_id, file_id),
        ready: true,
        transcode_job_id: None,
    }
}
