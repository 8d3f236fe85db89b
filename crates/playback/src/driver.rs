//! Feeds output-engine events into the session

use crate::orchestrator::PlaybackOrchestrator;
use crate::services::EngineEvent;
use earshot_core::EngineState;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Consumes `events` until the engine drops its sender
///
/// Runs on its own task so a slow negotiation never holds up position
/// updates.
pub fn spawn_engine_driver(
    orchestrator: Arc<PlaybackOrchestrator>,
    mut events: broadcast::Receiver<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => apply(&orchestrator, event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Engine driver fell behind; skipped {} events", skipped);
                }
                Err(RecvError::Closed) => {
                    log::debug!("Engine event stream closed");
                    break;
                }
            }
        }
    })
}

fn apply(orchestrator: &PlaybackOrchestrator, event: EngineEvent) {
    match event {
        EngineEvent::State(EngineState::Playing) => orchestrator.set_playing(true),
        EngineEvent::State(EngineState::Paused) | EngineEvent::State(EngineState::Idle) => {
            orchestrator.set_playing(false)
        }
        // Keep the current flag until the engine settles
        EngineEvent::State(EngineState::Buffering) => {}
        EngineEvent::State(EngineState::Ended) => {
            if let Err(e) = orchestrator.finish_book() {
                log::warn!("Could not record finished book: {}", e);
            }
        }
        EngineEvent::State(EngineState::Error) => {
            orchestrator.set_playing(false);
            log::error!("Output engine reported an error; playback paused");
        }
        EngineEvent::Position(position_ms) => orchestrator.update_position(position_ms),
        EngineEvent::Duration(duration_ms) => {
            let expected = orchestrator.snapshot().duration_ms;
            if expected != 0 && expected != duration_ms {
                log::debug!(
                    "Engine reports {}ms, timeline says {}ms; keeping the timeline",
                    duration_ms,
                    expected
                );
            }
        }
    }
}
