//! Clock-driven stand-in for an audio output engine
//!
//! Nothing is decoded. Position advances with wall time scaled by the
//! playback speed, which is enough to exercise the session, autosave and the
//! sleep timer from a terminal.

use async_trait::async_trait;
use earshot_core::{EngineState, Result};
use earshot_playback::{AudioSegment, EngineEvent, OutputEngine};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
struct Transport {
    state: EngineState,
    position_ms: u64,
    duration_ms: u64,
    speed: f32,
    volume: f32,
}

pub struct SimulatedEngine {
    transport: Mutex<Transport>,
    events: broadcast::Sender<EngineEvent>,
}

impl SimulatedEngine {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            transport: Mutex::new(Transport {
                state: EngineState::Idle,
                position_ms: 0,
                duration_ms: 0,
                speed: 1.0,
                volume: 1.0,
            }),
            events,
        })
    }

    /// Advances the playhead every `tick` while playing
    pub fn spawn_clock(self: &Arc<Self>, tick: Duration) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                ticker.tick().await;
                engine.advance(tick);
            }
        })
    }

    fn advance(&self, elapsed: Duration) {
        let (position, ended) = {
            let mut transport = self.lock();
            if transport.state != EngineState::Playing {
                return;
            }
            let step = (elapsed.as_millis() as f64 * f64::from(transport.speed)) as u64;
            transport.position_ms = transport
                .position_ms
                .saturating_add(step)
                .min(transport.duration_ms);
            let ended = transport.position_ms >= transport.duration_ms;
            if ended {
                transport.state = EngineState::Ended;
            }
            (transport.position_ms, ended)
        };

        self.emit(EngineEvent::Position(position as i64));
        if ended {
            self.emit(EngineEvent::State(EngineState::Ended));
        }
    }

    fn set_state(&self, state: EngineState) {
        self.lock().state = state;
        self.emit(EngineEvent::State(state));
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, Transport> {
        match self.transport.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl OutputEngine for SimulatedEngine {
    async fn load(&self, segments: &[AudioSegment]) -> Result<()> {
        let duration_ms = segments.last().map(|s| s.end_ms()).unwrap_or(0);
        {
            let mut transport = self.lock();
            transport.duration_ms = duration_ms;
            transport.position_ms = 0;
        }
        log::debug!("Loaded {} segments ({}ms)", segments.len(), duration_ms);
        self.emit(EngineEvent::Duration(duration_ms));
        self.set_state(EngineState::Paused);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.set_state(EngineState::Playing);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.set_state(EngineState::Paused);
        Ok(())
    }

    async fn seek_to(&self, book_position_ms: u64) -> Result<()> {
        let position = {
            let mut transport = self.lock();
            transport.position_ms = book_position_ms.min(transport.duration_ms);
            transport.position_ms
        };
        self.emit(EngineEvent::Position(position as i64));
        Ok(())
    }

    async fn set_speed(&self, speed: f32) -> Result<()> {
        self.lock().speed = speed;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        let previous = std::mem::replace(&mut self.lock().volume, volume);
        if previous != volume {
            log::trace!("Volume {:.2} -> {:.2}", previous, volume);
        }
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.set_state(EngineState::Idle);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earshot_core::FileId;

    fn segment(duration_ms: u64) -> AudioSegment {
        AudioSegment {
            file_id: FileId::from("f1"),
            source_url: "https://s/f1".to_string(),
            local_path: None,
            duration_ms,
            offset_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_advances_only_while_playing() {
        let engine = SimulatedEngine::new();
        engine.load(&[segment(10_000)]).await.unwrap();

        engine.advance(Duration::from_secs(1));
        assert_eq!(engine.lock().position_ms, 0);

        engine.set_speed(2.0).await.unwrap();
        engine.play().await.unwrap();
        engine.advance(Duration::from_secs(1));
        assert_eq!(engine.lock().position_ms, 2_000);
    }

    #[tokio::test]
    async fn test_reports_end() {
        let engine = SimulatedEngine::new();
        let mut events = engine.subscribe();
        engine.load(&[segment(1_000)]).await.unwrap();
        engine.play().await.unwrap();
        engine.advance(Duration::from_secs(5));

        let mut saw_end = false;
        while let Ok(event) = events.try_recv() {
            if event == EngineEvent::State(EngineState::Ended) {
                saw_end = true;
            }
        }
        assert!(saw_end);
        assert_eq!(engine.lock().position_ms, 1_000);
    }
}
