//! Sleep timer state machine and its driver task

use crate::orchestrator::PlaybackOrchestrator;
use earshot_core::Timestamp;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

const MS_PER_MINUTE: u64 = 60_000;

/// When the timer should fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTimerMode {
    /// After a fixed number of minutes of wall time
    Duration { minutes: u32 },
    /// When playback crosses `boundary_ms`, the end of the current chapter
    EndOfChapter { boundary_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTimerState {
    Inactive,
    Active {
        mode: SleepTimerMode,
        remaining_ms: u64,
        total_ms: u64,
        started_at: Timestamp,
    },
    /// Fired; volume ramps down before playback pauses
    FadingOut {
        fade_remaining_ms: u64,
        fade_total_ms: u64,
    },
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Nothing is running
    Idle,
    Counting,
    FadeStarted,
    Fading,
    /// Fade is over; pause playback and call [`SleepTimer::finish`]
    FadeComplete,
}

/// Countdown that pauses playback with a short fade
#[derive(Debug, Clone)]
pub struct SleepTimer {
    state: SleepTimerState,
    fade_ms: u64,
}

impl SleepTimer {
    pub fn new(fade: Duration) -> Self {
        Self {
            state: SleepTimerState::Inactive,
            fade_ms: fade.as_millis() as u64,
        }
    }

    pub fn state(&self) -> SleepTimerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, SleepTimerState::Inactive)
    }

    /// Starts a countdown of `minutes`
    pub fn start_duration(&mut self, minutes: u32) {
        let total_ms = u64::from(minutes) * MS_PER_MINUTE;
        log::info!("Sleep timer set for {} minutes", minutes);
        self.state = SleepTimerState::Active {
            mode: SleepTimerMode::Duration { minutes },
            remaining_ms: total_ms,
            total_ms,
            started_at: Timestamp::now(),
        };
    }

    /// Starts a timer that fires when playback reaches `boundary_ms`
    pub fn start_end_of_chapter(&mut self, position_ms: i64, boundary_ms: u64) {
        let total_ms = boundary_ms.saturating_sub(position_ms.max(0) as u64);
        log::info!("Sleep timer set for end of chapter at {}ms", boundary_ms);
        self.state = SleepTimerState::Active {
            mode: SleepTimerMode::EndOfChapter { boundary_ms },
            remaining_ms: total_ms,
            total_ms,
            started_at: Timestamp::now(),
        };
    }

    /// Advances the timer by `elapsed_ms`; `position_ms` drives chapter mode
    pub fn tick(&mut self, elapsed_ms: u64, position_ms: i64) -> TimerTick {
        match self.state {
            SleepTimerState::Inactive => TimerTick::Idle,
            SleepTimerState::Active {
                mode,
                remaining_ms,
                total_ms,
                started_at,
            } => {
                let left = match mode {
                    SleepTimerMode::Duration { .. } => remaining_ms.saturating_sub(elapsed_ms),
                    // Seeking backwards must not wind the timer back up
                    SleepTimerMode::EndOfChapter { boundary_ms } => remaining_ms
                        .min(boundary_ms.saturating_sub(position_ms.max(0) as u64)),
                };

                if left == 0 {
                    log::info!(
                        "Sleep timer fired after {}s of wall time; fading out over {}ms",
                        Timestamp::now().millis_since(started_at) / 1000,
                        self.fade_ms
                    );
                    self.state = SleepTimerState::FadingOut {
                        fade_remaining_ms: self.fade_ms,
                        fade_total_ms: self.fade_ms,
                    };
                    if self.fade_ms == 0 {
                        return TimerTick::FadeComplete;
                    }
                    return TimerTick::FadeStarted;
                }

                self.state = SleepTimerState::Active {
                    mode,
                    remaining_ms: left,
                    total_ms,
                    started_at,
                };
                TimerTick::Counting
            }
            SleepTimerState::FadingOut {
                fade_remaining_ms,
                fade_total_ms,
            } => {
                let left = fade_remaining_ms.saturating_sub(elapsed_ms);
                self.state = SleepTimerState::FadingOut {
                    fade_remaining_ms: left,
                    fade_total_ms,
                };
                if left == 0 {
                    TimerTick::FadeComplete
                } else {
                    TimerTick::Fading
                }
            }
        }
    }

    /// Returns to `Inactive` once playback has been paused after the fade
    pub fn finish(&mut self) {
        if matches!(self.state, SleepTimerState::FadingOut { .. }) {
            log::debug!("Sleep timer finished");
            self.state = SleepTimerState::Inactive;
        }
    }

    pub fn cancel(&mut self) {
        if self.is_active() {
            log::info!("Sleep timer cancelled");
        }
        self.state = SleepTimerState::Inactive;
    }

    /// Adds `minutes` to a running countdown
    ///
    /// During the fade this restarts the timer with `minutes` left. Chapter
    /// timers and an inactive timer are left alone. Returns whether anything
    /// changed.
    pub fn extend(&mut self, minutes: u32) -> bool {
        let extra_ms = u64::from(minutes) * MS_PER_MINUTE;
        match self.state {
            SleepTimerState::Active {
                mode: SleepTimerMode::Duration { minutes: current },
                remaining_ms,
                total_ms,
                started_at,
            } => {
                self.state = SleepTimerState::Active {
                    mode: SleepTimerMode::Duration {
                        minutes: current.saturating_add(minutes),
                    },
                    remaining_ms: remaining_ms + extra_ms,
                    total_ms: total_ms + extra_ms,
                    started_at,
                };
                true
            }
            SleepTimerState::FadingOut { .. } if minutes > 0 => {
                self.start_duration(minutes);
                true
            }
            _ => false,
        }
    }

    pub fn remaining_ms(&self) -> u64 {
        match self.state {
            SleepTimerState::Active { remaining_ms, .. } => remaining_ms,
            _ => 0,
        }
    }

    /// Fraction of the countdown that has elapsed, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        match self.state {
            SleepTimerState::Inactive => 0.0,
            SleepTimerState::Active {
                remaining_ms,
                total_ms,
                ..
            } => {
                if total_ms == 0 {
                    1.0
                } else {
                    (1.0 - remaining_ms as f64 / total_ms as f64).clamp(0.0, 1.0)
                }
            }
            SleepTimerState::FadingOut { .. } => 1.0,
        }
    }

    /// Output gain: 1 until the fade, then a linear ramp down to 0
    pub fn volume(&self) -> f32 {
        match self.state {
            SleepTimerState::FadingOut {
                fade_remaining_ms,
                fade_total_ms,
            } if fade_total_ms > 0 => fade_remaining_ms as f32 / fade_total_ms as f32,
            SleepTimerState::FadingOut { .. } => 0.0,
            _ => 1.0,
        }
    }

    /// Remaining time as `M:SS`, rounding partial seconds up
    pub fn format_remaining(&self) -> String {
        let seconds = self.remaining_ms().div_ceil(1_000);
        format!("{}:{:02}", seconds / 60, seconds % 60)
    }
}

impl Default for SleepTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

fn lock(timer: &Mutex<SleepTimer>) -> MutexGuard<'_, SleepTimer> {
    match timer.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Ticks `timer` every `interval` until it stops running
///
/// Applies the fade volume while fading, then pauses playback through the
/// orchestrator and restores full volume.
pub fn spawn_sleep_timer(
    timer: Arc<Mutex<SleepTimer>>,
    orchestrator: Arc<PlaybackOrchestrator>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let step_ms = interval.as_millis() as u64;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let position_ms = orchestrator.snapshot().position_ms;
            let (tick, volume) = {
                let mut timer = lock(&timer);
                let tick = timer.tick(step_ms, position_ms);
                (tick, timer.volume())
            };

            match tick {
                TimerTick::Idle => break,
                TimerTick::Counting => {}
                TimerTick::FadeStarted | TimerTick::Fading => {
                    if let Err(e) = orchestrator.set_volume(volume).await {
                        log::debug!("Could not apply fade volume: {}", e);
                    }
                }
                TimerTick::FadeComplete => {
                    if let Err(e) = orchestrator.pause().await {
                        log::warn!("Sleep timer could not pause playback: {}", e);
                    }
                    if let Err(e) = orchestrator.set_volume(1.0).await {
                        log::debug!("Could not restore volume: {}", e);
                    }
                    lock(&timer).finish();
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thirty_minute_scenario() {
        let mut timer = SleepTimer::default();
        timer.start_duration(30);

        match timer.state() {
            SleepTimerState::Active { total_ms, .. } => assert_eq!(total_ms, 1_800_000),
            other => panic!("expected active timer, got {:?}", other),
        }

        assert_eq!(timer.tick(600_000, 0), TimerTick::Counting);
        assert_eq!(timer.remaining_ms(), 1_200_000);
        assert!((timer.progress() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(timer.format_remaining(), "20:00");
    }

    #[test]
    fn test_format_remaining() {
        let mut timer = SleepTimer::default();
        timer.start_duration(1);
        timer.tick(15_000, 0);
        assert_eq!(timer.format_remaining(), "0:45");

        timer.start_duration(6);
        timer.tick(56_900, 0);
        // 303.1s left rounds up to 5:04; 303.0s shows 5:03
        assert_eq!(timer.format_remaining(), "5:04");
        timer.tick(100, 0);
        assert_eq!(timer.format_remaining(), "5:03");
    }

    #[test]
    fn test_remaining_never_increases_and_clamps_at_zero() {
        let mut timer = SleepTimer::new(Duration::from_secs(2));
        timer.start_duration(1);

        let mut last = timer.remaining_ms();
        for _ in 0..5 {
            timer.tick(10_000, 0);
            assert!(timer.remaining_ms() <= last);
            last = timer.remaining_ms();
        }
        assert_eq!(timer.tick(50_000, 0), TimerTick::FadeStarted);
        assert_eq!(timer.remaining_ms(), 0);
        assert_eq!(timer.progress(), 1.0);
    }

    #[test]
    fn test_fade_then_finish() {
        let mut timer = SleepTimer::new(Duration::from_secs(10));
        timer.start_duration(1);
        assert_eq!(timer.tick(60_000, 0), TimerTick::FadeStarted);
        assert_eq!(timer.volume(), 1.0);

        assert_eq!(timer.tick(5_000, 0), TimerTick::Fading);
        assert!((timer.volume() - 0.5).abs() < f32::EPSILON);

        assert_eq!(timer.tick(5_000, 0), TimerTick::FadeComplete);
        assert_eq!(timer.volume(), 0.0);

        timer.finish();
        assert_eq!(timer.state(), SleepTimerState::Inactive);
        assert_eq!(timer.tick(1_000, 0), TimerTick::Idle);
    }

    #[test]
    fn test_zero_fade_completes_at_once() {
        let mut timer = SleepTimer::new(Duration::ZERO);
        timer.start_duration(1);
        assert_eq!(timer.tick(60_000, 0), TimerTick::FadeComplete);
    }

    #[test]
    fn test_end_of_chapter_follows_position() {
        let mut timer = SleepTimer::default();
        timer.start_end_of_chapter(600_000, 900_000);
        assert_eq!(timer.remaining_ms(), 300_000);

        // Wall time alone does not move a chapter timer
        assert_eq!(timer.tick(1_000, 600_000), TimerTick::Counting);
        assert_eq!(timer.remaining_ms(), 300_000);

        timer.tick(1_000, 850_000);
        assert_eq!(timer.remaining_ms(), 50_000);

        // Seeking back keeps the remaining time where it was
        timer.tick(1_000, 700_000);
        assert_eq!(timer.remaining_ms(), 50_000);

        assert_eq!(timer.tick(1_000, 900_000), TimerTick::FadeStarted);
    }

    #[test]
    fn test_extend() {
        let mut timer = SleepTimer::default();
        assert!(!timer.extend(5));

        timer.start_duration(10);
        timer.tick(300_000, 0);
        assert!(timer.extend(5));
        assert_eq!(timer.remaining_ms(), 600_000);
        assert!(matches!(
            timer.state(),
            SleepTimerState::Active {
                mode: SleepTimerMode::Duration { minutes: 15 },
                total_ms: 900_000,
                ..
            }
        ));

        timer.tick(600_000, 0);
        assert!(matches!(timer.state(), SleepTimerState::FadingOut { .. }));
        assert!(timer.extend(2));
        assert_eq!(timer.remaining_ms(), 120_000);
        assert_eq!(timer.volume(), 1.0);
    }

    #[test]
    fn test_cancel_from_any_state() {
        let mut timer = SleepTimer::default();
        timer.start_duration(1);
        timer.cancel();
        assert_eq!(timer.state(), SleepTimerState::Inactive);

        timer.start_duration(1);
        timer.tick(60_000, 0);
        timer.cancel();
        assert_eq!(timer.state(), SleepTimerState::Inactive);
        assert_eq!(timer.format_remaining(), "0:00");
    }
}
