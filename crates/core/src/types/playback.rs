//! Playback-related domain models

use crate::types::{FileId, Validator};
use serde::{Deserialize, Serialize};

/// Playback speed multiplier
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaybackSpeed(f32);

impl PlaybackSpeed {
    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 3.0;
    pub const NORMAL: Self = Self(1.0);

    /// Creates a new playback speed (0.5x - 3.0x)
    pub fn new(speed: f32) -> Result<Self, String> {
        if !speed.is_finite() {
            return Err(format!("Speed must be a finite number, got {}", speed));
        }

        if !(Self::MIN..=Self::MAX).contains(&speed) {
            Err(format!(
                "Speed must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                speed
            ))
        } else {
            Ok(Self(speed))
        }
    }

    /// Creates a playback speed without validation (for deserialization)
    pub fn new_unchecked(speed: f32) -> Self {
        Self(speed)
    }

    /// Returns the speed value
    pub fn value(&self) -> f32 {
        self.0
    }

    /// Checks if this is normal speed
    pub fn is_normal(&self) -> bool {
        (self.0 - 1.0).abs() < f32::EPSILON
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl std::fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}x", self.0)
    }
}

impl Validator for PlaybackSpeed {
    fn validate(&self) -> Result<(), Vec<String>> {
        Self::new(self.0).map(|_| ()).map_err(|e| vec![e])
    }
}

/// Persisted listening progress for one book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeProgress {
    /// Book-relative position; may be negative or past the end if upstream
    /// data drifted
    pub position_ms: i64,
    pub is_finished: bool,
    /// True only when the user explicitly picked a speed for this book
    pub has_custom_speed: bool,
    pub playback_speed: f32,
}

impl ResumeProgress {
    /// Progress at a position, tracking the global default speed
    pub fn at(position_ms: i64) -> Self {
        Self {
            position_ms,
            is_finished: false,
            has_custom_speed: false,
            playback_speed: 1.0,
        }
    }

    /// Marks a user-chosen speed for this book
    pub fn with_custom_speed(mut self, speed: f32) -> Self {
        self.has_custom_speed = true;
        self.playback_speed = speed;
        self
    }
}

/// Output engine playback states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Buffering,
    Playing,
    Paused,
    Ended,
    Error,
}

impl EngineState {
    /// True while audio is (or is about to be) coming out of the speakers
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing | Self::Buffering)
    }
}

/// Progress of a server-side transcode the client is waiting on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareProgress {
    pub file_id: FileId,
    /// 0-100
    pub percent: u8,
    pub message: String,
}

impl PrepareProgress {
    /// Creates a progress report, clamping the percentage to 100
    pub fn new(file_id: FileId, percent: u8, message: impl Into<String>) -> Self {
        Self {
            file_id,
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_speed_default() {
        let speed = PlaybackSpeed::default();
        assert_eq!(speed.value(), 1.0);
        assert!(speed.is_normal());
    }

    #[test]
    fn test_playback_speed_bounds() {
        assert!(PlaybackSpeed::new(0.5).is_ok());
        assert!(PlaybackSpeed::new(3.0).is_ok());
        assert!(PlaybackSpeed::new(0.4).is_err());
        assert!(PlaybackSpeed::new(3.1).is_err());
        assert!(PlaybackSpeed::new(f32::NAN).is_err());
        assert!(PlaybackSpeed::new(f32::INFINITY).is_err());
    }

    #[test]
    fn test_playback_speed_validation() {
        assert!(PlaybackSpeed::new(2.0).unwrap().is_valid());
        assert!(!PlaybackSpeed::new_unchecked(5.0).is_valid());
    }

    #[test]
    fn test_playback_speed_display() {
        assert_eq!(PlaybackSpeed::new(1.5).unwrap().to_string(), "1.50x");
    }

    #[test]
    fn test_resume_progress_builders() {
        let p = ResumeProgress::at(42_000);
        assert!(!p.has_custom_speed);

        let p = p.with_custom_speed(1.75);
        assert!(p.has_custom_speed);
        assert_eq!(p.playback_speed, 1.75);
        assert_eq!(p.position_ms, 42_000);
    }

    #[test]
    fn test_engine_state_activity() {
        assert!(EngineState::Playing.is_active());
        assert!(EngineState::Buffering.is_active());
        assert!(!EngineState::Paused.is_active());
        assert!(!EngineState::Ended.is_active());
    }

    #[test]
    fn test_prepare_progress_clamps_percent() {
        let p = PrepareProgress::new(FileId::from("f"), 140, "Transcoding");
        assert_eq!(p.percent, 100);
    }
}
