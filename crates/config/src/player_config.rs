//! Player configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Slowest speed the player accepts
pub const MIN_SPEED: f32 = 0.5;

/// Fastest speed the player accepts
pub const MAX_SPEED: f32 = 3.0;

/// Player preferences and behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Global default playback speed, used unless a book has its own
    pub default_speed: f32,

    /// Spatial audio preference handed to the output engine
    pub spatial_audio: bool,

    /// Playback speed change step
    pub speed_step: f32,

    /// Length of the sleep-timer volume fade in seconds
    pub sleep_fade_secs: u64,

    /// Interval for persisting the playback position while playing
    pub autosave_interval_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_speed: 1.0,
            spatial_audio: false,
            speed_step: 0.1,
            sleep_fade_secs: 10,
            autosave_interval_secs: 5,
        }
    }
}

impl ConfigSection for PlayerConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(self.default_speed, MIN_SPEED, MAX_SPEED, "player.default_speed"),
            Validator::in_range(self.speed_step, 0.05, 0.5, "player.speed_step"),
            Validator::in_range(self.sleep_fade_secs, 0, 60, "player.sleep_fade_secs"),
            Validator::in_range(
                self.autosave_interval_secs,
                1,
                300,
                "player.autosave_interval_secs",
            ),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.default_speed = other.default_speed;
        self.spatial_audio = other.spatial_audio;
        self.speed_step = other.speed_step;
        self.sleep_fade_secs = other.sleep_fade_secs;
        self.autosave_interval_secs = other.autosave_interval_secs;
    }

    fn section_name(&self) -> &'static str {
        "player"
    }
}
