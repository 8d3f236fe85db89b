//! Earshot configuration
//!
//! Settings the playback engine reads at runtime: which server to talk to,
//! the global default speed, the spatial-audio preference, and how stream
//! negotiation polls for transcoded audio.
//!
//! Values resolve in layers. Defaults come first, then `config.toml`, then
//! `EARSHOT_*` environment variables. A file with out-of-range values still
//! loads (with a warning) but is refused on save.
//!
//! ```rust,no_run
//! use earshot_config::ConfigManager;
//!
//! let manager = ConfigManager::new().expect("config directory");
//! let config = manager.load_or_default();
//! println!("default speed {}", config.player.default_speed);
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

// Config sections
pub mod app_config;
mod player_config;
mod server_config;
mod streaming_config;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{
    apply_env_overrides, ConfigManager, ENV_PLAYER_DEFAULT_SPEED, ENV_SERVER_BASE_URL,
    ENV_STREAMING_NEGOTIATION_ENABLED,
};
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use player_config::{PlayerConfig, MAX_SPEED, MIN_SPEED};
pub use server_config::ServerConfig;
pub use streaming_config::StreamingConfig;

use serde::{Deserialize, Serialize};

/// Format version written into new config files
pub const CONFIG_VERSION: u32 = 1;

/// Everything in `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub app: AppConfig,
    /// Where the library server lives
    pub server: ServerConfig,
    pub player: PlayerConfig,
    /// Stream negotiation and transcode polling
    pub streaming: StreamingConfig,
}

impl Config {
    /// Checks every section and returns all problems at once
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = [
            self.app.validate(),
            self.server.validate(),
            self.player.validate(),
            self.streaming.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .flatten()
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Overlays `other` section by section; `other` wins
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.server.merge(other.server);
        self.player.merge(other.player);
        self.streaming.merge(other.streaming);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            server: ServerConfig::default(),
            player: PlayerConfig::default(),
            streaming: StreamingConfig::default(),
        }
    }
}
