//! [`SettingsStore`] over the on-disk configuration

use crate::negotiator::PollPolicy;
use crate::services::SettingsStore;
use earshot_config::{Config, ConfigManager};
use earshot_core::{AppError, PlaybackSpeed, Result};
use std::sync::{RwLock, RwLockReadGuard};

/// Settings read from a loaded [`Config`], written back through its manager
pub struct ConfigSettings {
    manager: ConfigManager,
    config: RwLock<Config>,
}

impl ConfigSettings {
    pub fn new(manager: ConfigManager, config: Config) -> Self {
        Self {
            manager,
            config: RwLock::new(config),
        }
    }

    /// Loads the config (with environment overrides) from `manager`
    pub fn load(manager: ConfigManager) -> Result<Self> {
        let config = manager
            .load_with_env_overrides()
            .map_err(|e| AppError::InvalidConfiguration {
                setting: manager.config_path().display().to_string(),
                value: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self::new(manager, config))
    }

    /// Copy of the current configuration
    pub fn config(&self) -> Config {
        self.read().clone()
    }

    /// Whether remote files should go through stream negotiation
    pub fn negotiation_enabled(&self) -> bool {
        self.read().streaming.negotiation_enabled
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from_config(&self.read().streaming)
    }

    fn read(&self) -> RwLockReadGuard<'_, Config> {
        match self.config.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SettingsStore for ConfigSettings {
    fn base_url(&self) -> Option<String> {
        self.read().server.normalized_base_url()
    }

    fn default_speed(&self) -> f32 {
        self.read().player.default_speed
    }

    fn set_default_speed(&self, speed: f32) -> Result<()> {
        let speed = PlaybackSpeed::new(speed)
            .map_err(|reason| AppError::InvalidArgument {
                argument: "default_speed".to_string(),
                reason,
            })?
            .value();

        self.manager
            .update(|config| config.player.default_speed = speed)
            .map_err(|e| AppError::StorageError {
                message: format!("failed to save default speed: {}", e),
            })?;

        let mut config = match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        config.player.default_speed = speed;
        log::info!("Default playback speed set to {}", speed);
        Ok(())
    }

    fn spatial_audio(&self) -> bool {
        self.read().player.spatial_audio
    }

    fn supported_codecs(&self) -> Vec<String> {
        self.read().streaming.supported_codecs.clone()
    }
}
