//! Configuration manager, the main API for config operations

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding `server.base_url`
pub const ENV_SERVER_BASE_URL: &str = "EARSHOT_SERVER_BASE_URL";
/// Environment variable overriding `player.default_speed`
pub const ENV_PLAYER_DEFAULT_SPEED: &str = "EARSHOT_PLAYER_DEFAULT_SPEED";
/// Environment variable overriding `streaming.negotiation_enabled`
pub const ENV_STREAMING_NEGOTIATION_ENABLED: &str = "EARSHOT_STREAMING_NEGOTIATION_ENABLED";

/// Loads, saves and updates the on-disk configuration
///
/// Directory layout follows the platform conventions from `directories`:
/// - Linux: `~/.config/earshot/`
/// - macOS: `~/Library/Application Support/earshot/`
/// - Windows: `%APPDATA%\earshot\`
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a manager rooted at the platform config directory
    pub fn new() -> ConfigResult<Self> {
        let config_dir = ProjectDirs::from("", "", "earshot")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            })?;
        Ok(Self::with_directory(config_dir))
    }

    /// Creates a manager rooted at `config_dir`
    pub fn with_directory(config_dir: PathBuf) -> Self {
        let persistence = ConfigPersistence::new(config_dir.join(CONFIG_FILE));
        Self {
            persistence,
            config_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, logging and falling back to defaults on error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads, applies `update_fn` and saves atomically
    ///
    /// ```rust,no_run
    /// # use earshot_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.player.default_speed = 1.3;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes a default config file unless one exists
    ///
    /// Returns `Ok(true)` when a file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        let path = self.config_path();
        if path.exists() {
            log::info!("Config file already exists at {}", path.display());
            return Ok(false);
        }

        self.save(&Config::default())?;
        log::info!("Generated default config at {}", path.display());
        Ok(true)
    }

    /// Overwrites the config file with defaults
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Lists validation problems in the current file
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the file and then applies `EARSHOT_*` environment overrides
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {:?}",
                errors
            );
        }

        Ok(config)
    }
}

/// Applies overrides read through `lookup` on top of `config`
///
/// An unparsable value is an error rather than being silently dropped.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_SERVER_BASE_URL) {
        log::debug!("{} overrides server.base_url", ENV_SERVER_BASE_URL);
        config.server.base_url = Some(url).filter(|u| !u.trim().is_empty());
    }

    if let Some(raw) = lookup(ENV_PLAYER_DEFAULT_SPEED) {
        config.player.default_speed =
            raw.trim()
                .parse::<f32>()
                .map_err(|_| ConfigError::InvalidEnvOverride {
                    variable: ENV_PLAYER_DEFAULT_SPEED.to_string(),
                    value: raw.clone(),
                })?;
    }

    if let Some(raw) = lookup(ENV_STREAMING_NEGOTIATION_ENABLED) {
        config.streaming.negotiation_enabled = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(ConfigError::InvalidEnvOverride {
                    variable: ENV_STREAMING_NEGOTIATION_ENABLED.to_string(),
                    value: raw,
                })
            }
        };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn setup_test_manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf());
        (temp_dir, manager)
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_or_default_with_missing_file() {
        let (_temp_dir, manager) = setup_test_manager();
        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_load_or_default_with_corrupt_file() {
        let (_temp_dir, manager) = setup_test_manager();
        std::fs::write(manager.config_path(), "[[[").expect("Should write");
        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_update() {
        let (_temp_dir, manager) = setup_test_manager();

        manager
            .update(|config| {
                config.player.default_speed = 1.75;
                config.player.spatial_audio = true;
            })
            .expect("Should update");

        let loaded = manager.load().expect("Should load");
        assert_eq!(loaded.player.default_speed, 1.75);
        assert!(loaded.player.spatial_audio);
    }

    #[test]
    fn test_update_rejects_invalid_result() {
        let (_temp_dir, manager) = setup_test_manager();
        let result = manager.update(|config| config.player.default_speed = 0.1);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_initialize_only_once() {
        let (_temp_dir, manager) = setup_test_manager();

        assert!(manager.initialize().expect("Should initialize"));
        assert!(manager.config_path().exists());
        assert!(!manager.initialize().expect("Should initialize"));
    }

    #[test]
    fn test_reset() {
        let (_temp_dir, manager) = setup_test_manager();
        manager
            .update(|config| config.streaming.negotiation_enabled = false)
            .expect("Should update");

        manager.reset().expect("Should reset");
        assert_eq!(manager.load().expect("Should load"), Config::default());
    }

    #[test]
    fn test_validate_reports_hand_edited_values() {
        let (_temp_dir, manager) = setup_test_manager();
        std::fs::write(manager.config_path(), "[streaming]\nmax_poll_attempts = 0\n")
            .expect("Should write");

        let errors = manager.validate().expect("Should validate");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("streaming.max_poll_attempts"));
    }

    #[test]
    fn test_env_overrides_applied() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                (ENV_SERVER_BASE_URL, "https://abs.example.com"),
                (ENV_PLAYER_DEFAULT_SPEED, "1.4"),
                (ENV_STREAMING_NEGOTIATION_ENABLED, "off"),
            ]),
        )
        .expect("Overrides should apply");

        assert_eq!(config.server.base_url.as_deref(), Some("https://abs.example.com"));
        assert_eq!(config.player.default_speed, 1.4);
        assert!(!config.streaming.negotiation_enabled);
    }

    #[test]
    fn test_env_override_bad_speed() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, env(&[(ENV_PLAYER_DEFAULT_SPEED, "fast")]));
        assert!(matches!(result, Err(ConfigError::InvalidEnvOverride { .. })));
        assert_eq!(config.player.default_speed, 1.0);
    }

    #[test]
    fn test_env_override_blank_url_clears() {
        let mut config = Config::default();
        config.server.base_url = Some("https://old.example.com".to_string());
        apply_env_overrides(&mut config, env(&[(ENV_SERVER_BASE_URL, "")]))
            .expect("Overrides should apply");
        assert!(config.server.base_url.is_none());
    }

    #[test]
    fn test_config_file_path() {
        let (_temp_dir, manager) = setup_test_manager();
        assert!(manager.config_path().ends_with("config.toml"));
        assert!(manager.config_path().starts_with(manager.config_dir()));
    }
}
