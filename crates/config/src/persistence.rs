//! File system persistence for configuration
//!
//! Writes go through a temp file in the same directory and are renamed into
//! place, and the previous file is copied to `config.toml.backup` first.

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Reads and writes a single config file
pub struct ConfigPersistence {
    path: PathBuf,
}

impl ConfigPersistence {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_error(&self, source: io::Error) -> ConfigError {
        ConfigError::ReadError {
            path: self.path.clone(),
            source,
        }
    }

    /// Loads configuration from file
    ///
    /// A missing file yields the defaults. An empty or unparsable file is an
    /// error. Out-of-range values only produce a warning so the user can fix
    /// them by hand.
    pub fn load(&self) -> ConfigResult<Config> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No config at {}; using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(e) => return Err(self.read_error(e)),
        };

        if contents.trim().is_empty() {
            return Err(self.read_error(io::Error::new(
                io::ErrorKind::InvalidData,
                "file has no content",
            )));
        }

        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: self.path.clone(),
            source,
        })?;

        if config.version > CONFIG_VERSION {
            log::warn!(
                "{} was written by config version {} (this build knows {}); unknown keys are dropped",
                self.path.display(),
                config.version,
                CONFIG_VERSION
            );
        }
        if let Err(problems) = config.validate() {
            log::warn!("Config has problems: {}", describe(&problems));
        }

        Ok(config)
    }

    /// Validates and atomically writes `config`
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        config
            .validate()
            .map_err(|problems| ConfigError::ValidationError(describe(&problems)))?;

        let dir = self
            .path
            .parent()
            .ok_or_else(|| ConfigError::PathResolutionError {
                reason: format!("{} has no parent directory", self.path.display()),
            })?;
        create_dir(dir)?;

        if self.path.is_file() {
            let backup = self.path.with_extension("toml.backup");
            fs::copy(&self.path, &backup).map_err(|source| ConfigError::BackupError { source })?;
            log::debug!("Previous config kept at {}", backup.display());
        }

        let rendered = toml::to_string_pretty(config)?;
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(rendered.as_bytes())?;
        staged.flush()?;
        staged
            .persist(&self.path)
            .map_err(|e| ConfigError::WriteError {
                path: self.path.clone(),
                source: e.error,
            })?;

        log::info!("Wrote config to {}", self.path.display());
        Ok(())
    }
}

fn create_dir(dir: &Path) -> ConfigResult<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| ConfigError::DirectoryCreationError {
        path: dir.to_path_buf(),
        source,
    })?;
    log::info!("Created {}", dir.display());
    Ok(())
}

fn describe(problems: &[crate::ValidationError]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
