//! Stream negotiation configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// How remote files are negotiated into playable streams
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    /// Ask the server for a transcoded stream before falling back to the raw file
    pub negotiation_enabled: bool,

    /// Codecs this device can decode, in preference order
    pub supported_codecs: Vec<String>,

    /// Seconds between transcode status polls
    pub poll_interval_secs: u64,

    /// Polls before giving up on a transcode
    pub max_poll_attempts: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            negotiation_enabled: true,
            supported_codecs: vec![
                "opus".to_string(),
                "aac".to_string(),
                "mp3".to_string(),
                "flac".to_string(),
            ],
            poll_interval_secs: 5,
            max_poll_attempts: 120,
        }
    }
}

impl ConfigSection for StreamingConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::distinct_non_empty(&self.supported_codecs, "streaming.supported_codecs"),
            Validator::in_range(self.poll_interval_secs, 1, 60, "streaming.poll_interval_secs"),
            Validator::in_range(self.max_poll_attempts, 1, 1000, "streaming.max_poll_attempts"),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.negotiation_enabled = other.negotiation_enabled;
        self.supported_codecs = other.supported_codecs;
        self.poll_interval_secs = other.poll_interval_secs;
        self.max_poll_attempts = other.max_poll_attempts;
    }

    fn section_name(&self) -> &'static str {
        "streaming"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_polls_for_ten_minutes() {
        let config = StreamingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.poll_interval_secs * u64::from(config.max_poll_attempts),
            600
        );
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = StreamingConfig {
            max_poll_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_codecs_rejected() {
        let config = StreamingConfig {
            supported_codecs: vec!["aac".to_string(), "aac".to_string()],
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].field, "streaming.supported_codecs");
    }
}
