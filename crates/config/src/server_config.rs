//! Server connection configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Where the audiobook server lives and how hard to try reaching it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the server; `None` until the user signs in
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retries for 5xx and transport failures
    pub max_retries: u32,
}

impl ServerConfig {
    /// Base URL without trailing slashes, if one is configured
    pub fn normalized_base_url(&self) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl ConfigSection for ServerConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::in_range(self.request_timeout_secs, 1, 300, "server.request_timeout_secs"),
            Validator::in_range(self.max_retries, 0, 10, "server.max_retries"),
        ];

        if let Some(url) = &self.base_url {
            results.push(Validator::http_url(url.trim(), "server.base_url"));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        self.request_timeout_secs = other.request_timeout_secs;
        self.max_retries = other.max_retries;
    }

    fn section_name(&self) -> &'static str {
        "server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_server() {
        let config = ServerConfig::default();
        assert!(config.base_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config = ServerConfig {
            base_url: Some("abs.example.com".to_string()),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].field, "server.base_url");
    }

    #[test]
    fn test_normalized_base_url() {
        let config = ServerConfig {
            base_url: Some("https://abs.example.com//".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.normalized_base_url().as_deref(),
            Some("https://abs.example.com")
        );

        let blank = ServerConfig {
            base_url: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank.normalized_base_url().is_none());
    }

    #[test]
    fn test_merge_keeps_url_when_other_has_none() {
        let mut base = ServerConfig {
            base_url: Some("https://abs.example.com".to_string()),
            ..Default::default()
        };
        base.merge(ServerConfig {
            max_retries: 5,
            ..Default::default()
        });
        assert_eq!(base.base_url.as_deref(), Some("https://abs.example.com"));
        assert_eq!(base.max_retries, 5);
    }
}
