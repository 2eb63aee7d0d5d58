//! Client configuration.
//!
//! A config is built by exactly one of three constructors: `ClientConfig::new`
//! plus the `with_*` builders, `from_toml_str`/`from_file`, or `from_env`.
//! Sources are not layered over each other.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::staging::Stager;

/// What to do when a picked image cannot be staged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFailurePolicy {
    /// Report the staging error and send the request without an image.
    #[default]
    ProceedWithoutImage,
    /// Report the staging error and do not send the request.
    Abort,
}

impl std::str::FromStr for ImageFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proceed" | "proceed_without_image" => Ok(Self::ProceedWithoutImage),
            "abort" => Ok(Self::Abort),
            _ => Err(ConfigError::Invalid {
                key: "CONTACTS_IMAGE_FAILURE",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Host root of the API; `api/` is appended per request.
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub image_failure: ImageFailurePolicy,

    /// Where staged images are written. Defaults to the system temp dir.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_ms: default_timeout_ms(),
            image_failure: ImageFailurePolicy::default(),
            staging_dir: None,
        }
    }

    /// Sub-millisecond remainders are dropped; anything shorter than 1ms
    /// becomes 1ms.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }

    pub fn with_image_failure(mut self, policy: ImageFailurePolicy) -> Self {
        self.image_failure = policy;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Read `CONTACTS_API_URL` (required), `CONTACTS_API_TIMEOUT_MS`,
    /// `CONTACTS_IMAGE_FAILURE` and `CONTACTS_STAGING_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("CONTACTS_API_URL").ok_or(ConfigError::Missing("CONTACTS_API_URL"))?;
        let mut config = Self::new(&base_url);
        if let Some(raw) = lookup("CONTACTS_API_TIMEOUT_MS") {
            config.timeout_ms = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "CONTACTS_API_TIMEOUT_MS",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("CONTACTS_IMAGE_FAILURE") {
            config.image_failure = raw.parse()?;
        }
        config.staging_dir = lookup("CONTACTS_STAGING_DIR").map(PathBuf::from);
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if self.base_url.is_empty() {
            return Err(ConfigError::Missing("base_url"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "timeout_ms",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stager(&self) -> Stager {
        self.staging_dir.clone().map(Stager::new).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn toml_applies_defaults() {
        let config = ClientConfig::from_toml_str(r#"base_url = "http://api.local/""#).unwrap();
        assert_eq!(config.base_url, "http://api.local");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.image_failure, ImageFailurePolicy::ProceedWithoutImage);
        assert!(config.staging_dir.is_none());
    }

    #[test]
    fn toml_reads_all_fields() {
        let config = ClientConfig::from_toml_str(
            r#"
            base_url = "http://api.local"
            timeout_ms = 1500
            image_failure = "abort"
            staging_dir = "/tmp/staging"
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(1500));
        assert_eq!(config.image_failure, ImageFailurePolicy::Abort);
        assert_eq!(config.stager().dir(), Path::new("/tmp/staging"));
    }

    #[test]
    fn toml_rejects_zero_timeout() {
        let err = ClientConfig::from_toml_str("base_url = \"http://a\"\ntimeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "timeout_ms", .. }));
    }

    #[test]
    fn env_requires_base_url() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CONTACTS_API_URL")));
    }

    #[test]
    fn env_parses_optional_values() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CONTACTS_API_URL", "http://10.0.2.2:8000/"),
            ("CONTACTS_API_TIMEOUT_MS", "12000"),
            ("CONTACTS_IMAGE_FAILURE", "Abort"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://10.0.2.2:8000");
        assert_eq!(config.timeout(), Duration::from_secs(12));
        assert_eq!(config.image_failure, ImageFailurePolicy::Abort);
    }

    #[test]
    fn env_rejects_bad_timeout() {
        let err = ClientConfig::from_lookup(lookup(&[
            ("CONTACTS_API_URL", "http://a"),
            ("CONTACTS_API_TIMEOUT_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CONTACTS_API_TIMEOUT_MS", .. }));
    }

    #[test]
    fn builder_keeps_sub_second_timeouts() {
        let config = ClientConfig::new("http://a").with_timeout(Duration::from_millis(1500));
        assert_eq!(config.timeout(), Duration::from_millis(1500));

        let config = ClientConfig::new("http://a").with_timeout(Duration::from_millis(300));
        assert_eq!(config.timeout(), Duration::from_millis(300));

        let config = ClientConfig::new("http://a").with_timeout(Duration::from_micros(10));
        assert_eq!(config.timeout(), Duration::from_millis(1));
    }
}
