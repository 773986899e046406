use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sluice_bucket::{LimitError, TokenBucket, check_limit};

use crate::error::{ConfigError, Result};

/// Rate and burst capacity of one bucket.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitSpec {
    /// Tokens (bytes) added per second.
    pub rate:     f64,
    /// Maximum number of tokens the bucket accumulates.
    pub capacity: i64,
}

impl LimitSpec {
    pub fn new(rate: f64, capacity: i64) -> Self { Self { rate, capacity } }

    pub fn validate(&self) -> std::result::Result<(), LimitError> {
        check_limit(self.rate, self.capacity)
    }

    /// Create an empty bucket with this limit, originating at `now`.
    pub fn build(&self, now: Instant) -> std::result::Result<TokenBucket, LimitError> {
        TokenBucket::new(self.rate, self.capacity, now)
    }

    /// Replace the limit of an existing bucket.
    pub fn apply(&self, bucket: &TokenBucket) -> std::result::Result<(), LimitError> {
        bucket.update_limit(self.rate, self.capacity)
    }
}

/// Limits for per-stream and shared buckets.
///
/// # Examples
///
/// ```
/// use sluice::BandwidthConfig;
///
/// let config = BandwidthConfig::from_toml_str(
///     r#"
///     [local]
///     rate = 1024.0
///     capacity = 4096
///
///     [shared]
///     rate = 8192.0
///     capacity = 32768
///     "#,
/// )
/// .unwrap();
///
/// assert_eq!(config.shared.capacity, 32768);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandwidthConfig {
    pub local:  LimitSpec,
    pub shared: LimitSpec,
}

impl BandwidthConfig {
    pub fn new(local: LimitSpec, shared: LimitSpec) -> Self { Self { local, shared } }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.as_ref().display(), "bandwidth config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.local.validate().map_err(invalid("local"))?;
        self.shared.validate().map_err(invalid("shared"))?;
        Ok(())
    }
}

pub(crate) fn invalid(section: &'static str) -> impl FnOnce(LimitError) -> ConfigError {
    move |source| ConfigError::Invalid { section, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [local]
        rate = 100.0
        capacity = 200

        [shared]
        rate = 1000.0
        capacity = 5000
    "#;

    #[test]
    fn test_parse_valid_config() {
        let config = BandwidthConfig::from_toml_str(VALID).unwrap();
        assert_eq!(config.local, LimitSpec::new(100.0, 200));
        assert_eq!(config.shared, LimitSpec::new(1000.0, 5000));
    }

    #[test]
    fn test_parse_rejects_missing_section() {
        let result = BandwidthConfig::from_toml_str("[local]\nrate = 1.0\ncapacity = 1\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_names_section() {
        let config = BandwidthConfig::new(LimitSpec::new(10.0, 10), LimitSpec::new(0.0, 10));

        match config.validate() {
            Err(ConfigError::Invalid { section, source }) => {
                assert_eq!(section, "shared");
                assert_eq!(source, LimitError::InvalidRate(0.0));
            }
            other => panic!("expected invalid shared limit, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_invalid_capacity() {
        let toml = VALID.replace("capacity = 200", "capacity = 0");
        let err = BandwidthConfig::from_toml_str(&toml).unwrap_err();
        assert_eq!(err.to_string(), "invalid [local] limit: capacity must be positive, got 0");
    }

    #[test]
    fn test_spec_builds_and_applies() {
        let now = Instant::now();
        let bucket = LimitSpec::new(2.0, 4).build(now).unwrap();
        assert_eq!(bucket.capacity(), 4);

        LimitSpec::new(4.0, 8).apply(&bucket).unwrap();
        assert_eq!(bucket.capacity(), 8);
        assert_eq!(bucket.fill_interval(), std::time::Duration::from_millis(250));
    }

    #[test]
    fn test_toml_roundtrip_preserves_limits() {
        let config = BandwidthConfig::from_toml_str(VALID).unwrap();
        let rendered = toml::to_string(&config).unwrap();
        assert_eq!(BandwidthConfig::from_toml_str(&rendered).unwrap(), config);
    }
}
