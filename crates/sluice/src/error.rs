use std::io;

use sluice_bucket::LimitError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid [{section}] limit: {source}")]
    Invalid {
        section: &'static str,
        #[source]
        source:  LimitError,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
