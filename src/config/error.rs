//! Errors raised while resolving, parsing or persisting `serial-flow` config.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Malformed(#[from] toml::de::Error),

    #[error("config could not be encoded: {0}")]
    Encode(#[from] toml::ser::Error),

    /// A section value the engine cannot run with, e.g. a zero buffer size.
    #[error("[{section}] {key} {reason}")]
    OutOfRange {
        section: &'static str,
        key: &'static str,
        reason: &'static str,
    },

    /// A `SERIAL_FLOW_*` or `TEST_*` override that does not parse.
    #[error("{var}={value:?} is not a valid {expected}")]
    BadOverride {
        var: String,
        value: String,
        expected: &'static str,
    },

    /// `save`/`reload` on a loader that was built from defaults.
    #[error("no config file backs this loader")]
    Detached,
}

impl ConfigError {
    pub fn out_of_range(section: &'static str, key: &'static str, reason: &'static str) -> Self {
        Self::OutOfRange {
            section,
            key,
            reason,
        }
    }

    pub fn bad_override(
        var: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::BadOverride {
            var: var.into(),
            value: value.into(),
            expected,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
