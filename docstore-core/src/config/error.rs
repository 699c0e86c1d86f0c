//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not well-formed TOML for [`super::Config`]
    #[error("malformed config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A `DOCSTORE_*` override did not parse
    #[error("bad value for {var}: {reason}")]
    Env { var: String, reason: String },

    /// Values parsed but do not make sense together
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
