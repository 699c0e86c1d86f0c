//! Logging setup errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed
    #[error("logging already initialized: {0}")]
    InitializationFailed(String),

    /// Not one of trace, debug, info, warn or error
    #[error("unknown log level '{0}'")]
    InvalidLevel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            LoggingError::InvalidLevel("loud".into()).to_string(),
            "unknown log level 'loud'"
        );
        assert!(LoggingError::InitializationFailed("set".into())
            .to_string()
            .starts_with("logging already initialized"));
    }
}
