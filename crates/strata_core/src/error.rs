//! Error types for the core library
//!
//! Only the fallible edges of the runtime (parsing text, touching the file
//! system, reading configuration) produce errors. Frame processing itself
//! degrades softly and logs instead.

use thiserror::Error;

/// The core error type
#[derive(Debug, Error)]
pub enum Error {
    /// JSON text could not be parsed or produced
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration could not be parsed
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// A type name was looked up that was never registered
    #[error("Type not registered: {0}")]
    TypeNotRegistered(String),

    /// The archive was readable but its layout is wrong
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),
}

/// Result type alias
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TypeNotRegistered("Transform".into());
        assert_eq!(err.to_string(), "Type not registered: Transform");

        let err = Error::InvalidArchive("expected object".into());
        assert_eq!(err.to_string(), "Invalid archive: expected object");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
