//! Error types for the iplocate library

use std::fmt;

/// Result type alias for location lookups
pub type Result<T> = std::result::Result<T, LocationError>;

/// Main error type for location lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// Malformed or unresolvable input address. Raised before any database I/O.
    InvalidAddress(String),

    /// Database file missing, unreadable, or with a malformed header
    InvalidDatabase(String),

    /// Short read in the middle of a database structure
    TruncatedRead(String),

    /// I/O errors outside of a structured read
    Io(String),

    /// Configuration could not be parsed
    Config(String),

    /// Database construction errors (builders only)
    Build(String),
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            LocationError::InvalidDatabase(msg) => write!(f, "Invalid database: {}", msg),
            LocationError::TruncatedRead(msg) => write!(f, "Truncated read: {}", msg),
            LocationError::Io(msg) => write!(f, "I/O error: {}", msg),
            LocationError::Config(msg) => write!(f, "Configuration error: {}", msg),
            LocationError::Build(msg) => write!(f, "Build error: {}", msg),
        }
    }
}

impl std::error::Error for LocationError {}

impl From<std::io::Error> for LocationError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            LocationError::TruncatedRead(err.to_string())
        } else {
            LocationError::Io(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LocationError {
    fn from(err: serde_json::Error) -> Self {
        LocationError::Config(err.to_string())
    }
}
