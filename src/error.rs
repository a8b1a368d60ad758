//! # Error Types Module
//!
//! Centralized error handling for the hygrolog application.
//! Provides custom error types for each module with proper context and error chaining.
//!
//! ## Error Types
//! - `DecodeError`: Malformed instrument lines; always recoverable, the line is dropped
//! - `ConnectionError`: Serial port open/read failures
//! - `PersistenceError`: Failures while merging buffered records into the day file
//! - `ConfigError`: Configuration file I/O, parsing, and validation errors
//!
//! ## Recovery Semantics
//! Only `ConfigError` and an initial `ConnectionError::OpenFailed` prevent a
//! logging session from starting or continuing. Everything else is reported
//! and the pipeline keeps running.

use std::fmt;
use std::num::ParseFloatError;
use std::path::PathBuf;

/// Errors produced while decoding a single instrument line
#[derive(Debug)]
pub enum DecodeError {
    /// Line has fewer comma-separated fields than the protocol variant requires
    TooFewFields { found: usize, minimum: usize },
    /// A designated numeric field did not parse as a float
    NumericParse {
        index: usize,
        value: String,
        source: ParseFloatError,
    },
    /// A configured field offset is structurally absent from the line
    FieldIndex { index: usize, field_count: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TooFewFields { found, minimum } => {
                write!(f, "Line has {} fields, expected at least {}", found, minimum)
            }
            DecodeError::NumericParse { index, value, source } => {
                write!(f, "Field {} ({:?}) is not a number: {}", index, value, source)
            }
            DecodeError::FieldIndex { index, field_count } => {
                write!(f, "Field {} is missing (line has {} fields)", index, field_count)
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::NumericParse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors that can occur while managing the serial link
#[derive(Debug)]
pub enum ConnectionError {
    /// The initial port open failed; the session cannot start
    OpenFailed { port: String, source: std::io::Error },
    /// A read failed mid-session; triggers the reconnect path
    ReadFailed(std::io::Error),
    /// The configured reconnect budget was spent without reopening the port
    RetriesExhausted { attempts: u32 },
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::OpenFailed { port, source } => {
                write!(f, "Failed to open serial port {}: {}", port, source)
            }
            ConnectionError::ReadFailed(e) => {
                write!(f, "Serial read failed: {}", e)
            }
            ConnectionError::RetriesExhausted { attempts } => {
                write!(f, "Gave up reconnecting after {} attempts", attempts)
            }
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::OpenFailed { source, .. } => Some(source),
            ConnectionError::ReadFailed(e) => Some(e),
            ConnectionError::RetriesExhausted { .. } => None,
        }
    }
}

/// Errors that can occur while flushing buffered records to the day file
#[derive(Debug)]
pub enum PersistenceError {
    /// Existing rows could not be read back; the flush degrades to "no prior rows"
    ReadExisting { path: PathBuf, source: csv::Error },
    /// Writing the temporary file failed; the target was never touched
    WriteTemp(csv::Error),
    /// Atomically replacing the target with the temporary file failed
    Replace(std::io::Error),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::ReadExisting { path, source } => {
                write!(f, "Failed to read existing records from {}: {}", path.display(), source)
            }
            PersistenceError::WriteTemp(e) => {
                write!(f, "Failed to write temporary file: {}", e)
            }
            PersistenceError::Replace(e) => {
                write!(f, "Failed to replace day file: {}", e)
            }
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::ReadExisting { source, .. } => Some(source),
            PersistenceError::WriteTemp(e) => Some(e),
            PersistenceError::Replace(e) => Some(e),
        }
    }
}

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
    /// No serial port configured
    MissingPort,
    /// A configuration value failed validation
    InvalidValue { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
            ConfigError::MissingPort => {
                write!(f, "No serial port configured")
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid config value for {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
            ConfigError::MissingPort => None,
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::TooFewFields { found: 2, minimum: 8 };
        assert!(err.to_string().contains("2 fields"));
        assert!(err.to_string().contains("at least 8"));
    }

    #[test]
    fn test_decode_error_chain() {
        use std::error::Error;
        let source = "x".parse::<f64>().unwrap_err();
        let err = DecodeError::NumericParse {
            index: 1,
            value: "x".to_string(),
            source,
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn test_connection_error_chain() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such device");
        let err = ConnectionError::OpenFailed {
            port: "COM3".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("COM3"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_config_error_chain() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::ReadFailed(io_err);
        assert!(err.source().is_some());
    }
}
