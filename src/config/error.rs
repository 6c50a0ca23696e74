//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that is not a valid number.
    #[error("failed to parse {name}='{value}' as {expected}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    /// An environment variable held a value that is not `true`/`false`/`1`/`0`.
    #[error("failed to parse {name}='{value}' as a boolean")]
    InvalidBool { name: &'static str, value: String },

    /// Device preference was not one of the supported names.
    #[error("unknown device '{value}': expected one of auto, cpu, metal, cuda")]
    InvalidDevice { value: String },

    /// A numeric setting is outside its allowed range.
    #[error("{name} is out of range: {reason}")]
    OutOfRange { name: &'static str, reason: String },

    /// A `min_*`/`max_*` pair is inverted.
    #[error("{min_name} ({min}) must not exceed {max_name} ({max})")]
    InvertedBounds {
        min_name: &'static str,
        min: usize,
        max_name: &'static str,
        max: usize,
    },

    /// A string setting must not be blank.
    #[error("{name} must not be empty")]
    EmptyValue { name: &'static str },

    /// Specified path does not exist on the filesystem.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}
