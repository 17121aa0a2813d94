//! Error types for RoleBridge
//!
//! "Not found" is deliberately absent: a missing user or group is an
//! ordinary answer and travels as [`crate::Lookup::NotFound`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Caller Errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Directory Errors
    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Malformed range response: {0}")]
    MalformedRange(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Shorthand for an empty or missing identifier argument
    pub fn missing_argument(name: &str) -> Self {
        Error::InvalidArgument(format!("{} must not be empty", name))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::Directory(_) => "DirectoryError",
            Error::MalformedRange(_) => "MalformedRange",
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }

    /// Whether the error came from talking to the directory
    pub fn is_directory_fault(&self) -> bool {
        matches!(self, Error::Directory(_) | Error::MalformedRange(_))
    }
}
