//! Unified error type for the rimlights-lib crate.
//!
//! [`RimlightsError`] wraps the transport error and the domain-specific error
//! kinds (`Config`, `Color`). `From` impls allow `?` to propagate across
//! module boundaries.

use std::fmt;

use crate::transport::TransportError;

/// Unified error type for rimlights-lib operations.
#[derive(Debug)]
pub enum RimlightsError {
    /// Serial link error (timeout, corrupted reply, write failure).
    Transport(TransportError),
    /// Standard I/O error (config file, telemetry mapping).
    Io(std::io::Error),
    /// Configuration error. Fatal at startup.
    Config(String),
    /// Color parsing error.
    Color(String),
}

impl fmt::Display for RimlightsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RimlightsError::Transport(e) => write!(f, "{e}"),
            RimlightsError::Io(e) => write!(f, "I/O error: {e}"),
            RimlightsError::Config(e) => write!(f, "Config error: {e}"),
            RimlightsError::Color(e) => write!(f, "Color error: {e}"),
        }
    }
}

impl std::error::Error for RimlightsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RimlightsError::Transport(e) => Some(e),
            RimlightsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for RimlightsError {
    fn from(e: TransportError) -> Self {
        RimlightsError::Transport(e)
    }
}

impl From<std::io::Error> for RimlightsError {
    fn from(e: std::io::Error) -> Self {
        RimlightsError::Io(e)
    }
}

/// Crate-level Result alias using [`RimlightsError`].
pub type Result<T> = std::result::Result<T, RimlightsError>;
