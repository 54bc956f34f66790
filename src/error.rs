//! Crate-level error type
//!
//! Subsystems keep their own error enums close to where they occur
//! (`capture::CaptureError`, `session::SinkError`); this module folds them
//! into one `Error` for callers that drive the whole pipeline.

use crate::capture::CaptureError;
use crate::session::SinkError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for pipeline operations.
#[derive(Debug)]
pub enum Error {
    /// I/O failure outside the capture path (e.g. the raw dump writer).
    Io(std::io::Error),
    /// Capture device failure.
    Capture(CaptureError),
    /// Transport packetizer failure.
    Sink(SinkError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Capture(e) => write!(f, "Capture error: {}", e),
            Error::Sink(e) => write!(f, "Sink error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Capture(e) => Some(e),
            Error::Sink(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<CaptureError> for Error {
    fn from(e: CaptureError) -> Self {
        Error::Capture(e)
    }
}

impl From<SinkError> for Error {
    fn from(e: SinkError) -> Self {
        Error::Sink(e)
    }
}
