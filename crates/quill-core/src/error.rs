//! Error taxonomy for generation workflows.
//!
//! Every failure surfaces to the immediate caller; nothing here is retried.
//! Normal end of a fragment stream is not an error and has no variant here,
//! see [`crate::aggregate::StreamOutcome::Completed`].

use std::io;

/// Errors raised while preparing, streaming, or displaying a generation.
#[derive(Debug, thiserror::Error)]
pub enum QuillError {
    /// The remote generation call errored before or during streaming
    /// (connect, HTTP status, timeout, malformed stream data).
    #[error("generation source failed: {0}")]
    SourceFailed(String),

    /// An unsupported provider or model was requested. Raised before any
    /// network call is made.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// The page could not be retrieved or parsed.
    #[error("failed to fetch content: {0}")]
    ContentFetch(String),

    /// Configuration could not be loaded, or a required value is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// The display sink failed to render.
    #[error("display sink error: {0}")]
    Sink(#[from] io::Error),
}

impl QuillError {
    /// Build a `SourceFailed` from anything displayable, with a short context prefix.
    pub fn source_failed(context: &str, err: impl std::fmt::Display) -> Self {
        QuillError::SourceFailed(format!("{}: {}", context, err))
    }
}

/// Carries the display text, so an error returned from `main` reads as the message.
impl From<QuillError> for io::Error {
    fn from(err: QuillError) -> Self {
        let kind = match &err {
            QuillError::Sink(e) => return io::Error::new(e.kind(), err.to_string()),
            QuillError::InvalidSelection(_) => io::ErrorKind::InvalidInput,
            QuillError::Config(_) => io::ErrorKind::InvalidData,
            QuillError::SourceFailed(_) | QuillError::ContentFetch(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QuillError>;
