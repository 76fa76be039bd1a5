#![forbid(unsafe_code)]

//! Failure taxonomy for the ingestion and page routes.

/// Everything that can stop a scrape. Each variant maps to the `errorType`
/// reported by `GET /scrape`.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("YouTube API key not configured")]
    Configuration,

    #[error("{0}")]
    Upstream(String),

    #[error("Malformed item at position {index}: {reason}")]
    MalformedItem { index: usize, reason: String },

    #[error("Failed to save {failed} of {total} videos")]
    Persistence { failed: usize, total: usize },
}

impl ScrapeError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Stable name surfaced to clients and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration => "ConfigurationError",
            Self::Upstream(_) => "UpstreamError",
            Self::MalformedItem { .. } => "MalformedItemError",
            Self::Persistence { .. } => "PersistenceError",
        }
    }
}

/// Failures on the two read paths.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Video not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
