use thiserror::Error;

use crate::browser::BrowserError;

pub type HarvestResult<T> = Result<T, HarvestError>;

/// Fatal outcomes of a harvest run. Per-item trouble never surfaces here.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("authentication failed: {reason}")]
    Authentication { reason: String },
    #[error("profile @{handle} not found")]
    ProfileNotFound { handle: String },
    #[error("profile @{handle} is private")]
    PrivateProfile { handle: String },
    #[error("navigation to {url} timed out after {timeout_secs}s")]
    NavigationTimeout { url: String, timeout_secs: u64 },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl HarvestError {
    pub fn code(&self) -> &'static str {
        match self {
            HarvestError::Authentication { .. } => "AUTHENTICATION_FAILED",
            HarvestError::ProfileNotFound { .. } => "PROFILE_NOT_FOUND",
            HarvestError::PrivateProfile { .. } => "PRIVATE_PROFILE",
            HarvestError::NavigationTimeout { .. } => "NAVIGATION_TIMEOUT",
            HarvestError::InvalidRequest(_) => "INVALID_REQUEST",
            HarvestError::Browser(_) => "SCRAPING_FAILED",
        }
    }

    /// Transport status a request/response front end should answer with.
    pub fn status_hint(&self) -> u16 {
        match self {
            HarvestError::Authentication { .. } => 401,
            HarvestError::ProfileNotFound { .. } => 404,
            HarvestError::PrivateProfile { .. } => 403,
            HarvestError::InvalidRequest(_) => 400,
            HarvestError::NavigationTimeout { .. } | HarvestError::Browser(_) => 500,
        }
    }

    /// Whether the caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarvestError::NavigationTimeout { .. } | HarvestError::Browser(_)
        )
    }
}

/// Failure while extracting one item. Absorbed by the extractor and recorded as a
/// `Failed` status on that item only.
#[derive(Debug, Error)]
#[error("extraction of item #{sequence} ({identity_key}) failed: {source}")]
pub struct ItemExtractionError {
    pub identity_key: String,
    pub sequence: usize,
    #[source]
    pub source: BrowserError,
}
