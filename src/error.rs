use thiserror::Error;

/// Failure of a single fetch. Nothing is retried; the first failure is final.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Host unreachable, transport broke mid-body, or an unexpected HTTP status.
    #[error("network failure: {message}")]
    NetworkFailure {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The host does not serve a file for this identifier (missing or not shared).
    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// The destination could not be written.
    #[error("io failure on {path}")]
    IoFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type FetchResult<T> = Result<T, FetchError>;

impl FetchError {
    pub(crate) fn network<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FetchError::NetworkFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn status(url: &str, status: reqwest::StatusCode) -> Self {
        FetchError::NetworkFailure {
            message: format!("{url} returned {status}"),
            source: None,
        }
    }

    pub(crate) fn invalid(identifier: &str, reason: impl Into<String>) -> Self {
        FetchError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        FetchError::IoFailure {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn is_invalid_identifier(&self) -> bool {
        matches!(self, FetchError::InvalidIdentifier { .. })
    }

    pub fn is_network_failure(&self) -> bool {
        matches!(self, FetchError::NetworkFailure { .. })
    }

    pub fn is_io_failure(&self) -> bool {
        matches!(self, FetchError::IoFailure { .. })
    }
}
