//! Error types for the tankobon library.
//!
//! Transport and persistence problems that a component can absorb are logged at
//! the component boundary; everything that leaves a chapter artifact incomplete
//! is returned as one of these variants.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the tankobon library.
#[derive(Debug, Error)]
pub enum TankobonError {
    // Resolution errors
    #[error("No match found for '{query}' on {catalog}")]
    NotFound { query: String, catalog: String },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("{failed} of {total} pages failed for chapter '{chapter}': {first}")]
    PageDownload {
        chapter: String,
        failed: usize,
        total: usize,
        /// Failure of the lowest-indexed page that failed.
        first: Box<TankobonError>,
    },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("XML error: {message}")]
    Xml { message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for tankobon operations.
pub type Result<T> = std::result::Result<T, TankobonError>;

impl From<std::io::Error> for TankobonError {
    fn from(err: std::io::Error) -> Self {
        TankobonError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for TankobonError {
    fn from(err: serde_json::Error) -> Self {
        TankobonError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for TankobonError {
    fn from(err: rusqlite::Error) -> Self {
        TankobonError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for TankobonError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TankobonError::Timeout(std::time::Duration::from_secs(0))
        } else {
            TankobonError::Network {
                message: err.to_string(),
                cause: err.url().map(|u| u.to_string()),
            }
        }
    }
}

impl From<zip::result::ZipError> for TankobonError {
    fn from(err: zip::result::ZipError) -> Self {
        TankobonError::Archive {
            message: err.to_string(),
        }
    }
}

impl TankobonError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        TankobonError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a not-found error for a query against a catalog.
    pub fn not_found(query: impl Into<String>, catalog: impl Into<String>) -> Self {
        TankobonError::NotFound {
            query: query.into(),
            catalog: catalog.into(),
        }
    }

    /// Whether this error means "no catalog match" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TankobonError::NotFound { .. })
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Network/connectivity error
    /// - -32002: Series not found
    /// - -32003: Download or archive failed
    /// - -32005: Validation error
    ///
    /// Everything else maps to -32603 (internal error).
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            TankobonError::Network { .. } | TankobonError::Timeout(_) => -32000,

            TankobonError::NotFound { .. } => -32002,

            TankobonError::DownloadFailed { .. }
            | TankobonError::PageDownload { .. }
            | TankobonError::Archive { .. } => -32003,

            TankobonError::Validation { .. } | TankobonError::Config { .. } => -32005,

            _ => -32603,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TankobonError::Network { .. } | TankobonError::Timeout(_) => true,
            TankobonError::DownloadFailed { message, .. } => {
                message.contains("status 5")
                    || message.contains("status 429")
                    || message.contains("status 408")
            }
            _ => false,
        }
    }
}
