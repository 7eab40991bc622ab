//! # Error Module
//!
//! Error types for the export lifecycle and duplicate detection.
//!
//! ## Design Principles
//! - **Never panic** on remote or user data - return errors instead
//! - **Include context** - dataset slugs, endpoints, paths
//! - **Nothing masked** - a cleanup failure carries the primary failure
//!   instead of replacing it

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AnnoFetchError {
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Deduplication error: {0}")]
    Dedup(#[from] DedupError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors from the export lifecycle manager
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Destination directory already contains files: {path}")]
    DestinationNotEmpty { path: PathBuf },

    #[error("Timed out after {waited:?} waiting for export '{name}' to become ready")]
    Timeout { name: String, waited: Duration },

    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Failed to download export archive: {0}")]
    Download(#[from] TransferError),

    #[error("Export archive is corrupt: {reason}")]
    ArchiveCorrupt { reason: String },

    #[error("Failed to delete export '{name}' on the server: {source}")]
    CleanupFailed {
        name: String,
        #[source]
        source: RemoteError,
        /// The failure that preceded cleanup, if retrieval itself failed.
        /// `None` means the export was retrieved successfully and only the
        /// server-side deletion failed.
        primary: Option<Box<ExportError>>,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Human-readable summary of what preceded a cleanup failure.
    pub fn cleanup_context(&self) -> Option<String> {
        match self {
            ExportError::CleanupFailed { primary: None, .. } => {
                Some("export data was retrieved successfully".to_string())
            }
            ExportError::CleanupFailed {
                primary: Some(primary),
                ..
            } => Some(format!("after earlier failure: {primary}")),
            _ => None,
        }
    }
}

/// Errors from calls to the remote dataset service
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("{method} {endpoint} returned HTTP {status}")]
    Status {
        method: &'static str,
        endpoint: String,
        status: u16,
    },

    #[error("{method} {endpoint} failed: {message}")]
    Transport {
        method: &'static str,
        endpoint: String,
        message: String,
    },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl RemoteError {
    /// 4xx responses indicate a caller or authentication problem and are
    /// never worth retrying.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RemoteError::Status { status, .. } if (400..500).contains(status))
    }
}

/// Errors during streamed archive download
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Download request failed: {message}")]
    Http { message: String },

    #[error("Download returned HTTP {status}")]
    Status { status: u16 },

    #[error("Response exceeded the {limit_bytes} byte limit")]
    TooLarge { limit_bytes: u64 },

    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the duplicate detector
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Image not found for id '{image_id}': {path}")]
    ImageNotFound { image_id: String, path: PathBuf },

    #[error("Failed to decode image '{image_id}': {reason}")]
    Decode { image_id: String, reason: String },

    #[error("Failed to read image directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors loading remote API configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("No API key configured. Set ANNO_FETCH_API_KEY or add api_key to the config file.")]
    MissingApiKey,

    #[error("No team slug configured. Set ANNO_FETCH_TEAM or add team_slug to the config file.")]
    MissingTeam,
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, AnnoFetchError>;
