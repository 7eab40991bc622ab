//! # Export Module
//!
//! Retrieves annotation export archives from the remote dataset service.
//!
//! ## Lifecycle
//! 1. **Prepare** - check the destination directory before any remote call
//! 2. **Request** - create the export job on the server
//! 3. **Poll** - wait for the job to be flagged latest with a download URL
//! 4. **Download** - stream the archive into a scoped temp directory
//! 5. **Extract** - unpack into the destination
//! 6. **Cleanup** - delete the server-side job on every path, success or not
//!
//! The server-side export job is a scoped resource: once created it is
//! always deleted, and a deletion failure is reported alongside (never
//! instead of) whatever failed before it.

mod archive;
mod manager;

pub use manager::{ExportManager, ExportRequest};

use crate::core::remote::DatasetIdentifier;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Lifecycle of an export job as tracked by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    /// Creation request sent to the server
    Requested,
    /// Listed on the server but not yet ready for download
    Pending,
    /// Ready with a download URL
    Ready,
    /// Archive retrieved and extracted locally
    Downloaded,
    /// Server-side resource deleted
    Deleted,
    /// A step failed; deletion is still attempted
    Failed,
}

impl std::fmt::Display for ExportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ExportStage::Requested => "requested",
            ExportStage::Pending => "pending",
            ExportStage::Ready => "ready",
            ExportStage::Downloaded => "downloaded",
            ExportStage::Deleted => "deleted",
            ExportStage::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// What a successful retrieval returns: export job metadata plus the
/// extracted annotation files. The credentialed download URL is deliberately
/// absent.
#[derive(Debug, Clone, Serialize)]
pub struct ExportManifest {
    /// Server-side name of the export job (already deleted by the time the
    /// manifest is returned).
    pub name: String,
    /// Dataset the export was taken from.
    pub dataset: DatasetIdentifier,
    /// Annotation format reported by the server.
    pub format: Option<String>,
    /// Server-side creation timestamp, when reported.
    pub inserted_at: Option<DateTime<Utc>>,
    /// Number of dataset items requested for export.
    pub item_count: usize,
    /// Extracted annotation files, sorted.
    pub annotation_paths: Vec<PathBuf>,
}
