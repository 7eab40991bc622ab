//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Export lifecycle events
    Export(ExportEvent),
    /// Duplicate detection events
    Dedup(DedupEvent),
}

/// Events during the export lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExportEvent {
    /// The export job was requested on the server
    Requested {
        dataset: String,
        name: String,
        item_count: usize,
    },
    /// A poll attempt found the export not yet ready
    Waiting { name: String, attempt: usize },
    /// The export reported ready with a download URL
    Ready { name: String },
    /// Archive download started
    DownloadStarted { name: String },
    /// Archive download finished
    Downloaded { name: String, bytes: u64 },
    /// Archive extraction into the destination started
    Extracting { destination: PathBuf },
    /// Archive extraction finished
    Extracted { file_count: usize },
    /// Server-side export deletion started
    CleanupStarted { name: String },
    /// Server-side export deletion finished
    CleanupFinished { name: String },
    /// A non-fatal error occurred (e.g. a tolerated poll failure)
    Error { message: String },
}

/// Events during duplicate detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DedupEvent {
    /// Fingerprinting has started
    Started { total_images: usize },
    /// Progress update during fingerprinting
    Progress(DedupProgress),
    /// Detection completed
    Completed {
        representatives: usize,
        duplicates: usize,
    },
}

/// Progress information during fingerprinting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupProgress {
    /// Number of images fingerprinted so far
    pub completed: usize,
    /// Total number of images in the batch
    pub total: usize,
    /// Id of the image just fingerprinted
    pub current_id: String,
}
