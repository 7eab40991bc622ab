//! # Remote Module
//!
//! The seam between the export manager and the annotation platform.
//!
//! ## Collaborators
//! - [`RemoteDatasetService`] - export job CRUD and dataset item listing,
//!   implemented over HTTP by [`DarwinClient`]
//! - [`ArchiveFetcher`] - streamed download of a URL to a local path
//!
//! Both are traits so tests can inject spies without a network.

mod darwin;
mod transfer;

pub use darwin::DarwinClient;
pub use transfer::HttpArchiveFetcher;

use crate::error::{RemoteError, TransferError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A dataset slug, validated to be non-empty and URL-safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetIdentifier(String);

impl DatasetIdentifier {
    /// Parse a dataset slug. Rejects empty strings and path separators,
    /// which would corrupt endpoint URLs.
    pub fn parse(slug: &str) -> Option<Self> {
        let slug = slug.trim();
        if slug.is_empty() || slug.contains('/') || slug.contains(char::is_whitespace) {
            return None;
        }
        Some(Self(slug.to_string()))
    }

    /// The raw slug.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DatasetIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One export entry as reported by the server's export listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub name: String,
    /// Whether this entry supersedes earlier exports under the same name.
    #[serde(default)]
    pub latest: bool,
    /// Present only once the export is ready for download. Short-lived and
    /// credentialed; never exposed in manifests.
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub inserted_at: Option<DateTime<Utc>>,
}

impl ExportRecord {
    /// An export is ready once the server flags it latest and hands out a
    /// download URL.
    pub fn is_ready(&self) -> bool {
        self.latest && self.download_url.is_some()
    }
}

/// One dataset item as reported by the server's item listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Options sent along with an export creation request.
#[derive(Debug, Clone)]
pub struct ExportRequestOptions {
    /// Annotation format to export ("json" for the vendor's JSON format).
    pub format: String,
    /// Include annotator authorship in the export.
    pub include_authorship: bool,
    /// Embed an access token in the download URL.
    pub include_export_token: bool,
}

impl Default for ExportRequestOptions {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            include_authorship: true,
            include_export_token: true,
        }
    }
}

/// Export job CRUD and dataset item listing on the annotation platform.
///
/// Every call is a synchronous request; non-2xx responses surface as
/// [`RemoteError::Status`].
pub trait RemoteDatasetService: Send + Sync {
    /// Request creation of an export job over the given item ids.
    fn create_export(
        &self,
        dataset: &DatasetIdentifier,
        name: &str,
        item_ids: &[String],
        options: &ExportRequestOptions,
    ) -> Result<(), RemoteError>;

    /// List every export job currently known for the dataset.
    fn list_exports(&self, dataset: &DatasetIdentifier) -> Result<Vec<ExportRecord>, RemoteError>;

    /// Delete the export job with the given name.
    fn delete_export(&self, dataset: &DatasetIdentifier, name: &str) -> Result<(), RemoteError>;

    /// List dataset items, optionally filtered to the given workflow
    /// statuses (comma-separated, e.g. `"review,complete"`).
    fn list_items(
        &self,
        dataset: &DatasetIdentifier,
        statuses: Option<&str>,
    ) -> Result<Vec<ItemRecord>, RemoteError>;
}

/// Streamed byte download of a URL to a local path.
pub trait ArchiveFetcher: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransferError>;
}
