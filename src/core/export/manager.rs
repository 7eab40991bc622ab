//! Export lifecycle manager implementation.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::{info, warn};
use uuid::Uuid;

use super::{archive, ExportManifest, ExportStage};
use crate::core::remote::{
    ArchiveFetcher, DatasetIdentifier, ExportRecord, ExportRequestOptions, RemoteDatasetService,
};
use crate::error::ExportError;
use crate::events::{null_sender, Event, EventSender, ExportEvent};

/// Default wait between export listing polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One export retrieval request.
///
/// When `name` is `None` a unique name is generated per call, so concurrent
/// retrievals on the same dataset cannot collide. Callers that pin a fixed
/// name take on the precondition that no other export under that name is in
/// flight for the dataset.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub dataset: DatasetIdentifier,
    /// Dataset item ids to include in the export.
    pub item_ids: Vec<String>,
    /// Directory the annotation files are extracted into.
    pub destination: PathBuf,
    /// Remove pre-existing top-level files from the destination instead of
    /// failing with `DestinationNotEmpty`.
    pub clear_existing: bool,
    /// How long to wait for the export to become ready. Checked only
    /// before the download begins.
    pub timeout: Duration,
    /// Server-side export name; generated when absent.
    pub name: Option<String>,
    /// Format and token options forwarded to the creation request.
    pub options: ExportRequestOptions,
}

impl ExportRequest {
    pub fn new(dataset: DatasetIdentifier, item_ids: Vec<String>, destination: PathBuf) -> Self {
        Self {
            dataset,
            item_ids,
            destination,
            clear_existing: false,
            timeout: Duration::from_secs(60),
            name: None,
            options: ExportRequestOptions::default(),
        }
    }
}

/// The export record once it is ready, paired with its download URL.
struct ReadyExport {
    record: ExportRecord,
    url: String,
}

/// Orchestrates the export lifecycle against the remote dataset service.
pub struct ExportManager {
    service: Box<dyn RemoteDatasetService>,
    fetcher: Box<dyn ArchiveFetcher>,
    poll_interval: Duration,
}

impl ExportManager {
    pub fn new(service: Box<dyn RemoteDatasetService>, fetcher: Box<dyn ArchiveFetcher>) -> Self {
        Self {
            service,
            fetcher,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll interval (tests use a near-zero interval).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Retrieve an export without progress reporting.
    pub fn retrieve(&self, request: &ExportRequest) -> Result<ExportManifest, ExportError> {
        self.retrieve_with_events(request, &null_sender())
    }

    /// Retrieve an export, emitting progress events.
    ///
    /// Fails with `DestinationNotEmpty` before any remote call when the
    /// destination holds files and `clear_existing` is off. After the export
    /// job is created, its deletion is attempted on every path; a deletion
    /// failure surfaces as `CleanupFailed` carrying any primary failure.
    ///
    /// The manager assumes exclusive write access to the destination for the
    /// duration of the call and takes no lock; concurrent calls against the
    /// same destination are unsupported.
    pub fn retrieve_with_events(
        &self,
        request: &ExportRequest,
        events: &EventSender,
    ) -> Result<ExportManifest, ExportError> {
        prepare_destination(&request.destination, request.clear_existing)?;

        let name = request
            .name
            .clone()
            .unwrap_or_else(generate_export_name);

        self.service.create_export(
            &request.dataset,
            &name,
            &request.item_ids,
            &request.options,
        )?;
        info!(
            dataset = %request.dataset,
            name = %name,
            items = request.item_ids.len(),
            stage = %ExportStage::Requested,
            "export requested"
        );
        events.send(Event::Export(ExportEvent::Requested {
            dataset: request.dataset.to_string(),
            name: name.clone(),
            item_count: request.item_ids.len(),
        }));

        // The job now exists on the server. Everything from here runs under
        // the two-phase contract: retrieve, then delete no matter what.
        let outcome = self.fetch_and_extract(request, &name, events);

        events.send(Event::Export(ExportEvent::CleanupStarted { name: name.clone() }));
        let cleanup = self.service.delete_export(&request.dataset, &name);

        match (outcome, cleanup) {
            (Ok(manifest), Ok(())) => {
                info!(name = %name, stage = %ExportStage::Deleted, "export cleaned up");
                events.send(Event::Export(ExportEvent::CleanupFinished { name }));
                Ok(manifest)
            }
            (Ok(_), Err(source)) => Err(ExportError::CleanupFailed {
                name,
                source,
                primary: None,
            }),
            (Err(primary), Ok(())) => {
                warn!(name = %name, stage = %ExportStage::Failed, error = %primary, "export failed");
                events.send(Event::Export(ExportEvent::CleanupFinished { name }));
                Err(primary)
            }
            (Err(primary), Err(source)) => Err(ExportError::CleanupFailed {
                name,
                source,
                primary: Some(Box::new(primary)),
            }),
        }
    }

    fn fetch_and_extract(
        &self,
        request: &ExportRequest,
        name: &str,
        events: &EventSender,
    ) -> Result<ExportManifest, ExportError> {
        let ready = self.wait_until_ready(&request.dataset, name, request.timeout, events)?;

        // Scoped staging directory; removed by RAII on every exit path.
        let staging = TempDir::new().map_err(|source| ExportError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let archive_path = staging.path().join("export.zip");

        events.send(Event::Export(ExportEvent::DownloadStarted {
            name: name.to_string(),
        }));
        let bytes = self.fetcher.fetch(&ready.url, &archive_path)?;
        info!(name, bytes, "export archive downloaded");
        events.send(Event::Export(ExportEvent::Downloaded {
            name: name.to_string(),
            bytes,
        }));

        events.send(Event::Export(ExportEvent::Extracting {
            destination: request.destination.clone(),
        }));
        let annotation_paths = archive::unzip_to_dir(&archive_path, &request.destination)?;
        info!(
            name,
            files = annotation_paths.len(),
            stage = %ExportStage::Downloaded,
            "export archive extracted"
        );
        events.send(Event::Export(ExportEvent::Extracted {
            file_count: annotation_paths.len(),
        }));

        Ok(ExportManifest {
            name: name.to_string(),
            dataset: request.dataset.clone(),
            format: ready.record.format,
            inserted_at: ready.record.inserted_at,
            item_count: request.item_ids.len(),
            annotation_paths,
        })
    }

    /// Poll the export listing until the named export is latest and carries
    /// a download URL.
    ///
    /// 4xx responses abort immediately; other remote failures count as a
    /// missed poll attempt and are retried on the next interval.
    fn wait_until_ready(
        &self,
        dataset: &DatasetIdentifier,
        name: &str,
        timeout: Duration,
        events: &EventSender,
    ) -> Result<ReadyExport, ExportError> {
        let started = Instant::now();
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.service.list_exports(dataset) {
                Ok(records) => {
                    let entry = records
                        .into_iter()
                        .find(|record| record.name == name && record.is_ready());
                    if let Some(record) = entry {
                        if let Some(url) = record.download_url.clone() {
                            info!(name, attempt, stage = %ExportStage::Ready, "export ready");
                            events.send(Event::Export(ExportEvent::Ready {
                                name: name.to_string(),
                            }));
                            return Ok(ReadyExport { record, url });
                        }
                    }
                }
                Err(err) if err.is_client_error() => return Err(err.into()),
                Err(err) => {
                    warn!(name, attempt, error = %err, "export poll failed, will retry");
                    events.send(Event::Export(ExportEvent::Error {
                        message: err.to_string(),
                    }));
                }
            }

            if started.elapsed() >= timeout {
                return Err(ExportError::Timeout {
                    name: name.to_string(),
                    waited: started.elapsed(),
                });
            }
            tracing::debug!(name, attempt, stage = %ExportStage::Pending, "export not ready yet");
            events.send(Event::Export(ExportEvent::Waiting {
                name: name.to_string(),
                attempt,
            }));
            std::thread::sleep(self.poll_interval);
        }
    }
}

/// Generate a per-call unique export name.
fn generate_export_name() -> String {
    format!("export-{}", Uuid::new_v4().simple())
}

/// Check the destination before any remote work happens.
///
/// Missing directories are created. Non-empty directories fail unless
/// `clear_existing` is set, in which case top-level files are removed;
/// subdirectories are left untouched.
fn prepare_destination(destination: &Path, clear_existing: bool) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: destination.to_path_buf(),
        source,
    };

    if !destination.exists() {
        std::fs::create_dir_all(destination).map_err(io_err)?;
        return Ok(());
    }

    let entries = std::fs::read_dir(destination)
        .map_err(io_err)?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(io_err)?;
    if entries.is_empty() {
        return Ok(());
    }
    if !clear_existing {
        return Err(ExportError::DestinationNotEmpty {
            path: destination.to_path_buf(),
        });
    }

    for entry in entries {
        let file_type = entry.file_type().map_err(io_err)?;
        if file_type.is_dir() {
            continue;
        }
        std::fs::remove_file(entry.path()).map_err(|source| ExportError::Io {
            path: entry.path(),
            source,
        })?;
    }
    Ok(())
}
