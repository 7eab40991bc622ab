//! Integration tests for the export lifecycle manager.
//!
//! These tests drive the full retrieve flow against spy collaborators:
//! - Precondition failures make no remote calls
//! - The server-side export is always deleted, exactly once
//! - Cleanup failures never mask (or get masked by) earlier failures
//! - Extraction round-trips a synthetic archive

use anno_fetch::core::export::{ExportManager, ExportRequest};
use anno_fetch::core::remote::{
    ArchiveFetcher, DatasetIdentifier, ExportRecord, ExportRequestOptions, ItemRecord,
    RemoteDatasetService,
};
use anno_fetch::error::{ExportError, RemoteError, TransferError};
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted outcome for one `list_exports` call.
enum ListReply {
    /// Export exists but has no download URL yet
    NotReady,
    /// Export is latest and downloadable at the given URL
    Ready(&'static str),
    /// Remote failure with the given HTTP status
    Fail(u16),
}

/// Spy implementation of the remote service.
///
/// `list_exports` consumes scripted replies; once the script runs out it
/// keeps answering `NotReady`, which lets timeout tests poll forever.
struct SpyService {
    script: Mutex<VecDeque<ListReply>>,
    created_name: Mutex<Option<String>>,
    create_calls: AtomicUsize,
    list_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    deleted_names: Mutex<Vec<String>>,
    delete_error: Mutex<Option<RemoteError>>,
}

impl SpyService {
    fn new(script: Vec<ListReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            created_name: Mutex::new(None),
            create_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            deleted_names: Mutex::new(Vec::new()),
            delete_error: Mutex::new(None),
        }
    }

    fn failing_delete(self, status: u16) -> Self {
        *self.delete_error.lock().unwrap() = Some(RemoteError::Status {
            method: "DELETE",
            endpoint: "/exports".to_string(),
            status,
        });
        self
    }

    fn remote_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
            + self.list_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }
}

impl RemoteDatasetService for SpyService {
    fn create_export(
        &self,
        _dataset: &DatasetIdentifier,
        name: &str,
        _item_ids: &[String],
        options: &ExportRequestOptions,
    ) -> Result<(), RemoteError> {
        assert_eq!(options.format, "json");
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        *self.created_name.lock().unwrap() = Some(name.to_string());
        Ok(())
    }

    fn list_exports(&self, _dataset: &DatasetIdentifier) -> Result<Vec<ExportRecord>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let name = self
            .created_name
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "unnamed".to_string());
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ListReply::NotReady);
        match reply {
            ListReply::NotReady => Ok(vec![ExportRecord {
                name,
                latest: true,
                download_url: None,
                format: Some("json".to_string()),
                inserted_at: None,
            }]),
            ListReply::Ready(url) => Ok(vec![ExportRecord {
                name,
                latest: true,
                download_url: Some(url.to_string()),
                format: Some("json".to_string()),
                inserted_at: None,
            }]),
            ListReply::Fail(status) => Err(RemoteError::Status {
                method: "GET",
                endpoint: "/exports".to_string(),
                status,
            }),
        }
    }

    fn delete_export(&self, _dataset: &DatasetIdentifier, name: &str) -> Result<(), RemoteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.deleted_names.lock().unwrap().push(name.to_string());
        match self.delete_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn list_items(
        &self,
        _dataset: &DatasetIdentifier,
        _statuses: Option<&str>,
    ) -> Result<Vec<ItemRecord>, RemoteError> {
        Ok(Vec::new())
    }
}

/// Fetcher that writes fixed bytes instead of touching the network.
struct FixtureFetcher {
    bytes: Vec<u8>,
}

impl ArchiveFetcher for FixtureFetcher {
    fn fetch(&self, _url: &str, dest: &Path) -> Result<u64, TransferError> {
        std::fs::write(dest, &self.bytes)?;
        Ok(self.bytes.len() as u64)
    }
}

/// Fetcher that always fails.
struct BrokenFetcher;

impl ArchiveFetcher for BrokenFetcher {
    fn fetch(&self, _url: &str, _dest: &Path) -> Result<u64, TransferError> {
        Err(TransferError::Status { status: 403 })
    }
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

fn annotation_zip() -> Vec<u8> {
    zip_bytes(&[
        ("img_a.json", br#"{"image": "img_a"}"#),
        ("img_b.json", br#"{"image": "img_b"}"#),
    ])
}

fn request(dest: PathBuf) -> ExportRequest {
    let dataset = DatasetIdentifier::parse("bumper-2021").unwrap();
    let mut request = ExportRequest::new(
        dataset,
        vec!["item1".to_string(), "item2".to_string()],
        dest,
    );
    request.timeout = Duration::from_millis(50);
    request
}

/// Arc wrapper so tests keep a handle on the spy after boxing it.
struct SharedService(std::sync::Arc<SpyService>);

impl RemoteDatasetService for SharedService {
    fn create_export(
        &self,
        dataset: &DatasetIdentifier,
        name: &str,
        item_ids: &[String],
        options: &ExportRequestOptions,
    ) -> Result<(), RemoteError> {
        self.0.create_export(dataset, name, item_ids, options)
    }

    fn list_exports(&self, dataset: &DatasetIdentifier) -> Result<Vec<ExportRecord>, RemoteError> {
        self.0.list_exports(dataset)
    }

    fn delete_export(&self, dataset: &DatasetIdentifier, name: &str) -> Result<(), RemoteError> {
        self.0.delete_export(dataset, name)
    }

    fn list_items(
        &self,
        dataset: &DatasetIdentifier,
        statuses: Option<&str>,
    ) -> Result<Vec<ItemRecord>, RemoteError> {
        self.0.list_items(dataset, statuses)
    }
}

fn build_manager(
    service: &std::sync::Arc<SpyService>,
    fetcher: impl ArchiveFetcher + 'static,
) -> ExportManager {
    ExportManager::new(Box::new(SharedService(service.clone())), Box::new(fetcher))
        .with_poll_interval(Duration::from_millis(1))
}

#[test]
fn non_empty_destination_makes_no_remote_calls() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("stale.json"), b"{}").unwrap();

    let service = std::sync::Arc::new(SpyService::new(vec![]));
    let manager = build_manager(
        &service,
        FixtureFetcher {
            bytes: annotation_zip(),
        },
    );

    let err = manager
        .retrieve(&request(temp.path().to_path_buf()))
        .unwrap_err();

    assert!(matches!(err, ExportError::DestinationNotEmpty { .. }));
    assert_eq!(service.remote_calls(), 0);
}

#[test]
fn round_trip_extracts_exactly_the_archive_entries() {
    let temp = assert_fs::TempDir::new().unwrap();
    let dest = temp.path().join("annos");

    let service = std::sync::Arc::new(SpyService::new(vec![ListReply::Ready(
        "https://example.com/export.zip",
    )]));
    let manager = build_manager(
        &service,
        FixtureFetcher {
            bytes: annotation_zip(),
        },
    );

    let manifest = manager.retrieve(&request(dest.clone())).unwrap();

    assert_eq!(
        manifest.annotation_paths,
        vec![dest.join("img_a.json"), dest.join("img_b.json")]
    );
    temp.child("annos/img_a.json")
        .assert(predicate::path::exists());
    temp.child("annos/img_b.json")
        .assert(predicate::str::contains("img_b"));
    assert_eq!(manifest.item_count, 2);
    assert_eq!(manifest.format.as_deref(), Some("json"));
    // Exactly one cleanup call, for the job that was created.
    assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
    let created = service.created_name.lock().unwrap().clone().unwrap();
    assert_eq!(*service.deleted_names.lock().unwrap(), vec![created]);
}

#[test]
fn fixed_export_name_is_used_verbatim() {
    let temp = tempfile::tempdir().unwrap();

    let service = std::sync::Arc::new(SpyService::new(vec![ListReply::Ready(
        "https://example.com/export.zip",
    )]));
    let manager = build_manager(
        &service,
        FixtureFetcher {
            bytes: annotation_zip(),
        },
    );

    let mut req = request(temp.path().join("annos"));
    req.name = Some("export_tmp".to_string());
    manager.retrieve(&req).unwrap();

    assert_eq!(
        *service.deleted_names.lock().unwrap(),
        vec!["export_tmp".to_string()]
    );
}

#[test]
fn timeout_still_deletes_the_export_once() {
    let temp = tempfile::tempdir().unwrap();

    // Script stays empty: every poll answers NotReady.
    let service = std::sync::Arc::new(SpyService::new(vec![]));
    let manager = build_manager(
        &service,
        FixtureFetcher {
            bytes: annotation_zip(),
        },
    );

    let err = manager.retrieve(&request(temp.path().join("annos"))).unwrap_err();

    assert!(matches!(err, ExportError::Timeout { .. }));
    assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
    let created = service.created_name.lock().unwrap().clone().unwrap();
    assert_eq!(*service.deleted_names.lock().unwrap(), vec![created]);
}

#[test]
fn cleanup_failure_after_success_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("annos");

    let service = std::sync::Arc::new(
        SpyService::new(vec![ListReply::Ready("https://example.com/export.zip")])
            .failing_delete(500),
    );
    let manager = build_manager(
        &service,
        FixtureFetcher {
            bytes: annotation_zip(),
        },
    );

    let err = manager.retrieve(&request(dest.clone())).unwrap_err();

    match err {
        ExportError::CleanupFailed { primary, .. } => assert!(primary.is_none()),
        other => panic!("expected CleanupFailed, got {other:?}"),
    }
    // The data itself was retrieved before cleanup failed.
    assert!(dest.join("img_a.json").exists());
}

#[test]
fn cleanup_failure_carries_the_primary_failure() {
    let temp = tempfile::tempdir().unwrap();

    let service = std::sync::Arc::new(
        SpyService::new(vec![ListReply::Ready("https://example.com/export.zip")])
            .failing_delete(500),
    );
    let manager = build_manager(&service, BrokenFetcher);

    let err = manager.retrieve(&request(temp.path().join("annos"))).unwrap_err();

    match err {
        ExportError::CleanupFailed { primary, .. } => {
            let primary = primary.expect("primary failure must be preserved");
            assert!(matches!(*primary, ExportError::Download(_)));
        }
        other => panic!("expected CleanupFailed, got {other:?}"),
    }
}

#[test]
fn client_error_during_polling_aborts_and_cleans_up() {
    let temp = tempfile::tempdir().unwrap();

    let service = std::sync::Arc::new(SpyService::new(vec![ListReply::Fail(401)]));
    let manager = build_manager(
        &service,
        FixtureFetcher {
            bytes: annotation_zip(),
        },
    );

    let err = manager.retrieve(&request(temp.path().join("annos"))).unwrap_err();

    match err {
        ExportError::Remote(remote) => assert!(remote.is_client_error()),
        other => panic!("expected Remote, got {other:?}"),
    }
    assert_eq!(service.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn transient_poll_failure_is_retried() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("annos");

    let service = std::sync::Arc::new(SpyService::new(vec![
        ListReply::Fail(503),
        ListReply::NotReady,
        ListReply::Ready("https://example.com/export.zip"),
    ]));
    let manager = build_manager(
        &service,
        FixtureFetcher {
            bytes: annotation_zip(),
        },
    );

    let mut req = request(dest);
    req.timeout = Duration::from_secs(5);
    let manifest = manager.retrieve(&req).unwrap();

    assert_eq!(manifest.annotation_paths.len(), 2);
    assert_eq!(service.list_calls.load(Ordering::SeqCst), 3);
}

#[test]
fn corrupt_archive_fails_but_still_cleans_up() {
    let temp = tempfile::tempdir().unwrap();

    let service = std::sync::Arc::new(SpyService::new(vec![ListReply::Ready(
        "https://example.com/export.zip",
    )]));
    let manager = build_manager(
        &service,
        FixtureFetcher {
            bytes: b"definitely not a zip".to_vec(),
        },
    );

    let err = manager.retrieve(&request(temp.path().join("annos"))).unwrap_err();

    assert!(matches!(err, ExportError::ArchiveCorrupt { .. }));
    assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn clear_existing_replaces_top_level_files() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("annos");
    std::fs::create_dir(&dest).unwrap();
    std::fs::write(dest.join("stale.json"), b"{}").unwrap();

    let service = std::sync::Arc::new(SpyService::new(vec![ListReply::Ready(
        "https://example.com/export.zip",
    )]));
    let manager = build_manager(
        &service,
        FixtureFetcher {
            bytes: annotation_zip(),
        },
    );

    let mut req = request(dest.clone());
    req.clear_existing = true;
    let manifest = manager.retrieve(&req).unwrap();

    assert!(!dest.join("stale.json").exists());
    assert_eq!(manifest.annotation_paths.len(), 2);
}

#[test]
fn traversal_entries_cannot_escape_the_destination() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("annos");

    let service = std::sync::Arc::new(SpyService::new(vec![ListReply::Ready(
        "https://example.com/export.zip",
    )]));
    let manager = build_manager(
        &service,
        FixtureFetcher {
            bytes: zip_bytes(&[("../escape.json", b"{}"), ("ok.json", b"{}")]),
        },
    );

    let manifest = manager.retrieve(&request(dest.clone())).unwrap();

    assert_eq!(manifest.annotation_paths, vec![dest.join("ok.json")]);
    assert!(!temp.path().join("escape.json").exists());
}
