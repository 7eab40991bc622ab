//! Duplicate detection over a batch of image ids.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::info;

use super::{AverageFingerprinter, DuplicateScanResult, Fingerprint, ImageSource};
use crate::error::DedupError;
use crate::events::{null_sender, DedupEvent, DedupProgress, Event, EventSender};

/// Partitions a batch of images into representatives and duplicates.
///
/// Classification is a left-to-right fold over the input order: the first
/// image seen with a fingerprint becomes its representative, every later
/// image with that fingerprint is a duplicate. Fingerprint computation can
/// optionally run in parallel; the fold itself always runs in input order,
/// so first-seen semantics are identical either way.
pub struct DuplicateScanner {
    fingerprinter: AverageFingerprinter,
    parallel: bool,
}

impl DuplicateScanner {
    pub fn new() -> Self {
        Self {
            fingerprinter: AverageFingerprinter::new(),
            parallel: false,
        }
    }

    /// Compute fingerprints across worker threads.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Scan without progress reporting.
    pub fn scan(
        &self,
        image_ids: &[String],
        source: &dyn ImageSource,
    ) -> Result<DuplicateScanResult, DedupError> {
        self.scan_with_events(image_ids, source, &null_sender())
    }

    /// Scan a batch, emitting progress events.
    pub fn scan_with_events(
        &self,
        image_ids: &[String],
        source: &dyn ImageSource,
        events: &EventSender,
    ) -> Result<DuplicateScanResult, DedupError> {
        events.send(Event::Dedup(DedupEvent::Started {
            total_images: image_ids.len(),
        }));

        let fingerprints = if self.parallel {
            self.fingerprints_parallel(image_ids, source, events)?
        } else {
            self.fingerprints_sequential(image_ids, source, events)?
        };

        let result = fold_fingerprints(fingerprints);
        info!(
            representatives = result.representatives().len(),
            duplicates = result.duplicates().len(),
            duplicate_ratio = result.duplicate_ratio(),
            "duplicate scan complete"
        );
        events.send(Event::Dedup(DedupEvent::Completed {
            representatives: result.representatives().len(),
            duplicates: result.duplicates().len(),
        }));
        Ok(result)
    }

    fn fingerprints_sequential(
        &self,
        image_ids: &[String],
        source: &dyn ImageSource,
        events: &EventSender,
    ) -> Result<Vec<(String, Fingerprint)>, DedupError> {
        let total = image_ids.len();
        let mut fingerprints = Vec::with_capacity(total);
        for (index, image_id) in image_ids.iter().enumerate() {
            let image = source.load(image_id)?;
            fingerprints.push((image_id.clone(), self.fingerprinter.fingerprint(&image)));
            events.send(Event::Dedup(DedupEvent::Progress(DedupProgress {
                completed: index + 1,
                total,
                current_id: image_id.clone(),
            })));
        }
        Ok(fingerprints)
    }

    /// Parallel fingerprinting. Collecting through rayon preserves input
    /// order, which the fold depends on.
    fn fingerprints_parallel(
        &self,
        image_ids: &[String],
        source: &dyn ImageSource,
        events: &EventSender,
    ) -> Result<Vec<(String, Fingerprint)>, DedupError> {
        let total = image_ids.len();
        let completed = AtomicUsize::new(0);
        image_ids
            .par_iter()
            .map(|image_id| {
                let image = source.load(image_id)?;
                let fingerprint = self.fingerprinter.fingerprint(&image);
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                events.send(Event::Dedup(DedupEvent::Progress(DedupProgress {
                    completed: done,
                    total,
                    current_id: image_id.clone(),
                })));
                Ok((image_id.clone(), fingerprint))
            })
            .collect()
    }
}

impl Default for DuplicateScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// The left-to-right fold: first seen wins, later holders of the same
/// fingerprint are duplicates. An id that is already a representative is
/// never demoted by a repeated appearance in the input.
fn fold_fingerprints(fingerprints: Vec<(String, Fingerprint)>) -> DuplicateScanResult {
    let mut by_fingerprint: HashMap<Fingerprint, String> = HashMap::new();
    let mut representative_ids: HashSet<String> = HashSet::new();
    let mut duplicate_ids: HashSet<String> = HashSet::new();
    let mut representatives = Vec::new();
    let mut duplicates = Vec::new();

    for (image_id, fingerprint) in fingerprints {
        match by_fingerprint.entry(fingerprint) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(image_id.clone());
                representative_ids.insert(image_id.clone());
                representatives.push(image_id);
            }
            std::collections::hash_map::Entry::Occupied(_) => {
                if !representative_ids.contains(&image_id) && duplicate_ids.insert(image_id.clone())
                {
                    duplicates.push(image_id);
                }
            }
        }
    }

    DuplicateScanResult::from_parts(representatives, duplicates, by_fingerprint)
}
