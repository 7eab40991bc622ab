//! Image loading for the duplicate detector.

use crate::error::DedupError;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Resolves an image id to a decoded image.
///
/// Implement this trait to feed the detector from somewhere other than a
/// local directory (or to stub it out in tests).
pub trait ImageSource: Send + Sync {
    fn load(&self, image_id: &str) -> Result<DynamicImage, DedupError>;
}

/// Loads `{root}/{id}.jpg` from a directory of downloaded images.
pub struct DirectoryImageSource {
    root: PathBuf,
}

impl DirectoryImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The path an image id resolves to.
    pub fn path_for(&self, image_id: &str) -> PathBuf {
        self.root.join(format!("{image_id}.jpg"))
    }

    /// Harvest image ids from the directory's top-level JPEG filenames,
    /// sorted for deterministic batch order.
    pub fn discover_ids(&self) -> Result<Vec<String>, DedupError> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| DedupError::ReadDirectory {
                path: self.root.clone(),
                source: err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk error")),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_jpeg = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
                .unwrap_or(false);
            if !is_jpeg {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ImageSource for DirectoryImageSource {
    fn load(&self, image_id: &str) -> Result<DynamicImage, DedupError> {
        let path = self.path_for(image_id);
        if !path.exists() {
            return Err(DedupError::ImageNotFound {
                image_id: image_id.to_string(),
                path,
            });
        }
        decode(image_id, &path)
    }
}

fn decode(image_id: &str, path: &Path) -> Result<DynamicImage, DedupError> {
    image::open(path).map_err(|err| DedupError::Decode {
        image_id: image_id.to_string(),
        reason: err.to_string(),
    })
}
