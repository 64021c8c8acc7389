//! Source image ingestion.
//!
//! Holds the user's selected images in selection order. That order is part of
//! the wire contract: the image at position `i` is submitted as
//! `image_<i>.<ext>`.
//!
//! ```text
//! add_single(dawn.jpg)      → [dawn.jpg]
//! add_single(dusk.png)      → [dawn.jpg, dusk.png]
//! add_from_folder(shots/)   → [dawn.jpg, dusk.png, shots/a.png, shots/b.jpg]
//! ```
//!
//! Folder ingestion takes the image files directly inside the folder, sorted
//! by file name, and skips everything else. A single file with an extension
//! outside the allow-list is rejected instead.

use crate::formats::{self, ImageFormat};
use crate::resource::{ImageResource, ImageSet, ResourceId};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Default upper bound on held source images.
pub const DEFAULT_MAX_IMAGES: usize = 500;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Unsupported image type: {0}")]
    UnsupportedFormat(String),
    #[error("Image limit reached ({limit} images)")]
    CapacityExceeded { limit: usize },
}

/// The user's source images for the next submission.
#[derive(Debug, Clone)]
pub struct ImageIngestionStore {
    images: ImageSet,
    folder_label: Option<String>,
    max_images: usize,
}

impl Default for ImageIngestionStore {
    fn default() -> Self {
        Self::with_capacity_limit(DEFAULT_MAX_IMAGES)
    }
}

impl ImageIngestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(max_images: usize) -> Self {
        Self {
            images: ImageSet::new(),
            folder_label: None,
            max_images,
        }
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Name of the last folder loaded, for display only.
    pub fn folder_label(&self) -> Option<&str> {
        self.folder_label.as_deref()
    }

    fn ensure_room(&self, additional: usize) -> Result<(), IngestError> {
        if self.images.len() + additional > self.max_images {
            return Err(IngestError::CapacityExceeded {
                limit: self.max_images,
            });
        }
        Ok(())
    }

    /// Append one in-memory image. `name` decides the format.
    pub fn add_bytes(
        &mut self,
        name: &str,
        bytes: impl Into<std::sync::Arc<[u8]>>,
    ) -> Result<ResourceId, IngestError> {
        let format = formats::ingest_format(name)
            .ok_or_else(|| IngestError::UnsupportedFormat(name.to_string()))?;
        self.ensure_room(1)?;
        Ok(self.images.push(ImageResource::new(name, format, bytes)))
    }

    /// Append one image file from disk.
    pub fn add_single(&mut self, path: &Path) -> Result<ResourceId, IngestError> {
        let name = file_name(path);
        if formats::ingest_format(&name).is_none() {
            return Err(IngestError::UnsupportedFormat(path.display().to_string()));
        }
        self.ensure_room(1)?;
        let bytes = read(path)?;
        let id = self.add_bytes(&name, bytes)?;
        debug!("Added {} as resource {}", path.display(), id.value());
        Ok(id)
    }

    /// Append every image directly inside `dir`, sorted by file name.
    ///
    /// The whole batch is checked against the capacity limit before anything
    /// is added, so a rejected folder leaves the store unchanged.
    pub fn add_from_folder(&mut self, dir: &Path) -> Result<Vec<ResourceId>, IngestError> {
        let mut batch: Vec<(PathBuf, ImageFormat)> = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match formats::ingest_format(&name) {
                Some(format) => batch.push((entry.into_path(), format)),
                None => debug!("Skipping non-image file {}", entry.path().display()),
            }
        }
        self.ensure_room(batch.len())?;

        let mut loaded = Vec::with_capacity(batch.len());
        for (path, format) in &batch {
            loaded.push(ImageResource::new(file_name(path), *format, read(path)?));
        }
        let ids = loaded.into_iter().map(|r| self.images.push(r)).collect();

        self.folder_label = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .or_else(|| Some(dir.display().to_string()));
        debug!("Loaded {} images from {}", batch.len(), dir.display());
        Ok(ids)
    }

    /// Release one image.
    pub fn remove(&mut self, id: ResourceId) -> bool {
        self.images.remove(id).is_some()
    }

    /// Release every image and forget the folder label.
    pub fn clear(&mut self) {
        self.images.clear();
        self.folder_label = None;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read(path: &Path) -> Result<Vec<u8>, IngestError> {
    std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}
