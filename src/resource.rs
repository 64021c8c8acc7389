//! Binary image resources and the ordered sets that own them.
//!
//! An [`ImageSet`] is the single owner of its resources: it hands out
//! [`ResourceId`]s as display references and is the only place a resource is
//! released (on [`ImageSet::remove`], [`ImageSet::clear`] or when the whole
//! set is replaced and dropped). Bytes are shared read-only through `Arc`, so
//! a submission snapshot can keep a resource alive after the set lets go of
//! it without copying the buffer.
//!
//! A reference that no longer resolves is not an error. Display code treats
//! it as "hide this item".

use crate::formats::ImageFormat;
use image::ImageReader;
use rayon::iter::{FromParallelIterator, IntoParallelIterator};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Display reference to a resource. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Pixel size read from the image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// One image held client-side, either user-selected or returned by the service.
#[derive(Debug, Clone)]
pub struct ImageResource {
    id: ResourceId,
    name: String,
    format: ImageFormat,
    bytes: Arc<[u8]>,
    dimensions: Option<Dimensions>,
}

impl ImageResource {
    /// Wrap raw bytes, probing the header for dimensions.
    ///
    /// Bytes that do not decode still produce a resource; it simply has no
    /// dimensions and is hidden by display code.
    pub fn new(name: impl Into<String>, format: ImageFormat, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let dimensions = probe_dimensions(&bytes);
        Self {
            id: ResourceId::next(),
            name: name.into(),
            format,
            bytes,
            dimensions,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    /// Whether a display surface can render this resource.
    pub fn is_displayable(&self) -> bool {
        self.dimensions.is_some()
    }
}

/// Read width and height from an encoded image without decoding pixels.
pub fn probe_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some(Dimensions { width, height })
}

/// Ordered collection of resources. Insertion order is display order.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    items: Vec<ImageResource>,
}

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: ImageResource) -> ResourceId {
        let id = resource.id();
        self.items.push(resource);
        id
    }

    /// Release one resource. Returns it if the id was held by this set.
    pub fn remove(&mut self, id: ResourceId) -> Option<ImageResource> {
        let pos = self.items.iter().position(|r| r.id() == id)?;
        Some(self.items.remove(pos))
    }

    /// Release every resource.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn resolve(&self, id: ResourceId) -> Option<&ImageResource> {
        self.items.iter().find(|r| r.id() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageResource> {
        self.items.iter()
    }

    pub fn ids(&self) -> Vec<ResourceId> {
        self.items.iter().map(ImageResource::id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total bytes held by the set.
    pub fn total_bytes(&self) -> usize {
        self.items.iter().map(ImageResource::len).sum()
    }
}

impl FromIterator<ImageResource> for ImageSet {
    fn from_iter<I: IntoIterator<Item = ImageResource>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Collecting from an indexed parallel iterator keeps source order.
impl FromParallelIterator<ImageResource> for ImageSet {
    fn from_par_iter<I>(par_iter: I) -> Self
    where
        I: IntoParallelIterator<Item = ImageResource>,
    {
        Self {
            items: Vec::from_par_iter(par_iter),
        }
    }
}

impl<'a> IntoIterator for &'a ImageSet {
    type Item = &'a ImageResource;
    type IntoIter = std::slice::Iter<'a, ImageResource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
