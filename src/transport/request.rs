//! The submission request: an immutable, already-serialized aggregate.
//!
//! Built once when a submission starts and never mutated. Every parameter is
//! a text field; every source image is a binary part sent under the form
//! field [`FILE_FIELD`] with a positional file name:
//!
//! ```text
//! fovea_radius=50
//! input_image_resolution=260
//! ...
//! file: image_0.png  (image/png)
//! file: image_1.jpg  (image/jpeg)
//! ```
//!
//! Image bytes are shared with the ingestion store, not copied.

use crate::ingest::ImageIngestionStore;
use crate::params::ParameterSnapshot;
use std::sync::Arc;

/// Form field name every image part is sent under.
pub const FILE_FIELD: &str = "file";

/// One image in the multipart body.
#[derive(Debug, Clone)]
pub struct BinaryPart {
    file_name: String,
    content_type: &'static str,
    bytes: Arc<[u8]>,
}

impl BinaryPart {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    parameters: ParameterSnapshot,
    fields: Vec<(&'static str, String)>,
    parts: Vec<BinaryPart>,
}

impl SubmissionRequest {
    /// Serialize a parameter snapshot and the current image sequence.
    pub fn snapshot(parameters: ParameterSnapshot, images: &ImageIngestionStore) -> Self {
        let parts = images
            .images()
            .iter()
            .enumerate()
            .map(|(index, image)| BinaryPart {
                file_name: format!("image_{}.{}", index, image.format().primary_extension()),
                content_type: image.format().mime_type(),
                bytes: Arc::clone(image.bytes()),
            })
            .collect();
        Self {
            parameters,
            fields: parameters.fields(),
            parts,
        }
    }

    pub fn parameters(&self) -> &ParameterSnapshot {
        &self.parameters
    }

    pub fn fields(&self) -> &[(&'static str, String)] {
        &self.fields
    }

    pub fn parts(&self) -> &[BinaryPart] {
        &self.parts
    }

    pub fn image_count(&self) -> usize {
        self.parts.len()
    }

    /// Sum of image bytes in the body.
    pub fn payload_bytes(&self) -> usize {
        self.parts.iter().map(|p| p.bytes.len()).sum()
    }
}
