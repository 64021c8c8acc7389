//! Unpacks an archive payload into processed image resources.
//!
//! Entries are read in archive order. Directories and entries without an
//! image suffix (see [`formats::result_format`]) are skipped silently. Header
//! probing runs in parallel with rayon, but the returned set always follows
//! archive order, so the same payload yields the same sequence every time.
//!
//! Any failure to parse the container or read an entry is
//! [`ArchiveError::Corrupt`]; nothing partial is returned. Sizes declared in
//! entry headers are never trusted: each entry is read through a hard cap of
//! [`MAX_ENTRY_BYTES`], and an entry that runs past it fails the archive.

use crate::formats::{self, ImageFormat};
use crate::resource::{ImageResource, ImageSet};
use rayon::prelude::*;
use std::io::{Cursor, Read};
use thiserror::Error;
use tracing::debug;

/// Largest decompressed entry accepted from a result archive.
pub const MAX_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive is corrupt: {0}")]
    Corrupt(String),
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Extract every image entry of a zip payload, in archive order.
pub fn extract_images(payload: &[u8]) -> Result<ImageSet, ArchiveError> {
    extract_images_capped(payload, MAX_ENTRY_BYTES)
}

fn extract_images_capped(payload: &[u8], max_entry_bytes: u64) -> Result<ImageSet, ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(payload))?;

    let mut entries: Vec<(String, ImageFormat, Vec<u8>)> = Vec::new();
    let mut skipped = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let Some(format) = formats::result_format(&name) else {
            skipped += 1;
            continue;
        };
        let mut bytes = Vec::new();
        entry
            .by_ref()
            .take(max_entry_bytes + 1)
            .read_to_end(&mut bytes)?;
        if bytes.len() as u64 > max_entry_bytes {
            return Err(ArchiveError::Corrupt(format!(
                "entry {name} exceeds {max_entry_bytes} bytes"
            )));
        }
        entries.push((name, format, bytes));
    }

    let images: ImageSet = entries
        .into_par_iter()
        .map(|(name, format, bytes)| ImageResource::new(name, format, bytes))
        .collect();

    debug!(
        "Extracted {} images from archive ({} non-image entries skipped)",
        images.len(),
        skipped
    );
    Ok(images)
}

/// Wrap a single-image response body as a one-item set.
///
/// The format comes from the declared content type; anything unrecognised
/// is treated as PNG, which is what the service produces.
pub fn single_image(content_type: Option<&str>, body: Vec<u8>) -> ImageSet {
    let format = content_type
        .and_then(ImageFormat::from_mime)
        .unwrap_or(ImageFormat::Png);
    let name = format!("processed.{}", format.primary_extension());
    std::iter::once(ImageResource::new(name, format, body)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{jpeg_bytes, png_bytes, zip_bytes};

    fn names(set: &ImageSet) -> Vec<&str> {
        set.iter().map(ImageResource::name).collect()
    }

    #[test]
    fn keeps_only_image_entries() {
        let zip = zip_bytes(&[
            ("a.png", png_bytes(2, 2)),
            ("b.jpg", jpeg_bytes(2, 2)),
            ("c.txt", b"log".to_vec()),
        ]);
        let set = extract_images(&zip).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(names(&set), ["a.png", "b.jpg"]);
    }

    #[test]
    fn order_follows_archive_and_is_stable() {
        let zip = zip_bytes(&[
            ("z.png", png_bytes(1, 1)),
            ("m.jpeg", jpeg_bytes(1, 1)),
            ("a.png", png_bytes(1, 1)),
        ]);
        let first = extract_images(&zip).unwrap();
        let second = extract_images(&zip).unwrap();
        assert_eq!(names(&first), ["z.png", "m.jpeg", "a.png"]);
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn nested_paths_are_kept_as_names() {
        let zip = zip_bytes(&[("out/one.png", png_bytes(1, 1))]);
        let set = extract_images(&zip).unwrap();
        assert_eq!(names(&set), ["out/one.png"]);
    }

    #[test]
    fn empty_archive_yields_empty_set() {
        let zip = zip_bytes(&[]);
        assert!(extract_images(&zip).unwrap().is_empty());
    }

    #[test]
    fn undecodable_entry_is_kept_but_not_displayable() {
        let zip = zip_bytes(&[("broken.png", b"\x89PNG garbage".to_vec())]);
        let set = extract_images(&zip).unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set.iter().next().unwrap().is_displayable());
    }

    #[test]
    fn oversized_entry_is_corrupt() {
        let zip = zip_bytes(&[("big.png", png_bytes(16, 16))]);
        let result = extract_images_capped(&zip, 8);
        assert!(matches!(result, Err(ArchiveError::Corrupt(msg)) if msg.contains("big.png")));
    }

    #[test]
    fn entry_at_cap_is_accepted() {
        let bytes = png_bytes(2, 2);
        let zip = zip_bytes(&[("fit.png", bytes.clone())]);
        let set = extract_images_capped(&zip, bytes.len() as u64).unwrap();
        assert_eq!(set.total_bytes(), bytes.len());
    }

    /// Overwrite the uncompressed-size slot of every zip64 extra field that
    /// currently records `actual`.
    fn forge_zip64_sizes(archive: &mut [u8], actual: u64, forged: u64) -> usize {
        let mut patched = 0;
        let mut i = 0;
        while i + 12 <= archive.len() {
            let is_zip64_header = archive[i] == 0x01 && archive[i + 1] == 0x00;
            let field_len = u16::from_le_bytes([archive[i + 2], archive[i + 3]]) as usize;
            if is_zip64_header
                && field_len >= 8
                && archive[i + 4..i + 12] == actual.to_le_bytes()
            {
                archive[i + 4..i + 12].copy_from_slice(&forged.to_le_bytes());
                patched += 1;
                i += 12;
            } else {
                i += 1;
            }
        }
        patched
    }

    #[test]
    fn forged_entry_size_does_not_panic() {
        let image = png_bytes(1, 1);
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .large_file(true);
        writer.start_file("huge.png", options).unwrap();
        std::io::Write::write_all(&mut writer, &image).unwrap();
        let mut archive = writer.finish().unwrap().into_inner();

        let patched = forge_zip64_sizes(&mut archive, image.len() as u64, 0xFFFF_FFFF_FFFF_FFF0);
        assert!(patched >= 1);

        // Either the reader rejects the header or it reads what is really there.
        match extract_images(&archive) {
            Ok(set) => assert!(set.total_bytes() <= archive.len()),
            Err(ArchiveError::Corrupt(_)) => {}
        }
    }

    #[test]
    fn garbage_payload_is_corrupt() {
        let result = extract_images(b"definitely not a zip file");
        assert!(matches!(result, Err(ArchiveError::Corrupt(_))));
    }

    #[test]
    fn single_image_uses_declared_type() {
        let set = single_image(Some("image/jpeg"), jpeg_bytes(3, 2));
        assert_eq!(names(&set), ["processed.jpg"]);
        assert!(set.iter().next().unwrap().is_displayable());
    }

    #[test]
    fn single_image_defaults_to_png() {
        let set = single_image(None, png_bytes(1, 1));
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().format(), ImageFormat::Png);
    }
}
