//! Image format allow-list shared by ingestion and archive extraction.
//!
//! The remote filter only understands PNG and JPEG, and returns the same.
//! WebP is accepted on ingestion because the service decodes it, but an
//! archive entry with a `.webp` suffix is not considered a result image.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    /// File extensions associated with this format, primary first.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Png => &["png"],
            Self::Jpeg => &["jpg", "jpeg"],
            Self::WebP => &["webp"],
        }
    }

    /// Extension used when naming a part or an output file.
    pub fn primary_extension(self) -> &'static str {
        self.extensions()[0]
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Look up a format by extension, ignoring ASCII case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        [Self::Png, Self::Jpeg, Self::WebP]
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// Look up a format from a declared MIME type (parameters ignored).
    pub fn from_mime(mime: &str) -> Option<Self> {
        match media_type_essence(mime).as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }
}

/// Formats accepted when the user selects source images.
const INGEST_FORMATS: &[ImageFormat] = &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Formats recognised as result images inside a returned archive.
const RESULT_FORMATS: &[ImageFormat] = &[ImageFormat::Png, ImageFormat::Jpeg];

fn extension_of(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|e| e.to_str())
}

/// Format of a user-selected file, if it is one we submit.
pub fn ingest_format(name: &str) -> Option<ImageFormat> {
    extension_of(name)
        .and_then(ImageFormat::from_extension)
        .filter(|f| INGEST_FORMATS.contains(f))
}

/// Format of an archive entry, if it counts as a processed image.
pub fn result_format(name: &str) -> Option<ImageFormat> {
    extension_of(name)
        .and_then(ImageFormat::from_extension)
        .filter(|f| RESULT_FORMATS.contains(f))
}

/// Lowercased `type/subtype` of a Content-Type value, parameters stripped.
pub fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup_ignores_case() {
        assert_eq!(ImageFormat::from_extension("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("Jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("gif"), None);
    }

    #[test]
    fn result_formats_exclude_webp_and_text() {
        assert_eq!(result_format("a.png"), Some(ImageFormat::Png));
        assert_eq!(result_format("out/b.JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(result_format("c.webp"), None);
        assert_eq!(result_format("c.txt"), None);
        assert_eq!(result_format("no_extension"), None);
    }

    #[test]
    fn ingest_formats_include_webp() {
        assert_eq!(ingest_format("photo.webp"), Some(ImageFormat::WebP));
        assert_eq!(ingest_format("notes.md"), None);
    }

    #[test]
    fn mime_lookup_strips_parameters() {
        assert_eq!(
            ImageFormat::from_mime("image/PNG; charset=binary"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_mime("application/octet-stream"), None);
    }

    #[test]
    fn essence_is_lowercased_and_trimmed() {
        assert_eq!(media_type_essence(" Application/Zip ; q=1"), "application/zip");
        assert_eq!(media_type_essence(""), "");
    }

    #[test]
    fn primary_extension_and_mime() {
        assert_eq!(ImageFormat::Jpeg.primary_extension(), "jpg");
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
    }
}
