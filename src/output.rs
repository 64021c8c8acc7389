//! CLI output formatting and result saving.
//!
//! This is the display surface for the terminal: the library core only
//! produces [`ImageSet`]s and [`SubmissionEvent`]s, and everything the user
//! sees is rendered here.
//!
//! # Output Format
//!
//! ## Parameters
//!
//! ```text
//! Parameters
//!     fovea_radius = 50
//!     kernel_value = (5, 5)
//!     input_image_resolution = 260
//! ```
//!
//! ## Image sets
//!
//! Each item leads with its positional index and name, followed by its pixel
//! size and encoded size. Items that cannot be rendered are hidden and only
//! counted.
//!
//! ```text
//! Processed (2 images)
//!     001 a.png  260x260  14.2 KB
//!     002 b.jpg  260x260  9.8 KB
//!     (1 not displayable)
//! ```
//!
//! ## Submission progress
//!
//! ```text
//! Submitting 2 images (23.9 KB)
//! Response 200 (application/zip, 24.0 KB)
//! Received 2 processed images from archive
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure, with no I/O.

use crate::params::ParameterSnapshot;
use crate::pipeline::{PipelineState, SubmissionEvent};
use crate::resource::{ImageResource, ImageSet};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the run description written next to saved results.
pub const MANIFEST_FILE: &str = "manifest.json";

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Format every parameter in transmission order, by wire name.
pub fn format_parameters(snapshot: &ParameterSnapshot) -> Vec<String> {
    let mut lines = vec!["Parameters".to_string()];
    for (name, value) in snapshot.fields() {
        lines.push(format!("{}{} = {}", indent(1), name, value));
    }
    lines
}

pub fn print_parameters(snapshot: &ParameterSnapshot) {
    print_lines(format_parameters(snapshot));
}

// ============================================================================
// Image sets
// ============================================================================

fn image_line(index: usize, image: &ImageResource) -> String {
    match image.dimensions() {
        Some(d) => format!(
            "{} {}  {}x{}  {}",
            format_index(index),
            image.name(),
            d.width,
            d.height,
            format_bytes(image.len())
        ),
        None => format!("{} {}  {}", format_index(index), image.name(), format_bytes(image.len())),
    }
}

/// Format an image set under `title`. Non-displayable items are hidden;
/// positional indices count only the items that are shown.
pub fn format_image_set(title: &str, set: &ImageSet) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", title, plural(set.len(), "image"))];
    let mut hidden = 0;
    let mut shown = 0;
    for image in set {
        if !image.is_displayable() {
            hidden += 1;
            continue;
        }
        shown += 1;
        lines.push(format!("{}{}", indent(1), image_line(shown, image)));
    }
    if hidden > 0 {
        lines.push(format!("{}({} not displayable)", indent(1), hidden));
    }
    lines
}

pub fn print_image_set(title: &str, set: &ImageSet) {
    print_lines(format_image_set(title, set));
}

// ============================================================================
// Submission progress
// ============================================================================

/// Format a single submission progress event as display lines.
///
/// `Idle` and `Submitting` transitions are implied by the surrounding lines
/// and render as nothing.
pub fn format_submission_event(event: &SubmissionEvent) -> Vec<String> {
    match event {
        SubmissionEvent::StateChanged(PipelineState::Success) => vec!["Done".to_string()],
        SubmissionEvent::StateChanged(PipelineState::Failed) => {
            vec!["Submission failed; previous results kept".to_string()]
        }
        SubmissionEvent::StateChanged(_) => Vec::new(),
        SubmissionEvent::Sending { images, bytes } => vec![format!(
            "Submitting {} ({})",
            plural(*images, "image"),
            format_bytes(*bytes)
        )],
        SubmissionEvent::ResponseReceived {
            status,
            content_type,
            bytes,
        } => vec![format!(
            "Response {} ({}, {})",
            status,
            content_type.as_deref().unwrap_or("no content type"),
            format_bytes(*bytes)
        )],
        SubmissionEvent::Completed {
            processed,
            from_archive,
        } => {
            let source = if *from_archive { "archive" } else { "single file" };
            vec![format!(
                "Received {} from {}",
                plural(*processed, "processed image"),
                source
            )]
        }
        SubmissionEvent::Failed { error } => vec![format!("{}Error: {}", indent(1), error)],
    }
}

pub fn print_submission_event(event: &SubmissionEvent) {
    print_lines(format_submission_event(event));
}

// ============================================================================
// Saving results
// ============================================================================

#[derive(Debug, Serialize)]
struct RunManifest<'a> {
    parameters: &'a ParameterSnapshot,
    images: Vec<SavedImage>,
}

#[derive(Debug, Serialize)]
struct SavedImage {
    file: String,
    source_name: String,
    format: crate::formats::ImageFormat,
    width: Option<u32>,
    height: Option<u32>,
    bytes: usize,
}

/// Output file name for the `pos`-th (1-based) processed image.
///
/// Archive entries may carry directories (`out/a.png`); the path is
/// flattened so every file lands directly in the output directory.
fn saved_file_name(pos: usize, name: &str) -> String {
    let flat: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("processed_{}_{}", format_index(pos), flat.trim_start_matches('.'))
}

/// Write every image in `set` to `dir` plus a `manifest.json` describing the
/// run. Returns the paths of the image files in set order.
pub fn save_image_set(
    set: &ImageSet,
    parameters: &ParameterSnapshot,
    dir: &Path,
) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(set.len());
    let mut images = Vec::with_capacity(set.len());
    for (i, image) in set.iter().enumerate() {
        let file = saved_file_name(i + 1, image.name());
        let path = dir.join(&file);
        fs::write(&path, image.bytes())?;
        images.push(SavedImage {
            file,
            source_name: image.name().to_string(),
            format: image.format(),
            width: image.dimensions().map(|d| d.width),
            height: image.dimensions().map(|d| d.height),
            bytes: image.len(),
        });
        paths.push(path);
    }
    let manifest = RunManifest { parameters, images };
    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(dir.join(MANIFEST_FILE), json)?;
    Ok(paths)
}
