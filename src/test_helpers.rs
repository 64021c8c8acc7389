//! Shared test utilities: tiny encoded images, zip payloads and a mock
//! transport that records every exchange.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let zip = zip_bytes(&[("a.png", png_bytes(2, 2)), ("c.txt", b"hi".to_vec())]);
//! let transport = MockTransport::replying(TransportResponse::ok("application/zip", zip));
//! ```

use image::{ImageFormat, RgbImage};
use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

use crate::transport::{SubmissionRequest, Transport, TransportError, TransportResponse};

// =========================================================================
// Encoded images
// =========================================================================

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 40) as u8, (y * 40) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// A valid PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// A valid JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

/// Build an in-memory zip archive from `(name, bytes)` entries, in order.
pub fn zip_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Temp directory populated with the given files.
pub fn dir_with_files(files: &[(&str, Vec<u8>)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (name, bytes) in files {
        std::fs::write(tmp.path().join(name), bytes).unwrap();
    }
    tmp
}

// =========================================================================
// Mock transport
// =========================================================================

/// What a recorded request looked like, without the image bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub fields: Vec<(String, String)>,
    pub file_names: Vec<String>,
}

/// Transport that replies with canned responses and records requests.
///
/// Uses Mutex (not RefCell) so the pipeline can be shared by reference across
/// concurrently polled futures in one test.
pub struct MockTransport {
    replies: Mutex<Vec<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    /// Reply to every request with the same response.
    pub fn replying(response: TransportResponse) -> Self {
        Self::with_replies(vec![Ok(response)])
    }

    /// Reply with each result in order; the last one repeats.
    pub fn with_replies(replies: Vec<Result<TransportResponse, TransportError>>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep this long before replying (use with paused tokio time).
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_reply(&self) -> Result<TransportResponse, TransportError> {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop().unwrap()
        } else {
            replies
                .last()
                .cloned()
                .unwrap_or_else(|| Err(TransportError::Network("no mock reply".into())))
        }
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: &SubmissionRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            fields: request
                .fields()
                .iter()
                .map(|(n, v)| (n.to_string(), v.clone()))
                .collect(),
            file_names: request
                .parts()
                .iter()
                .map(|p| p.file_name().to_string())
                .collect(),
        });
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.next_reply()
    }
}
