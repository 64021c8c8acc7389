//! Transport trait and the shapes of an exchange.
//!
//! The production implementation is [`HttpTransport`](super::http::HttpTransport).
//! Tests substitute a recording mock so the pipeline can be exercised without
//! a network.

use super::request::SubmissionRequest;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Connection, TLS or body-read failure.
    #[error("network error: {0}")]
    Network(String),
    /// The endpoint answered outside 200–299.
    #[error("HTTP error! status: {0}")]
    Status(u16),
    /// The request could not be built (bad URL, bad MIME type).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Raw answer from the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// A 200 response with the given content type.
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            body,
        }
    }

    /// A bodyless response with the given status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one submission and returns the raw response.
///
/// Implementations report every HTTP status as `Ok`; classifying status codes
/// is the pipeline's job.
pub trait Transport {
    fn send(
        &self,
        request: &SubmissionRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>>;
}
