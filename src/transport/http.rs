//! `reqwest` transport: one multipart POST per submission.

use super::backend::{Transport, TransportError, TransportResponse};
use super::request::{FILE_FIELD, SubmissionRequest};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::debug;

pub struct HttpTransport {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpTransport {
    /// Build a transport for `url`. `timeout` bounds the whole exchange at the
    /// client level, in addition to the pipeline's own bounded wait.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| TransportError::InvalidRequest(format!("bad endpoint URL {url}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("eyeball-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

fn build_form(request: &SubmissionRequest) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for (name, value) in request.fields() {
        form = form.text(*name, value.clone());
    }
    for part in request.parts() {
        let body = Part::bytes(part.bytes().to_vec())
            .file_name(part.file_name().to_string())
            .mime_str(part.content_type())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        form = form.part(FILE_FIELD, body);
    }
    Ok(form)
}

impl Transport for HttpTransport {
    async fn send(&self, request: &SubmissionRequest) -> Result<TransportResponse, TransportError> {
        let form = build_form(request)?;
        debug!(
            "POST {} ({} fields, {} images, {} bytes)",
            self.url,
            request.fields().len(),
            request.image_count(),
            request.payload_bytes()
        );

        let response = self
            .client
            .post(self.url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?
            .to_vec();
        debug!(
            "Response {} ({}, {} bytes)",
            status,
            content_type.as_deref().unwrap_or("no content type"),
            body.len()
        );

        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ImageIngestionStore;
    use crate::params::ParameterStore;
    use crate::test_helpers::{jpeg_bytes, png_bytes};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, capture the raw request, answer with `status`.
    async fn serve_once(
        status: &'static str,
        content_type: &'static str,
        body: &'static [u8],
    ) -> (String, JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/process", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 8192];
            while !request_complete(&raw) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
            raw
        });
        (url, server)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&raw[..end]).to_lowercase();
        let length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok());
        match length {
            Some(length) => raw.len() >= end + 4 + length,
            None => raw.ends_with(b"0\r\n\r\n"),
        }
    }

    fn two_image_request() -> SubmissionRequest {
        let mut params = ParameterStore::new();
        params.set_fovea_radius(40);
        let mut images = ImageIngestionStore::new();
        images.add_bytes("a.png", png_bytes(2, 2)).unwrap();
        images.add_bytes("b.jpg", jpeg_bytes(2, 2)).unwrap();
        SubmissionRequest::snapshot(params.snapshot(), &images)
    }

    #[tokio::test]
    async fn posts_fields_and_file_parts() {
        let (url, server) = serve_once("200 OK", "application/zip", b"PK").await;
        let transport = HttpTransport::new(&url, Duration::from_secs(5)).unwrap();

        let response = transport.send(&two_image_request()).await.unwrap();
        let raw = String::from_utf8_lossy(&server.await.unwrap()).to_lowercase();

        assert!(raw.starts_with("post /process http/1.1"));
        assert!(raw.contains("content-type: multipart/form-data; boundary="));
        assert!(raw.contains("name=\"fovea_radius\"\r\n\r\n40\r\n"));
        assert!(raw.contains("name=\"kernel_value\"\r\n\r\n(3, 3)\r\n"));
        assert!(raw.contains("name=\"input_image_resolution\"\r\n\r\n260\r\n"));
        assert!(raw.contains(
            "name=\"file\"; filename=\"image_0.png\"\r\ncontent-type: image/png\r\n"
        ));
        assert!(raw.contains(
            "name=\"file\"; filename=\"image_1.jpg\"\r\ncontent-type: image/jpeg\r\n"
        ));
        assert_eq!(raw.matches("name=\"file\"").count(), 2);

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("application/zip"));
        assert_eq!(response.body, b"PK");
    }

    #[tokio::test]
    async fn error_status_is_returned_not_raised() {
        let (url, server) = serve_once("500 Internal Server Error", "text/plain", b"boom").await;
        let transport = HttpTransport::new(&url, Duration::from_secs(5)).unwrap();

        let response = transport.send(&two_image_request()).await.unwrap();
        server.await.unwrap();

        assert_eq!(response.status, 500);
        assert!(!response.is_success());
        assert_eq!(response.body, b"boom");
    }

    #[test]
    fn rejects_malformed_url() {
        let result = HttpTransport::new("not a url", Duration::from_secs(5));
        assert!(matches!(result, Err(TransportError::InvalidRequest(_))));
    }

    #[test]
    fn keeps_endpoint_url() {
        let transport =
            HttpTransport::new("https://example.invalid/process", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.url(), "https://example.invalid/process");
    }
}
