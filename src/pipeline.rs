//! The submission state machine.
//!
//! ```text
//!          submit()                 2xx + parsed
//!   Idle ───────────▶ Submitting ─────────────────▶ Success ──▶ Idle
//!    ▲                    │
//!    │                    │ non-2xx / network / timeout / corrupt archive
//!    │                    ▼
//!    └─────────────── Failed
//! ```
//!
//! ## Guards
//!
//! `submit` refuses to leave `Idle` when there are no images
//! ([`SubmitError::EmptySubmissionRejected`]) and is a no-op while another
//! submission is in flight ([`SubmitError::SubmissionInFlight`]). Neither
//! rejection changes state or touches the network.
//!
//! ## Snapshot
//!
//! `submit` checks the guards and copies parameters and images into a
//! [`SubmissionRequest`] when it is *called*, not when the returned future is
//! first polled. The future borrows only the pipeline, so both stores can be
//! edited while the request is in flight; those edits only affect the next
//! submission.
//!
//! ## Cancellation
//!
//! Dropping the submit future before it completes counts as a failure: the
//! pipeline emits `Failed`, passes through the `Failed` state and returns to
//! `Idle`, ready for the next submission. Earlier results are kept.
//!
//! ## Results
//!
//! On success the processed set is replaced as a whole and the previous one
//! is dropped. On failure it is left exactly as it was, so results from an
//! earlier successful run stay visible.

use crate::archive::{self, ArchiveError};
use crate::formats::media_type_essence;
use crate::ingest::ImageIngestionStore;
use crate::params::ParameterStore;
use crate::resource::ImageSet;
use crate::transport::{SubmissionRequest, Transport, TransportError, TransportResponse};
use serde::Serialize;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Content types that mark a response body as a zip archive.
const ARCHIVE_CONTENT_TYPES: &[&str] = &["application/zip", "application/x-zip-compressed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Submitting,
    Success,
    Failed,
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("no images selected, nothing to submit")]
    EmptySubmissionRejected,
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    ArchiveCorrupt(#[from] ArchiveError),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl SubmitError {
    /// True for guard rejections, which never leave `Idle`.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::EmptySubmissionRejected | Self::SubmissionInFlight
        )
    }
}

/// Progress notifications for whatever is displaying the run.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionEvent {
    StateChanged(PipelineState),
    Sending {
        images: usize,
        bytes: usize,
    },
    ResponseReceived {
        status: u16,
        content_type: Option<String>,
        bytes: usize,
    },
    Completed {
        processed: usize,
        from_archive: bool,
    },
    Failed {
        error: String,
    },
}

/// Summary of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionReport {
    pub submitted: usize,
    pub processed: usize,
    pub from_archive: bool,
}

pub struct SubmissionPipeline<T> {
    transport: T,
    timeout: Duration,
    state: Mutex<PipelineState>,
    processed: Mutex<ImageSet>,
    events: Option<Sender<SubmissionEvent>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_archive(content_type: Option<&str>) -> bool {
    content_type
        .map(media_type_essence)
        .is_some_and(|essence| ARCHIVE_CONTENT_TYPES.contains(&essence.as_str()))
}

/// Marks one submission as in flight. Dropping it settles the pipeline into
/// `outcome` (or `Failed`, if nothing was recorded) and then `Idle`.
struct InFlight<'a, T> {
    pipeline: &'a SubmissionPipeline<T>,
    outcome: Option<PipelineState>,
}

impl<T> InFlight<'_, T> {
    fn settle(mut self, outcome: PipelineState) {
        self.outcome = Some(outcome);
    }
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        let outcome = self.outcome.unwrap_or_else(|| {
            warn!("Submission dropped before completion");
            self.pipeline.emit(SubmissionEvent::Failed {
                error: "submission cancelled before completion".to_string(),
            });
            PipelineState::Failed
        });
        self.pipeline.transition(outcome);
        self.pipeline.transition(PipelineState::Idle);
    }
}

impl<T> SubmissionPipeline<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            state: Mutex::new(PipelineState::Idle),
            processed: Mutex::new(ImageSet::new()),
            events: None,
        }
    }

    /// Send progress events to `events` from now on.
    pub fn with_events(mut self, events: Sender<SubmissionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    /// Current processed images (cheap: bytes are shared).
    pub fn processed(&self) -> ImageSet {
        lock(&self.processed).clone()
    }

    /// Drop all processed results, e.g. when starting a new session.
    pub fn reset(&self) {
        lock(&self.processed).clear();
    }

    fn emit(&self, event: SubmissionEvent) {
        if let Some(tx) = &self.events {
            // A closed receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }

    fn transition(&self, next: PipelineState) {
        *lock(&self.state) = next;
        debug!("Pipeline state → {:?}", next);
        self.emit(SubmissionEvent::StateChanged(next));
    }

    /// Check the guards, enter `Submitting` and snapshot both stores.
    fn begin(
        &self,
        params: &ParameterStore,
        images: &ImageIngestionStore,
    ) -> Result<(InFlight<'_, T>, SubmissionRequest), SubmitError> {
        {
            let mut state = lock(&self.state);
            if *state == PipelineState::Submitting {
                debug!("Submit ignored: already submitting");
                return Err(SubmitError::SubmissionInFlight);
            }
            if images.is_empty() {
                debug!("Submit rejected: no images");
                return Err(SubmitError::EmptySubmissionRejected);
            }
            *state = PipelineState::Submitting;
        }
        debug!("Pipeline state → {:?}", PipelineState::Submitting);
        self.emit(SubmissionEvent::StateChanged(PipelineState::Submitting));

        let guard = InFlight {
            pipeline: self,
            outcome: None,
        };
        Ok((guard, SubmissionRequest::snapshot(params.snapshot(), images)))
    }
}

impl<T: Transport> SubmissionPipeline<T> {
    /// Start one submission cycle.
    ///
    /// Guards and the snapshot run before this returns; the future only
    /// borrows the pipeline and drives the exchange to completion.
    pub fn submit<'a>(
        &'a self,
        params: &ParameterStore,
        images: &ImageIngestionStore,
    ) -> impl Future<Output = Result<SubmissionReport, SubmitError>> + use<'a, T> {
        let started = self.begin(params, images);
        async move {
            let (guard, request) = started?;
            self.run(guard, request).await
        }
    }

    async fn run(
        &self,
        guard: InFlight<'_, T>,
        request: SubmissionRequest,
    ) -> Result<SubmissionReport, SubmitError> {
        info!(
            "Submitting {} images ({} bytes)",
            request.image_count(),
            request.payload_bytes()
        );
        self.emit(SubmissionEvent::Sending {
            images: request.image_count(),
            bytes: request.payload_bytes(),
        });

        match self.exchange(&request).await {
            Ok((results, from_archive)) => {
                let report = SubmissionReport {
                    submitted: request.image_count(),
                    processed: results.len(),
                    from_archive,
                };
                *lock(&self.processed) = results;
                info!("Received {} processed images", report.processed);
                self.emit(SubmissionEvent::Completed {
                    processed: report.processed,
                    from_archive,
                });
                guard.settle(PipelineState::Success);
                Ok(report)
            }
            Err(err) => {
                warn!("Submission failed: {}", err);
                self.emit(SubmissionEvent::Failed {
                    error: err.to_string(),
                });
                guard.settle(PipelineState::Failed);
                Err(err)
            }
        }
    }

    async fn exchange(&self, request: &SubmissionRequest) -> Result<(ImageSet, bool), SubmitError> {
        let response: TransportResponse =
            tokio::time::timeout(self.timeout, self.transport.send(request))
                .await
                .map_err(|_| SubmitError::Timeout(self.timeout))??;

        self.emit(SubmissionEvent::ResponseReceived {
            status: response.status,
            content_type: response.content_type.clone(),
            bytes: response.body.len(),
        });
        if !response.is_success() {
            return Err(TransportError::Status(response.status).into());
        }

        if is_archive(response.content_type.as_deref()) {
            Ok((archive::extract_images(&response.body)?, true))
        } else {
            Ok((
                archive::single_image(response.content_type.as_deref(), response.body),
                false,
            ))
        }
    }
}
