//! # Eyeball Client
//!
//! Client core for a remote simulated-vision filter. The user tunes a set of
//! fovea and periphery parameters, picks source images, and submits both to
//! a processing service in one multipart request. The service answers with
//! either a single processed image or a zip archive of them, which is unpacked
//! into a displayable set.
//!
//! # Architecture: One Submission Cycle
//!
//! ```text
//! ParameterStore ─┐
//!                 ├─▶ SubmissionRequest ─▶ Transport ─▶ response
//! ImageIngestion ─┘     (snapshot)          (POST)        │
//!                                                          ▼
//!                         processed ImageSet ◀── archive / single image
//! ```
//!
//! The two stores are edited freely at any time. A submission copies both into
//! an immutable [`transport::SubmissionRequest`] as soon as `submit` is called, so edits
//! made while a request is in flight only affect the next one.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`params`] | Parameter store with clamping setters, snapshots, wire encoding |
//! | [`ingest`] | Source image store: single files, folders, capacity limit |
//! | [`resource`] | Image resources, display references and ordered sets |
//! | [`formats`] | PNG / JPEG / WebP allow-lists by extension and MIME type |
//! | [`transport`] | Request assembly, the `Transport` trait, the `reqwest` implementation |
//! | [`pipeline`] | Submission state machine: guards, timeout, result replacement |
//! | [`archive`] | Zip payload → ordered processed image set |
//! | [`config`] | `eyeball.toml` loading, validation and merging |
//! | [`output`] | CLI formatting and saving results to disk |
//!
//! # Design Decisions
//!
//! ## Clamp, Don't Reject
//!
//! Parameter setters never fail on numeric input. Out-of-range values snap to
//! the nearest bound, so what is displayed is always what will be sent. Only
//! enumerated fields (kernel, fovea type, booleans typed as text) can produce
//! a [`params::ParamError`].
//!
//! ## Failures Keep Earlier Results
//!
//! A failed submission (HTTP status, network, timeout, corrupt archive) leaves
//! the previously processed set untouched and returns the pipeline to `Idle`.
//! Nothing is retried automatically.
//!
//! ## Shared Bytes
//!
//! Image payloads are `Arc<[u8]>`. The request snapshot, the source store and
//! any display surface share one buffer; it is freed when the last holder lets
//! go, which for processed images is the moment a newer result set replaces it.

pub mod archive;
pub mod config;
pub mod formats;
pub mod ingest;
pub mod output;
pub mod params;
pub mod pipeline;
pub mod resource;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_helpers;
