//! Request assembly and the network exchange.
//!
//! | Piece | Role |
//! |---|---|
//! | [`SubmissionRequest`] | Write-once snapshot of parameters + images, already serialized |
//! | [`Transport`] | One POST, one response; the seam tests replace |
//! | [`HttpTransport`] | Production `reqwest` multipart implementation |

pub mod backend;
pub mod http;
pub mod request;

pub use backend::{Transport, TransportError, TransportResponse};
pub use http::HttpTransport;
pub use request::{BinaryPart, FILE_FIELD, SubmissionRequest};
