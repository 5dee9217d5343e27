//! Throttled access to the remote theme service.
//!
//! All outgoing calls flow through [`client::ApiClient`], which owns the
//! shared rate-limit state, paces requests against the server's call
//! budget and resolves retryable statuses internally. Endpoint wrappers
//! return typed payloads; downstream code never handles raw JSON.

pub mod bulk;
pub mod client;
pub mod error;
pub mod limits;
pub mod types;

pub use client::{ApiClient, ApiRequest, Method, RawResponse, Transport};
pub use error::ApiError;
