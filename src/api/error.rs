//! Error taxonomy for the theme service boundary.
//!
//! Rate limiting never appears here: 429s are retried inside the client.
//! Per-asset bulk failures are data (see [`crate::api::bulk`]), not errors.

use thiserror::Error;

/// A fatal theme service error, resolved at the API-client boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401: the token is missing, invalid or expired. Never retried.
    #[error("not authorized: the API token was rejected by the theme service")]
    Unauthorized,

    /// 403 with the service's "generated asset" marker; the message is
    /// surfaced verbatim.
    #[error("{0}")]
    ForbiddenGeneratedAsset(String),

    /// Any other 403.
    #[error(
        "not authorized to edit this theme; ask the store owner to grant you \
         theme access in the admin at {admin_url}"
    )]
    Forbidden { admin_url: String },

    /// 422: the service rejected the payload; includes the reported field
    /// errors as serialized by the server.
    #[error("the theme service rejected the request: {0}")]
    Validation(String),

    /// Other 4xx.
    #[error("client error (status {status})")]
    Client { status: u16 },

    /// 5xx. Never retried; re-run the sync once the service recovers.
    #[error("theme service error (status {status}); retry the sync later")]
    Server { status: u16 },

    /// 429 retry budget exhausted (only when a maximum is configured).
    #[error("rate limited: gave up after {0} retries")]
    RetriesExhausted(u32),

    /// Bulk write replied with something other than 207; nothing can be
    /// assumed applied.
    #[error("bulk upload failed with status {status} (expected 207)")]
    BulkStatus { status: u16 },

    /// The response body did not match the endpoint's documented shape.
    #[error("unexpected response from the theme service: {0}")]
    Payload(String),

    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
}
