//! Bulk upload coordination.
//!
//! One bulk write per batch: the service replies 207 with one result entry
//! per submitted asset, in request order. Entries are correlated back to
//! their originating asset by the key reported in the reply when present,
//! falling back to positional order. Per-asset failures are data; only a
//! non-207 overall status is an error.

use serde::Deserialize;
use serde_json::{Value, json};

use super::client::{ApiClient, ApiRequest};
use super::error::ApiError;
use super::types::{AssetParams, ThemeAsset};

/// Outcome of one asset within a bulk write.
#[derive(Debug)]
pub struct UploadResult {
    pub key: String,
    pub success: bool,
    /// Per-asset status code from the 207 body
    pub code: u16,
    /// Operation the service performed (defaults to "upload")
    pub operation: String,
    /// Server-reported errors for failed assets
    pub errors: Option<Value>,
    /// The written asset, echoed back on success
    pub asset: Option<ThemeAsset>,
}

#[derive(Debug, Deserialize)]
struct BulkEnvelope {
    results: Vec<BulkEntry>,
}

#[derive(Debug, Deserialize)]
struct BulkEntry {
    code: u16,
    #[serde(default)]
    body: Option<BulkEntryBody>,
}

#[derive(Debug, Default, Deserialize)]
struct BulkEntryBody {
    #[serde(default)]
    asset: Option<ThemeAsset>,
    #[serde(default)]
    errors: Option<Value>,
    #[serde(default)]
    operation: Option<String>,
}

/// Write one batch of assets, returning per-asset results in input order.
///
/// A non-207 overall status raises: nothing can be assumed applied. With a
/// 207, the caller decides whether per-asset failures abort the larger
/// sync or are merely logged.
pub fn upload_batch(
    client: &ApiClient,
    theme_id: u64,
    assets: &[AssetParams],
) -> Result<Vec<UploadResult>, ApiError> {
    let request = ApiRequest::put(
        format!("themes/{theme_id}/assets/bulk"),
        json!({ "assets": assets }),
    );
    let response = client.call(&request)?;
    if response.status != 207 {
        return Err(ApiError::BulkStatus {
            status: response.status,
        });
    }

    let envelope: BulkEnvelope = response.json()?;
    if envelope.results.len() != assets.len() {
        return Err(ApiError::Payload(format!(
            "bulk reply has {} results for {} assets",
            envelope.results.len(),
            assets.len()
        )));
    }

    let results = envelope
        .results
        .into_iter()
        .zip(assets)
        .map(|(entry, input)| {
            let body = entry.body.unwrap_or_default();
            // Prefer the key the service reports; positional otherwise.
            let key = body
                .asset
                .as_ref()
                .map(|a| a.key.clone())
                .unwrap_or_else(|| input.key.clone());
            UploadResult {
                key,
                success: (200..300).contains(&entry.code),
                code: entry.code,
                operation: body.operation.unwrap_or_else(|| "upload".to_string()),
                errors: body.errors,
                asset: body.asset,
            }
        })
        .collect();

    Ok(results)
}
