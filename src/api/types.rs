//! Typed payloads for the theme service endpoints.
//!
//! Every endpoint's response is validated into one of these shapes at the
//! client boundary, so the sync and preview layers never see loose JSON.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// A remotely hosted theme.
#[derive(Debug, Clone, Deserialize)]
pub struct Theme {
    pub id: u64,
    pub name: String,
    pub role: ThemeRole,
    /// Remote-side async creation still in progress
    #[serde(default)]
    pub processing: bool,
}

/// Theme role. Mutated only via the explicit publish operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeRole {
    Live,
    Unpublished,
    Development,
}

impl std::fmt::Display for ThemeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Unpublished => write!(f, "unpublished"),
            Self::Development => write!(f, "development"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ThemeEnvelope {
    pub theme: Theme,
}

/// One entry of the remote checksum manifest.
///
/// A checksum of `None` means the server has not verified the content
/// recently. Such assets are never silently skipped; the diff engine
/// conservatively re-uploads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChecksum {
    pub key: String,
    pub checksum: Option<String>,
}

impl RemoteChecksum {
    pub fn new(key: impl Into<String>, checksum: Option<&str>) -> Self {
        Self {
            key: key.into(),
            checksum: normalize_checksum(checksum),
        }
    }
}

/// The literal the service uses for unverified checksums.
const UNKNOWN_CHECKSUM: &str = "unknown";

/// Map the service's "unknown" literal (and empty strings) to `None`.
fn normalize_checksum(checksum: Option<&str>) -> Option<String> {
    match checksum {
        None | Some("") | Some(UNKNOWN_CHECKSUM) => None,
        Some(s) => Some(s.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ManifestEnvelope {
    pub assets: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ManifestEntry {
    pub key: String,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl From<ManifestEntry> for RemoteChecksum {
    fn from(entry: ManifestEntry) -> Self {
        RemoteChecksum::new(entry.key, entry.checksum.as_deref())
    }
}

/// A full theme asset as returned by the single-asset fetch.
///
/// `value` and `attachment` are mutually exclusive: text assets carry
/// `value`, binary assets carry base64 in `attachment`.
#[derive(Debug, Clone, Deserialize)]
pub struct ThemeAsset {
    pub key: String,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub attachment: Option<String>,
}

impl ThemeAsset {
    /// Decode the asset body into raw bytes.
    pub fn content(&self) -> anyhow::Result<Vec<u8>> {
        if let Some(value) = &self.value {
            return Ok(value.as_bytes().to_vec());
        }
        if let Some(attachment) = &self.attachment {
            return BASE64
                .decode(attachment)
                .map_err(|e| anyhow::anyhow!("asset {} has invalid attachment: {e}", self.key));
        }
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct AssetEnvelope {
    pub asset: ThemeAsset,
}

/// Parameters for one asset in a bulk write.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AssetParams {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

impl AssetParams {
    /// Text asset from UTF-8 content.
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            attachment: None,
        }
    }

    /// Binary asset; content is base64-encoded into `attachment`.
    pub fn binary(key: impl Into<String>, content: &[u8]) -> Self {
        Self {
            key: key.into(),
            value: None,
            attachment: Some(BASE64.encode(content)),
        }
    }

    /// Build params from raw file content, choosing text vs attachment.
    pub fn from_content(key: impl Into<String>, content: Vec<u8>) -> Self {
        let key = key.into();
        match String::from_utf8(content) {
            Ok(text) => Self::text(key, text),
            Err(err) => Self::binary(key, err.as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_normalization() {
        assert_eq!(RemoteChecksum::new("a", Some("abc")).checksum.as_deref(), Some("abc"));
        assert_eq!(RemoteChecksum::new("a", Some("unknown")).checksum, None);
        assert_eq!(RemoteChecksum::new("a", Some("")).checksum, None);
        assert_eq!(RemoteChecksum::new("a", None).checksum, None);
    }

    #[test]
    fn test_asset_params_exclusivity() {
        let text = AssetParams::from_content("sections/header.liquid", b"<div>".to_vec());
        assert!(text.value.is_some());
        assert!(text.attachment.is_none());

        let binary = AssetParams::from_content("assets/logo.png", vec![0x89, 0x50, 0xff]);
        assert!(binary.value.is_none());
        assert!(binary.attachment.is_some());
    }

    #[test]
    fn test_attachment_roundtrip() {
        let bytes = vec![0u8, 159, 146, 150];
        let params = AssetParams::binary("assets/logo.png", &bytes);

        let asset = ThemeAsset {
            key: params.key.clone(),
            checksum: None,
            value: None,
            attachment: params.attachment.clone(),
        };
        assert_eq!(asset.content().unwrap(), bytes);
    }

    #[test]
    fn test_theme_role_parsing() {
        let theme: Theme = serde_json::from_str(
            r#"{"id": 7, "name": "Dawn", "role": "development", "processing": true}"#,
        )
        .unwrap();
        assert_eq!(theme.role, ThemeRole::Development);
        assert!(theme.processing);
    }
}
