//! Render service proxy.
//!
//! Pages are rendered by an external HTTP service; this client forwards
//! render calls with the override snapshot substituted as template
//! replacements, so unsaved local edits show up without touching the
//! remote theme.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};

/// Response header confirming the service rendered from the supplied
/// template replacements instead of the persisted theme.
pub const MARKER_HEADER: &str = "x-templates-from-params";

/// Outcome of a render call.
pub struct RenderedPage {
    pub html: String,
    /// Whether the service confirmed the override was honored
    pub overrides_honored: bool,
}

pub struct RenderClient {
    http: Client,
    render_url: String,
}

impl RenderClient {
    pub fn new(render_url: &str) -> Result<Self> {
        if render_url.is_empty() {
            bail!("serve.render_url is not configured; the preview server needs a render service");
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            render_url: render_url.trim_end_matches('/').to_string(),
        })
    }

    /// Render a full page with every override applied.
    pub fn render_page(
        &self,
        path: &str,
        query: Option<&str>,
        overrides: &FxHashMap<String, String>,
    ) -> Result<RenderedPage> {
        self.render(render_payload(path, query, None, overrides))
    }

    /// Re-render a single section instance, substituting only the changed
    /// key's override.
    pub fn render_section(
        &self,
        path: &str,
        section_id: &str,
        key: &str,
        override_content: Option<String>,
    ) -> Result<RenderedPage> {
        let mut overrides = FxHashMap::default();
        if let Some(content) = override_content {
            overrides.insert(key.to_string(), content);
        }
        self.render(render_payload(path, None, Some(section_id), &overrides))
    }

    fn render(&self, payload: Value) -> Result<RenderedPage> {
        let response = self
            .http
            .post(format!("{}/render", self.render_url))
            .json(&payload)
            .send()
            .context("render service unreachable")?;

        let status = response.status();
        let overrides_honored = response
            .headers()
            .get(MARKER_HEADER)
            .and_then(|v| v.to_str().ok())
            == Some("1");
        let html = response
            .text()
            .context("failed to read render service response")?;

        if !status.is_success() {
            bail!(
                "render service returned {}: {}",
                status.as_u16(),
                truncate(&html)
            );
        }

        Ok(RenderedPage {
            html,
            overrides_honored,
        })
    }
}

/// Request body for the render service.
fn render_payload(
    path: &str,
    query: Option<&str>,
    section_id: Option<&str>,
    overrides: &FxHashMap<String, String>,
) -> Value {
    let mut body = json!({
        "path": path,
        "replace_templates": overrides,
    });
    if let Some(query) = query {
        body["query"] = query.into();
    }
    if let Some(id) = section_id {
        body["section_id"] = id.into();
    }
    body
}

fn truncate(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(500)
        .map_or(body.len(), |(i, _)| i);
    &body[..end]
}
