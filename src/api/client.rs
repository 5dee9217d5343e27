//! The throttled, retrying theme service client.
//!
//! Callers never reason about rate limits: `call` paces itself against the
//! server's call budget, honors `retry-after` on 429s in an explicit retry
//! loop, and resolves every response status into either a typed payload or
//! an [`ApiError`]. Transport and sleeping are injectable so the retry
//! behavior is testable without a network or real timers.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::error::ApiError;
use super::limits::{CALL_LIMIT_HEADER, RateLimitState, Sleeper, SystemSleeper};
use super::types::{
    AssetEnvelope, ManifestEnvelope, RemoteChecksum, Theme, ThemeAsset, ThemeEnvelope,
};
use crate::config::{LimitsConfig, RemoteConfig};
use crate::debug;

/// Request header carrying the API token.
pub const TOKEN_HEADER: &str = "x-api-token";

/// Sleep applied to a 429 without a `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: f64 = 1.0;

/// Marker the service puts in a 403 body when a client tries to delete a
/// server-generated derived asset.
const GENERATED_ASSET_MARKER: &str = "Cannot delete generated asset";

/// HTTP method subset used by the theme service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// One logical call to the theme service.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `themes/42/assets`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A response reduced to the parts the dispatch logic needs.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// `x-api-call-limit` header value, when present
    pub call_limit: Option<String>,
    /// `retry-after` header in seconds, when present
    pub retry_after: Option<f64>,
    pub body: String,
}

impl RawResponse {
    /// Parse the body against an endpoint's documented shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Payload(e.to_string()))
    }
}

/// Transport seam: issues one HTTP request, no retry or pacing logic.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &ApiRequest, token: &str) -> Result<RawResponse, ApiError>;
}

/// Production transport over a blocking reqwest client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest, token: &str) -> Result<RawResponse, ApiError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        builder = builder.header(TOKEN_HEADER, token).query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let call_limit = header(CALL_LIMIT_HEADER);
        let retry_after = header("retry-after").and_then(|v| v.trim().parse().ok());
        let body = response.text()?;

        Ok(RawResponse {
            status,
            call_limit,
            retry_after,
            body,
        })
    }
}

/// Throttled theme service client.
pub struct ApiClient {
    transport: Box<dyn Transport>,
    sleeper: Box<dyn Sleeper>,
    limits: LimitsConfig,
    admin_url: String,
    token: String,
    /// Shared call-budget state; written only from response handling below.
    state: Arc<Mutex<RateLimitState>>,
}

impl ApiClient {
    /// Build a client against the real service.
    pub fn new(remote: &RemoteConfig, token: String) -> Result<Self, ApiError> {
        Ok(Self::with_parts(
            Box::new(HttpTransport::new(remote.api_url.clone())?),
            Box::new(SystemSleeper),
            remote.limits.clone(),
            remote.admin_url.clone(),
            token,
        ))
    }

    /// Build a client from explicit parts (tests inject fakes here).
    pub fn with_parts(
        transport: Box<dyn Transport>,
        sleeper: Box<dyn Sleeper>,
        limits: LimitsConfig,
        admin_url: String,
        token: String,
    ) -> Self {
        Self {
            transport,
            sleeper,
            limits,
            admin_url,
            token,
            state: Arc::new(Mutex::new(RateLimitState::default())),
        }
    }

    /// Snapshot of the current call-budget state.
    pub fn rate_limit(&self) -> RateLimitState {
        *self.state.lock()
    }

    /// Issue one logical call, pacing and retrying as needed.
    ///
    /// Returns `Ok` for 200–399 and for 404 (callers decide whether "not
    /// found" is an error); every other status maps to an [`ApiError`].
    /// Retries of the same call are strictly sequential.
    pub fn call(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let mut retries: u32 = 0;

        loop {
            // Self-throttle before issuing when the budget is running low.
            if let Some(delay) = self.state.lock().pacing_delay(&self.limits) {
                debug!("api"; "pacing {:?} before {} {}", delay, request.method.as_str(), request.path);
                self.sleeper.sleep(delay);
            }

            let response = self.transport.execute(request, &self.token)?;

            if let Some(header) = &response.call_limit {
                self.state.lock().update(header);
            }

            match response.status {
                200..=399 => return Ok(response),
                404 => return Ok(response),
                429 => {
                    retries += 1;
                    if self.limits.max_retries > 0 && retries > self.limits.max_retries {
                        return Err(ApiError::RetriesExhausted(self.limits.max_retries));
                    }
                    let secs = response.retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    debug!("api"; "rate limited, retrying {} {} in {}s",
                        request.method.as_str(), request.path, secs);
                    self.sleeper.sleep(Duration::from_secs_f64(secs));
                }
                403 => return Err(self.classify_forbidden(&response)),
                401 => return Err(ApiError::Unauthorized),
                422 => return Err(ApiError::Validation(response.body)),
                400..=499 => {
                    return Err(ApiError::Client {
                        status: response.status,
                    });
                }
                _ => {
                    return Err(ApiError::Server {
                        status: response.status,
                    });
                }
            }
        }
    }

    /// 403s are either the specific "generated asset" refusal, surfaced
    /// verbatim, or a generic permission problem with remediation guidance.
    fn classify_forbidden(&self, response: &RawResponse) -> ApiError {
        if response.body.contains(GENERATED_ASSET_MARKER) {
            let message = serde_json::from_str::<Value>(&response.body)
                .ok()
                .and_then(|v| v.get("errors")?.as_str().map(str::to_string))
                .unwrap_or_else(|| response.body.clone());
            return ApiError::ForbiddenGeneratedAsset(message);
        }
        ApiError::Forbidden {
            admin_url: self.admin_url.clone(),
        }
    }

    // =========================================================================
    // Typed endpoints
    // =========================================================================

    /// Fetch the remote checksum manifest for a theme.
    pub fn list_assets(&self, theme_id: u64) -> Result<Vec<RemoteChecksum>, ApiError> {
        let request =
            ApiRequest::get(format!("themes/{theme_id}/assets")).with_query("fields", "key,checksum");
        let response = self.call(&request)?;
        let manifest: ManifestEnvelope = response.json()?;
        Ok(manifest.assets.into_iter().map(Into::into).collect())
    }

    /// Fetch a single asset with its content. `None` when the key is absent.
    pub fn get_asset(&self, theme_id: u64, key: &str) -> Result<Option<ThemeAsset>, ApiError> {
        let request = ApiRequest::get(format!("themes/{theme_id}/assets"))
            .with_query("asset[key]", key)
            .with_query("fields", "key,checksum,value,attachment");
        let response = self.call(&request)?;
        if response.status == 404 {
            return Ok(None);
        }
        let envelope: AssetEnvelope = response.json()?;
        Ok(Some(envelope.asset))
    }

    /// Delete a remote asset. "Already gone" is not an error.
    pub fn delete_asset(&self, theme_id: u64, key: &str) -> Result<(), ApiError> {
        let request =
            ApiRequest::delete(format!("themes/{theme_id}/assets")).with_query("asset[key]", key);
        // Success is signaled by a message field; its absence (or a 404)
        // means the asset was already gone, which is equally fine.
        self.call(&request)?;
        Ok(())
    }

    /// Fetch a theme's metadata.
    pub fn get_theme(&self, theme_id: u64) -> Result<Theme, ApiError> {
        let response = self.call(&ApiRequest::get(format!("themes/{theme_id}")))?;
        if response.status == 404 {
            return Err(ApiError::Payload(format!("theme {theme_id} does not exist")));
        }
        let envelope: ThemeEnvelope = response.json()?;
        Ok(envelope.theme)
    }

    /// Promote a theme to the live role.
    pub fn publish_theme(&self, theme_id: u64) -> Result<Theme, ApiError> {
        let request = ApiRequest::put(
            format!("themes/{theme_id}"),
            json!({ "theme": { "role": "live" } }),
        );
        let envelope: ThemeEnvelope = self.call(&request)?.json()?;
        Ok(envelope.theme)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Transport double: pops canned responses, records every request.
    pub(crate) struct FakeTransport {
        responses: Mutex<VecDeque<RawResponse>>,
        pub requests: Mutex<Vec<ApiRequest>>,
    }

    impl FakeTransport {
        pub fn new(responses: Vec<RawResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for FakeTransport {
        fn execute(&self, request: &ApiRequest, _token: &str) -> Result<RawResponse, ApiError> {
            self.requests.lock().push(request.clone());
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| ApiError::Payload("fake transport ran out of responses".into()))
        }
    }

    /// Sleeper double: records requested delays, never actually sleeps.
    pub(crate) struct RecordingSleeper {
        pub slept: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn new() -> Self {
            Self {
                slept: Mutex::new(Vec::new()),
            }
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.lock().push(duration);
        }
    }

    pub(crate) fn response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            call_limit: None,
            retry_after: None,
            body: body.to_string(),
        }
    }

    fn client_with(
        responses: Vec<RawResponse>,
        limits: LimitsConfig,
    ) -> (ApiClient, Arc<FakeTransport>, Arc<RecordingSleeper>) {
        // Keep handles to the doubles for assertions; the client owns
        // boxed forwarding wrappers.
        let transport = Arc::new(FakeTransport::new(responses));
        let sleeper = Arc::new(RecordingSleeper::new());

        struct ArcTransport(Arc<FakeTransport>);
        impl Transport for ArcTransport {
            fn execute(&self, r: &ApiRequest, t: &str) -> Result<RawResponse, ApiError> {
                self.0.execute(r, t)
            }
        }
        struct ArcSleeper(Arc<RecordingSleeper>);
        impl Sleeper for ArcSleeper {
            fn sleep(&self, d: Duration) {
                self.0.sleep(d);
            }
        }

        let client = ApiClient::with_parts(
            Box::new(ArcTransport(Arc::clone(&transport))),
            Box::new(ArcSleeper(Arc::clone(&sleeper))),
            limits,
            "https://store.example.com/admin".into(),
            "token".into(),
        );
        (client, transport, sleeper)
    }

    fn default_limits() -> LimitsConfig {
        LimitsConfig {
            call_delay_ms: 500,
            low_water: 0.2,
            max_retries: 0,
        }
    }

    #[test]
    fn test_success_updates_rate_limit_state() {
        let mut ok = response(200, "{}");
        ok.call_limit = Some("7/40".into());
        let (client, _, _) = client_with(vec![ok], default_limits());

        client.call(&ApiRequest::get("themes/1")).unwrap();
        let state = client.rate_limit();
        assert_eq!((state.used, state.capacity), (7, 40));
    }

    #[test]
    fn test_404_returned_as_is() {
        let (client, _, _) = client_with(vec![response(404, "")], default_limits());
        let resp = client.call(&ApiRequest::get("themes/1/assets")).unwrap();
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_429_waits_retry_after_then_reissues_identical_request() {
        let mut limited = response(429, "");
        limited.retry_after = Some(2.0);
        let (client, transport, sleeper) =
            client_with(vec![limited, response(200, "{}")], default_limits());

        let request = ApiRequest::get("themes/1/assets").with_query("fields", "key,checksum");
        client.call(&request).unwrap();

        // Waited exactly the advertised duration before retrying.
        assert_eq!(sleeper.slept.lock().as_slice(), &[Duration::from_secs(2)]);

        // Re-issued the identical request.
        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(requests[1], request);
    }

    #[test]
    fn test_429_without_header_uses_default_delay() {
        let (client, _, sleeper) =
            client_with(vec![response(429, ""), response(200, "{}")], default_limits());
        client.call(&ApiRequest::get("themes/1")).unwrap();
        assert_eq!(
            sleeper.slept.lock().as_slice(),
            &[Duration::from_secs_f64(DEFAULT_RETRY_AFTER_SECS)]
        );
    }

    #[test]
    fn test_429_retries_capped_by_max_retries() {
        let limits = LimitsConfig {
            max_retries: 2,
            ..default_limits()
        };
        let (client, transport, _) = client_with(
            vec![response(429, ""), response(429, ""), response(429, "")],
            limits,
        );

        let err = client.call(&ApiRequest::get("themes/1")).unwrap_err();
        assert!(matches!(err, ApiError::RetriesExhausted(2)));
        assert_eq!(transport.requests.lock().len(), 3);
    }

    #[test]
    fn test_pacing_delay_applied_when_budget_low() {
        let mut nearly_exhausted = response(200, "{}");
        nearly_exhausted.call_limit = Some("39/40".into());
        let (client, _, sleeper) = client_with(
            vec![nearly_exhausted, response(200, "{}")],
            default_limits(),
        );

        // First call learns the budget; second call paces before issuing.
        client.call(&ApiRequest::get("themes/1")).unwrap();
        assert!(sleeper.slept.lock().is_empty());

        client.call(&ApiRequest::get("themes/1")).unwrap();
        // remaining=1 → 500ms * 40
        assert_eq!(
            sleeper.slept.lock().as_slice(),
            &[Duration::from_millis(20_000)]
        );
    }

    #[test]
    fn test_403_generated_asset_message_surfaced_verbatim() {
        let body = r#"{"errors":"Cannot delete generated asset 'assets/app.css'"}"#;
        let (client, _, _) = client_with(vec![response(403, body)], default_limits());

        let err = client
            .call(&ApiRequest::delete("themes/1/assets"))
            .unwrap_err();
        match err {
            ApiError::ForbiddenGeneratedAsset(msg) => {
                assert_eq!(msg, "Cannot delete generated asset 'assets/app.css'");
            }
            other => panic!("expected ForbiddenGeneratedAsset, got {other:?}"),
        }
    }

    #[test]
    fn test_403_generic_includes_admin_url() {
        let (client, _, _) = client_with(
            vec![response(403, r#"{"errors":"no access"}"#)],
            default_limits(),
        );
        let err = client.call(&ApiRequest::get("themes/1")).unwrap_err();
        match err {
            ApiError::Forbidden { admin_url } => {
                assert_eq!(admin_url, "https://store.example.com/admin");
            }
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn test_401_fatal_no_retry() {
        let (client, transport, _) = client_with(vec![response(401, "")], default_limits());
        let err = client.call(&ApiRequest::get("themes/1")).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(transport.requests.lock().len(), 1);
    }

    #[test]
    fn test_422_includes_validation_payload() {
        let body = r#"{"errors":{"key":["is too long"]}}"#;
        let (client, _, _) = client_with(vec![response(422, body)], default_limits());
        let err = client.call(&ApiRequest::get("themes/1")).unwrap_err();
        match err {
            ApiError::Validation(payload) => assert!(payload.contains("is too long")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_5xx_fatal_no_retry() {
        let (client, transport, _) = client_with(vec![response(502, "")], default_limits());
        let err = client.call(&ApiRequest::get("themes/1")).unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 502 }));
        assert_eq!(transport.requests.lock().len(), 1);
    }

    #[test]
    fn test_list_assets_normalizes_unknown_checksums() {
        let body = r#"{"assets":[
            {"key":"assets/theme.css","checksum":"abc"},
            {"key":"templates/404.json","checksum":null},
            {"key":"sections/header.liquid","checksum":"unknown"}
        ]}"#;
        let (client, _, _) = client_with(vec![response(200, body)], default_limits());

        let manifest = client.list_assets(1).unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest[0].checksum.as_deref(), Some("abc"));
        assert_eq!(manifest[1].checksum, None);
        assert_eq!(manifest[2].checksum, None);
    }

    #[test]
    fn test_get_asset_absent_is_none() {
        let (client, _, _) = client_with(vec![response(404, "")], default_limits());
        assert!(client.get_asset(1, "missing.liquid").unwrap().is_none());
    }
}
