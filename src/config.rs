//! Project configuration (`weft.toml`) loading and validation.
//!
//! The config file names the remote theme service, the theme under
//! development, rate-limit pacing knobs, sync exclusions and the preview
//! server settings. The API token is read from the `WEFT_API_TOKEN`
//! environment variable only, never from the config file.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Environment variable holding the theme service API token.
pub const TOKEN_ENV: &str = "WEFT_API_TOKEN";

/// Top-level project configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub serve: ServeConfig,

    /// Project root (directory containing the config file). Not serialized.
    #[serde(skip)]
    pub root: PathBuf,
}

/// Remote theme service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Base URL of the theme service API, e.g. `https://store.example.com/api`
    pub api_url: String,
    /// Theme under development
    pub theme_id: u64,
    /// Store admin URL, shown in authorization error guidance
    pub admin_url: String,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Client-side pacing and retry knobs for the call budget.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Base pacing delay (milliseconds) applied once the budget runs low
    #[serde(default = "default_call_delay_ms")]
    pub call_delay_ms: u64,
    /// Fraction of the budget remaining that triggers pacing
    #[serde(default = "default_low_water")]
    pub low_water: f64,
    /// Maximum 429 retries per logical call; 0 retries indefinitely
    /// following server guidance
    #[serde(default)]
    pub max_retries: u32,
}

/// Sync behavior settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Assets per bulk upload call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Glob patterns for local files excluded from sync and watching
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// Preview server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind
    #[serde(default = "default_interface")]
    pub interface: IpAddr,
    /// Port number to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL of the external render service
    #[serde(default)]
    pub render_url: String,
}

fn default_call_delay_ms() -> u64 {
    500
}

fn default_low_water() -> f64 {
    0.2
}

fn default_batch_size() -> usize {
    10
}

fn default_interface() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    9292
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            ignore: Vec::new(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            call_delay_ms: default_call_delay_ms(),
            low_water: default_low_water(),
            max_retries: 0,
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            port: default_port(),
            render_url: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from the given path.
    ///
    /// The parent directory of the config file becomes the project root;
    /// the theme files themselves live directly under it (`sections/`,
    /// `templates/`, `assets/`, ...).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;

        config.root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.remote.api_url.is_empty() {
            bail!("remote.api_url must not be empty");
        }
        if !(0.0..=1.0).contains(&self.remote.limits.low_water) {
            bail!("remote.limits.low_water must be between 0 and 1");
        }
        if self.sync.batch_size == 0 {
            bail!("sync.batch_size must be at least 1");
        }
        Ok(())
    }

    /// Read the API token from the environment.
    pub fn auth_token(&self) -> Result<String> {
        std::env::var(TOKEN_ENV).with_context(|| {
            format!("{TOKEN_ENV} is not set; export an API token with access to the theme service")
        })
    }
}
