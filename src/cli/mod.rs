//! Command-line interface.

pub mod args;
pub mod dev;
pub mod publish;

pub use args::{Cli, Commands};

use anyhow::Result;

use crate::api::client::ApiClient;
use crate::config::Config;

/// Build the throttled API client from config and the environment token.
pub fn api_client(config: &Config) -> Result<ApiClient> {
    let token = config.auth_token()?;
    Ok(ApiClient::new(&config.remote, token)?)
}
