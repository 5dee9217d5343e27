//! Promote a development theme to the live role.

use anyhow::{Result, bail};

use crate::api::client::ApiClient;
use crate::api::types::ThemeRole;
use crate::config::Config;
use crate::log;
use crate::sync::confirm;

pub fn run(config: &Config, client: &ApiClient, force: bool) -> Result<()> {
    let theme = client.get_theme(config.remote.theme_id)?;

    if theme.role == ThemeRole::Live {
        log!("publish"; "theme \"{}\" is already live", theme.name);
        return Ok(());
    }
    if theme.processing {
        bail!(
            "theme \"{}\" is still being created remotely; retry shortly",
            theme.name
        );
    }
    if !force
        && !confirm(&format!(
            "Publish \"{}\" and make it the live theme?",
            theme.name
        ))?
    {
        bail!("publish aborted");
    }

    let theme = client.publish_theme(config.remote.theme_id)?;
    log!("publish"; "theme \"{}\" is now live", theme.name);
    Ok(())
}
