//! Sync orchestration: push (local → remote) and pull (remote → local).
//!
//! The diff engine decides what to move; this module moves it, batching
//! uploads through the bulk endpoint, reporting per-asset failures without
//! aborting the batch, and requiring confirmation before destructive
//! deletes unless explicitly forced.

pub mod diff;
pub mod local;

use anyhow::{Context, Result, bail};
use rustc_hash::FxHashMap;
use std::io::{self, Write};

use crate::api::bulk;
use crate::api::client::ApiClient;
use crate::api::types::{AssetParams, ThemeRole};
use crate::config::Config;
use crate::{debug, log};
use diff::LocalChecksum;
use local::LocalFile;

/// Flags shared by the push and pull commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Skip all confirmation prompts
    pub force: bool,
    /// Never delete on the receiving side
    pub no_delete: bool,
}

/// Push local changes to the remote theme.
pub fn push(config: &Config, client: &ApiClient, options: SyncOptions) -> Result<()> {
    let theme_id = config.remote.theme_id;
    let theme = client.get_theme(theme_id)?;
    if theme.processing {
        bail!("theme \"{}\" is still being created remotely; retry shortly", theme.name);
    }
    if theme.role == ThemeRole::Live
        && !options.force
        && !confirm(&format!(
            "Theme \"{}\" is live. Push to the live theme anyway?",
            theme.name
        ))?
    {
        bail!("push aborted");
    }

    let remote = client.list_assets(theme_id)?;
    let files = local::list_files(config)?;
    let by_key: FxHashMap<&str, &LocalFile> =
        files.iter().map(|f| (f.key.as_str(), f)).collect();
    let checksums: Vec<LocalChecksum> = files
        .iter()
        .map(|f| LocalChecksum::new(f.key.clone(), f.checksum.clone()))
        .collect();

    let plan = diff::plan(&remote, &checksums, true);
    log!("push"; "{} to upload, {} to delete, {} unchanged",
        plan.to_upload.len(), plan.to_delete.len(), plan.unchanged.len());

    if plan.is_empty() {
        log!("push"; "theme already in sync");
        return Ok(());
    }

    let mut failed = 0usize;
    for batch in plan.to_upload.chunks(config.sync.batch_size) {
        let assets: Vec<AssetParams> = batch
            .iter()
            .map(|key| {
                let file = by_key[key.as_str()];
                let content = std::fs::read(&file.path)
                    .with_context(|| format!("failed to read {}", file.path.display()))?;
                Ok(AssetParams::from_content(key.clone(), content))
            })
            .collect::<Result<_>>()?;

        for result in bulk::upload_batch(client, theme_id, &assets)? {
            if result.success {
                debug!("push"; "uploaded {}", result.key);
            } else {
                failed += 1;
                let detail = result
                    .errors
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("status {}", result.code));
                log!("push"; "failed {}: {}", result.key, detail);
            }
        }
    }

    if !plan.to_delete.is_empty() && !options.no_delete {
        if options.force || confirm_deletes("remote", &plan.to_delete)? {
            for key in &plan.to_delete {
                client.delete_asset(theme_id, key)?;
                debug!("push"; "deleted {}", key);
            }
            log!("push"; "deleted {} remote asset(s)", plan.to_delete.len());
        } else {
            log!("push"; "skipped {} delete(s)", plan.to_delete.len());
        }
    }

    let uploaded = plan.to_upload.len() - failed;
    log!("push"; "uploaded {} asset(s)", uploaded);
    if failed > 0 {
        bail!("{failed} asset(s) failed to upload; see the report above");
    }
    Ok(())
}

/// Pull the remote theme into the local directory (remote wins).
pub fn pull(config: &Config, client: &ApiClient, options: SyncOptions) -> Result<()> {
    let theme_id = config.remote.theme_id;
    let remote = client.list_assets(theme_id)?;
    let generated = diff::generated_keys(&remote);
    let files = local::list_files(config)?;
    let local_by_key: FxHashMap<&str, &LocalFile> =
        files.iter().map(|f| (f.key.as_str(), f)).collect();

    // Remote wins: download anything missing, differing, or unverified.
    // Server-generated derived assets stay remote-only; pulling them would
    // push them right back on the next sync.
    let mut downloaded = 0usize;
    for entry in &remote {
        if generated.contains(&entry.key) {
            continue;
        }
        let fresh = match (&entry.checksum, local_by_key.get(entry.key.as_str())) {
            (Some(c), Some(f)) => *c == f.checksum,
            _ => false,
        };
        if fresh {
            continue;
        }

        let Some(asset) = client.get_asset(theme_id, &entry.key)? else {
            debug!("pull"; "{} vanished remotely, skipping", entry.key);
            continue;
        };
        let path = config.root.join(&entry.key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, asset.content()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!("pull"; "downloaded {}", entry.key);
        downloaded += 1;
    }

    let remote_keys: FxHashMap<&str, ()> = remote.iter().map(|r| (r.key.as_str(), ())).collect();
    let local_only: Vec<String> = files
        .iter()
        .filter(|f| !remote_keys.contains_key(f.key.as_str()))
        .map(|f| f.key.clone())
        .collect();

    if !local_only.is_empty() && !options.no_delete {
        if options.force || confirm_deletes("local", &local_only)? {
            for key in &local_only {
                std::fs::remove_file(config.root.join(key))
                    .with_context(|| format!("failed to delete {key}"))?;
            }
            log!("pull"; "deleted {} local file(s)", local_only.len());
        } else {
            log!("pull"; "skipped {} delete(s)", local_only.len());
        }
    }

    log!("pull"; "downloaded {} asset(s)", downloaded);
    Ok(())
}

/// Ask before a destructive delete, listing what would go.
fn confirm_deletes(side: &str, keys: &[String]) -> Result<bool> {
    eprintln!("The following {side} files have no counterpart and would be deleted:");
    for key in keys {
        eprintln!("  {key}");
    }
    confirm("Delete them?")
}

pub(crate) fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
