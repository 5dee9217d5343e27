//! Local file listing and content hashing.
//!
//! Walks the project directory, derives path-like asset keys and computes
//! the hex blake3 checksums the remote manifest is compared against.

use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// A theme file on disk, addressed by its asset key.
#[derive(Debug, Clone)]
pub struct LocalFile {
    /// Path-like asset key, e.g. `sections/header.liquid`
    pub key: String,
    /// Hex blake3 of the file content
    pub checksum: String,
    pub path: PathBuf,
}

/// Compute the checksum of in-memory content.
pub fn checksum_bytes(content: &[u8]) -> String {
    hex::encode(blake3::hash(content).as_bytes())
}

/// Compute the checksum of a file, streaming in 64 KiB chunks.
pub fn checksum_file(path: &Path) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Build the ignore matcher from configured patterns (gitignore syntax).
pub fn build_ignore(root: &Path, patterns: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .with_context(|| format!("invalid ignore pattern {pattern:?}"))?;
    }
    Ok(builder.build()?)
}

/// Derive the asset key for a path under the project root.
///
/// Keys always use forward slashes, regardless of platform.
pub fn key_for_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let key = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if key.is_empty() { None } else { Some(key) }
}

/// Whether a path participates in sync and watching at all.
///
/// The config file itself and dotfiles are never theme assets.
pub fn is_theme_file(root: &Path, path: &Path, ignore: &Gitignore) -> bool {
    let Some(key) = key_for_path(root, path) else {
        return false;
    };
    if key.split('/').any(|part| part.starts_with('.')) {
        return false;
    }
    if key == "weft.toml" {
        return false;
    }
    !ignore.matched(path, false).is_ignore()
}

/// List every theme file under the project root with its checksum.
///
/// Results are sorted by key for deterministic plans and logs.
pub fn list_files(config: &Config) -> Result<Vec<LocalFile>> {
    let root = &config.root;
    let ignore = build_ignore(root, &config.sync.ignore)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_theme_file(root, &path, &ignore) {
            continue;
        }
        let Some(key) = key_for_path(root, &path) else {
            continue;
        };
        let checksum = checksum_file(&path)?;
        files.push(LocalFile {
            key,
            checksum,
            path,
        });
    }

    files.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(files)
}
