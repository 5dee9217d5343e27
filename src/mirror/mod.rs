//! Filesystem mirror actor.
//!
//! Watches the theme directory and keeps the in-memory override cache in
//! step with files on disk, publishing hot-reload events as changes land.
//! Implements the "Watcher-First" pattern for zero event loss.
//!
//! Architecture:
//! ```text
//! Watcher → Debouncer (pure timing) → Mirror (cache + index) → ReloadBus
//! ```

pub mod overrides;
pub mod sections;

mod debouncer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use ignore::gitignore::Gitignore;
use jwalk::WalkDir;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashMap;

use crate::config::Config;
use crate::reload::{HotReloadEvent, ReloadBus};
use crate::sync::local::{build_ignore, is_theme_file, key_for_path};
use crate::{debug, log};
use debouncer::{ChangeKind, Debouncer, normalize_path};
use overrides::OverrideCache;
use sections::SectionIndex;

/// Mirror actor: the exclusive writer of the override cache.
pub struct MirrorActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    /// Shutdown signal from the Ctrl+C handler
    shutdown_rx: crossbeam::channel::Receiver<()>,
    /// Debouncer state
    debouncer: Debouncer,
    mirror: Mirror,
}

impl MirrorActor {
    /// Create a new MirrorActor with Watcher-First pattern
    ///
    /// The watcher starts immediately, buffering events while the initial
    /// scan runs. This eliminates the "vacuum period".
    pub fn new(
        config: Arc<Config>,
        overrides: Arc<OverrideCache>,
        bus: Arc<ReloadBus>,
        shutdown_rx: crossbeam::channel::Receiver<()>,
    ) -> Result<Self> {
        let root = normalize_path(&config.root);
        let ignore = build_ignore(&root, &config.sync.ignore)?;

        // Create sync channel for notify (it doesn't support async)
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        // Create and configure watcher IMMEDIATELY
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;

        // Events are now buffering in notify_rx while the scan runs

        Ok(Self {
            notify_rx,
            watcher,
            shutdown_rx,
            debouncer: Debouncer::new(),
            mirror: Mirror {
                root,
                ignore,
                overrides,
                sections: SectionIndex::new(),
                bus,
            },
        })
    }

    /// Run the actor event loop
    pub async fn run(self) {
        let notify_rx = self.notify_rx;
        let shutdown_rx = self.shutdown_rx;
        let mut debouncer = self.debouncer;
        let mut mirror = self.mirror;
        let _watcher = self.watcher;

        if let Err(e) = mirror.initial_scan() {
            log!("error"; "initial scan failed: {:#}", e);
        }
        crate::core::set_ready();

        let (async_tx, mut async_rx) = tokio::sync::mpsc::channel::<notify::Event>(64);

        // Spawn a thread to poll notify events and send to async channel
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        // Bridge the sync shutdown signal into the select loop
        let (stop_tx, mut stop_rx) = tokio::sync::mpsc::channel::<()>(1);
        std::thread::spawn(move || {
            if shutdown_rx.recv().is_ok() {
                let _ = stop_tx.blocking_send(());
            }
        });

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.recv() => break,
                Some(event) = async_rx.recv() => debouncer.add_event(&event),
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    if crate::core::is_shutdown() {
                        break;
                    }
                    if let Some(changes) = debouncer.take_if_ready() {
                        mirror.apply_changes(changes);
                    }
                }
            }
        }

        debug!("watch"; "mirror actor stopped");
    }
}

/// Cache and index state behind the actor. Split out so the change
/// pipeline can be driven directly in tests, without a watcher.
struct Mirror {
    root: PathBuf,
    ignore: Gitignore,
    overrides: Arc<OverrideCache>,
    sections: SectionIndex,
    bus: Arc<ReloadBus>,
}

impl Mirror {
    /// Populate the cache from disk before serving.
    ///
    /// Structured templates are loaded eagerly so the very first render
    /// already carries them and the section index is complete. Other text
    /// assets enter the cache when they first change.
    fn initial_scan(&mut self) -> Result<()> {
        let mut loaded = 0usize;
        for entry in WalkDir::new(&self.root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !is_theme_file(&self.root, &path, &self.ignore) {
                continue;
            }
            let Some(key) = key_for_path(&self.root, &path) else {
                continue;
            };
            if !sections::is_structured(&key) {
                continue;
            }

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            self.sections.update_template(&key, &content);
            self.overrides.insert(&key, content);
            loaded += 1;
        }

        log!("watch"; "mirroring {} ({} structured template(s))",
            self.root.display(), loaded);
        Ok(())
    }

    /// Apply a debounced batch: update the cache and index, then publish
    /// one event per surviving change.
    fn apply_changes(&mut self, changes: FxHashMap<PathBuf, ChangeKind>) {
        let mut batch: Vec<(String, ChangeKind, PathBuf)> = changes
            .into_iter()
            .filter(|(path, _)| is_theme_file(&self.root, path, &self.ignore))
            .filter_map(|(path, kind)| {
                key_for_path(&self.root, &path).map(|key| (key, kind, path))
            })
            .collect();
        batch.sort_by(|a, b| a.0.cmp(&b.0));

        for (key, kind, path) in batch {
            match kind {
                ChangeKind::Created | ChangeKind::Modified => self.apply_write(&key, &path),
                ChangeKind::Removed => self.apply_removal(&key),
            }
        }
    }

    fn apply_write(&mut self, key: &str, path: &Path) {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                // Raced with a deletion; the Removed event will follow.
                debug!("watch"; "skipping {}: {}", key, e);
                return;
            }
        };

        match String::from_utf8(bytes) {
            Ok(content) => {
                if sections::is_structured(key) {
                    self.sections.update_template(key, &content);
                }
                if !self.overrides.insert(key, content) {
                    debug!("watch"; "unchanged content: {}", key);
                    return;
                }
                self.publish(self.sections.classify(key));
            }
            Err(_) => {
                // Binary assets are not overridable; still worth a reload.
                self.publish(HotReloadEvent::Other {
                    key: key.to_string(),
                });
            }
        }
    }

    fn apply_removal(&mut self, key: &str) {
        if sections::is_structured(key) {
            self.sections.remove_template(key);
        }
        self.overrides.remove(key);
        self.publish(HotReloadEvent::Other {
            key: key.to_string(),
        });
    }

    fn publish(&self, event: HotReloadEvent) {
        log!("reload"; "{}", event.key());
        self.bus.publish(&event);
    }
}
