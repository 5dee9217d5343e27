use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashMap;

pub(super) const DEBOUNCE_MS: u64 = 300;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub(super) fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Pure debouncer: only handles timing and event deduplication.
/// No business logic, no global state access.
pub(super) struct Debouncer {
    /// Path → ChangeKind (dedup is free via HashMap key uniqueness)
    pub(super) changes: FxHashMap<PathBuf, ChangeKind>,
    pub(super) last_event: Option<std::time::Instant>,
}

impl Debouncer {
    pub(super) fn new() -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
        }
    }

    /// Add a notify event, applying dedup rules:
    /// - Remove + Create/Modify → Create/Modify (file was restored)
    /// - Create/Modify + Remove → Remove (file was deleted)
    /// - Same type events: first event wins
    pub(super) fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // Ignore metadata-only changes (mtime/atime/chmod noise)
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }

            let path = normalize_path(path);

            if let Some(&existing) = self.changes.get(&path) {
                // State transitions:
                // - Removed -> Created/Modified: restored, use new event
                // - Modified -> Removed: deleted, upgrade to Removed
                // - Created -> Removed: appeared then vanished, discard (no-op)
                // - otherwise: first event wins
                match (existing, kind) {
                    (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                        crate::debug!("watch"; "restore {}->created: {}", existing.label(), path.display());
                        self.changes.insert(path, kind);
                    }
                    (ChangeKind::Modified, ChangeKind::Removed) => {
                        crate::debug!("watch"; "upgrade modified->removed: {}", path.display());
                        self.changes.insert(path, ChangeKind::Removed);
                    }
                    (ChangeKind::Created, ChangeKind::Removed) => {
                        crate::debug!("watch"; "discard created+removed: {}", path.display());
                        self.changes.remove(&path);
                    }
                    _ => {
                        continue;
                    }
                }
                self.last_event = Some(std::time::Instant::now());
                continue;
            }

            crate::debug!("watch"; "event {}: {}", kind.label(), path.display());
            self.changes.insert(path, kind);
            self.last_event = Some(std::time::Instant::now());
        }
    }

    /// Take raw events if the quiet window elapsed.
    pub(super) fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        if !self.is_ready() {
            return None;
        }

        let changes = std::mem::take(&mut self.changes);
        self.last_event = None;

        if changes.is_empty() {
            return None;
        }

        Some(changes)
    }

    pub(super) fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };

        if last_event.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
            return false;
        }

        !self.changes.is_empty()
    }

    /// Precise sleep duration until next possible ready time.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        Duration::from_millis(DEBOUNCE_MS)
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Canonicalize where possible, falling back to an absolute join. The
/// watcher may report non-canonicalized paths for newly created files.
pub(super) fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.into_iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn modify_kind() -> notify::EventKind {
        notify::EventKind::Modify(notify::event::ModifyKind::Data(
            notify::event::DataChange::Any,
        ))
    }

    fn create_kind() -> notify::EventKind {
        notify::EventKind::Create(notify::event::CreateKind::File)
    }

    fn remove_kind() -> notify::EventKind {
        notify::EventKind::Remove(notify::event::RemoveKind::File)
    }

    #[test]
    fn test_debouncer_empty() {
        let debouncer = Debouncer::new();
        assert!(!debouncer.is_ready());
    }

    #[test]
    fn test_event_routing_by_kind() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.liquid"], create_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/b.liquid"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/c.liquid"], remove_kind()));

        assert_eq!(debouncer.changes.len(), 3);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.liquid")],
            ChangeKind::Created
        );
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/b.liquid")],
            ChangeKind::Modified
        );
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/c.liquid")],
            ChangeKind::Removed
        );
    }

    #[test]
    fn test_temp_file_ignored() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/real.liquid"], modify_kind()));
        assert!(debouncer.last_event.is_some());
        let first_time = debouncer.last_event.unwrap();

        std::thread::sleep(Duration::from_millis(5));

        // Temp file event — should NOT update last_event or add to changes
        debouncer.add_event(&make_event(vec!["/tmp/.header.liquid.swp"], modify_kind()));
        assert_eq!(debouncer.last_event.unwrap(), first_time);
        assert_eq!(debouncer.changes.len(), 1);
    }

    #[test]
    fn test_dedup_first_event_wins() {
        let mut debouncer = Debouncer::new();

        // Same path: create then modify — first one (create) wins
        debouncer.add_event(&make_event(vec!["/tmp/a.liquid"], create_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.liquid"], modify_kind()));

        assert_eq!(debouncer.changes.len(), 1);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.liquid")],
            ChangeKind::Created
        );
    }

    #[test]
    fn test_dedup_same_event() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&make_event(
            vec!["/tmp/a.liquid", "/tmp/a.liquid"],
            modify_kind(),
        ));
        assert_eq!(debouncer.changes.len(), 1);
    }

    #[test]
    fn test_sleep_duration_no_events() {
        let debouncer = Debouncer::new();
        assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));
    }

    #[test]
    fn test_sleep_duration_after_event() {
        let mut debouncer = Debouncer::new();
        debouncer.last_event = Some(std::time::Instant::now());

        let dur = debouncer.sleep_duration();
        assert!(dur >= Duration::from_millis(DEBOUNCE_MS - 10));
        assert!(dur <= Duration::from_millis(DEBOUNCE_MS + 10));
    }

    #[test]
    fn test_remove_then_create_restores() {
        let mut debouncer = Debouncer::new();

        // File removed, then restored (created) — should become Created
        debouncer.add_event(&make_event(vec!["/tmp/a.liquid"], remove_kind()));
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.liquid")],
            ChangeKind::Removed
        );

        debouncer.add_event(&make_event(vec!["/tmp/a.liquid"], create_kind()));
        assert_eq!(debouncer.changes.len(), 1);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.liquid")],
            ChangeKind::Created
        );
    }

    #[test]
    fn test_create_then_remove_discards() {
        let mut debouncer = Debouncer::new();

        // File created, then removed — net no-op, should be discarded entirely
        debouncer.add_event(&make_event(vec!["/tmp/a.liquid"], create_kind()));
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.liquid")],
            ChangeKind::Created
        );

        debouncer.add_event(&make_event(vec!["/tmp/a.liquid"], remove_kind()));
        assert!(
            debouncer.changes.is_empty(),
            "created+removed should discard"
        );
    }

    #[test]
    fn test_modify_then_remove_upgrades() {
        let mut debouncer = Debouncer::new();

        // File modified, then removed — should upgrade to Removed
        debouncer.add_event(&make_event(vec!["/tmp/a.liquid"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.liquid"], remove_kind()));
        assert_eq!(debouncer.changes.len(), 1);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.liquid")],
            ChangeKind::Removed
        );
    }

    #[test]
    fn test_metadata_only_modify_ignored() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&make_event(
            vec!["/tmp/a.liquid"],
            notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
                notify::event::MetadataKind::Any,
            )),
        ));
        assert!(debouncer.changes.is_empty());
    }
}
