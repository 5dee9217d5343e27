//! Checksum diff engine.
//!
//! Pure functions for reconciling a remote checksum manifest with a local
//! file listing. No network access, no side effects; the sync
//! orchestration decides what to do with the resulting plan.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::api::types::RemoteChecksum;

/// A local file reduced to its sync identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalChecksum {
    pub key: String,
    pub checksum: String,
}

impl LocalChecksum {
    pub fn new(key: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            checksum: checksum.into(),
        }
    }
}

/// The minimal set of writes needed to bring the remote in line with the
/// local directory. Derived and ephemeral: recomputed on every sync pass,
/// never persisted.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Local differs from, or is absent on, the remote
    pub to_upload: Vec<String>,
    /// Remote has the key, the local directory does not
    pub to_delete: Vec<String>,
    /// Identical on both sides
    pub unchanged: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute the sync plan for a push (local wins).
///
/// Rules:
/// - local-only key → upload
/// - remote-only key → delete, unless `exclude_generated` filters it out
///   as a server-generated derived asset (dropped before diffing)
/// - differing checksums → upload
/// - identical checksums → unchanged
/// - a remote checksum of `None` is unverifiable and always forces an
///   upload, never trusting possibly-stale data
pub fn plan(
    remote: &[RemoteChecksum],
    local: &[LocalChecksum],
    exclude_generated: bool,
) -> SyncPlan {
    let remote: Vec<&RemoteChecksum> = if exclude_generated {
        let generated = generated_keys(remote);
        remote.iter().filter(|r| !generated.contains(&r.key)).collect()
    } else {
        remote.iter().collect()
    };

    let remote_by_key: FxHashMap<&str, &RemoteChecksum> =
        remote.iter().map(|r| (r.key.as_str(), *r)).collect();
    let local_keys: FxHashSet<&str> = local.iter().map(|l| l.key.as_str()).collect();

    let mut result = SyncPlan::default();

    for file in local {
        match remote_by_key.get(file.key.as_str()) {
            None => result.to_upload.push(file.key.clone()),
            Some(r) => match &r.checksum {
                // Unverified server side: conservatively re-upload.
                None => result.to_upload.push(file.key.clone()),
                Some(c) if *c == file.checksum => result.unchanged.push(file.key.clone()),
                Some(_) => result.to_upload.push(file.key.clone()),
            },
        }
    }

    for r in &remote {
        if !local_keys.contains(r.key.as_str()) {
            result.to_delete.push(r.key.clone());
        }
    }

    result.to_upload.sort();
    result.to_delete.sort();
    result.unchanged.sort();
    result
}

/// Remote keys that are server-generated derived assets.
///
/// The service compiles `<key>.liquid` sources into plain `<key>` variants;
/// those derived keys must never be deleted by a client-driven sync.
pub fn generated_keys(remote: &[RemoteChecksum]) -> FxHashSet<String> {
    let all: FxHashSet<&str> = remote.iter().map(|r| r.key.as_str()).collect();
    remote
        .iter()
        .filter(|r| all.contains(format!("{}.liquid", r.key).as_str()))
        .map(|r| r.key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(entries: &[(&str, Option<&str>)]) -> Vec<RemoteChecksum> {
        entries
            .iter()
            .map(|(k, c)| RemoteChecksum::new(*k, *c))
            .collect()
    }

    fn local(entries: &[(&str, &str)]) -> Vec<LocalChecksum> {
        entries
            .iter()
            .map(|(k, c)| LocalChecksum::new(*k, *c))
            .collect()
    }

    #[test]
    fn test_plan_partitions_key_union() {
        let remote = remote(&[
            ("a.liquid", Some("1")),
            ("b.liquid", Some("2")),
            ("c.liquid", None),
        ]);
        let local = local(&[("b.liquid", "2"), ("c.liquid", "3"), ("d.liquid", "4")]);

        let plan = plan(&remote, &local, false);

        let mut all: Vec<&String> = plan
            .to_upload
            .iter()
            .chain(&plan.to_delete)
            .chain(&plan.unchanged)
            .collect();
        all.sort();
        all.dedup();
        // Every key in the union appears in exactly one set.
        assert_eq!(all.len(), 4);
        assert_eq!(
            plan.to_upload.len() + plan.to_delete.len() + plan.unchanged.len(),
            4
        );
    }

    #[test]
    fn test_local_only_uploads_remote_only_deletes() {
        let plan = plan(
            &remote(&[("remote-only.liquid", Some("1"))]),
            &local(&[("local-only.liquid", "2")]),
            false,
        );
        assert_eq!(plan.to_upload, vec!["local-only.liquid"]);
        assert_eq!(plan.to_delete, vec!["remote-only.liquid"]);
        assert!(plan.unchanged.is_empty());
    }

    #[test]
    fn test_null_remote_checksum_always_uploads() {
        let plan = plan(
            &remote(&[("a.liquid", None)]),
            &local(&[("a.liquid", "anything")]),
            false,
        );
        assert_eq!(plan.to_upload, vec!["a.liquid"]);
    }

    #[test]
    fn test_identical_checksums_unchanged_until_either_side_moves() {
        let r = remote(&[("a.liquid", Some("same"))]);
        let l = local(&[("a.liquid", "same")]);
        assert_eq!(plan(&r, &l, false).unchanged, vec!["a.liquid"]);

        let l_changed = local(&[("a.liquid", "different")]);
        let changed = plan(&r, &l_changed, false);
        assert!(changed.unchanged.is_empty());
        assert_eq!(changed.to_upload, vec!["a.liquid"]);

        let r_changed = remote(&[("a.liquid", Some("different"))]);
        let changed = plan(&r_changed, &l, false);
        assert!(changed.unchanged.is_empty());
        assert_eq!(changed.to_upload, vec!["a.liquid"]);
    }

    #[test]
    fn test_generated_assets_never_deleted() {
        // assets/app.css was compiled from assets/app.css.liquid; only the
        // source is the client's to manage.
        let r = remote(&[
            ("assets/app.css", Some("1")),
            ("assets/app.css.liquid", Some("2")),
        ]);
        let plan = plan(&r, &[], true);
        assert_eq!(plan.to_delete, vec!["assets/app.css.liquid"]);
    }

    #[test]
    fn test_generated_filtering_off_by_flag() {
        let r = remote(&[
            ("assets/app.css", Some("1")),
            ("assets/app.css.liquid", Some("2")),
        ]);
        let plan = plan(&r, &[], false);
        assert_eq!(
            plan.to_delete,
            vec!["assets/app.css", "assets/app.css.liquid"]
        );
    }

    #[test]
    fn test_end_to_end_scenario() {
        // assets/theme.css differs between the two sides; templates/404.json
        // exists on both but the remote has left it unchecksummed, which
        // forces an upload regardless of the local checksum.
        let r = remote(&[
            ("assets/theme.css", Some("B")),
            ("templates/404.json", None),
        ]);
        let l = local(&[("assets/theme.css", "A"), ("templates/404.json", "B")]);

        let plan = plan(&r, &l, true);
        assert_eq!(plan.to_upload, vec!["assets/theme.css", "templates/404.json"]);
        assert!(plan.to_delete.is_empty());
        assert!(plan.unchanged.is_empty());
    }
}
