//! Section-reference index and change classification.
//!
//! Structured templates (JSON) declare named section instances, each
//! referencing a section type. The index answers "which instances render
//! section type X" so a change to `sections/X.liquid` can be turned into a
//! targeted reload of just those instances. Pure data; no filesystem or
//! actor machinery.

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::reload::HotReloadEvent;

/// Namespace of section template keys.
pub const SECTIONS_PREFIX: &str = "sections/";

/// Whether a key is a structured (JSON) template, loaded eagerly at
/// startup and parsed for section references.
pub fn is_structured(key: &str) -> bool {
    key.ends_with(".json")
}

/// Section type referenced by a changed key, if it is a section template.
///
/// `sections/header.liquid` → `header`; keys outside the namespace have
/// no section type.
pub fn section_type_of(key: &str) -> Option<&str> {
    let rest = key.strip_prefix(SECTIONS_PREFIX)?;
    if rest.contains('/') {
        return None;
    }
    Some(rest.split_once('.').map_or(rest, |(stem, _)| stem))
}

/// Shape of a structured template, reduced to what the index needs.
#[derive(Debug, Deserialize)]
struct TemplateDoc {
    #[serde(default)]
    sections: FxHashMap<String, SectionInstance>,
}

#[derive(Debug, Deserialize)]
struct SectionInstance {
    #[serde(rename = "type")]
    section_type: String,
}

/// Derived index: template key → (instance name → section type).
#[derive(Debug, Default)]
pub struct SectionIndex {
    templates: FxHashMap<String, FxHashMap<String, String>>,
}

impl SectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-parse one structured template and replace its rows.
    ///
    /// Unparseable content clears the template's rows rather than keeping
    /// stale references around; the next successful parse restores them.
    pub fn update_template(&mut self, key: &str, content: &str) {
        match serde_json::from_str::<TemplateDoc>(content) {
            Ok(doc) => {
                let rows = doc
                    .sections
                    .into_iter()
                    .map(|(name, instance)| (name, instance.section_type))
                    .collect();
                self.templates.insert(key.to_string(), rows);
            }
            Err(_) => {
                self.templates.remove(key);
            }
        }
    }

    /// Drop a deleted template's rows.
    pub fn remove_template(&mut self, key: &str) {
        self.templates.remove(key);
    }

    /// Every instance name (across all templates) referencing a section
    /// type, sorted and deduplicated.
    pub fn instances_of(&self, section_type: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .templates
            .values()
            .flat_map(|rows| {
                rows.iter()
                    .filter(|(_, t)| *t == section_type)
                    .map(|(name, _)| name.clone())
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Classify a changed key into a reload directive.
    ///
    /// A section template with live references yields a targeted
    /// `section` event; everything else falls back to `other`.
    pub fn classify(&self, key: &str) -> HotReloadEvent {
        if let Some(section_type) = section_type_of(key) {
            let names = self.instances_of(section_type);
            if !names.is_empty() {
                return HotReloadEvent::Section {
                    key: key.to_string(),
                    names,
                };
            }
        }
        HotReloadEvent::Other {
            key: key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_keys() {
        assert!(is_structured("templates/index.json"));
        assert!(is_structured("config/settings_data.json"));
        assert!(!is_structured("sections/header.liquid"));
    }

    #[test]
    fn test_section_type_extraction() {
        assert_eq!(section_type_of("sections/header.liquid"), Some("header"));
        assert_eq!(section_type_of("sections/header"), Some("header"));
        assert_eq!(section_type_of("assets/theme.css"), None);
        assert_eq!(section_type_of("sections/nested/x.liquid"), None);
    }

    #[test]
    fn test_classification_collects_referencing_instances() {
        let mut index = SectionIndex::new();
        index.update_template(
            "templates/index.json",
            r#"{"sections":{"hero":{"type":"header"},"main":{"type":"content"}}}"#,
        );
        index.update_template(
            "templates/page.json",
            r#"{"sections":{"footer-header":{"type":"header"}}}"#,
        );

        match index.classify("sections/header.liquid") {
            HotReloadEvent::Section { key, names } => {
                assert_eq!(key, "sections/header.liquid");
                assert_eq!(names, vec!["footer-header", "hero"]);
            }
            other => panic!("expected section event, got {other:?}"),
        }
    }

    #[test]
    fn test_unreferenced_key_classifies_as_other() {
        let mut index = SectionIndex::new();
        index.update_template(
            "templates/index.json",
            r#"{"sections":{"hero":{"type":"header"}}}"#,
        );

        assert_eq!(
            index.classify("sections/sidebar.liquid"),
            HotReloadEvent::Other {
                key: "sections/sidebar.liquid".into()
            }
        );
        assert_eq!(
            index.classify("assets/theme.css"),
            HotReloadEvent::Other {
                key: "assets/theme.css".into()
            }
        );
    }

    #[test]
    fn test_update_replaces_and_remove_clears_rows() {
        let mut index = SectionIndex::new();
        index.update_template(
            "templates/index.json",
            r#"{"sections":{"hero":{"type":"header"}}}"#,
        );
        assert_eq!(index.instances_of("header"), vec!["hero"]);

        // Instance renamed: old rows must not linger.
        index.update_template(
            "templates/index.json",
            r#"{"sections":{"banner":{"type":"header"}}}"#,
        );
        assert_eq!(index.instances_of("header"), vec!["banner"]);

        index.remove_template("templates/index.json");
        assert!(index.instances_of("header").is_empty());
    }

    #[test]
    fn test_unparseable_template_clears_rows() {
        let mut index = SectionIndex::new();
        index.update_template(
            "templates/index.json",
            r#"{"sections":{"hero":{"type":"header"}}}"#,
        );
        index.update_template("templates/index.json", "{not json");
        assert!(index.instances_of("header").is_empty());
    }
}
