//
// config.rs
//
// Bridge configuration: content kinds per extension and which kinds get a
// background syntax parse
//

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Kind of content a resource holds, as announced to the analysis server in
/// `textDocument/didOpen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Go,
    Mod,
    Sum,
    Work,
    Tmpl,
}

impl ContentKind {
    /// Language identifier used on the wire.
    pub fn language_id(self) -> &'static str {
        match self {
            ContentKind::Go => "go",
            ContentKind::Mod => "go.mod",
            ContentKind::Sum => "go.sum",
            ContentKind::Work => "go.work",
            ContentKind::Tmpl => "tmpl",
        }
    }

    fn from_setting(value: &str) -> Option<Self> {
        match value {
            "go" => Some(ContentKind::Go),
            "mod" | "go.mod" => Some(ContentKind::Mod),
            "sum" | "go.sum" => Some(ContentKind::Sum),
            "work" | "go.work" => Some(ContentKind::Work),
            "tmpl" => Some(ContentKind::Tmpl),
            _ => None,
        }
    }
}

/// Configuration shared by the synchronizer and the parse coordinator.
///
/// Built once at startup and handed to consumers by value. Later adjustments
/// go through [`BridgeConfig::with_overrides`], which returns a modified clone.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Kind used for resources with no extension or an unknown one
    pub default_kind: ContentKind,
    /// Extension (without the dot) to content kind
    pub extension_kinds: BTreeMap<String, ContentKind>,
    /// Kinds that get a background structural parse
    pub parse_kinds: Vec<ContentKind>,
    /// Whether `textDocument/didSave` carries the full text
    pub save_includes_text: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let extension_kinds = [
            ("go", ContentKind::Go),
            ("mod", ContentKind::Mod),
            ("sum", ContentKind::Sum),
            ("work", ContentKind::Work),
        ]
        .into_iter()
        .map(|(ext, kind)| (ext.to_string(), kind))
        .collect();

        Self {
            // cgo files predating go1.15 have no extension at all
            default_kind: ContentKind::Go,
            extension_kinds,
            parse_kinds: vec![ContentKind::Go],
            save_includes_text: false,
        }
    }
}

impl BridgeConfig {
    /// Detect the content kind of a resource from its file extension.
    pub fn detect_kind(&self, name: &str) -> ContentKind {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.extension_kinds.get(ext))
            .copied()
            .unwrap_or(self.default_kind)
    }

    /// Whether documents with this name should be parsed in the background.
    ///
    /// Only resources whose extension maps explicitly to a parseable kind
    /// qualify; the default kind never triggers a parse on its own.
    pub fn should_parse(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.extension_kinds.get(ext))
            .is_some_and(|kind| self.parse_kinds.contains(kind))
    }

    /// Apply overrides to a clone of this configuration.
    pub fn with_overrides<'a, I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = &'a dyn Fn(&mut BridgeConfig)>,
    {
        let mut config = self.clone();
        for apply in overrides {
            apply(&mut config);
        }
        config
    }

    /// Build a configuration from editor-supplied settings.
    ///
    /// Reads camelCase keys from a JSON object. Only keys present in the value
    /// are applied; everything else keeps its default.
    ///
    /// Supported keys:
    /// - `defaultKind`: kind name used for unknown extensions
    /// - `extensionKinds`: object of extension to kind name, merged over defaults
    /// - `parseKinds`: array of kind names to parse in the background
    /// - `saveIncludesText`: boolean
    pub fn from_settings(settings: &serde_json::Value) -> Self {
        let mut config = Self::default();

        if let Some(kind) = settings
            .get("defaultKind")
            .and_then(|v| v.as_str())
            .and_then(ContentKind::from_setting)
        {
            config.default_kind = kind;
        }

        if let Some(map) = settings.get("extensionKinds").and_then(|v| v.as_object()) {
            for (ext, value) in map {
                match value.as_str().and_then(ContentKind::from_setting) {
                    Some(kind) => {
                        config
                            .extension_kinds
                            .insert(ext.trim_start_matches('.').to_string(), kind);
                    }
                    None => log::warn!("Ignoring unknown content kind for extension {ext}: {value}"),
                }
            }
        }

        if let Some(kinds) = settings.get("parseKinds").and_then(|v| v.as_array()) {
            config.parse_kinds = kinds
                .iter()
                .filter_map(|v| v.as_str().and_then(ContentKind::from_setting))
                .collect();
        }

        if let Some(flag) = settings.get("saveIncludesText").and_then(|v| v.as_bool()) {
            config.save_includes_text = flag;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_kind_by_extension() {
        let config = BridgeConfig::default();
        assert_eq!(config.detect_kind("/src/main.go"), ContentKind::Go);
        assert_eq!(config.detect_kind("/src/go.mod"), ContentKind::Mod);
        assert_eq!(config.detect_kind("/src/go.sum"), ContentKind::Sum);
        assert_eq!(config.detect_kind("/src/go.work"), ContentKind::Work);
    }

    #[test]
    fn test_unknown_or_missing_extension_uses_default() {
        let config = BridgeConfig::default();
        assert_eq!(config.detect_kind("/src/cgo_file"), ContentKind::Go);
        assert_eq!(config.detect_kind("/src/notes.txt"), ContentKind::Go);
    }

    #[test]
    fn test_only_go_files_are_parsed_by_default() {
        let config = BridgeConfig::default();
        assert!(config.should_parse("/src/main.go"));
        assert!(!config.should_parse("/src/go.mod"));
        assert!(!config.should_parse("/src/README"));
    }

    #[test]
    fn test_overrides_leave_original_untouched() {
        let base = BridgeConfig::default();
        let save_text: &dyn Fn(&mut BridgeConfig) = &|c| c.save_includes_text = true;
        let tmpl: &dyn Fn(&mut BridgeConfig) = &|c| {
            c.extension_kinds.insert("tmpl".into(), ContentKind::Tmpl);
        };

        let derived = base.with_overrides([save_text, tmpl]);

        assert!(derived.save_includes_text);
        assert_eq!(derived.detect_kind("page.tmpl"), ContentKind::Tmpl);
        assert_eq!(base, BridgeConfig::default());
    }

    #[test]
    fn test_from_settings_applies_present_keys_only() {
        let settings = json!({
            "extensionKinds": { ".gotmpl": "tmpl", "weird": "nonsense" },
            "parseKinds": ["go", "tmpl"],
            "saveIncludesText": true
        });

        let config = BridgeConfig::from_settings(&settings);

        assert_eq!(config.default_kind, ContentKind::Go);
        assert_eq!(config.detect_kind("x.gotmpl"), ContentKind::Tmpl);
        assert_eq!(config.detect_kind("x.weird"), ContentKind::Go);
        assert!(config.should_parse("x.gotmpl"));
        assert!(config.save_includes_text);
    }

    #[test]
    fn test_language_ids() {
        assert_eq!(ContentKind::Go.language_id(), "go");
        assert_eq!(ContentKind::Mod.language_id(), "go.mod");
        assert_eq!(ContentKind::Sum.language_id(), "go.sum");
    }
}
