//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treeplayer/treeplayer.toml`
//! 3. Local config: `<dir>/.treeplayer.toml` (usually the working directory)
//! 4. Environment variables: `TREEPLAYER_*` prefix

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::services::export::ExportFormat;
use crate::application::services::frame::{ColumnMask, FrameOptions, DEFAULT_COLUMN_MASK};
use crate::application::ApplicationError;
use crate::util::path::expand_env_vars;

/// Column-name rewrite rule: every match of `pattern` becomes `replacement`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaskRule {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}

/// Raw settings for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub n_entries: Option<usize>,
    pub first_entry: Option<usize>,
    pub column_mask: Option<Vec<MaskRule>>,
    pub exclude: Option<Vec<String>>,
    pub format: Option<ExportFormat>,
    pub tree_dir: Option<PathBuf>,
}

/// Unified configuration for treeplayer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Maximum number of entries converted into a frame
    pub n_entries: usize,
    /// First entry converted into a frame
    pub first_entry: usize,
    /// Leaf patterns never selected by `select`
    pub exclude: Vec<String>,
    /// Output format of `export`
    pub format: ExportFormat,
    /// Directory relative tree manifests are looked up in (default: cwd)
    pub tree_dir: Option<PathBuf>,
    /// Column-name rewrite rules, applied in order
    pub column_mask: Vec<MaskRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            n_entries: 100_000_000,
            first_entry: 0,
            column_mask: DEFAULT_COLUMN_MASK
                .iter()
                .map(|(pattern, replacement)| MaskRule {
                    pattern: pattern.to_string(),
                    replacement: replacement.to_string(),
                })
                .collect(),
            exclude: vec![],
            format: ExportFormat::Csv,
            tree_dir: None,
        }
    }
}

/// Get the XDG config directory for treeplayer.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treeplayer").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treeplayer.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".treeplayer.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Union of `base` and `overlay`; `!item` in the overlay removes `item`.
///
/// ```ignore
/// merge_array(&["a", "b"], &["c"])       // → ["a", "b", "c"]
/// merge_array(&["a", "b"], &["!a", "c"]) // → ["b", "c"]
/// ```
pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
    let mut result: Vec<String> = base.to_vec();
    for pattern in overlay {
        if let Some(negated) = pattern.strip_prefix('!') {
            result.retain(|item| item != negated);
        } else if !result.contains(pattern) {
            result.push(pattern.clone());
        }
    }
    let mut seen = HashSet::new();
    result.retain(|item| seen.insert(item.clone()));
    result
}

impl Settings {
    /// Frame conversion options. A `user_mask` (`:`-separated tokens cut
    /// out of column names) replaces the configured `column_mask`.
    pub fn frame_options(&self, user_mask: Option<&str>) -> Result<FrameOptions, ApplicationError> {
        let mask = match user_mask {
            Some(user_mask) => ColumnMask::removing(user_mask)?,
            None => {
                let rules: Vec<(&str, &str)> = self
                    .column_mask
                    .iter()
                    .map(|r| (r.pattern.as_str(), r.replacement.as_str()))
                    .collect();
                ColumnMask::new(rules.as_slice())?
            }
        };
        Ok(FrameOptions {
            n_entries: self.n_entries,
            first_entry: self.first_entry,
            mask,
        })
    }

    /// Resolve a tree argument against `tree_dir`.
    pub fn tree_path(&self, path: &Path) -> PathBuf {
        let expanded = PathBuf::from(expand_env_vars(&path.to_string_lossy()));
        match &self.tree_dir {
            Some(dir) if expanded.is_relative() => dir.join(expanded),
            _ => expanded,
        }
    }

    fn expand_paths(&mut self) {
        if let Some(dir) = &self.tree_dir {
            self.tree_dir = Some(PathBuf::from(expand_env_vars(&dir.to_string_lossy())));
        }
    }

    /// Merge local config onto self: scalars override, `exclude` unions.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            n_entries: overlay.n_entries.unwrap_or(self.n_entries),
            first_entry: overlay.first_entry.unwrap_or(self.first_entry),
            column_mask: overlay
                .column_mask
                .clone()
                .unwrap_or_else(|| self.column_mask.clone()),
            exclude: overlay
                .exclude
                .as_ref()
                .map(|o| merge_array(&self.exclude, o))
                .unwrap_or_else(|| self.exclude.clone()),
            format: overlay.format.unwrap_or(self.format),
            tree_dir: overlay.tree_dir.clone().or_else(|| self.tree_dir.clone()),
        }
    }

    /// Apply global config onto defaults: everything specified replaces.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            n_entries: global.n_entries.unwrap_or(self.n_entries),
            first_entry: global.first_entry.unwrap_or(self.first_entry),
            column_mask: global
                .column_mask
                .clone()
                .unwrap_or_else(|| self.column_mask.clone()),
            exclude: global.exclude.clone().unwrap_or_else(|| self.exclude.clone()),
            format: global.format.unwrap_or(self.format),
            tree_dir: global.tree_dir.clone().or_else(|| self.tree_dir.clone()),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Array Merge Semantics
    /// - Defaults → Global: REPLACE
    /// - Global → Local: `exclude` UNIONS (with `!pattern` removal), `column_mask` REPLACES
    /// - Any → Env vars: REPLACE
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();

        Ok(current)
    }

    /// Apply TREEPLAYER_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("TREEPLAYER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("exclude"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get::<usize>("n_entries") {
            settings.n_entries = val;
        }
        if let Ok(val) = config.get::<usize>("first_entry") {
            settings.first_entry = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("exclude") {
            settings.exclude = val;
        }
        if let Ok(val) = config.get_string("format") {
            settings.format = val
                .parse()
                .map_err(|message| ApplicationError::Config { message })?;
        }
        if let Ok(val) = config.get_string("tree_dir") {
            settings.tree_dir = Some(PathBuf::from(val));
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# treeplayer configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/treeplayer/treeplayer.toml
#   Local:  ./.treeplayer.toml
#   Env:    TREEPLAYER_* environment variables
#
# Local `exclude` entries are added to the global ones;
# use "!pattern" to remove an inherited entry.

# n_entries = 100000000
# first_entry = 0
# format = "csv"            # csv | ipc
# tree_dir = "~/trees"
# exclude = [".*ITS.*"]

# [[column_mask]]
# pattern = '\.fElements'
# replacement = ""
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_building_frame_options_then_default_mask_applies() {
        let options = Settings::default().frame_options(None).unwrap();
        assert_eq!(options.n_entries, 100_000_000);
        assert_eq!(options.mask.apply("track.fX"), "track_X");
    }

    #[test]
    fn given_user_mask_when_building_frame_options_then_tokens_removed() {
        let options = Settings::default().frame_options(Some("LHC15o.")).unwrap();
        assert_eq!(options.mask.apply("LHC15o.meanG"), "meanG");
        assert_eq!(options.mask.apply("LHC15o.track.fX"), "track.fX");
    }

    #[test]
    fn given_invalid_mask_pattern_when_building_frame_options_then_error() {
        let settings = Settings {
            column_mask: vec![MaskRule {
                pattern: "(".into(),
                replacement: String::new(),
            }],
            ..Default::default()
        };
        assert!(settings.frame_options(None).is_err());
    }

    #[test]
    fn test_merge_array_union_and_negation() {
        let base = vec!["a".to_string(), "b".to_string()];
        let overlay = vec!["!a".to_string(), "c".to_string(), "b".to_string()];
        assert_eq!(merge_array(&base, &overlay), vec!["b", "c"]);
    }

    #[test]
    fn test_local_merge_unions_exclude_and_overrides_scalars() {
        let base = Settings {
            exclude: vec![".*ITS.*".into()],
            ..Default::default()
        };
        let raw = RawSettings {
            n_entries: Some(10),
            exclude: Some(vec![".*TPC.*".into()]),
            ..Default::default()
        };
        let merged = base.merge_with(&raw);
        assert_eq!(merged.n_entries, 10);
        assert_eq!(merged.first_entry, 0);
        assert_eq!(merged.exclude, vec![".*ITS.*", ".*TPC.*"]);
    }

    #[test]
    fn test_apply_global_replaces_arrays() {
        let base = Settings {
            exclude: vec![".*ITS.*".into()],
            ..Default::default()
        };
        let raw = RawSettings {
            exclude: Some(vec![".*TPC.*".into()]),
            column_mask: Some(vec![]),
            format: Some(ExportFormat::Ipc),
            ..Default::default()
        };
        let global = base.apply_global(&raw);
        assert_eq!(global.exclude, vec![".*TPC.*"]);
        assert!(global.column_mask.is_empty());
        assert_eq!(global.format, ExportFormat::Ipc);
    }

    #[test]
    fn given_tree_dir_when_resolving_then_relative_paths_anchor_there() {
        let settings = Settings {
            tree_dir: Some(PathBuf::from("/data/trees")),
            ..Default::default()
        };
        assert_eq!(
            settings.tree_path(Path::new("qa.toml")),
            PathBuf::from("/data/trees/qa.toml")
        );
        assert_eq!(settings.tree_path(Path::new("/tmp/qa.toml")), PathBuf::from("/tmp/qa.toml"));
    }

    #[test]
    fn test_template_parses() {
        let raw: RawSettings = toml::from_str(&Settings::template()).unwrap();
        assert!(raw.n_entries.is_none());
    }
}
