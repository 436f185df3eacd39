//! Tree manifest loading
//!
//! A manifest is a TOML file describing a tree: its data table, aliases,
//! metadata and friend trees. Friends may point at another manifest or
//! directly at a table.
//!
//! ```toml
//! name = "qa"
//! data = "qa.tsv"
//! rows = 1000          # optional: read at most this many table rows
//!
//! [aliases]
//! bzPos = "bz>0"
//!
//! [metadata]
//! "bz.Title" = "magnetic field"
//!
//! [[friends]]
//! name = "LHC15o"
//! title = "map.root"
//! manifest = "map.toml"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt, ManifestResultExt};
use crate::domain::{InMemoryTree, Table};
use crate::infrastructure::traits::FileSystem;
use crate::util::path::{resolve_relative, PathExt};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeManifest {
    pub name: Option<String>,
    pub data: Option<PathBuf>,
    /// Maximum number of table rows read
    pub rows: Option<usize>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub friends: Vec<FriendManifest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FriendManifest {
    pub name: String,
    pub title: Option<String>,
    pub manifest: Option<PathBuf>,
    pub data: Option<PathBuf>,
    /// Maximum number of rows read from `data`
    pub rows: Option<usize>,
}

/// Service loading trees from manifests and tables.
pub struct TreeLoader {
    fs: Arc<dyn FileSystem>,
}

impl TreeLoader {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Load a tree from a manifest (`*.toml`) or a table file.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<InMemoryTree> {
        let mut stack = Vec::new();
        self.load_any(path, &mut stack)
    }

    fn load_any(&self, path: &Path, stack: &mut Vec<PathBuf>) -> ApplicationResult<InMemoryTree> {
        if !self.fs.exists(path) {
            return Err(ApplicationError::ManifestNotFound(path.to_path_buf()));
        }
        if path.is_manifest() {
            self.load_manifest(path, stack)
        } else {
            self.load_table(path, &path.tree_name(), None)
        }
    }

    fn load_manifest(&self, path: &Path, stack: &mut Vec<PathBuf>) -> ApplicationResult<InMemoryTree> {
        let canonical = self
            .fs
            .canonicalize(path)
            .with_path_context("canonicalize", path)?;
        if stack.contains(&canonical) {
            return Err(invalid(path, "friend manifests form a cycle"));
        }
        stack.push(canonical);

        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read manifest", path)?;
        let manifest: TreeManifest = toml::from_str(&content).in_manifest(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let name = manifest.name.clone().unwrap_or_else(|| path.tree_name());

        let mut tree = match &manifest.data {
            Some(data) => self.load_table(&resolve_relative(base_dir, data), &name, manifest.rows)?,
            None => InMemoryTree::new(name.as_str()),
        };
        for (alias, formula) in &manifest.aliases {
            tree.set_alias(alias.as_str(), formula.as_str());
        }
        for (key, value) in &manifest.metadata {
            tree.set_metadata(key.as_str(), value.as_str());
        }

        for friend in &manifest.friends {
            let friend_tree = match (&friend.manifest, &friend.data) {
                (Some(m), None) => self.load_any(&resolve_relative(base_dir, m), stack)?,
                (None, Some(d)) => {
                    let d = resolve_relative(base_dir, d);
                    if !self.fs.exists(&d) {
                        return Err(ApplicationError::ManifestNotFound(d));
                    }
                    self.load_table(&d, &friend.name, friend.rows)?
                }
                _ => {
                    return Err(invalid(
                        path,
                        format!("friend '{}' needs exactly one of manifest or data", friend.name),
                    ))
                }
            };
            let title = friend
                .title
                .clone()
                .unwrap_or_else(|| friend_tree_title(friend));
            debug!("friend {} ({})", friend.name, title);
            tree.add_friend(friend.name.as_str(), title, friend_tree);
        }

        stack.pop();
        info!("loaded tree {} from {}", name, path.display());
        Ok(tree)
    }

    fn load_table(&self, path: &Path, name: &str, rows: Option<usize>) -> ApplicationResult<InMemoryTree> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read table", path)?;
        let table = Table::parse_rows(&content, rows)?;
        debug!("table {}: {} rows", path.display(), table.rows());
        Ok(InMemoryTree::from_table(name, table)?)
    }
}

fn friend_tree_title(friend: &FriendManifest) -> String {
    friend
        .manifest
        .as_ref()
        .or(friend.data.as_ref())
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

fn invalid(path: &Path, message: impl Into<String>) -> ApplicationError {
    ApplicationError::InvalidManifest {
        path: path.to_path_buf(),
        message: message.into(),
    }
}
