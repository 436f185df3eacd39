//! Tree data sources: branches, aliases, friends and per-entry columns.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::table::Table;

/// A named column within a tree, possibly split into sub-branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub children: Vec<Branch>,
}

impl Branch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    fn child_mut(&mut self, name: &str) -> &mut Branch {
        child_entry(&mut self.children, name)
    }
}

fn child_entry<'a>(branches: &'a mut Vec<Branch>, name: &str) -> &'a mut Branch {
    let pos = match branches.iter().position(|b| b.name == name) {
        Some(pos) => pos,
        None => {
            branches.push(Branch::new(name));
            branches.len() - 1
        }
    };
    &mut branches[pos]
}

/// Friend tree reference: the name it is attached under and its title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendInfo {
    pub name: String,
    pub title: String,
}

/// Read access to a tree.
///
/// Column paths are dotted branch paths (`track.fX`); friends are joined
/// row-wise by entry index.
pub trait TreeSource {
    fn name(&self) -> &str;

    /// Number of entries (rows).
    fn entries(&self) -> usize;

    /// Top-level branches.
    fn branches(&self) -> &[Branch];

    /// Aliases as `(name, formula)` in declaration order.
    fn aliases(&self) -> &[(String, String)];

    fn friends(&self) -> Vec<FriendInfo>;

    fn friend(&self, name: &str) -> Option<&dyn TreeSource>;

    /// The `metaTable` user info: variable name to description.
    fn metadata(&self) -> &BTreeMap<String, String>;

    /// Values of a leaf branch, one per entry.
    fn column(&self, path: &str) -> Option<&[f64]>;

    fn alias(&self, name: &str) -> Option<&str> {
        self.aliases()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, formula)| formula.as_str())
    }
}

/// Tree held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTree {
    name: String,
    entries: usize,
    branches: Vec<Branch>,
    columns: HashMap<String, Vec<f64>>,
    aliases: Vec<(String, String)>,
    friends: Vec<(FriendInfo, InMemoryTree)>,
    metadata: BTreeMap<String, String>,
}

impl InMemoryTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Build a tree from a table; dotted column names become sub-branches.
    #[instrument(level = "debug", skip(table))]
    pub fn from_table(name: &str, table: Table) -> DomainResult<Self> {
        let mut tree = Self::new(name);
        for (column, values) in table.names.into_iter().zip(table.columns) {
            tree.add_column(&column, values)?;
        }
        Ok(tree)
    }

    /// Add a leaf column; the first column fixes the number of entries.
    pub fn add_column(&mut self, path: &str, values: Vec<f64>) -> DomainResult<()> {
        if self.columns.is_empty() {
            self.entries = values.len();
        } else if values.len() != self.entries {
            return Err(DomainError::ColumnLength {
                name: path.to_string(),
                expected: self.entries,
                found: values.len(),
            });
        }

        let mut parts = path.split('.');
        if let Some(first) = parts.next() {
            let mut branch = child_entry(&mut self.branches, first);
            for part in parts {
                branch = branch.child_mut(part);
            }
        }
        debug!("column {} ({} entries)", path, values.len());
        self.columns.insert(path.to_string(), values);
        Ok(())
    }

    /// Define or redefine an alias; names stay unique.
    pub fn set_alias(&mut self, name: impl Into<String>, formula: impl Into<String>) {
        let name = name.into();
        let formula = formula.into();
        match self.aliases.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = formula,
            None => self.aliases.push((name, formula)),
        }
    }

    /// Attach a friend tree. A tree without columns of its own takes its
    /// entry count from the first friend.
    pub fn add_friend(&mut self, name: impl Into<String>, title: impl Into<String>, tree: InMemoryTree) {
        let info = FriendInfo {
            name: name.into(),
            title: title.into(),
        };
        if self.columns.is_empty() && self.friends.is_empty() {
            debug!("{} has no columns, {} entries from friend {}", self.name, tree.entries, info.name);
            self.entries = tree.entries;
        }
        self.friends.push((info, tree));
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }
}

impl TreeSource for InMemoryTree {
    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> usize {
        self.entries
    }

    fn branches(&self) -> &[Branch] {
        &self.branches
    }

    fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    fn friends(&self) -> Vec<FriendInfo> {
        self.friends.iter().map(|(info, _)| info.clone()).collect()
    }

    fn friend(&self, name: &str) -> Option<&dyn TreeSource> {
        self.friends
            .iter()
            .find(|(info, _)| info.name == name)
            .map(|(_, tree)| tree as &dyn TreeSource)
    }

    fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    fn column(&self, path: &str) -> Option<&[f64]> {
        self.columns.get(path).map(Vec::as_slice)
    }
}
