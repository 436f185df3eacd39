//! Arena-based n-ary tree mirroring a branch/alias/friend hierarchy.

use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};

/// Role of a node inside an alias tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Synthetic root holding the top-level entries of a tree
    Base,
    /// Branch (or friend tree holding branches)
    Branch,
    /// Named formula over branches and other aliases
    Alias,
    /// Plain word found while expanding an alias formula
    Variable,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Base => "base",
            NodeKind::Branch => "branch",
            NodeKind::Alias => "alias",
            NodeKind::Variable => "variable",
        };
        f.write_str(s)
    }
}

/// Data payload for tree nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    /// Branch, alias or variable name; empty for the base node
    pub name: String,
    pub kind: NodeKind,
    /// Alias formula, if the node is an alias
    pub content: Option<String>,
}

impl NodeData {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            Some(content) => write!(f, "{} = {}", self.name, content),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug)]
pub struct TreeNode {
    pub data: NodeData,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in insertion order
    pub children: Vec<Index>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Search limits, same meaning as anytree's `findall` keywords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Maximum depth to descend into (root = level 1)
    pub max_level: Option<usize>,
    /// Fail if fewer nodes match
    pub min_count: Option<usize>,
    /// Fail if more nodes match
    pub max_count: Option<usize>,
}

impl FindOptions {
    fn check(&self, found: usize) -> DomainResult<()> {
        let too_few = self.min_count.is_some_and(|min| found < min);
        let too_many = self.max_count.is_some_and(|max| found > max);
        if too_few || too_many {
            return Err(DomainError::CountMismatch {
                found,
                min: self.min_count,
                max: self.max_count,
            });
        }
        Ok(())
    }
}

/// Arena-based tree structure.
///
/// Uses generational arena for memory-safe node references and O(1) lookups.
/// A tree is built once per query and dropped afterwards.
#[derive(Debug)]
pub struct TreeArena {
    arena: Arena<TreeNode>,
    root: Option<Index>,
}

impl Default for TreeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeArena {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    /// Insert a node below `parent`; a node without parent becomes the root.
    #[instrument(level = "trace", skip(self))]
    pub fn insert_node(&mut self, data: NodeData, parent: Option<Index>) -> Index {
        let node = TreeNode {
            data,
            parent,
            children: Vec::new(),
        };
        let node_idx = self.arena.insert(node);

        if let Some(parent_idx) = parent {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.push(node_idx);
            }
        } else {
            self.root = Some(node_idx);
        }

        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn children(&self, idx: Index) -> &[Index] {
        self.get_node(idx)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Pre-order traversal, children left to right.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    /// Children before their parent.
    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        if let Some(root) = self.root {
            self.calculate_depth(root)
        } else {
            0
        }
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        if let Some(node) = self.get_node(node_idx) {
            1 + node
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }

    /// Level of a node, the root being level 1.
    pub fn level(&self, idx: Index) -> usize {
        self.ancestors(idx).count()
    }

    /// Walk from a node up to the root, the node itself first.
    pub fn ancestors(&self, idx: Index) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: self.get_node(idx).map(|_| idx),
        }
    }

    /// Names from the root down to `idx`.
    pub fn path(&self, idx: Index) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .ancestors(idx)
            .filter_map(|i| self.get_node(i))
            .map(|n| n.data.name.as_str())
            .collect();
        names.reverse();
        names
    }

    /// Names joined with `/`; the unnamed base node makes it `/branch/leaf`.
    pub fn path_string(&self, idx: Index) -> String {
        self.path(idx).join("/")
    }

    /// Path relative to the base node: `branch/leaf`.
    pub fn relative_path(&self, idx: Index) -> String {
        self.named_path(idx).join("/")
    }

    /// Dotted name as used in tree expressions: `friend.branch.leaf`.
    pub fn qualified_name(&self, idx: Index) -> String {
        self.named_path(idx).join(".")
    }

    fn named_path(&self, idx: Index) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .ancestors(idx)
            .filter_map(|i| self.get_node(i))
            .filter(|n| n.data.kind != NodeKind::Base)
            .map(|n| n.data.name.as_str())
            .collect();
        names.reverse();
        names
    }

    /// Indices of all nodes without children, in pre-order.
    pub fn leaves(&self) -> Vec<Index> {
        self.iter()
            .filter(|(_, node)| node.is_leaf())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Qualified names of all leaf nodes.
    ///
    /// A tree holding only its base node has no named leaves.
    #[instrument(level = "debug", skip(self))]
    pub fn leaf_nodes(&self) -> Vec<String> {
        self.leaves()
            .into_iter()
            .filter(|&idx| {
                self.get_node(idx)
                    .is_some_and(|n| n.data.kind != NodeKind::Base)
            })
            .map(|idx| self.qualified_name(idx))
            .collect()
    }

    /// Pre-order search over the tree, honouring level and count limits.
    pub fn find_all<F>(&self, options: &FindOptions, mut filter: F) -> DomainResult<Vec<Index>>
    where
        F: FnMut(Index, &TreeNode) -> bool,
    {
        let mut found = Vec::new();
        for (idx, node) in self.iter() {
            if let Some(max_level) = options.max_level {
                if self.level(idx) > max_level {
                    continue;
                }
            }
            if filter(idx, node) {
                found.push(idx);
            }
        }
        options.check(found.len())?;
        Ok(found)
    }
}

pub struct Ancestors<'a> {
    arena: &'a TreeArena,
    next: Option<Index>,
}

impl Iterator for Ancestors<'_> {
    type Item = Index;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.arena.get_node(current).and_then(|n| n.parent);
        Some(current)
    }
}

pub struct TreeIterator<'a> {
    arena: &'a TreeArena,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(arena: &'a TreeArena) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = arena.root() {
            stack.push(root);
        }
        Self { arena, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    arena: &'a TreeArena,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(arena: &'a TreeArena) -> Self {
        let stack = arena.root().map(|root| vec![(root, false)]).unwrap_or_default();
        Self { arena, stack }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((idx, expanded)) = self.stack.pop() {
            let Some(node) = self.arena.get_node(idx) else {
                continue;
            };
            if expanded {
                return Some((idx, node));
            }
            self.stack.push((idx, true));
            self.stack
                .extend(node.children.iter().rev().map(|&child| (child, false)));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    //      ""
    //    /    \
    //  track   bz
    //  /   \
    // fX   fY
    fn sample() -> (TreeArena, Vec<Index>) {
        let mut tree = TreeArena::new();
        let base = tree.insert_node(NodeData::new("", NodeKind::Base), None);
        let track = tree.insert_node(NodeData::new("track", NodeKind::Branch), Some(base));
        let fx = tree.insert_node(NodeData::new("fX", NodeKind::Branch), Some(track));
        let fy = tree.insert_node(NodeData::new("fY", NodeKind::Branch), Some(track));
        let bz = tree.insert_node(NodeData::new("bz", NodeKind::Branch), Some(base));
        (tree, vec![base, track, fx, fy, bz])
    }

    #[test]
    fn test_paths() {
        let (tree, idx) = sample();
        assert_eq!(tree.path_string(idx[2]), "/track/fX");
        assert_eq!(tree.relative_path(idx[2]), "track/fX");
        assert_eq!(tree.qualified_name(idx[3]), "track.fY");
        assert_eq!(tree.level(idx[0]), 1);
        assert_eq!(tree.level(idx[2]), 3);
    }

    #[test]
    fn test_traversal_order() {
        let (tree, _) = sample();
        let pre: Vec<_> = tree.iter().map(|(_, n)| n.data.name.clone()).collect();
        assert_eq!(pre, vec!["", "track", "fX", "fY", "bz"]);
        let post: Vec<_> = tree
            .iter_postorder()
            .map(|(_, n)| n.data.name.as_str())
            .collect();
        assert_eq!(post, vec!["fX", "fY", "track", "bz", ""]);
    }

    #[test]
    fn test_depth_and_leaves() {
        let (tree, _) = sample();
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.leaf_nodes(), vec!["track.fX", "track.fY", "bz"]);
    }

    #[test]
    fn test_find_all_respects_max_level() {
        let (tree, _) = sample();
        let options = FindOptions {
            max_level: Some(2),
            ..Default::default()
        };
        let found = tree
            .find_all(&options, |_, n| n.data.kind == NodeKind::Branch)
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_find_all_count_bounds() {
        let (tree, _) = sample();
        let options = FindOptions {
            max_count: Some(1),
            ..Default::default()
        };
        let result = tree.find_all(&options, |_, n| n.data.name.starts_with('f'));
        assert!(matches!(
            result,
            Err(DomainError::CountMismatch { found: 2, .. })
        ));
    }
}
