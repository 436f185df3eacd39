//! Builds the branch/alias/friend hierarchy of a tree.

use generational_arena::Index;
use tracing::{debug, instrument, warn};

use crate::domain::arena::{NodeData, NodeKind, TreeArena};
use crate::domain::source::{Branch, TreeSource};

/// Constructs an [`TreeArena`] mirroring a tree.
///
/// Layout below the unnamed base node:
/// - every branch with its sub-branches,
/// - every alias (formula kept as node content),
/// - every friend tree as a branch node holding the friend's branches.
#[derive(Debug)]
pub struct TreeBuilder {
    include_aliases: bool,
    include_friends: bool,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            include_aliases: true,
            include_friends: true,
        }
    }

    pub fn aliases(mut self, include: bool) -> Self {
        self.include_aliases = include;
        self
    }

    pub fn friends(mut self, include: bool) -> Self {
        self.include_friends = include;
        self
    }

    #[instrument(level = "debug", skip_all, fields(tree = tree.name()))]
    pub fn build(&self, tree: &dyn TreeSource) -> TreeArena {
        let mut arena = TreeArena::new();
        let base = arena.insert_node(NodeData::new("", NodeKind::Base), None);

        for branch in tree.branches() {
            insert_branch(&mut arena, branch, base);
        }

        if self.include_aliases {
            for (name, formula) in tree.aliases() {
                arena.insert_node(
                    NodeData::new(name.as_str(), NodeKind::Alias).with_content(formula.as_str()),
                    Some(base),
                );
            }
        }

        if self.include_friends {
            for info in tree.friends() {
                let Some(friend) = tree.friend(&info.name) else {
                    warn!("friend tree '{}' cannot be resolved, skipped", info.name);
                    continue;
                };
                let node = arena.insert_node(NodeData::new(info.name.as_str(), NodeKind::Branch), Some(base));
                for branch in friend.branches() {
                    insert_branch(&mut arena, branch, node);
                }
            }
        }

        debug!("tree {} -> {} nodes", tree.name(), arena.len());
        arena
    }
}

fn insert_branch(arena: &mut TreeArena, branch: &Branch, parent: Index) {
    let idx = arena.insert_node(NodeData::new(branch.name.as_str(), NodeKind::Branch), Some(parent));
    for child in &branch.children {
        insert_branch(arena, child, idx);
    }
}

/// Expand a tree, its aliases and friends into an alias tree.
pub fn tree_to_any_tree(tree: &dyn TreeSource) -> TreeArena {
    TreeBuilder::new().build(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::InMemoryTree;

    fn sample_tree() -> InMemoryTree {
        let mut friend = InMemoryTree::new("map");
        friend.add_column("hnormChi2.meanG", vec![1.0]).unwrap();

        let mut tree = InMemoryTree::new("qa");
        tree.add_column("bz", vec![0.5]).unwrap();
        tree.add_column("track.fX", vec![1.0]).unwrap();
        tree.set_alias("bzPos", "bz>0");
        tree.add_friend("LHC15o", "map", friend);
        tree
    }

    #[test]
    fn test_tree_to_any_tree_layout() {
        let arena = tree_to_any_tree(&sample_tree());
        let names: Vec<_> = arena
            .iter()
            .map(|(_, n)| (n.data.name.clone(), n.data.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("".to_string(), NodeKind::Base),
                ("bz".to_string(), NodeKind::Branch),
                ("track".to_string(), NodeKind::Branch),
                ("fX".to_string(), NodeKind::Branch),
                ("bzPos".to_string(), NodeKind::Alias),
                ("LHC15o".to_string(), NodeKind::Branch),
                ("hnormChi2".to_string(), NodeKind::Branch),
                ("meanG".to_string(), NodeKind::Branch),
            ]
        );
    }

    #[test]
    fn test_alias_nodes_keep_formula() {
        let arena = tree_to_any_tree(&sample_tree());
        let alias = arena
            .iter()
            .find(|(_, n)| n.data.kind == NodeKind::Alias)
            .map(|(_, n)| n.data.content.clone());
        assert_eq!(alias, Some(Some("bz>0".to_string())));
    }

    #[test]
    fn test_builder_can_skip_friends() {
        let arena = TreeBuilder::new().friends(false).build(&sample_tree());
        assert_eq!(arena.leaf_nodes(), vec!["bz", "track.fX", "bzPos"]);
    }
}
