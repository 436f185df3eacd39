use generational_arena::Index;
use termtree::Tree;

use crate::domain::arena::{NodeKind, TreeArena};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TreeNodeConvert for TreeArena {
    fn to_tree_string(&self) -> Tree<String> {
        let Some(root_idx) = self.root() else {
            return Tree::new("Empty tree".to_string());
        };
        let mut tree = Tree::new(label(self, root_idx));
        build_tree(self, root_idx, &mut tree);
        tree
    }
}

fn label(arena: &TreeArena, idx: Index) -> String {
    match arena.get_node(idx) {
        Some(node) if node.data.kind == NodeKind::Base => ".".to_string(),
        Some(node) => node.data.to_string(),
        None => String::new(),
    }
}

fn build_tree(arena: &TreeArena, node_idx: Index, parent_tree: &mut Tree<String>) {
    for &child_idx in arena.children(node_idx) {
        let mut child_tree = Tree::new(label(arena, child_idx));
        build_tree(arena, child_idx, &mut child_tree);
        parent_tree.push(child_tree);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alias::{make_alias_any_tree, AliasMap};

    #[test]
    fn test_render_alias_tree() {
        let mut aliases = AliasMap::new();
        aliases.insert("ok".to_string(), "a>0&&b".to_string());
        aliases.insert("b".to_string(), "c<1".to_string());
        let tree = make_alias_any_tree("ok", &aliases).unwrap();

        let rendered = tree.to_tree_string().to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "ok = a>0&&b");
        assert!(lines[1].ends_with("a"));
        assert!(lines[2].ends_with("b = c<1"));
        assert!(lines[3].ends_with("c"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(TreeArena::new().to_tree_string().to_string().trim(), "Empty tree");
    }
}
