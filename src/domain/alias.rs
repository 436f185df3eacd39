//! Alias dictionaries and recursive alias dependency trees.

use std::collections::{BTreeMap, HashSet};

use generational_arena::Index;
use tracing::{debug, instrument};

use crate::domain::arena::{FindOptions, NodeData, NodeKind, TreeArena};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::parser::{formula_variables, Grammar};
use crate::domain::selection::anchored;
use crate::domain::source::TreeSource;

/// Alias name to formula.
pub type AliasMap = BTreeMap<String, String>;

/// Collect the aliases of a tree into a lookup table.
pub fn alias_to_dictionary(tree: &dyn TreeSource) -> AliasMap {
    tree.aliases()
        .iter()
        .map(|(name, formula)| (name.clone(), formula.clone()))
        .collect()
}

/// Build the dependency tree of an alias.
///
/// The root is `key`; below it every distinct word of its formula, aliases
/// carrying their formula and expanded recursively.
///
/// ```text
/// dEdxOK = dEdx>0&&isOK        dEdxOK
/// isOK   = ncl>70              ├── dEdx
///                              └── isOK = ncl>70
///                                  └── ncl
/// ```
#[instrument(level = "debug", skip(aliases))]
pub fn make_alias_any_tree(key: &str, aliases: &AliasMap) -> DomainResult<TreeArena> {
    let mut arena = TreeArena::new();
    append_alias_tree(&mut arena, None, key, aliases)?;
    Ok(arena)
}

/// Attach the dependency tree of `key` below `parent` (or as root).
pub fn append_alias_tree(
    arena: &mut TreeArena,
    parent: Option<Index>,
    key: &str,
    aliases: &AliasMap,
) -> DomainResult<Index> {
    let formula = aliases
        .get(key)
        .ok_or_else(|| DomainError::UnknownAlias(key.to_string()))?;
    let node = arena.insert_node(
        NodeData::new(key, NodeKind::Alias).with_content(formula.as_str()),
        parent,
    );
    let mut chain = vec![key.to_string()];
    expand(arena, node, formula, aliases, &mut chain)?;
    Ok(node)
}

fn expand(
    arena: &mut TreeArena,
    parent: Index,
    formula: &str,
    aliases: &AliasMap,
    chain: &mut Vec<String>,
) -> DomainResult<()> {
    let mut seen = HashSet::new();
    for word in formula_variables(formula, Grammar::Alias)? {
        if !seen.insert(word.clone()) {
            continue;
        }
        let Some(content) = aliases.get(&word) else {
            arena.insert_node(NodeData::new(word, NodeKind::Variable), Some(parent));
            continue;
        };
        if chain.contains(&word) {
            let mut cycle = chain.clone();
            cycle.push(word);
            return Err(DomainError::AliasCycle(cycle));
        }
        debug!("expanding alias {}", word);
        let node = arena.insert_node(
            NodeData::new(word.as_str(), NodeKind::Alias).with_content(content.as_str()),
            Some(parent),
        );
        chain.push(word);
        expand(arena, node, content, aliases, chain)?;
        chain.pop();
    }
    Ok(())
}

/// Names of the nodes below `base` matching `regexp` at their start.
pub fn get_alias_any_tree(
    base: &TreeArena,
    regexp: &str,
    options: &FindOptions,
) -> DomainResult<Vec<String>> {
    let re = anchored(regexp)?;
    let found = base.find_all(options, |_, node| re.is_match(&node.data.name))?;
    Ok(found
        .into_iter()
        .filter_map(|idx| base.get_node(idx))
        .map(|node| node.data.name.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases(pairs: &[(&str, &str)]) -> AliasMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_make_alias_any_tree_nested() {
        let aliases = aliases(&[
            ("dEdxOK", "dEdx>0&&isOK&&dEdx<100"),
            ("isOK", "(ncl>70)&&(chi2<4)"),
        ]);
        let tree = make_alias_any_tree("dEdxOK", &aliases).unwrap();
        let nodes: Vec<_> = tree
            .iter()
            .map(|(_, n)| (n.data.name.clone(), n.data.kind))
            .collect();
        assert_eq!(
            nodes,
            vec![
                ("dEdxOK".to_string(), NodeKind::Alias),
                ("dEdx".to_string(), NodeKind::Variable),
                ("isOK".to_string(), NodeKind::Alias),
                ("ncl".to_string(), NodeKind::Variable),
                ("chi2".to_string(), NodeKind::Variable),
            ]
        );
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_unknown_key() {
        let result = make_alias_any_tree("missing", &AliasMap::new());
        assert!(matches!(result, Err(DomainError::UnknownAlias(k)) if k == "missing"));
    }

    #[test]
    fn test_cycle_is_reported() {
        let aliases = aliases(&[("a", "b+1"), ("b", "c*2"), ("c", "a")]);
        let result = make_alias_any_tree("a", &aliases);
        match result {
            Err(DomainError::AliasCycle(chain)) => assert_eq!(chain, vec!["a", "b", "c", "a"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_dependency_is_not_a_cycle() {
        let aliases = aliases(&[("a", "b+c"), ("b", "x"), ("c", "b*2")]);
        let tree = make_alias_any_tree("a", &aliases).unwrap();
        assert_eq!(tree.leaf_nodes(), vec!["a.b.x", "a.c.b.x"]);
    }

    #[test]
    fn test_get_alias_any_tree() {
        let aliases = aliases(&[("qa", "MIPquality_Warning||global_Warning||bz")]);
        let tree = make_alias_any_tree("qa", &aliases).unwrap();
        let found = get_alias_any_tree(&tree, ".*Warning", &FindOptions::default()).unwrap();
        assert_eq!(found, vec!["MIPquality_Warning", "global_Warning"]);
    }
}
