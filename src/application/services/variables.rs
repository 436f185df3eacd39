//! Variable dependency lists for a set of tree expressions.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use crate::application::ApplicationResult;
use crate::domain::parser::{parse_tree_variables, VariableCounts};
use crate::domain::selection::{compile_all, unanchored};
use crate::domain::{tree_to_any_tree, NodeKind, TreeSource};

/// Count the variables needed by `expressions`.
///
/// Keys matching any `to_remove` pattern (searched anywhere in the key) are
/// dropped; every `to_replace` match is cut out of the remaining keys, counts
/// of keys that collide afterwards are summed. With a `tree`, keys naming
/// neither a node nor a dotted path of the tree are dropped.
#[instrument(level = "debug", skip(tree))]
pub fn get_and_test_variable_list<S: AsRef<str> + std::fmt::Debug>(
    expressions: &[S],
    to_remove: &[S],
    to_replace: &[S],
    tree: Option<&dyn TreeSource>,
) -> ApplicationResult<VariableCounts> {
    let remove = compile_all(to_remove, unanchored)?;
    let replace = compile_all(to_replace, unanchored)?;

    let mut counts = VariableCounts::new();
    for expression in expressions {
        // errors are logged by the parser, the expression is skipped
        let _ = parse_tree_variables(expression.as_ref(), &mut counts);
    }

    counts.retain(|key, _| !remove.iter().any(|re| re.is_match(key)));

    for re in &replace {
        let mut replaced = VariableCounts::new();
        for (key, count) in counts {
            let key = re.replace_all(&key, "").into_owned();
            *replaced.entry(key).or_insert(0) += count;
        }
        counts = replaced;
    }

    if let Some(tree) = tree {
        let known = tree_names(tree);
        counts.retain(|key, _| {
            let exists = known.contains(key.as_str());
            if !exists {
                info!("Not existing tree variable {}", key);
            }
            exists
        });
    }

    debug!("variables: {:?}", counts);
    Ok(counts)
}

/// Node names and dotted paths of the tree hierarchy.
fn tree_names(tree: &dyn TreeSource) -> HashSet<String> {
    let arena = tree_to_any_tree(tree);
    let mut names = HashSet::new();
    for (idx, node) in arena.iter() {
        if node.data.kind == NodeKind::Base {
            continue;
        }
        names.insert(node.data.name.clone());
        names.insert(arena.qualified_name(idx));
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InMemoryTree;

    const EXPRESSIONS: [&str; 3] = [
        "meanMIP>0&resolutionMIP>0",
        "meanMIP:meanMIPele",
        "tab.sliders(slider.meanMIP(45,55,0.1,45,55),slider.meanMIPele(50,80,0.2,50,80))",
    ];

    #[test]
    fn test_remove_and_replace() {
        let counts =
            get_and_test_variable_list(&EXPRESSIONS, &["tab\\.", "^sliders$"], &["slider\\."], None)
                .unwrap();
        let keys: Vec<_> = counts.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["meanMIP", "meanMIPele", "resolutionMIP"]);
        // two from expressions, one from the collapsed slider.meanMIP
        assert_eq!(counts["meanMIP"], 3);
        assert_eq!(counts["meanMIPele"], 2);
    }

    #[test]
    fn test_tree_filter_drops_unknown() {
        let mut tree = InMemoryTree::new("qa");
        tree.add_column("meanMIP", vec![50.0]).unwrap();
        tree.add_column("track.fX", vec![1.0]).unwrap();
        tree.set_alias("resolutionMIP", "meanMIP*0.1");

        let expressions = ["meanMIP>0&resolutionMIP>0", "track.fX*missing"];
        let counts =
            get_and_test_variable_list(&expressions, &[], &[], Some(&tree)).unwrap();
        let keys: Vec<_> = counts.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["meanMIP", "resolutionMIP", "track.fX"]);
    }

    #[test]
    fn test_unparsable_expression_is_skipped() {
        let counts = get_and_test_variable_list(&["a>(b", "c+d"], &[], &[], None).unwrap();
        assert_eq!(counts.len(), 2);
        assert!(counts.contains_key("c"));
    }
}
