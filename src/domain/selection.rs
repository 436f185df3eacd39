//! Regular-expression selection of branches and aliases in an alias tree.

use generational_arena::Index;
use regex::Regex;
use tracing::{debug, instrument};

use crate::domain::arena::{FindOptions, NodeKind, TreeArena};
use crate::domain::error::{DomainError, DomainResult};

/// Compile a pattern that must match at the start of the haystack.
pub fn anchored(pattern: &str) -> DomainResult<Regex> {
    Regex::new(&format!("^(?:{})", pattern)).map_err(|e| DomainError::pattern(pattern, e))
}

/// Compile a pattern that may match anywhere in the haystack.
pub fn unanchored(pattern: &str) -> DomainResult<Regex> {
    Regex::new(pattern).map_err(|e| DomainError::pattern(pattern, e))
}

pub fn compile_all<S: AsRef<str>>(
    patterns: &[S],
    compile: fn(&str) -> DomainResult<Regex>,
) -> DomainResult<Vec<Regex>> {
    patterns.iter().map(|p| compile(p.as_ref())).collect()
}

/// Where [`find_selected_branch`] looks for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOptions {
    /// Match against the path relative to the base node (`track/fX`)
    pub in_path: bool,
    /// Match against the node name (`fX`)
    pub in_name: bool,
    pub find: FindOptions,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            in_path: true,
            in_name: true,
            find: FindOptions::default(),
        }
    }
}

/// Nodes whose path or name matches `regexp` at its start.
///
/// Path matches come first, each node is reported once.
///
/// ```text
/// find_selected_branch(&tree, "MIP.*Warning", &SelectOptions::default())
///   -> [MIPattachSlopeA_Warning, MIPattachSlopeC_Warning, MIPquality_Warning]
/// ```
#[instrument(level = "debug", skip(tree))]
pub fn find_selected_branch(
    tree: &TreeArena,
    regexp: &str,
    options: &SelectOptions,
) -> DomainResult<Vec<Index>> {
    let re = anchored(regexp)?;
    let mut found = Vec::new();
    if options.in_path {
        found.extend(tree.find_all(&options.find, |idx, node| {
            node.data.kind != NodeKind::Base && re.is_match(&tree.relative_path(idx))
        })?);
    }
    if options.in_name {
        for idx in tree.find_all(&options.find, |_, node| {
            node.data.kind != NodeKind::Base && re.is_match(&node.data.name)
        })? {
            if !found.contains(&idx) {
                found.push(idx);
            }
        }
    }
    debug!("'{}' selected {} nodes", regexp, found.len());
    Ok(found)
}

/// Leaf paths (`friend/branch/leaf`) matching any include pattern and no
/// exclude pattern, in include order and without repeats.
///
/// ```text
/// find_selected_branches(&tree, &[".*LHC15o.*Chi2.*meanG.*"], &[".*ITS.*"])
///   -> ["LHC15o_pass1/hnormChi2TPCMult_Tgl_mdEdxDist/meanG", ...]
/// ```
#[instrument(level = "debug", skip(tree))]
pub fn find_selected_branches<S: AsRef<str> + std::fmt::Debug>(
    tree: &TreeArena,
    include: &[S],
    exclude: &[S],
) -> DomainResult<Vec<String>> {
    let include = compile_all(include, anchored)?;
    let exclude = compile_all(exclude, anchored)?;

    let leaves: Vec<String> = tree
        .leaves()
        .into_iter()
        .filter(|&idx| {
            tree.get_node(idx)
                .is_some_and(|n| n.data.kind != NodeKind::Base)
        })
        .map(|idx| tree.relative_path(idx))
        .collect();

    let mut selected: Vec<String> = Vec::new();
    for re in &include {
        for path in &leaves {
            if !re.is_match(path) || exclude.iter().any(|ex| ex.is_match(path)) {
                continue;
            }
            if !selected.contains(path) {
                selected.push(path.clone());
            }
        }
    }
    debug!("selected {} leaves", selected.len());
    Ok(selected)
}
