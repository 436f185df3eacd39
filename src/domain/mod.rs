//! Domain layer: trees, alias hierarchies and formula handling
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod alias;
pub mod arena;
pub mod builder;
pub mod error;
pub mod expr;
pub mod parser;
pub mod render;
pub mod selection;
pub mod source;
pub mod table;

pub use alias::{alias_to_dictionary, get_alias_any_tree, make_alias_any_tree, AliasMap};
pub use arena::{FindOptions, NodeData, NodeKind, TreeArena, TreeNode};
pub use builder::{tree_to_any_tree, TreeBuilder};
pub use error::{DomainError, DomainResult};
pub use expr::{CompiledExpr, Evaluator};
pub use parser::{parse_tree_variables, Grammar, VariableCounts};
pub use render::TreeNodeConvert;
pub use selection::{find_selected_branch, find_selected_branches, SelectOptions};
pub use source::{Branch, FriendInfo, InMemoryTree, TreeSource};
pub use table::Table;
