//! Exploration of tree data: branch/alias/friend hierarchies, alias
//! dependency trees, variable lists and tree to data-frame conversion.
//!
//! Layers, innermost first:
//! - [`domain`]: trees, alias hierarchies, formula parsing and evaluation
//! - [`application`]: frame conversion, variable lists, manifest loading, export
//! - [`infrastructure`]: filesystem boundary and service wiring
//! - [`cli`]: argument parsing and command dispatch

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
