//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::application::services::ExportFormat;

/// Explore tree data: branch/alias/friend hierarchies, alias dependencies and frame conversion
#[derive(Parser, Debug)]
#[command(name = "treeplayer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Directory holding the local .treeplayer.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Tree manifest (`*.toml`) or table file
#[derive(Args, Debug, Clone)]
pub struct TreeArg {
    #[arg(value_hint = ValueHint::FilePath)]
    pub tree: PathBuf,
}

/// Entry window and column naming
#[derive(Args, Debug, Clone, Default)]
pub struct FrameArgs {
    /// Selection formula, entries where it is zero are skipped
    #[arg(short, long, default_value = "")]
    pub selection: String,

    /// Maximum number of entries
    #[arg(short = 'n', long)]
    pub n_entries: Option<usize>,

    /// First entry
    #[arg(short, long)]
    pub first_entry: Option<usize>,

    /// `:`-separated tokens removed from column names, replacing the configured mask
    #[arg(short, long)]
    pub mask: Option<String>,

    /// Extra frame column computed from other columns (`name=formula`), repeatable
    #[arg(short, long = "alias", value_name = "NAME=FORMULA")]
    pub aliases: Vec<String>,
}

/// Which variables become frame columns
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ColumnsArgs {
    /// `:`-separated expressions (`track.fX:bz*2`)
    #[arg(short, long)]
    pub variables: Option<String>,

    /// Leaf path patterns (`friend/branch/leaf`), repeatable
    #[arg(short, long)]
    pub include: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show aliases, friends and metadata of a tree
    Info {
        #[command(flatten)]
        tree: TreeArg,
    },

    /// Show the branch/alias/friend hierarchy
    Tree {
        #[command(flatten)]
        tree: TreeArg,
        /// Leave out aliases
        #[arg(long)]
        no_aliases: bool,
        /// Leave out friend trees
        #[arg(long)]
        no_friends: bool,
    },

    /// Find nodes whose path or name starts with a pattern
    Find {
        #[command(flatten)]
        tree: TreeArg,
        /// Regular expression, matched at the start
        regexp: String,
        /// Do not match against paths
        #[arg(long)]
        no_path: bool,
        /// Do not match against names
        #[arg(long)]
        no_name: bool,
        /// Maximum depth (base = 1)
        #[arg(long)]
        max_level: Option<usize>,
    },

    /// List leaf paths selected by include/exclude patterns
    Select {
        #[command(flatten)]
        tree: TreeArg,
        /// Include patterns
        #[arg(short, long, required = true)]
        include: Vec<String>,
        /// Exclude patterns (added to configured ones)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// Show the dependency tree of an alias
    Alias {
        #[command(flatten)]
        tree: TreeArg,
        /// Alias name
        key: String,
        /// Only list dependencies whose name starts with this pattern
        #[arg(long)]
        find: Option<String>,
    },

    /// Count variables used by expressions
    Vars {
        /// Expressions
        #[arg(required = true)]
        expressions: Vec<String>,
        /// Drop variables not present in this tree
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        tree: Option<PathBuf>,
        /// Drop variables matching these patterns
        #[arg(short, long)]
        remove: Vec<String>,
        /// Cut matches of these patterns out of variable names
        #[arg(short = 'p', long)]
        replace: Vec<String>,
    },

    /// Print a frame of variables
    Draw {
        #[command(flatten)]
        tree: TreeArg,
        #[command(flatten)]
        columns: ColumnsArgs,
        #[command(flatten)]
        frame: FrameArgs,
    },

    /// Write a frame of variables to a file
    Export {
        #[command(flatten)]
        tree: TreeArg,
        #[command(flatten)]
        columns: ColumnsArgs,
        #[command(flatten)]
        frame: FrameArgs,
        /// Output file
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: PathBuf,
        /// Output format (default from settings)
        #[arg(long)]
        format: Option<ExportFormat>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Print a commented settings template
    Template,
    /// Show config file locations
    Path,
}
