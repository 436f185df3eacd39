//! Command dispatch: one handler per subcommand.

use std::io::{self, Write};
use std::path::Path;

use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::{
    get_and_test_variable_list, get_tree_info, set_alias, tree_to_frame, tree_to_frame_selected,
    ExportFormat,
};
use crate::application::ApplicationError;
use crate::cli::args::{Cli, ColumnsArgs, Commands, ConfigCommands, FrameArgs, TreeArg};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, merge_array, Settings};
use crate::domain::{
    alias_to_dictionary, find_selected_branch, find_selected_branches, get_alias_any_tree,
    make_alias_any_tree, FindOptions, InMemoryTree, SelectOptions, TreeBuilder, TreeNodeConvert,
    TreeSource,
};
use crate::infrastructure::{InfraError, ServiceContainer};

pub fn execute_command(cli: Cli) -> CliResult<()> {
    let Some(command) = cli.command else {
        return Err(CliError::Usage("no command given, see --help".to_string()));
    };

    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let local_dir = cli.config_dir.or_else(|| std::env::current_dir().ok());
    let settings = Settings::load(local_dir.as_deref())?;
    debug!("settings: {:?}", settings);
    let container = ServiceContainer::new(settings);

    match command {
        Commands::Info { tree } => _info(&container, &tree),
        Commands::Tree {
            tree,
            no_aliases,
            no_friends,
        } => _tree(&container, &tree, !no_aliases, !no_friends),
        Commands::Find {
            tree,
            regexp,
            no_path,
            no_name,
            max_level,
        } => {
            let options = SelectOptions {
                in_path: !no_path,
                in_name: !no_name,
                find: FindOptions {
                    max_level,
                    ..Default::default()
                },
            };
            _find(&container, &tree, &regexp, &options)
        }
        Commands::Select {
            tree,
            include,
            exclude,
        } => _select(&container, &tree, &include, &exclude),
        Commands::Alias { tree, key, find } => _alias(&container, &tree, &key, find.as_deref()),
        Commands::Vars {
            expressions,
            tree,
            remove,
            replace,
        } => _vars(&container, &expressions, tree.as_deref(), &remove, &replace),
        Commands::Draw {
            tree,
            columns,
            frame,
        } => _draw(&container, &tree, &columns, &frame),
        Commands::Export {
            tree,
            columns,
            frame,
            output,
            format,
        } => {
            let format = format.unwrap_or(container.settings.format);
            _export(&container, &tree, &columns, &frame, &output, format)
        }
        Commands::Config { command } => _config(&container, command, local_dir.as_deref()),
        Commands::Completion { .. } => Ok(()),
    }
}

fn load_tree(container: &ServiceContainer, arg: &TreeArg) -> CliResult<InMemoryTree> {
    let path = container.settings.tree_path(&arg.tree);
    Ok(container.loader.load(&path)?)
}

fn write_stdout(content: &str) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", content).map_err(|e| InfraError::io("write stdout", e))?;
    Ok(())
}

#[instrument(skip(container))]
fn _info(container: &ServiceContainer, arg: &TreeArg) -> CliResult<()> {
    let tree = load_tree(container, arg)?;
    let info = get_tree_info(&tree);

    output::header(&format!("{} ({} entries)", tree.name(), tree.entries()));
    output::header("aliases");
    for (name, formula) in &info.aliases {
        output::entry(name, formula);
    }
    output::header("friends");
    for friend in &info.friends {
        output::entry(&friend.name, &friend.title);
    }
    output::header("metaTable");
    for (name, title) in &info.meta_table {
        output::entry(name, title);
    }
    Ok(())
}

#[instrument(skip(container))]
fn _tree(container: &ServiceContainer, arg: &TreeArg, aliases: bool, friends: bool) -> CliResult<()> {
    let tree = load_tree(container, arg)?;
    let arena = TreeBuilder::new().aliases(aliases).friends(friends).build(&tree);
    write_stdout(&arena.to_tree_string().to_string())
}

#[instrument(skip(container))]
fn _find(
    container: &ServiceContainer,
    arg: &TreeArg,
    regexp: &str,
    options: &SelectOptions,
) -> CliResult<()> {
    let tree = load_tree(container, arg)?;
    let arena = TreeBuilder::new().build(&tree);
    let found = find_selected_branch(&arena, regexp, options)?;
    if found.is_empty() {
        output::warning(&format!("nothing matches '{}'", regexp));
    }
    for idx in found {
        let kind = arena
            .get_node(idx)
            .map(|n| n.data.kind.to_string())
            .unwrap_or_default();
        output::info(&format!("{}\t{}", arena.qualified_name(idx), kind));
    }
    Ok(())
}

#[instrument(skip(container))]
fn _select(
    container: &ServiceContainer,
    arg: &TreeArg,
    include: &[String],
    exclude: &[String],
) -> CliResult<()> {
    let tree = load_tree(container, arg)?;
    let arena = TreeBuilder::new().build(&tree);
    let exclude = merge_array(&container.settings.exclude, exclude);
    for path in find_selected_branches(&arena, include, exclude.as_slice())? {
        output::info(&path);
    }
    Ok(())
}

#[instrument(skip(container))]
fn _alias(container: &ServiceContainer, arg: &TreeArg, key: &str, find: Option<&str>) -> CliResult<()> {
    let tree = load_tree(container, arg)?;
    let aliases = alias_to_dictionary(&tree);
    let arena = make_alias_any_tree(key, &aliases)?;
    match find {
        Some(regexp) => {
            for name in get_alias_any_tree(&arena, regexp, &FindOptions::default())? {
                output::info(&name);
            }
            Ok(())
        }
        None => write_stdout(&arena.to_tree_string().to_string()),
    }
}

#[instrument(skip(container))]
fn _vars(
    container: &ServiceContainer,
    expressions: &[String],
    tree: Option<&Path>,
    remove: &[String],
    replace: &[String],
) -> CliResult<()> {
    let tree = match tree {
        Some(path) => Some(container.loader.load(&container.settings.tree_path(path))?),
        None => None,
    };
    let counts = get_and_test_variable_list(
        expressions,
        remove,
        replace,
        tree.as_ref().map(|t| t as &dyn TreeSource),
    )?;
    for (name, count) in &counts {
        output::info(&format!("{}\t{}", name, count));
    }
    Ok(())
}

/// Build the frame described by `columns` and `frame`.
fn build_frame(
    container: &ServiceContainer,
    tree: &dyn TreeSource,
    columns: &ColumnsArgs,
    frame: &FrameArgs,
) -> CliResult<RecordBatch> {
    let settings = &container.settings;
    let mut options = settings.frame_options(frame.mask.as_deref())?;
    if let Some(n) = frame.n_entries {
        options.n_entries = n;
    }
    if let Some(first) = frame.first_entry {
        options.first_entry = first;
    }

    let mut batch = match &columns.variables {
        Some(variables) => tree_to_frame(tree, variables, &frame.selection, &options)?,
        None => tree_to_frame_selected(
            tree,
            columns.include.as_slice(),
            settings.exclude.as_slice(),
            &frame.selection,
            &options,
        )?,
    };

    for alias in &frame.aliases {
        let (name, formula) = alias
            .split_once('=')
            .ok_or_else(|| CliError::InvalidArgs(format!("alias '{}' is not NAME=FORMULA", alias)))?;
        batch = set_alias(&batch, name.trim(), formula.trim())?;
    }
    Ok(batch)
}

#[instrument(skip(container))]
fn _draw(
    container: &ServiceContainer,
    arg: &TreeArg,
    columns: &ColumnsArgs,
    frame: &FrameArgs,
) -> CliResult<()> {
    let tree = load_tree(container, arg)?;
    let batch = build_frame(container, &tree, columns, frame)?;
    let table = pretty_format_batches(&[batch]).map_err(ApplicationError::from)?;
    write_stdout(&table.to_string())
}

#[instrument(skip(container))]
fn _export(
    container: &ServiceContainer,
    arg: &TreeArg,
    columns: &ColumnsArgs,
    frame: &FrameArgs,
    output_path: &Path,
    format: ExportFormat,
) -> CliResult<()> {
    let tree = load_tree(container, arg)?;
    let batch = build_frame(container, &tree, columns, frame)?;
    container.exporter.export(&batch, output_path, format)?;
    output::success(&format!(
        "{} rows x {} columns -> {}",
        batch.num_rows(),
        batch.num_columns(),
        output_path.display()
    ));
    Ok(())
}

fn _config(container: &ServiceContainer, command: ConfigCommands, local_dir: Option<&Path>) -> CliResult<()> {
    match command {
        ConfigCommands::Show => write_stdout(&container.settings.to_toml()?),
        ConfigCommands::Template => write_stdout(&Settings::template()),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::entry("global", &path.display()),
                None => output::warning("no config directory for this platform"),
            }
            if let Some(dir) = local_dir {
                output::entry("local", &local_config_path(dir).display());
            }
            Ok(())
        }
    }
}
