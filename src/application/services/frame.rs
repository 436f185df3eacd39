//! Tree to data-frame conversion.
//!
//! A frame is an Arrow [`RecordBatch`] with one `Float64` column per drawn
//! variable. Tree metadata travels along as schema metadata.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::selection::unanchored;
use crate::domain::{
    alias_to_dictionary, find_selected_branches, tree_to_any_tree, AliasMap, DomainResult,
    Evaluator, FriendInfo, InMemoryTree, TreeSource,
};

/// Default `(pattern, replacement)` rules applied to column names.
pub const DEFAULT_COLUMN_MASK: [(&str, &str); 3] =
    [(r"\.fElements", ""), (r"\.fX$", "_X"), (r"\.fY$", "_Y")];

/// Rewrites drawn expressions into column names.
#[derive(Debug, Clone)]
pub struct ColumnMask {
    rules: Vec<(Regex, String)>,
}

impl Default for ColumnMask {
    fn default() -> Self {
        let rules = DEFAULT_COLUMN_MASK
            .iter()
            .filter_map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .ok()
                    .map(|re| (re, replacement.to_string()))
            })
            .collect();
        Self { rules }
    }
}

impl ColumnMask {
    pub fn new<S: AsRef<str>>(rules: &[(S, S)]) -> DomainResult<Self> {
        let rules = rules
            .iter()
            .map(|(pattern, replacement)| {
                unanchored(pattern.as_ref()).map(|re| (re, replacement.as_ref().to_string()))
            })
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Mask cutting each token of a `:`-separated list out of names.
    ///
    /// Replaces the rewrite rules entirely: `track.fX` stays `track.fX`
    /// unless a token matches it.
    pub fn removing(mask: &str) -> DomainResult<Self> {
        let rules = mask
            .split(':')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|token| unanchored(&regex::escape(token)).map(|re| (re, String::new())))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn apply(&self, name: &str) -> String {
        self.rules
            .iter()
            .fold(name.to_string(), |acc, (re, replacement)| {
                re.replace_all(&acc, replacement.as_str()).into_owned()
            })
    }
}

/// Turn names into unique identifiers (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn sanitize_column_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let mut ident: String = name
            .as_ref()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
            ident.insert(0, '_');
        }
        let mut unique = ident.clone();
        let mut n = 1;
        while !seen.insert(unique.clone()) {
            unique = format!("{}_{}", ident, n);
            n += 1;
        }
        out.push(unique);
    }
    out
}

/// Entry window and naming of a conversion.
#[derive(Debug, Clone)]
pub struct FrameOptions {
    pub n_entries: usize,
    pub first_entry: usize,
    pub mask: ColumnMask,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            n_entries: 100_000_000,
            first_entry: 0,
            mask: ColumnMask::default(),
        }
    }
}

/// Values of drawn variables for the selected entries.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawResult {
    /// Entry numbers that passed the selection
    pub entries: Vec<usize>,
    /// One column per variable, aligned with `entries`
    pub values: Vec<Vec<f64>>,
}

impl DrawResult {
    pub fn rows(&self) -> usize {
        self.entries.len()
    }
}

/// Evaluate `variables` on entries `[first_entry, first_entry + n_entries)`
/// for which `selection` is non-zero. An empty selection keeps every entry.
#[instrument(level = "debug", skip(tree), fields(tree = tree.name()))]
pub fn draw<S: AsRef<str> + std::fmt::Debug>(
    tree: &dyn TreeSource,
    variables: &[S],
    selection: &str,
    n_entries: usize,
    first_entry: usize,
) -> ApplicationResult<DrawResult> {
    let total = tree.entries();
    let first = first_entry.min(total);
    let last = first.saturating_add(n_entries).min(total);

    let mut eval = Evaluator::new(tree);
    let entries: Vec<usize> = if selection.trim().is_empty() {
        (first..last).collect()
    } else {
        let mask = eval.evaluate(selection)?;
        (first..last)
            .filter(|&i| mask[i] != 0.0 && !mask[i].is_nan())
            .collect()
    };

    let mut values = Vec::with_capacity(variables.len());
    for variable in variables {
        let column = eval.evaluate(variable.as_ref())?;
        values.push(entries.iter().map(|&i| column[i]).collect());
    }
    debug!("drew {} of {} entries", entries.len(), last - first);
    Ok(DrawResult { entries, values })
}

fn split_variables(variables: &str) -> Vec<&str> {
    variables
        .split(':')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect()
}

/// Convert the `:`-separated `variables` of the selected entries into a frame.
#[instrument(level = "debug", skip(tree, options), fields(tree = tree.name()))]
pub fn tree_to_frame(
    tree: &dyn TreeSource,
    variables: &str,
    selection: &str,
    options: &FrameOptions,
) -> ApplicationResult<RecordBatch> {
    let variables = split_variables(variables);
    if variables.is_empty() {
        return Err(ApplicationError::EmptyQuery);
    }
    let result = draw(
        tree,
        variables.as_slice(),
        selection,
        options.n_entries,
        options.first_entry,
    )?;

    let masked: Vec<String> = variables.iter().map(|v| options.mask.apply(v)).collect();
    let names = sanitize_column_names(masked.as_slice());
    let fields: Vec<Field> = names
        .iter()
        .map(|name| Field::new(name, DataType::Float64, true))
        .collect();
    let columns: Vec<ArrayRef> = result
        .values
        .into_iter()
        .map(|values| Arc::new(Float64Array::from(values)) as ArrayRef)
        .collect();

    let metadata: HashMap<String, String> = tree
        .metadata()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let schema = Arc::new(Schema::new_with_metadata(fields, metadata));
    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Convert every leaf selected by `include`/`exclude` into a frame.
///
/// Leaf paths `friend/branch/leaf` are drawn as `friend.branch.leaf`.
pub fn tree_to_frame_selected<S: AsRef<str> + std::fmt::Debug>(
    tree: &dyn TreeSource,
    include: &[S],
    exclude: &[S],
    selection: &str,
    options: &FrameOptions,
) -> ApplicationResult<RecordBatch> {
    let arena = tree_to_any_tree(tree);
    let paths = find_selected_branches(&arena, include, exclude)?;
    let variables = paths.iter().map(|p| p.replace('/', ".")).join(":");
    debug!("selected variables: {}", variables);
    tree_to_frame(tree, &variables, selection, options)
}

/// Append (or replace) `column` computed from `formula` over the frame columns.
#[instrument(level = "debug", skip(batch))]
pub fn set_alias(batch: &RecordBatch, column: &str, formula: &str) -> ApplicationResult<RecordBatch> {
    let schema = batch.schema();
    let mut tree = InMemoryTree::new("frame");
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let Some(values) = array.as_any().downcast_ref::<Float64Array>() else {
            warn!("column {} is not Float64, not usable in formulas", field.name());
            continue;
        };
        let values = values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        tree.add_column(field.name(), values)?;
    }

    let computed = Evaluator::new(&tree).evaluate(formula)?;
    let computed: ArrayRef = Arc::new(Float64Array::from(computed));

    let mut fields: Vec<Field> = Vec::with_capacity(batch.num_columns() + 1);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns() + 1);
    let mut replaced = false;
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        if field.name() == column {
            fields.push(Field::new(column, DataType::Float64, true));
            columns.push(computed.clone());
            replaced = true;
        } else {
            fields.push(field.as_ref().clone());
            columns.push(array.clone());
        }
    }
    if !replaced {
        fields.push(Field::new(column, DataType::Float64, true));
        columns.push(computed);
    }

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Values of a frame column.
pub fn frame_column(batch: &RecordBatch, name: &str) -> ApplicationResult<Vec<f64>> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| ApplicationError::ColumnNotFound(name.to_string()))?;
    let values = array
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| ApplicationError::ColumnNotFound(name.to_string()))?;
    Ok((0..values.len())
        .map(|i| if values.is_null(i) { f64::NAN } else { values.value(i) })
        .collect())
}

/// Aliases, friends and metadata of a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeInfo {
    pub aliases: AliasMap,
    pub friends: Vec<FriendInfo>,
    pub meta_table: BTreeMap<String, String>,
}

pub fn get_tree_info(tree: &dyn TreeSource) -> TreeInfo {
    TreeInfo {
        aliases: alias_to_dictionary(tree),
        friends: tree.friends(),
        meta_table: tree.metadata().clone(),
    }
}
