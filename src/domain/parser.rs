//! Tokenizer for tree formulas: nested parenthesised word lists.
//!
//! A formula such as `x>1 & (x2<2) | sin(x)<1` is read as a nested list of
//! words, operators being dropped: `[x, 1, x, [x2, 2], sin, [x], 1]`.

use std::collections::BTreeMap;

use nom::bytes::complete::take_while1;
use nom::character::complete::{char, multispace0};
use nom::error::{Error, ErrorKind};
use nom::IResult;
use tracing::{debug, error, instrument};

use crate::domain::error::{DomainError, DomainResult};

/// Variable name to number of occurrences.
pub type VariableCounts = BTreeMap<String, usize>;

/// Element of a parsed formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nested {
    Word(String),
    Group(Vec<Nested>),
}

/// Token sets understood by the formula tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// Selections, draw expressions and widget descriptions
    Variables,
    /// Alias formulas
    Alias,
}

impl Grammar {
    /// Punctuation dropped between words. Longer tokens come first.
    fn suppressed(self) -> &'static [&'static str] {
        match self {
            Grammar::Variables => &[",", "|", "&", "!", ">", "=", "+", "-", "<", "*", "/", ":"],
            Grammar::Alias => &[
                "||", "&&", ",", "!", "+", "-", "*", "/", "=", ">", "<", "|", "&",
            ],
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_'
}

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(is_word_char)(input)
}

fn suppressed(input: &str, grammar: Grammar) -> IResult<&str, ()> {
    for token in grammar.suppressed() {
        if let Some(rest) = input.strip_prefix(token) {
            return Ok((rest, ()));
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)))
}

fn group(input: &str, grammar: Grammar) -> IResult<&str, Vec<Nested>> {
    let (mut input, _) = char('(')(input)?;
    let mut items = Vec::new();
    loop {
        let (rest, _) = multispace0(input)?;
        if let Ok((rest, _)) = char::<&str, Error<&str>>(')')(rest) {
            return Ok((rest, items));
        }
        if rest.starts_with('(') {
            let (rest, inner) = group(rest, grammar)?;
            items.push(Nested::Group(inner));
            input = rest;
        } else if let Ok((rest, w)) = word(rest) {
            items.push(Nested::Word(w.to_string()));
            input = rest;
        } else {
            let (rest, _) = suppressed(rest, grammar)?;
            input = rest;
        }
    }
}

/// Parse a formula into its nested word structure.
#[instrument(level = "trace")]
pub fn nested_expression(expression: &str, grammar: Grammar) -> DomainResult<Vec<Nested>> {
    let wrapped = format!("({})", expression);
    let syntax = |message: String| DomainError::Syntax {
        expression: expression.to_string(),
        message,
    };
    match group(&wrapped, grammar) {
        Ok((rest, items)) if rest.trim().is_empty() => Ok(items),
        Ok((rest, _)) => Err(syntax(format!("unbalanced parentheses before '{}'", rest))),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = wrapped.len() - e.input.len();
            if e.input.is_empty() {
                Err(syntax("missing closing parenthesis".to_string()))
            } else {
                // offset counts the added opening parenthesis
                Err(syntax(format!(
                    "unexpected input at position {}: '{}'",
                    offset.saturating_sub(1),
                    e.input.chars().next().unwrap_or_default()
                )))
            }
        }
        Err(nom::Err::Incomplete(_)) => Err(syntax("incomplete input".to_string())),
    }
}

/// All words of a nested formula, depth first.
pub fn flatten(items: &[Nested]) -> Vec<&str> {
    let mut out = Vec::new();
    collect_words(items, &mut out);
    out
}

fn collect_words<'a>(items: &'a [Nested], out: &mut Vec<&'a str>) {
    for item in items {
        match item {
            Nested::Word(w) => out.push(w),
            Nested::Group(inner) => collect_words(inner, out),
        }
    }
}

/// True for words the tree would read as numeric literals.
pub fn is_number(word: &str) -> bool {
    word.parse::<f64>().is_ok()
}

/// Variables referenced by a formula, in order of appearance (repeats kept).
pub fn formula_variables(expression: &str, grammar: Grammar) -> DomainResult<Vec<String>> {
    let items = nested_expression(expression, grammar)?;
    Ok(flatten(&items)
        .into_iter()
        .filter(|w| !is_number(w))
        .map(str::to_string)
        .collect())
}

/// Parse a tree expression and count the variables needed to evaluate it.
///
/// Counts are added to `counts`, so several expressions can be accumulated.
/// On a syntax error `counts` is left untouched.
///
/// ```
/// use treeplayer::domain::parser::{parse_tree_variables, VariableCounts};
///
/// let mut counts = VariableCounts::new();
/// parse_tree_variables("x>1 & x>0 | y==1 |x+1>2| (x2<2) | (x1*2)<2| sin(x)<1", &mut counts).unwrap();
/// assert_eq!(counts["x"], 4);
/// assert_eq!(counts["sin"], 1);
/// ```
pub fn parse_tree_variables(expression: &str, counts: &mut VariableCounts) -> DomainResult<()> {
    debug!("expression: {}", expression);
    let variables = formula_variables(expression, Grammar::Variables).inspect_err(|e| {
        error!("{}", e);
    })?;
    for variable in variables {
        *counts.entry(variable).or_insert(0) += 1;
    }
    Ok(())
}
