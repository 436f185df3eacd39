//! Expression engine for tree formulas.
//!
//! Supports arithmetic (+, -, *, /), comparisons (==, !=, <, <=, >, >=),
//! boolean operators (&&, ||, &, |, !) and the functions abs, sqrt, log,
//! exp, pow, min, max, sin, cos, tan and atan2. Identifiers may contain dots
//! (`track.fX`, `friend.branch`).

use std::collections::HashMap;

use tracing::{debug, instrument, trace};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::source::TreeSource;

/// Parsed formula; variables are indices into the row passed to `eval`.
#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Var(usize),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

#[derive(Debug, Clone, Copy)]
enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Booleans are `1.0`/`0.0`; any non-zero value is true.
fn truth(v: bool) -> f64 {
    if v {
        1.0
    } else {
        0.0
    }
}

impl BinaryOp {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Eq => truth((lhs - rhs).abs() < f64::EPSILON),
            BinaryOp::Ne => truth((lhs - rhs).abs() >= f64::EPSILON),
            BinaryOp::Lt => truth(lhs < rhs),
            BinaryOp::Le => truth(lhs <= rhs),
            BinaryOp::Gt => truth(lhs > rhs),
            BinaryOp::Ge => truth(lhs >= rhs),
            BinaryOp::And => truth(lhs != 0.0 && rhs != 0.0),
            BinaryOp::Or => truth(lhs != 0.0 || rhs != 0.0),
        }
    }
}

/// Functions callable from formulas (ROOT `TMath` subset).
#[derive(Debug, Clone, Copy)]
enum Func {
    Abs,
    Sqrt,
    Log,
    Exp,
    Pow,
    Min,
    Max,
    Sin,
    Cos,
    Tan,
    Atan2,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        let func = match name {
            "abs" => Func::Abs,
            "sqrt" => Func::Sqrt,
            "log" => Func::Log,
            "exp" => Func::Exp,
            "pow" => Func::Pow,
            "min" => Func::Min,
            "max" => Func::Max,
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "atan2" => Func::Atan2,
            _ => return None,
        };
        Some(func)
    }

    fn arity(self) -> usize {
        match self {
            Func::Pow | Func::Min | Func::Max | Func::Atan2 => 2,
            _ => 1,
        }
    }

    /// `args` holds exactly `arity()` values.
    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Func::Abs => args[0].abs(),
            Func::Sqrt => args[0].sqrt(),
            Func::Log => args[0].ln(),
            Func::Exp => args[0].exp(),
            Func::Pow => args[0].powf(args[1]),
            Func::Min => args[0].min(args[1]),
            Func::Max => args[0].max(args[1]),
            Func::Sin => args[0].sin(),
            Func::Cos => args[0].cos(),
            Func::Tan => args[0].tan(),
            Func::Atan2 => args[0].atan2(args[1]),
        }
    }
}

impl Expr {
    fn eval(&self, row: &[f64]) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Var(i) => row[*i],
            Expr::Unary(UnaryOp::Neg, e) => -e.eval(row),
            Expr::Unary(UnaryOp::Not, e) => truth(e.eval(row) == 0.0),
            Expr::Binary(op, lhs, rhs) => op.apply(lhs.eval(row), rhs.eval(row)),
            Expr::Call(func, args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(row)).collect();
                func.apply(&values)
            }
        }
    }
}

/// A formula compiled once and evaluated row by row.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    ast: Expr,
    /// Variables referenced by the formula, in order of first occurrence
    pub required: Vec<String>,
}

impl CompiledExpr {
    pub fn compile(input: &str) -> DomainResult<Self> {
        let syntax = |message: String| DomainError::Syntax {
            expression: input.to_string(),
            message,
        };
        let tokens = tokenize(input).map_err(syntax)?;
        let mut parser = Parser::new(&tokens);
        let ast = parser.parse_or().map_err(syntax)?;
        if let Some(token) = parser.peek() {
            return Err(syntax(format!("unexpected token after expression: {:?}", token)));
        }
        Ok(CompiledExpr {
            ast,
            required: parser.variables,
        })
    }

    /// `values` follows the order of `required`.
    pub fn eval_row(&self, values: &[f64]) -> f64 {
        self.ast.eval(values)
    }

    /// Evaluate `n` rows; every column holds at least `n` values.
    pub fn eval_bulk(&self, columns: &[&[f64]], n: usize) -> Vec<f64> {
        let mut row = vec![0.0; columns.len()];
        (0..n)
            .map(|i| {
                for (value, column) in row.iter_mut().zip(columns) {
                    *value = column[i];
                }
                self.ast.eval(&row)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(BinaryOp),
    Not,
    LParen,
    RParen,
    Comma,
}

/// Two-character operators, matched before single characters.
const DOUBLE_OPS: [(&str, BinaryOp); 6] = [
    ("&&", BinaryOp::And),
    ("||", BinaryOp::Or),
    ("==", BinaryOp::Eq),
    ("!=", BinaryOp::Ne),
    ("<=", BinaryOp::Le),
    (">=", BinaryOp::Ge),
];

fn single_op(c: char) -> Option<Token> {
    let op = match c {
        '+' => BinaryOp::Add,
        '-' => BinaryOp::Sub,
        '*' => BinaryOp::Mul,
        '/' => BinaryOp::Div,
        '<' => BinaryOp::Lt,
        '>' => BinaryOp::Gt,
        // single `&`, `|` and `=` are logical/comparison in tree formulas
        '&' => BinaryOp::And,
        '|' => BinaryOp::Or,
        '=' => BinaryOp::Eq,
        '!' => return Some(Token::Not),
        '(' => return Some(Token::LParen),
        ')' => return Some(Token::RParen),
        ',' => return Some(Token::Comma),
        _ => return None,
    };
    Some(Token::Op(op))
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut rest = input.trim_start();

    while let Some(c) = rest.chars().next() {
        if let Some((text, op)) = DOUBLE_OPS.iter().find(|(text, _)| rest.starts_with(text)) {
            tokens.push(Token::Op(*op));
            rest = &rest[text.len()..];
        } else if let Some(token) = single_op(c) {
            tokens.push(token);
            rest = &rest[c.len_utf8()..];
        } else if c.is_ascii_digit() || c == '.' {
            let len = number_len(rest);
            let text = &rest[..len];
            let n: f64 = text.parse().map_err(|_| format!("invalid number: '{}'", text))?;
            tokens.push(Token::Num(n));
            rest = &rest[len..];
        } else if c.is_ascii_alphabetic() || c == '_' {
            let len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
            tokens.push(Token::Ident(rest[..len].to_string()));
            rest = &rest[len..];
        } else {
            return Err(format!("unexpected character: '{}'", c));
        }
        rest = rest.trim_start();
    }

    Ok(tokens)
}

/// Length of the number at the start of `s`, exponent included (`1.5e-3`).
fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut len = 0;
    while len < bytes.len() {
        let b = bytes[len];
        let exponent_sign =
            (b == b'+' || b == b'-') && len > 0 && matches!(bytes[len - 1], b'e' | b'E');
        if b.is_ascii_digit() || b == b'.' || b == b'e' || b == b'E' || exponent_sign {
            len += 1;
        } else {
            break;
        }
    }
    len
}

/// Recursive descent, lowest precedence first: `||`, `&&`, comparison,
/// additive, multiplicative, unary, atom.
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    variables: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            variables: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            other => Err(format!("expected {:?}, got {:?}", expected, other)),
        }
    }

    /// Index of `name` in the row, registering it on first use.
    fn variable(&mut self, name: &str) -> usize {
        match self.variables.iter().position(|v| v == name) {
            Some(i) => i,
            None => {
                self.variables.push(name.to_string());
                self.variables.len() - 1
            }
        }
    }

    /// The operator at the cursor, if it is one of `ops`.
    fn next_op(&self, ops: &[BinaryOp]) -> Option<BinaryOp> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => Some(*op),
            _ => None,
        }
    }

    /// Left-associative chain of `ops` between operands parsed by `operand`.
    fn chain(
        &mut self,
        ops: &[BinaryOp],
        operand: fn(&mut Self) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let mut lhs = operand(self)?;
        while let Some(op) = self.next_op(ops) {
            self.advance();
            let rhs = operand(self)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        self.chain(&[BinaryOp::Or], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        self.chain(&[BinaryOp::And], Self::parse_cmp)
    }

    fn parse_cmp(&mut self) -> Result<Expr, String> {
        const COMPARISONS: [BinaryOp; 6] = [
            BinaryOp::Eq,
            BinaryOp::Ne,
            BinaryOp::Lt,
            BinaryOp::Le,
            BinaryOp::Gt,
            BinaryOp::Ge,
        ];
        self.chain(&COMPARISONS, Self::parse_add)
    }

    fn parse_add(&mut self) -> Result<Expr, String> {
        self.chain(&[BinaryOp::Add, BinaryOp::Sub], Self::parse_mul)
    }

    fn parse_mul(&mut self) -> Result<Expr, String> {
        self.chain(&[BinaryOp::Mul, BinaryOp::Div], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        let op = match self.peek() {
            Some(Token::Op(BinaryOp::Sub)) => UnaryOp::Neg,
            Some(Token::Not) => UnaryOp::Not,
            Some(Token::Op(BinaryOp::Add)) => {
                self.advance();
                return self.parse_unary();
            }
            _ => return self.parse_atom(),
        };
        self.advance();
        Ok(Expr::Unary(op, Box::new(self.parse_unary()?)))
    }

    fn parse_atom(&mut self) -> Result<Expr, String> {
        match self.advance().cloned() {
            Some(Token::Num(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let e = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Some(Token::Ident(name)) if self.peek() == Some(&Token::LParen) => {
                self.advance();
                self.parse_call(&name)
            }
            Some(Token::Ident(name)) => Ok(Expr::Var(self.variable(&name))),
            other => Err(format!("expected number, identifier or '(', got {:?}", other)),
        }
    }

    /// Arguments of `name(`, the opening parenthesis already consumed.
    fn parse_call(&mut self, name: &str) -> Result<Expr, String> {
        let func = Func::from_name(name).ok_or_else(|| format!("unknown function: '{}'", name))?;
        let mut args = vec![self.parse_or()?];
        while self.peek() == Some(&Token::Comma) {
            self.advance();
            args.push(self.parse_or()?);
        }
        self.expect(&Token::RParen)?;
        if args.len() != func.arity() {
            return Err(format!(
                "{}() takes {} argument(s), got {}",
                name,
                func.arity(),
                args.len()
            ));
        }
        Ok(Expr::Call(func, args))
    }
}

/// Evaluates formulas over all entries of a tree.
///
/// Identifiers resolve to aliases first (expanded recursively), then to leaf
/// branches by dotted path, then to `friend.path` in friend trees. Resolved
/// columns are cached for the lifetime of the evaluator.
pub struct Evaluator<'a> {
    tree: &'a dyn TreeSource,
    cache: HashMap<String, Vec<f64>>,
    resolving: Vec<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(tree: &'a dyn TreeSource) -> Self {
        Self {
            tree,
            cache: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    pub fn entries(&self) -> usize {
        self.tree.entries()
    }

    /// Values of `expression` for every entry of the tree.
    #[instrument(level = "debug", skip(self))]
    pub fn evaluate(&mut self, expression: &str) -> DomainResult<Vec<f64>> {
        let compiled = CompiledExpr::compile(expression)?;
        self.evaluate_compiled(&compiled)
    }

    pub fn evaluate_compiled(&mut self, compiled: &CompiledExpr) -> DomainResult<Vec<f64>> {
        for name in &compiled.required {
            self.resolve(name)?;
        }
        let columns: Vec<&[f64]> = compiled
            .required
            .iter()
            .filter_map(|name| self.cache.get(name).map(Vec::as_slice))
            .collect();
        Ok(compiled.eval_bulk(&columns, self.tree.entries()))
    }

    fn resolve(&mut self, name: &str) -> DomainResult<()> {
        if self.cache.contains_key(name) {
            return Ok(());
        }
        let values = self.lookup(name)?;
        self.cache.insert(name.to_string(), values);
        Ok(())
    }

    fn lookup(&mut self, name: &str) -> DomainResult<Vec<f64>> {
        let tree = self.tree;
        let entries = tree.entries();

        if let Some(formula) = tree.alias(name) {
            if self.resolving.iter().any(|r| r == name) {
                let mut chain = self.resolving.clone();
                chain.push(name.to_string());
                return Err(DomainError::AliasCycle(chain));
            }
            trace!("alias {} = {}", name, formula);
            self.resolving.push(name.to_string());
            let values = self.evaluate(formula);
            self.resolving.pop();
            return values;
        }

        if let Some(column) = tree.column(name) {
            return Ok(column.to_vec());
        }

        if let Some((prefix, rest)) = name.split_once('.') {
            if let Some(friend) = tree.friend(prefix) {
                debug!("resolving {} in friend {}", rest, prefix);
                let mut values = Evaluator::new(friend).evaluate(rest).map_err(|e| match e {
                    DomainError::UnknownVariable(_) => DomainError::UnknownVariable(name.to_string()),
                    other => other,
                })?;
                values.resize(entries, f64::NAN);
                return Ok(values);
            }
        }

        Err(DomainError::UnknownVariable(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::InMemoryTree;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    #[test]
    fn test_simple_arithmetic() {
        let e = CompiledExpr::compile("2 + 3 * 4").unwrap();
        assert!(e.required.is_empty());
        assert!(approx(e.eval_row(&[]), 14.0));
    }

    #[test]
    fn test_dotted_variables() {
        let e = CompiledExpr::compile("track.fX * weight").unwrap();
        assert_eq!(e.required, vec!["track.fX", "weight"]);
        assert!(approx(e.eval_row(&[100.0, 0.5]), 50.0));
    }

    #[test]
    fn test_single_character_boolean_operators() {
        let e = CompiledExpr::compile("x>1 & y<2 | z").unwrap();
        assert!(approx(e.eval_row(&[2.0, 1.0, 0.0]), 1.0));
        assert!(approx(e.eval_row(&[0.0, 1.0, 0.0]), 0.0));
        assert!(approx(e.eval_row(&[0.0, 1.0, 1.0]), 1.0));
    }

    #[test]
    fn test_functions_and_arity() {
        let e = CompiledExpr::compile("atan2(y, x)").unwrap();
        assert!(approx(e.eval_row(&[1.0, 1.0]), std::f64::consts::FRAC_PI_4));
        assert!(CompiledExpr::compile("sqrt(1, 2)").is_err());
        assert!(CompiledExpr::compile("foo(1)").is_err());
    }

    #[test]
    fn test_precedence_and_unary_operators() {
        let e = CompiledExpr::compile("-a*2 + 1.5e1 > 10 && !b").unwrap();
        assert_eq!(e.required, vec!["a", "b"]);
        assert!(approx(e.eval_row(&[1.0, 0.0]), 1.0));
        assert!(approx(e.eval_row(&[3.0, 0.0]), 0.0));
        assert!(approx(e.eval_row(&[1.0, 1.0]), 0.0));
    }

    #[test]
    fn test_repeated_variable_registered_once() {
        let e = CompiledExpr::compile("x*x - (x != 2)").unwrap();
        assert_eq!(e.required, vec!["x"]);
        assert!(approx(e.eval_row(&[3.0]), 8.0));
        assert!(approx(e.eval_row(&[2.0]), 4.0));
    }

    #[test]
    fn test_syntax_error() {
        let result = CompiledExpr::compile("a + * b");
        assert!(matches!(result, Err(DomainError::Syntax { .. })));
    }

    fn tree() -> InMemoryTree {
        let mut friend = InMemoryTree::new("map");
        friend.add_column("meanG", vec![10.0, 20.0]).unwrap();
        friend.set_alias("twice", "meanG*2");

        let mut tree = InMemoryTree::new("qa");
        tree.add_column("track.fX", vec![1.0, 2.0, 3.0]).unwrap();
        tree.add_column("bz", vec![-0.5, 0.5, 0.5]).unwrap();
        tree.set_alias("bzPos", "bz>0");
        tree.set_alias("xPos", "track.fX*bzPos");
        tree.add_friend("map", "map", friend);
        tree
    }

    #[test]
    fn test_evaluator_expands_aliases() {
        let tree = tree();
        let mut eval = Evaluator::new(&tree);
        assert_eq!(eval.evaluate("xPos + 1").unwrap(), vec![1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_evaluator_reads_friends_by_row() {
        let tree = tree();
        let mut eval = Evaluator::new(&tree);
        let values = eval.evaluate("map.twice").unwrap();
        assert_eq!(&values[..2], &[20.0, 40.0]);
        assert!(values[2].is_nan());
    }

    #[test]
    fn test_evaluator_unknown_variable() {
        let tree = tree();
        let mut eval = Evaluator::new(&tree);
        let result = eval.evaluate("map.nothing + 1");
        assert!(matches!(result, Err(DomainError::UnknownVariable(n)) if n == "map.nothing"));
    }

    #[test]
    fn test_evaluator_alias_cycle() {
        let mut tree = tree();
        tree.set_alias("a", "b+1");
        tree.set_alias("b", "a+1");
        let mut eval = Evaluator::new(&tree);
        let result = eval.evaluate("a");
        assert!(matches!(result, Err(DomainError::AliasCycle(chain)) if chain == vec!["a", "b", "a"]));
    }

    #[test]
    fn test_constant_expression_fills_all_entries() {
        let tree = tree();
        let mut eval = Evaluator::new(&tree);
        assert_eq!(eval.evaluate("1").unwrap(), vec![1.0; 3]);
    }
}
