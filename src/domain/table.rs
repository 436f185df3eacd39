//! Plain-text tables in the ROOT `TTree::ReadFile` convention.
//!
//! The first line names the columns, optionally typed (`run/I:time/D:qMax/F`);
//! every following line holds one entry, values separated by tabs or spaces.

use regex::Regex;
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};

/// Column-oriented table of `f64` values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub names: Vec<String>,
    pub columns: Vec<Vec<f64>>,
}

impl Table {
    pub fn rows(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Parse the table, keeping at most `limit` data rows.
    #[instrument(level = "debug", skip(content))]
    pub fn parse_rows(content: &str, limit: Option<usize>) -> DomainResult<Self> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty() && !l.trim_start().starts_with('#'));

        let (_, header) = lines
            .next()
            .ok_or_else(|| DomainError::InvalidTable("missing header line".to_string()))?;
        let names = parse_header(header)?;
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

        for (line_no, line) in lines {
            if limit.is_some_and(|limit| columns[0].len() >= limit) {
                break;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != names.len() {
                return Err(DomainError::InvalidTable(format!(
                    "line {}: expected {} values, found {}",
                    line_no + 1,
                    names.len(),
                    fields.len()
                )));
            }
            for (column, field) in columns.iter_mut().zip(fields) {
                column.push(parse_value(field).ok_or_else(|| {
                    DomainError::InvalidTable(format!(
                        "line {}: not a number: '{}'",
                        line_no + 1,
                        field
                    ))
                })?);
            }
        }

        debug!("parsed table: {} columns, {} rows", names.len(), columns[0].len());
        Ok(Self { names, columns })
    }
}

/// `a/D:b/I` or tab separated `a\tb`; leaf type suffixes are dropped.
fn parse_header(header: &str) -> DomainResult<Vec<String>> {
    let type_suffix = Regex::new(r"/[A-Za-z]$").map_err(|e| DomainError::pattern("/[A-Za-z]$", e))?;
    let raw: Vec<&str> = if header.contains(':') {
        header.split(':').collect()
    } else {
        header.split_whitespace().collect()
    };

    let mut names = Vec::with_capacity(raw.len());
    for field in raw {
        // a `name/D\tcomment` field keeps only its first tab-separated part
        let field = field.split('\t').next().unwrap_or_default().trim();
        let name = type_suffix.replace(field, "").to_string();
        if name.is_empty() {
            return Err(DomainError::InvalidTable(format!(
                "empty column name in header '{}'",
                header
            )));
        }
        if names.contains(&name) {
            return Err(DomainError::InvalidTable(format!("duplicate column '{}'", name)));
        }
        names.push(name);
    }
    Ok(names)
}

fn parse_value(field: &str) -> Option<f64> {
    field.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed_header() {
        let table = Table::parse_rows("run/I:time/D:meanMIP/D\n1\t10.5\t50\n2\t11.5\t51\n", None).unwrap();
        assert_eq!(table.names, vec!["run", "time", "meanMIP"]);
        assert_eq!(table.rows(), 2);
        assert_eq!(table.column("meanMIP"), Some(&[50.0, 51.0][..]));
    }

    #[test]
    fn test_parse_untyped_header() {
        let table = Table::parse_rows("x y\n1 2\n", None).unwrap();
        assert_eq!(table.names, vec!["x", "y"]);
        assert_eq!(table.column("y"), Some(&[2.0][..]));
    }

    #[test]
    fn test_parse_row_limit() {
        let table = Table::parse_rows("x/D\n1\n2\n3\n", Some(2)).unwrap();
        assert_eq!(table.rows(), 2);
    }

    #[test]
    fn test_parse_rejects_short_rows() {
        let result = Table::parse_rows("x/D:y/D\n1\n", None);
        assert!(matches!(result, Err(DomainError::InvalidTable(_))));
    }

    #[test]
    fn test_parse_nan_values() {
        let table = Table::parse_rows("x/D\nnan\n", None).unwrap();
        assert!(table.columns[0][0].is_nan());
    }
}
