use crate::core::{Record, RepoError, Result, Row, Value};
use serde::Serialize;
use std::fmt;

/// Raw rows returned by a query executor, labelled by column.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Single scalar of a one-row, one-column result (e.g. a count).
    pub fn scalar(&self) -> Result<&Value> {
        self.rows
            .first()
            .and_then(|row| row.first())
            .ok_or_else(|| RepoError::Execution("Expected a scalar result, got no rows".into()))
    }

    /// Rows as records keyed by column label.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }

    pub fn print(&self) {
        println!("{}", self);
    }
}

/// Plain-text table, one line per row.
impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return f.write_str("(no columns)");
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Value::to_string).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                cells
                    .iter()
                    .filter_map(|row| row.get(i).map(String::len))
                    .fold(column.len(), usize::max)
            })
            .collect();

        let line = |f: &mut fmt::Formatter<'_>, values: &[String]| -> fmt::Result {
            for (i, (value, width)) in values.iter().zip(&widths).enumerate() {
                if i > 0 {
                    f.write_str(" | ")?;
                }
                write!(f, "{:<width$}", value, width = *width)?;
            }
            writeln!(f)
        };

        line(f, &self.columns)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        for row in &cells {
            line(f, row)?;
        }
        write!(f, "({} row{})", self.rows.len(), if self.rows.len() == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rendering_pads_columns() {
        let set = ResultSet::new(
            vec!["username".into(), "age".into()],
            vec![vec![Value::from("m1"), Value::Integer(10)]],
        );
        let rendered = set.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "username | age");
        assert_eq!(lines[2], "m1       | 10 ");
        assert_eq!(lines[3], "(1 row)");
    }

    #[test]
    fn test_scalar_of_empty_result_fails() {
        assert!(ResultSet::default().scalar().is_err());
        assert_eq!(ResultSet::default().records(), Vec::<Record>::new());
    }
}
