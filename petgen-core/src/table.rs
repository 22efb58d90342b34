//! Tab-separated tables.
//!
//! All problem tables as well as the simulation result share this simple
//! representation: a header with column names followed by rows of string
//! cells. Typed interpretation of the cells happens in the `problem`
//! module.

use std::fs;
use std::path::Path;

use crate::error::Error;
use crate::Result;

const SEPARATOR: char = '\t';

/// Ordered sequence of rows with fixed named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Name used to refer to the table in error messages, usually the file
    /// name it was read from
    pub name: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a new empty table with the given columns.
    pub fn new(name: &str, columns: Vec<String>) -> Table {
        Table {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Reads a table from a tab-separated file.
    pub fn from_path(path: &Path) -> Result<Table> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::IoError(format!("{}: {}", path.to_string_lossy(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Table::parse(&name, &content)
    }

    /// Parses tab-separated text. Blank lines are skipped, cells are
    /// trimmed.
    pub fn parse(name: &str, content: &str) -> Result<Table> {
        let mut lines = content
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());
        let columns: Vec<String> = match lines.next() {
            Some(header) => header
                .split(SEPARATOR)
                .map(|c| c.trim().to_string())
                .collect(),
            None => return Err(Error::Other(format!("table {} is empty", name))),
        };
        let mut table = Table::new(name, columns);
        for (n, line) in lines.enumerate() {
            let row: Vec<String> = line.split(SEPARATOR).map(|c| c.trim().to_string()).collect();
            table.push_row(row).map_err(|e| match e {
                // report row numbers as seen in the file, header being row 1
                Error::RaggedRow(t, _, got, expected) => Error::RaggedRow(t, n + 2, got, expected),
                other => other,
            })?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Gets the index of a column that has to be present.
    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| Error::MissingColumn(self.name.clone(), column.to_string()))
    }

    /// Appends a row. Row length must match the number of columns.
    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::RaggedRow(
                self.name.clone(),
                self.rows.len() + 1,
                row.len(),
                self.columns.len(),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Gets the cell at the given row and column. Empty cells are treated
    /// as missing.
    pub fn get(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Gets a cell that has to be present.
    pub fn get_required(&self, row: usize, column: usize) -> Result<&str> {
        self.get(row, column).ok_or_else(|| {
            Error::MissingValue(
                self.name.clone(),
                self.columns[column].clone(),
                // 1-based, counting the header
                row + 2,
            )
        })
    }

    pub fn set(&mut self, row: usize, column: usize, value: String) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value;
        }
    }

    /// Appends all rows of another table. Both tables need to have the
    /// same set of columns, order may differ.
    pub fn concat(&mut self, other: Table) -> Result<()> {
        let mut mapping = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match other.column_index(column) {
                Some(idx) => mapping.push(idx),
                None => {
                    return Err(Error::TableMismatch(format!(
                        "{} has column \"{}\" which {} doesn't",
                        self.name, column, other.name
                    )))
                }
            }
        }
        if other.columns.len() != self.columns.len() {
            return Err(Error::TableMismatch(format!(
                "{} has {} columns, {} has {}",
                self.name,
                self.columns.len(),
                other.name,
                other.columns.len()
            )));
        }
        for row in other.rows {
            let reordered = mapping.iter().map(|i| row[*i].clone()).collect();
            self.rows.push(reordered);
        }
        Ok(())
    }

    /// Serializes the table into tab-separated text with a header row.
    pub fn to_tsv_string(&self) -> String {
        let mut out = self.columns.join("\t");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }

    /// Writes the table to the given path, replacing any existing file.
    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_tsv_string())
            .map_err(|e| Error::IoError(format!("{}: {}", path.to_string_lossy(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESIGN: &str = "observableId\ttime\tmeasurement\n\
                          obs_a\t0\t0.5\n\
                          \n\
                          obs_b\t1.5\t\n";

    #[test]
    fn parse_skips_blank_lines() {
        let table = Table::parse("design", DESIGN).unwrap();
        assert_eq!(table.columns(), &["observableId", "time", "measurement"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, 0), Some("obs_b"));
        // empty cell counts as missing
        assert_eq!(table.get(1, 2), None);
        assert!(table.get_required(1, 2).is_err());
    }

    #[test]
    fn ragged_row_reports_file_row() {
        let err = Table::parse("design", "a\tb\n1\t2\n3\n").unwrap_err();
        match err {
            Error::RaggedRow(name, row, got, expected) => {
                assert_eq!(name, "design");
                assert_eq!(row, 3);
                assert_eq!(got, 1);
                assert_eq!(expected, 2);
            }
            e => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn missing_column() {
        let table = Table::parse("design", DESIGN).unwrap();
        assert!(table.require_column("time").is_ok());
        assert!(matches!(
            table.require_column("simulationConditionId"),
            Err(Error::MissingColumn(_, _))
        ));
    }

    #[test]
    fn concat_reorders_columns() {
        let mut first = Table::parse("first", "a\tb\n1\t2\n").unwrap();
        let second = Table::parse("second", "b\ta\n4\t3\n").unwrap();
        first.concat(second).unwrap();
        assert_eq!(first.rows()[1], vec!["3".to_string(), "4".to_string()]);

        let third = Table::parse("third", "a\tc\n5\t6\n").unwrap();
        assert!(first.concat(third).is_err());
    }

    #[test]
    fn tsv_output_has_header() {
        let mut table = Table::parse("design", DESIGN).unwrap();
        table.set(1, 2, "0.25".to_string());
        assert_eq!(
            table.to_tsv_string(),
            "observableId\ttime\tmeasurement\nobs_a\t0\t0.5\nobs_b\t1.5\t0.25\n"
        );
    }
}
