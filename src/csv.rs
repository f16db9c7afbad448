//! Minimal CSV loading with a header-defined column schema.
//!
//! The first line names the columns; every following non-empty line is a
//! row. Fields may be double-quoted, with `""` as the embedded-quote escape.

use std::path::Path;

use crate::error::{Error, Result};

/// An in-memory, column-named row set loaded from one CSV file.
#[derive(Debug, Clone)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Load a table from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Parse CSV text into a table. An empty input yields an empty table.
    pub fn parse(content: &str) -> Self {
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());
        let headers = match lines.next() {
            Some(line) => split_line(line),
            None => Vec::new(),
        };
        let rows = lines.map(split_line).collect();
        Self { headers, rows }
    }

    /// Number of data rows (the header line is not counted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Value of `column` in data row `row`, if both exist.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }

    /// All values present in `column`, in row order. Rows too short to
    /// reach the column are skipped.
    pub fn column(&self, column: &str) -> Vec<String> {
        let Some(idx) = self.headers.iter().position(|h| h == column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(idx).cloned())
            .collect()
    }
}

/// Split one CSV line into fields, honoring double quotes.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                // "" inside a quoted field is a literal quote
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields.iter_mut().for_each(|f| *f = f.trim().to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_header_and_rows() {
        let table = CsvTable::parse("id,name\n1,alice\n2,bob\n");
        assert_eq!(table.headers(), &["id".to_string(), "name".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "name"), Some("alice"));
        assert_eq!(table.value(1, "id"), Some("2"));
    }

    #[test]
    fn missing_column_is_none() {
        let table = CsvTable::parse("id\n1\n");
        assert_eq!(table.value(0, "name"), None);
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let table = CsvTable::parse("id,desc\n1,\"a, b\"\n2,\"say \"\"hi\"\"\"\n");
        assert_eq!(table.value(0, "desc"), Some("a, b"));
        assert_eq!(table.value(1, "desc"), Some("say \"hi\""));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let table = CsvTable::parse("url\n\nhttps://a.test/\n\nhttps://b.test/\n");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn column_skips_short_rows() {
        let table = CsvTable::parse("id,name\n1,alice\n2\n3,carol\n");
        assert_eq!(table.column("name"), vec!["alice", "carol"]);
    }

    #[test]
    fn empty_file_yields_empty_table() {
        let table = CsvTable::parse("");
        assert!(table.is_empty());
        assert!(table.headers().is_empty());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "user,city\nu1,berlin\nu2,oslo\n").unwrap();
        let table = CsvTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(1, "city"), Some("oslo"));
    }
}
