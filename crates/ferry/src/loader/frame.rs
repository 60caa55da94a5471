//! 🧮 CsvFrame: one CSV file held in memory with a SQL type per column.
//!
//! The header row gives the column names and their order. Every other row is
//! one record. Types are inferred per column over all of its non-null cells:
//!
//! | every non-null cell parses as... | column type        |
//! |----------------------------------|--------------------|
//! | a 64-bit integer                 | `BIGINT`           |
//! | a float                          | `DOUBLE PRECISION` |
//! | `true` / `false` (any case)      | `BOOLEAN`          |
//! | anything else                    | `TEXT`             |
//!
//! Empty cells and the usual null spellings (`NA`, `NULL`, `NaN`, ...) load as
//! SQL NULL. A column with nothing but nulls is `TEXT`.

use std::collections::HashSet;
use std::path::Path;

use crate::errors::LoadError;

/// 🕳️ Cell spellings that mean "no value here".
const NULL_SPELLINGS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// 🏷️ The SQL type a column lands as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Double,
    Boolean,
    Text,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Text => "TEXT",
        }
    }
}

/// 📦 One typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    BigInt(i64),
    Double(f64),
    Boolean(bool),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

/// 🧮 A parsed CSV file: columns in header order, rows in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvFrame {
    columns: Vec<Column>,
    rows: Vec<Vec<CellValue>>,
}

fn is_null(raw: &str) -> bool {
    NULL_SPELLINGS.contains(&raw)
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn infer_column_type<'a, I>(cells: I) -> ColumnType
where
    I: Iterator<Item = &'a str> + Clone,
{
    let mut present = cells.filter(|raw| !is_null(raw)).map(str::trim).peekable();
    if present.peek().is_none() {
        return ColumnType::Text;
    }
    if present.clone().all(|raw| raw.parse::<i64>().is_ok()) {
        ColumnType::BigInt
    } else if present.clone().all(|raw| raw.parse::<f64>().is_ok()) {
        ColumnType::Double
    } else if present.all(|raw| parse_bool(raw).is_some()) {
        ColumnType::Boolean
    } else {
        ColumnType::Text
    }
}

fn typed_cell(raw: &str, column_type: ColumnType) -> CellValue {
    if is_null(raw) {
        return CellValue::Null;
    }
    let trimmed = raw.trim();
    // inference already proved every parse below succeeds; Null is only a fallback
    match column_type {
        ColumnType::BigInt => trimmed.parse().map(CellValue::BigInt).unwrap_or(CellValue::Null),
        ColumnType::Double => trimmed.parse().map(CellValue::Double).unwrap_or(CellValue::Null),
        ColumnType::Boolean => parse_bool(trimmed).map(CellValue::Boolean).unwrap_or(CellValue::Null),
        ColumnType::Text => CellValue::Text(raw.to_string()),
    }
}

/// 🏷️ Blank header cells become `Unnamed: <index>`, repeats get a `.1`, `.2`, ... suffix.
fn column_names(header: &csv::StringRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let base = if raw.trim().is_empty() {
                format!("Unnamed: {index}")
            } else {
                raw.to_string()
            };
            let mut name = base.clone();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{base}.{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

impl CsvFrame {
    /// 📂 Read and parse a CSV file.
    pub async fn from_path(path: &Path) -> Result<Self, LoadError> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(&bytes)
    }

    /// 🔬 Parse CSV bytes. The first record is the header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let header = reader.headers()?.clone();
        if header.is_empty() || header.iter().all(|name| name.trim().is_empty()) {
            return Err(LoadError::EmptyHeader);
        }
        let names = column_names(&header);
        let width = names.len();

        let mut records = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != width {
                return Err(LoadError::RaggedRow {
                    // 📏 the line the record starts on; quoted newlines count
                    row: record
                        .position()
                        .map(|position| position.line() as usize)
                        .unwrap_or(index + 2),
                    expected: width,
                    found: record.len(),
                });
            }
            records.push(record);
        }

        let columns: Vec<Column> = names
            .into_iter()
            .enumerate()
            .map(|(position, name)| Column {
                name,
                column_type: infer_column_type(records.iter().map(move |r| &r[position])),
            })
            .collect();

        let rows = records
            .iter()
            .map(|record| {
                record
                    .iter()
                    .zip(&columns)
                    .map(|(raw, column)| typed_cell(raw, column.column_type))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_types(frame: &CsvFrame) -> Vec<(&str, ColumnType)> {
        frame
            .columns()
            .iter()
            .map(|c| (c.name.as_str(), c.column_type))
            .collect()
    }

    #[test]
    fn the_one_where_every_column_finds_its_type() {
        let frame = CsvFrame::from_bytes(
            b"id,price,active,name\n1,9.99,true,Widget\n2,10,FALSE,Gadget\n",
        )
        .expect("valid csv");

        assert_eq!(
            column_types(&frame),
            vec![
                ("id", ColumnType::BigInt),
                ("price", ColumnType::Double),
                ("active", ColumnType::Boolean),
                ("name", ColumnType::Text),
            ]
        );
        assert_eq!(
            frame.rows()[1],
            vec![
                CellValue::BigInt(2),
                CellValue::Double(10.0),
                CellValue::Boolean(false),
                CellValue::Text("Gadget".to_string()),
            ]
        );
    }

    #[test]
    fn the_one_where_empty_cells_become_null_not_zero() {
        let frame = CsvFrame::from_bytes(b"id,score,nickname\n1,,\n2,7,NA\n").expect("valid csv");

        assert_eq!(frame.columns()[1].column_type, ColumnType::BigInt);
        assert_eq!(frame.rows()[0][1], CellValue::Null);
        assert_eq!(frame.rows()[0][2], CellValue::Null);
        assert_eq!(frame.rows()[1][2], CellValue::Null);
        // 🕳️ nothing but nulls: we have no evidence, so TEXT
        assert_eq!(frame.columns()[2].column_type, ColumnType::Text);
    }

    #[test]
    fn the_one_where_one_word_in_a_number_column_makes_it_text() {
        let frame = CsvFrame::from_bytes(b"zip\n02134\n90210\nunknown\n").expect("valid csv");

        assert_eq!(frame.columns()[0].column_type, ColumnType::Text);
        // 🧾 text keeps the original spelling, leading zero included
        assert_eq!(frame.rows()[0][0], CellValue::Text("02134".to_string()));
    }

    #[test]
    fn the_one_where_a_header_only_file_is_an_empty_table() {
        let frame = CsvFrame::from_bytes(b"id,name\n").expect("header only is fine");
        assert_eq!(frame.row_count(), 0);
        assert_eq!(frame.columns().len(), 2);
    }

    #[test]
    fn the_one_where_an_empty_file_has_no_header() {
        let err = CsvFrame::from_bytes(b"").expect_err("nothing to read");
        assert!(matches!(err, LoadError::EmptyHeader));
    }

    #[test]
    fn the_one_where_a_short_row_is_called_out_by_line() {
        let err = CsvFrame::from_bytes(b"a,b,c\n1,2,3\n4,5\n").expect_err("ragged");
        match err {
            LoadError::RaggedRow { row, expected, found } => {
                assert_eq!((row, expected, found), (3, 3, 2));
            }
            plot_twist => panic!("💀 expected a ragged row, got {plot_twist:?}"),
        }
    }

    #[test]
    fn the_one_where_twins_in_the_header_get_told_apart() {
        let frame = CsvFrame::from_bytes(b"a,a,,a\n1,2,3,4\n").expect("valid csv");
        let names: Vec<&str> = frame.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a.1", "Unnamed: 2", "a.2"]);
    }

    #[test]
    fn the_one_where_quoted_commas_stay_inside_the_cell() {
        let frame = CsvFrame::from_bytes(b"id,address\n1,\"1 Main St, Springfield\"\n")
            .expect("valid csv");
        assert_eq!(
            frame.rows()[0][1],
            CellValue::Text("1 Main St, Springfield".to_string())
        );
    }

    #[test]
    fn the_one_where_a_quoted_newline_does_not_throw_off_the_line_count() {
        let err = CsvFrame::from_bytes(b"id,note\n1,\"two\nlines\"\n2\n").expect_err("ragged");
        match err {
            LoadError::RaggedRow { row, expected, found } => {
                assert_eq!((row, expected, found), (4, 2, 1));
            }
            plot_twist => panic!("💀 expected a ragged row, got {plot_twist:?}"),
        }
    }
}
