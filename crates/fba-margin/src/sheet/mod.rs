//! Spreadsheet access.
//!
//! The pipeline only needs a handful of operations, captured by
//! [`SheetStore`]: read a column, write a cell, and (for search results)
//! create a worksheet and append rows. Rows and columns are 1-based, as a
//! spreadsheet user counts them.

pub mod google;
pub mod xlsx;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::AsinRow;

pub use google::{spreadsheet_id, GoogleSheetStore};
pub use xlsx::XlsxSheetStore;

/// Default worksheet holding the ASIN column.
pub const DEFAULT_WORKSHEET: &str = "ASINs";

/// Default column receiving the margin.
pub const DEFAULT_MARGIN_COLUMN: u32 = 3;

/// A value written to a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// The value as a spreadsheet would display it.
    pub fn display(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<u32> for CellValue {
    fn from(n: u32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// A spreadsheet backend.
#[async_trait]
pub trait SheetStore: Send {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Every value in `column` from row 1 down to the last non-empty cell;
    /// blank cells read as `""`.
    async fn read_column(&mut self, worksheet: &str, column: u32) -> Result<Vec<String>>;

    /// Write one cell.
    async fn write_cell(
        &mut self,
        worksheet: &str,
        row: u32,
        column: u32,
        value: &CellValue,
    ) -> Result<()>;

    /// Create the worksheet if missing. Returns true when it was created.
    async fn ensure_worksheet(&mut self, title: &str, rows: u32, columns: u32) -> Result<bool>;

    /// Append rows after the last used row.
    async fn append_rows(&mut self, worksheet: &str, rows: &[Vec<CellValue>]) -> Result<()>;

    /// Persist buffered writes. Write-through stores do nothing.
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Turn column A values into identifier rows.
///
/// A first cell reading `asin` (any case) is a header and is skipped.
/// Blank cells are dropped but the remaining rows keep their sheet numbers.
pub fn identifiers_from_column(values: &[String]) -> Vec<AsinRow> {
    let has_header = values
        .first()
        .is_some_and(|first| first.trim().eq_ignore_ascii_case("asin"));
    let skip = usize::from(has_header);

    values
        .iter()
        .enumerate()
        .skip(skip)
        .filter_map(|(i, value)| {
            let asin = value.trim();
            (!asin.is_empty()).then(|| AsinRow::new(i as u32 + 1, asin))
        })
        .collect()
}

/// Read the identifier rows from column A of `worksheet`.
pub async fn read_identifiers(store: &mut dyn SheetStore, worksheet: &str) -> Result<Vec<AsinRow>> {
    let values = store.read_column(worksheet, 1).await?;
    let rows = identifiers_from_column(&values);
    tracing::info!(
        worksheet,
        count = rows.len(),
        "Read ASINs from {}",
        store.describe()
    );
    Ok(rows)
}

/// Column number to letters: 1 → `A`, 27 → `AA`.
pub fn column_letter(column: u32) -> String {
    let mut n = column.max(1);
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Parse a column given as letters (`C`, `aa`) or a 1-based number (`3`).
pub fn parse_column(input: &str) -> Result<u32> {
    let s = input.trim();
    if s.is_empty() {
        return Err(Error::InvalidColumn(input.to_string()));
    }
    if let Ok(n) = s.parse::<u32>() {
        return if n == 0 {
            Err(Error::InvalidColumn(input.to_string()))
        } else {
            Ok(n)
        };
    }
    if s.len() > 3 || !s.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidColumn(input.to_string()));
    }
    Ok(s.to_ascii_uppercase()
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1)))
}

/// A1 notation for a worksheet range, quoting the sheet name.
pub fn a1_range(worksheet: &str, range: &str) -> String {
    format!("'{}'!{}", worksheet.replace('\'', "''"), range)
}
