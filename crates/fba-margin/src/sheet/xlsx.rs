//! Local `.xlsx` workbook backend.
//!
//! The workbook is read once with calamine and held in memory. Writes
//! update the in-memory cells and [`SheetStore::flush`] rewrites the whole
//! file with rust_xlsxwriter. Formatting, formulas and charts of the
//! original file are not preserved; only cell values are.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;

use super::{CellValue, SheetStore};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Worksheet {
    name: String,
    /// 1-based (row, column) → value.
    cells: BTreeMap<(u32, u32), CellValue>,
}

impl Worksheet {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: BTreeMap::new(),
        }
    }

    fn last_row(&self) -> u32 {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }
}

pub struct XlsxSheetStore {
    path: PathBuf,
    sheets: Vec<Worksheet>,
    dirty: bool,
}

fn cell_from_data(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Text(format!("#{e:?}"))),
    }
}

impl XlsxSheetStore {
    /// Load `path`, or start an empty workbook when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Workbook not found, starting empty");
            return Ok(Self {
                path,
                sheets: Vec::new(),
                dirty: false,
            });
        }

        let mut workbook = open_workbook_auto(&path)?;
        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name)?;
            let mut sheet = Worksheet::new(&name);
            let (row0, col0) = range.start().unwrap_or((0, 0));
            for (r, c, data) in range.used_cells() {
                if let Some(value) = cell_from_data(data) {
                    sheet
                        .cells
                        .insert((row0 + r as u32 + 1, col0 + c as u32 + 1), value);
                }
            }
            sheets.push(sheet);
        }

        tracing::debug!(path = %path.display(), sheets = sheets.len(), "Loaded workbook");
        Ok(Self {
            path,
            sheets,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn worksheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Current value of one cell, after any unflushed writes.
    pub fn cell(&self, worksheet: &str, row: u32, column: u32) -> Option<&CellValue> {
        self.sheet(worksheet).ok()?.cells.get(&(row, column))
    }

    fn sheet(&self, name: &str) -> Result<&Worksheet> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::WorksheetNotFound(name.to_string()))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Worksheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::WorksheetNotFound(name.to_string()))
    }

    fn save(&self) -> Result<()> {
        let mut workbook = Workbook::new();
        for sheet in &self.sheets {
            let ws = workbook.add_worksheet();
            ws.set_name(&sheet.name)?;
            for (&(row, column), value) in &sheet.cells {
                let (r, c) = (row - 1, to_col(column)?);
                match value {
                    CellValue::Text(s) => ws.write_string(r, c, s)?,
                    CellValue::Number(n) => ws.write_number(r, c, *n)?,
                    CellValue::Bool(b) => ws.write_boolean(r, c, *b)?,
                };
            }
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        workbook.save(&self.path)?;
        Ok(())
    }
}

fn to_col(column: u32) -> Result<u16> {
    u16::try_from(column - 1).map_err(|_| Error::InvalidColumn(column.to_string()))
}

#[async_trait]
impl SheetStore for XlsxSheetStore {
    fn describe(&self) -> String {
        format!("workbook {}", self.path.display())
    }

    async fn read_column(&mut self, worksheet: &str, column: u32) -> Result<Vec<String>> {
        let sheet = self.sheet(worksheet)?;
        let mut values = Vec::new();
        for (&(row, _), value) in sheet.cells.iter().filter(|((_, c), _)| *c == column) {
            let idx = (row - 1) as usize;
            if values.len() <= idx {
                values.resize(idx + 1, String::new());
            }
            values[idx] = value.display();
        }
        Ok(values)
    }

    async fn write_cell(
        &mut self,
        worksheet: &str,
        row: u32,
        column: u32,
        value: &CellValue,
    ) -> Result<()> {
        if row == 0 || column == 0 {
            return Err(Error::InvalidColumn(format!("R{row}C{column}")));
        }
        to_col(column)?;
        self.sheet_mut(worksheet)?
            .cells
            .insert((row, column), value.clone());
        self.dirty = true;
        Ok(())
    }

    async fn ensure_worksheet(&mut self, title: &str, _rows: u32, _columns: u32) -> Result<bool> {
        if self.sheet(title).is_ok() {
            return Ok(false);
        }
        self.sheets.push(Worksheet::new(title));
        self.dirty = true;
        tracing::info!(title, "Created worksheet");
        Ok(true)
    }

    async fn append_rows(&mut self, worksheet: &str, rows: &[Vec<CellValue>]) -> Result<()> {
        let sheet = self.sheet_mut(worksheet)?;
        let start = sheet.last_row() + 1;
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                sheet
                    .cells
                    .insert((start + i as u32, j as u32 + 1), value.clone());
            }
        }
        self.dirty |= !rows.is_empty();
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.save()?;
        self.dirty = false;
        tracing::info!(path = %self.path.display(), "Saved workbook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> XlsxSheetStore {
        XlsxSheetStore {
            path: PathBuf::from("unused.xlsx"),
            sheets: vec![Worksheet::new("ASINs")],
            dirty: false,
        }
    }

    #[tokio::test]
    async fn test_read_column_fills_gaps() {
        let mut s = store();
        s.write_cell("ASINs", 1, 1, &"ASIN".into()).await.unwrap();
        s.write_cell("ASINs", 3, 1, &"B000000003".into()).await.unwrap();
        s.write_cell("ASINs", 2, 2, &"other".into()).await.unwrap();

        let col = s.read_column("ASINs", 1).await.unwrap();
        assert_eq!(col, vec!["ASIN", "", "B000000003"]);
    }

    #[tokio::test]
    async fn test_missing_worksheet() {
        let mut s = store();
        let err = s.read_column("Nope", 1).await.unwrap_err();
        assert!(matches!(err, Error::WorksheetNotFound(name) if name == "Nope"));
    }

    #[tokio::test]
    async fn test_append_after_last_row() {
        let mut s = store();
        s.ensure_worksheet("Amazon", 100, 18).await.unwrap();
        s.append_rows("Amazon", &[vec!["h1".into(), "h2".into()]])
            .await
            .unwrap();
        s.append_rows("Amazon", &[vec![1u32.into(), true.into()]])
            .await
            .unwrap();
        assert_eq!(s.cell("Amazon", 2, 1), Some(&CellValue::Number(1.0)));
        assert_eq!(s.cell("Amazon", 2, 2), Some(&CellValue::Bool(true)));
        assert!(!s.ensure_worksheet("Amazon", 100, 18).await.unwrap());
    }

    #[tokio::test]
    async fn test_flush_clean_is_noop() {
        let mut s = store();
        // Nothing written, so the bogus path is never touched.
        s.flush().await.unwrap();
    }
}
