//! Core data types: identifier rows, margins and run summaries.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A net profit margin as rendered by the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    /// Numeric value in percent (`12.5` for `"12.5%"`), when the label
    /// reads as one number.
    pub percent: Option<f64>,
    /// The label text exactly as shown, written to the sheet verbatim.
    pub text: String,
}

impl std::fmt::Display for Margin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// One identifier read from the sheet, with its margin once scraped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsinRow {
    /// 1-based sheet row the identifier was read from.
    pub row: u32,
    pub asin: String,
    pub margin: Option<Margin>,
}

impl AsinRow {
    pub fn new(row: u32, asin: impl Into<String>) -> Self {
        Self {
            row,
            asin: asin.into(),
            margin: None,
        }
    }

    /// Record the scraped margin. A row takes at most one result per run.
    pub fn record(&mut self, margin: Margin) -> Result<()> {
        if self.margin.is_some() {
            return Err(Error::AlreadyRecorded { row: self.row });
        }
        self.margin = Some(margin);
        Ok(())
    }
}

/// Totals for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Non-blank identifiers read from the sheet.
    pub total: u32,
    /// Identifiers for which a valid margin was found.
    pub found: u32,
    /// Margins successfully written back.
    pub written: u32,
    /// Identifiers with no usable margin on the page.
    pub no_margin: u32,
    /// Identifiers whose lookup failed (page interaction or browser error).
    pub failed: u32,
    /// True when the loop stopped early because the calculator could not be reset.
    pub aborted: bool,
}

impl RunSummary {
    /// Identifiers that were attempted (the rest were cut off by an abort).
    pub fn attempted(&self) -> u32 {
        self.found + self.no_margin + self.failed
    }

    /// Margins that were found but could not be written to the sheet.
    pub fn write_failures(&self) -> u32 {
        self.found - self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn margin(text: &str, percent: f64) -> Margin {
        Margin {
            percent: Some(percent),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_record_once() {
        let mut row = AsinRow::new(2, "B000TEST01");
        row.record(margin("12.5%", 12.5)).unwrap();
        assert_eq!(row.margin.as_ref().unwrap().text, "12.5%");
    }

    #[test]
    fn test_record_twice_rejected() {
        let mut row = AsinRow::new(7, "B000TEST01");
        row.record(margin("12.5%", 12.5)).unwrap();
        let err = row.record(margin("9%", 9.0)).unwrap_err();
        assert!(matches!(err, Error::AlreadyRecorded { row: 7 }));
        assert_eq!(row.margin.unwrap().percent, Some(12.5));
    }

    #[test]
    fn test_summary_attempted() {
        let summary = RunSummary {
            total: 10,
            found: 4,
            written: 3,
            no_margin: 2,
            failed: 1,
            aborted: true,
        };
        assert_eq!(summary.attempted(), 7);
        assert_eq!(summary.write_failures(), 1);
    }

    #[test]
    fn test_margin_display() {
        assert_eq!(margin("-3.1%", -3.1).to_string(), "-3.1%");
    }
}
