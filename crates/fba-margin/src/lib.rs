//! fba-margin — read ASINs from a spreadsheet, look each one up in the
//! Amazon FBA Revenue Calculator, and write the net profit margin back.

pub mod browser;
pub mod calculator;
pub mod cookies;
pub mod error;
pub mod google_auth;
pub mod margin;
pub mod pipeline;
pub mod progress;
pub mod search;
pub mod sheet;
pub mod types;

pub use calculator::{Calculator, CalculatorTimings, LookupOutcome, CALCULATOR_URL};
pub use error::{Error, Result};
pub use margin::{first_valid_margin, is_valid_margin};
pub use pipeline::{MarginRun, RunOptions};
pub use sheet::{read_identifiers, CellValue, SheetStore};
pub use types::*;
