//! Error types for the fba-margin library.

use std::path::PathBuf;

/// All errors surfaced by cookie loading, sheet access, auth and config.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Cookie file not found: {0}")]
    CookieFileNotFound(PathBuf),

    #[error("Invalid cookie file {path}: {source}")]
    InvalidCookieFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Credentials file not found: {0}")]
    CredentialsNotFound(PathBuf),

    #[error("Invalid service account key: {0}")]
    InvalidCredentials(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Sheet API error ({status}): {message}")]
    SheetApi { status: u16, message: String },

    #[error("Worksheet not found: {0}")]
    WorksheetNotFound(String),

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Invalid spreadsheet reference: {0}")]
    InvalidSpreadsheet(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Row {row} already has a margin recorded")]
    AlreadyRecorded { row: u32 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<calamine::Error> for Error {
    fn from(e: calamine::Error) -> Self {
        Error::Workbook(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Error::Workbook(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;
