//! Google Sheets API v4 backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{a1_range, column_letter, CellValue, SheetStore};
use crate::error::{Error, Result};
use crate::google_auth::TokenSource;

/// Public Sheets API endpoint.
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

/// Extract the spreadsheet id from a sheet URL, or accept a bare id.
///
/// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=0` → `<id>`.
pub fn spreadsheet_id(reference: &str) -> Result<String> {
    let reference = reference.trim();
    let invalid = || Error::InvalidSpreadsheet(reference.to_string());

    let id = match reference.split_once("/spreadsheets/d/") {
        Some((_, rest)) => rest.split(['/', '?', '#']).next().unwrap_or_default(),
        None if reference.contains("://") => return Err(invalid()),
        None => reference,
    };

    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid());
    }
    Ok(id.to_string())
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

/// A spreadsheet reached through the Sheets REST API. Writes go through
/// immediately, so progress survives an interrupted run.
pub struct GoogleSheetStore {
    client: reqwest::Client,
    base: Url,
    spreadsheet_id: String,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleSheetStore {
    /// Open a spreadsheet by URL or id.
    pub fn new(spreadsheet: &str, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let base = Url::parse(SHEETS_API_BASE)
            .map_err(|e| Error::Config(format!("invalid Sheets API base: {e}")))?;
        Ok(Self {
            client,
            base,
            spreadsheet_id: spreadsheet_id(spreadsheet)?,
            tokens,
        })
    }

    /// Send requests to another API root (emulators, tests).
    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        self.base =
            Url::parse(base).map_err(|e| Error::Config(format!("invalid API base {base}: {e}")))?;
        Ok(self)
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// `{base}/v4/spreadsheets/{id}` followed by `tail` path segments, each encoded.
    fn url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("API base cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(tail);
        Ok(url)
    }

    async fn call(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value> {
        let token = self.tokens.access_token().await?;
        let mut request = self.client.request(method.clone(), url.clone()).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        tracing::debug!(%method, path = url.path(), status, "Sheets API call");

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(String::from))
                .unwrap_or(text);
            return Err(Error::SheetApi { status, message });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn sheet_titles(&self) -> Result<Vec<String>> {
        let mut url = self.url(&[&self.spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        let meta: SpreadsheetMeta = serde_json::from_value(self.call(Method::GET, url, None).await?)?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn map_range_error(err: Error, worksheet: &str) -> Error {
    match err {
        Error::SheetApi { status: 400, ref message } if message.contains("Unable to parse range") => {
            Error::WorksheetNotFound(worksheet.to_string())
        }
        other => other,
    }
}

#[async_trait]
impl SheetStore for GoogleSheetStore {
    fn describe(&self) -> String {
        format!("Google Sheet {}", self.spreadsheet_id)
    }

    async fn read_column(&mut self, worksheet: &str, column: u32) -> Result<Vec<String>> {
        let letter = column_letter(column);
        let range = a1_range(worksheet, &format!("{letter}:{letter}"));
        let mut url = self.url(&[&self.spreadsheet_id, "values", &range])?;
        url.query_pairs_mut().append_pair("majorDimension", "COLUMNS");

        let body = self
            .call(Method::GET, url, None)
            .await
            .map_err(|e| map_range_error(e, worksheet))?;
        let range: ValueRange = serde_json::from_value(body)?;
        Ok(range
            .values
            .into_iter()
            .next()
            .map(|col| col.iter().map(cell_text).collect())
            .unwrap_or_default())
    }

    async fn write_cell(
        &mut self,
        worksheet: &str,
        row: u32,
        column: u32,
        value: &CellValue,
    ) -> Result<()> {
        let range = a1_range(worksheet, &format!("{}{row}", column_letter(column)));
        let mut url = self.url(&[&self.spreadsheet_id, "values", &range])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[value]],
        });
        self.call(Method::PUT, url, Some(body))
            .await
            .map_err(|e| map_range_error(e, worksheet))?;
        Ok(())
    }

    async fn ensure_worksheet(&mut self, title: &str, rows: u32, columns: u32) -> Result<bool> {
        if self.sheet_titles().await?.iter().any(|t| t == title) {
            return Ok(false);
        }

        let url = self.url(&[&format!("{}:batchUpdate", self.spreadsheet_id)])?;
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": { "rowCount": rows, "columnCount": columns }
                    }
                }
            }]
        });
        self.call(Method::POST, url, Some(body)).await?;
        tracing::info!(title, "Created worksheet");
        Ok(true)
    }

    async fn append_rows(&mut self, worksheet: &str, rows: &[Vec<CellValue>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let range = a1_range(worksheet, "A1");
        let mut url = self.url(&[&self.spreadsheet_id, "values", &format!("{range}:append")])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = json!({
            "majorDimension": "ROWS",
            "values": rows,
        });
        self.call(Method::POST, url, Some(body))
            .await
            .map_err(|e| map_range_error(e, worksheet))?;
        tracing::info!(worksheet, rows = rows.len(), "Appended rows");
        Ok(())
    }
}
