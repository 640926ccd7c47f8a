//! Subcommand implementations.

pub mod doctor;
pub mod list_cmd;
pub mod run_cmd;
pub mod search_cmd;

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use fba_margin::google_auth::{ServiceAccountAuth, StaticToken, TokenSource, ACCESS_TOKEN_ENV};
use fba_margin::sheet::{GoogleSheetStore, XlsxSheetStore};
use fba_margin::SheetStore;

use crate::config::{SheetSource, Settings, CREDENTIALS_ENV};

/// Token source for the Sheets API: the service-account key if one is
/// configured, else a ready-made token from the environment.
pub fn token_source(settings: &Settings) -> Result<Arc<dyn TokenSource>> {
    if let Some(path) = &settings.credentials {
        let auth = ServiceAccountAuth::from_file(path)
            .with_context(|| format!("failed to load service account key {}", path.display()))?;
        tracing::info!(client_email = auth.client_email(), "Using service account");
        return Ok(Arc::new(auth));
    }
    if let Some(token) = StaticToken::from_env() {
        tracing::info!("Using access token from {ACCESS_TOKEN_ENV}");
        return Ok(Arc::new(token));
    }
    bail!(
        "no Google credentials: pass --credentials, or set {CREDENTIALS_ENV} or {ACCESS_TOKEN_ENV}"
    )
}

/// Open the configured sheet source.
pub fn open_store(settings: &Settings) -> Result<Box<dyn SheetStore>> {
    match &settings.source {
        Some(SheetSource::Google(sheet)) => {
            let store = GoogleSheetStore::new(sheet, token_source(settings)?)?;
            Ok(Box::new(store))
        }
        Some(SheetSource::Xlsx(path)) => Ok(Box::new(XlsxSheetStore::open(path)?)),
        None => bail!("no spreadsheet configured: pass --sheet <url-or-id> or --xlsx <path>"),
    }
}
