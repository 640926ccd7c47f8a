//! `fba-margin search <query>`: scrape a results page into a worksheet.

use std::time::Duration;

use anyhow::{Context, Result};

use fba_margin::search::{SearchClient, SearchProduct, SEARCH_WORKSHEET};
use fba_margin::{CellValue, SheetStore};

use super::open_store;
use crate::config::Settings;
use crate::output::Output;

#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub query: String,
    /// Print only, never touch the sheet.
    pub print_only: bool,
    pub target: String,
    pub no_delay: bool,
}

impl SearchArgs {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            print_only: false,
            target: SEARCH_WORKSHEET.to_string(),
            no_delay: false,
        }
    }
}

/// One row per product, preceded by the header row when `with_header` is set.
pub fn sheet_rows(products: &[SearchProduct], with_header: bool) -> Vec<Vec<CellValue>> {
    with_header
        .then(SearchProduct::header_row)
        .into_iter()
        .chain(products.iter().map(SearchProduct::to_row))
        .collect()
}

/// Append `products` to `worksheet`, creating it if needed. The header goes
/// in only while the worksheet is empty, so it stays on row 1.
pub async fn write_results(
    store: &mut dyn SheetStore,
    worksheet: &str,
    products: &[SearchProduct],
) -> Result<()> {
    let columns = SearchProduct::HEADERS.len() as u32;
    let created = store.ensure_worksheet(worksheet, 100, columns).await?;
    let empty = created
        || store
            .read_column(worksheet, 1)
            .await?
            .iter()
            .all(|v| v.trim().is_empty());
    store
        .append_rows(worksheet, &sheet_rows(products, empty))
        .await?;
    store.flush().await?;
    Ok(())
}

pub async fn run(settings: &Settings, args: &SearchArgs, out: Output) -> Result<Vec<SearchProduct>> {
    let mut client = SearchClient::new();
    if args.no_delay {
        client = client.with_delay(Duration::ZERO, Duration::ZERO);
    }
    let products = client
        .search(&args.query)
        .await
        .with_context(|| format!("search for '{}' failed", args.query))?;
    if products.is_empty() {
        tracing::warn!(query = %args.query, "No products found (the page may be a robot check)");
    }

    let write = !args.print_only && settings.source.is_some();
    if write && !products.is_empty() {
        let mut store = open_store(settings)?;
        write_results(store.as_mut(), &args.target, &products).await?;
        tracing::info!(
            worksheet = %args.target,
            rows = products.len(),
            "Search results written to {}",
            store.describe()
        );
    }

    if out.json {
        out.print_json(&products)?;
    } else {
        for p in &products {
            println!(
                "{:>3}  {:<10}  £{:>8.2}  {}",
                p.position,
                p.asin,
                p.price,
                p.title.as_deref().unwrap_or("-")
            );
        }
        if !out.quiet {
            println!();
            println!("{} products for '{}'", products.len(), args.query);
        }
    }
    Ok(products)
}
