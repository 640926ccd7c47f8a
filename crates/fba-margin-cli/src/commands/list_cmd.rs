//! `fba-margin list`: show the ASIN rows a run would process.

use anyhow::Result;

use fba_margin::{read_identifiers, AsinRow};

use super::open_store;
use crate::config::Settings;
use crate::output::Output;

pub async fn run(settings: &Settings, out: Output) -> Result<Vec<AsinRow>> {
    let mut store = open_store(settings)?;
    let rows = read_identifiers(store.as_mut(), &settings.worksheet).await?;

    if out.json {
        out.print_json(&rows)?;
        return Ok(rows);
    }
    if rows.is_empty() {
        println!("No ASINs in worksheet '{}'", settings.worksheet);
        return Ok(rows);
    }
    println!("{:>6}  ASIN", "Row");
    for row in &rows {
        println!("{:>6}  {}", row.row, row.asin);
    }
    if !out.quiet {
        println!();
        println!("{} ASINs in '{}'", rows.len(), settings.worksheet);
    }
    Ok(rows)
}
