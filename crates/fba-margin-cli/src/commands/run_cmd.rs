//! `fba-margin run`: the margin pipeline.

use anyhow::{Context, Result};

use fba_margin::browser::{ChromiumRenderer, Renderer};
use fba_margin::{progress, CalculatorTimings, MarginRun, RunOptions, RunSummary};

use super::open_store;
use crate::config::Settings;
use crate::output::Output;

pub fn run_options(settings: &Settings) -> RunOptions {
    RunOptions {
        worksheet: settings.worksheet.clone(),
        margin_column: settings.margin_column,
        cookie_file: settings.cookies.clone(),
        calculator_url: settings.calculator_url.clone(),
        timings: CalculatorTimings::default(),
    }
}

pub async fn run(settings: &Settings, out: Output) -> Result<RunSummary> {
    let mut store = open_store(settings)?;
    tracing::info!("Reading ASINs from {}", store.describe());

    let renderer = ChromiumRenderer::launch(!settings.headed)
        .await
        .context("failed to launch Chromium (see `fba-margin doctor`)")?;

    let (tx, rx) = progress::channel();
    let bar = crate::progress::spawn(rx, out.show_progress());

    let result = MarginRun::new(run_options(settings))
        .with_progress(tx)
        .execute(store.as_mut(), &renderer)
        .await;

    if let Err(e) = renderer.shutdown().await {
        tracing::warn!("Browser shutdown failed: {e}");
    }
    let _ = bar.await;
    let summary = result?;

    if out.json {
        out.print_json(&summary)?;
    } else {
        println!("{}", crate::progress::summary_line(&summary));
        if summary.write_failures() > 0 {
            println!("{} margins could not be written", summary.write_failures());
        }
        if summary.aborted {
            println!("Run stopped early: the calculator could not be reset");
        }
    }
    Ok(summary)
}
