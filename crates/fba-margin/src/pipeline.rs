//! The margin run: read identifiers, look each one up, write margins back.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::browser::Renderer;
use crate::calculator::{Calculator, CalculatorTimings, LookupOutcome, CALCULATOR_URL};
use crate::cookies::{load_cookies, BrowserCookie};
use crate::progress::{emit, ProgressSender, RunEventKind};
use crate::sheet::{read_identifiers, CellValue, SheetStore, DEFAULT_MARGIN_COLUMN, DEFAULT_WORKSHEET};
use crate::types::RunSummary;

/// What to read, where to write, and how to drive the calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub worksheet: String,
    /// 1-based column receiving the margin text.
    pub margin_column: u32,
    /// Cookie export loaded before the first navigation.
    pub cookie_file: Option<PathBuf>,
    pub calculator_url: String,
    pub timings: CalculatorTimings,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            worksheet: DEFAULT_WORKSHEET.to_string(),
            margin_column: DEFAULT_MARGIN_COLUMN,
            cookie_file: None,
            calculator_url: CALCULATOR_URL.to_string(),
            timings: CalculatorTimings::default(),
        }
    }
}

pub struct MarginRun {
    options: RunOptions,
    /// Cookies supplied directly, in addition to `cookie_file`.
    cookies: Vec<BrowserCookie>,
    progress: Option<ProgressSender>,
}

fn outcome_reason(outcome: &LookupOutcome) -> &'static str {
    match outcome {
        LookupOutcome::InputNotFound => "ASIN input not found",
        LookupOutcome::SearchUnavailable => "search button not found",
        LookupOutcome::SelectUnavailable => "select button not found",
        LookupOutcome::NoValidMargin { .. } => "no valid margin",
        LookupOutcome::NoMargin => "no margin shown",
        LookupOutcome::Found { .. } => "found",
    }
}

impl MarginRun {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            cookies: Vec::new(),
            progress: None,
        }
    }

    pub fn with_cookies(mut self, cookies: Vec<BrowserCookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Broadcast [`crate::progress::RunEvent`]s on `tx`.
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run the whole pipeline against `store`, using one context from `renderer`.
    ///
    /// Errors are returned only for fatal conditions: the sheet cannot be
    /// read, the cookie file cannot be loaded, or the calculator cannot be
    /// opened. Per-row problems are logged and counted in the summary.
    pub async fn execute(
        &self,
        store: &mut dyn SheetStore,
        renderer: &dyn Renderer,
    ) -> Result<RunSummary> {
        let opts = &self.options;
        let mut seq = 0u64;
        let mut summary = RunSummary::default();

        let mut rows = read_identifiers(store, &opts.worksheet)
            .await
            .with_context(|| format!("failed to read ASINs from {}", store.describe()))?;
        summary.total = rows.len() as u32;
        tracing::info!(count = rows.len(), "ASINs to process");
        emit(&self.progress, &mut seq, RunEventKind::RunStarted { total: summary.total });

        if rows.is_empty() {
            tracing::warn!(worksheet = %opts.worksheet, "No ASINs found, nothing to do");
            emit(&self.progress, &mut seq, RunEventKind::RunComplete { summary: summary.clone() });
            return Ok(summary);
        }

        let mut cookies = self.cookies.clone();
        if let Some(path) = &opts.cookie_file {
            cookies.extend(load_cookies(path)?);
        }

        let mut ctx = renderer
            .new_context()
            .await
            .context("failed to open a browser context")?;
        if !cookies.is_empty() {
            if let Err(e) = ctx.set_cookies(&cookies).await {
                let _ = ctx.close().await;
                return Err(e.context("failed to inject cookies"));
            }
            tracing::info!(count = cookies.len(), "Injected cookies");
        }

        let mut calculator =
            Calculator::new(ctx, opts.timings.clone()).with_url(opts.calculator_url.clone());
        match calculator.open().await {
            Ok(true) => {}
            Ok(false) => {
                let _ = calculator.into_context().close().await;
                bail!("could not get past the calculator's guest gate");
            }
            Err(e) => {
                let _ = calculator.into_context().close().await;
                return Err(e);
            }
        }

        let last = rows.len() - 1;
        for (i, row) in rows.iter_mut().enumerate() {
            let (n, asin) = (row.row, row.asin.clone());
            tracing::info!(row = n, %asin, "Processing ASIN");
            emit(&self.progress, &mut seq, RunEventKind::RowStarted { row: n, asin: asin.clone() });

            match calculator.lookup(&asin).await {
                Ok(LookupOutcome::Found { margin, .. }) => {
                    summary.found += 1;
                    emit(
                        &self.progress,
                        &mut seq,
                        RunEventKind::MarginFound {
                            row: n,
                            asin: asin.clone(),
                            margin: margin.text.clone(),
                        },
                    );
                    let cell = CellValue::Text(margin.text.clone());
                    match store
                        .write_cell(&opts.worksheet, n, opts.margin_column, &cell)
                        .await
                    {
                        Ok(()) => {
                            summary.written += 1;
                            tracing::info!(row = n, %asin, margin = %margin, "Margin written");
                            emit(&self.progress, &mut seq, RunEventKind::MarginWritten { row: n, asin: asin.clone() });
                        }
                        Err(e) => {
                            tracing::error!(row = n, %asin, "Failed to write margin: {e}");
                            emit(
                                &self.progress,
                                &mut seq,
                                RunEventKind::RowFailed {
                                    row: n,
                                    asin: asin.clone(),
                                    reason: format!("write failed: {e}"),
                                },
                            );
                        }
                    }
                    if let Err(e) = row.record(margin) {
                        tracing::warn!(row = n, "{e}");
                    }
                }
                Ok(outcome) if outcome.is_failure() => {
                    summary.failed += 1;
                    tracing::warn!(row = n, %asin, reason = outcome_reason(&outcome), "Lookup failed");
                    emit(
                        &self.progress,
                        &mut seq,
                        RunEventKind::RowFailed {
                            row: n,
                            asin: asin.clone(),
                            reason: outcome_reason(&outcome).to_string(),
                        },
                    );
                }
                Ok(outcome) => {
                    summary.no_margin += 1;
                    tracing::warn!(row = n, %asin, reason = outcome_reason(&outcome), "No margin for ASIN");
                    emit(&self.progress, &mut seq, RunEventKind::RowNoMargin { row: n, asin: asin.clone() });
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(row = n, %asin, "Lookup error: {e:#}");
                    emit(
                        &self.progress,
                        &mut seq,
                        RunEventKind::RowFailed {
                            row: n,
                            asin: asin.clone(),
                            reason: format!("{e:#}"),
                        },
                    );
                }
            }

            if i == last {
                break;
            }
            let reason = match calculator.reset().await {
                Ok(true) => continue,
                Ok(false) => "guest gate not passed after reset".to_string(),
                Err(e) => format!("{e:#}"),
            };
            summary.aborted = true;
            tracing::error!(row = n, "Could not reset the calculator, stopping: {reason}");
            emit(&self.progress, &mut seq, RunEventKind::RunAborted { reason });
            break;
        }

        let flushed = store.flush().await;
        if let Err(e) = calculator.into_context().close().await {
            tracing::warn!("Failed to close browser context: {e}");
        }
        tracing::debug!(
            open_contexts = renderer.active_contexts(),
            "Closed calculator context"
        );
        flushed.with_context(|| format!("failed to save {}", store.describe()))?;

        tracing::info!(
            total = summary.total,
            found = summary.found,
            written = summary.written,
            no_margin = summary.no_margin,
            failed = summary.failed,
            aborted = summary.aborted,
            "Run complete"
        );
        emit(&self.progress, &mut seq, RunEventKind::RunComplete { summary: summary.clone() });
        Ok(summary)
    }
}
