//! Terminal progress bar fed from the run's event channel.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use fba_margin::progress::{ProgressReceiver, RunEventKind};
use fba_margin::RunSummary;

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}";

fn new_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

pub fn summary_line(summary: &RunSummary) -> String {
    format!(
        "{} written, {} without margin, {} failed of {}",
        summary.written, summary.no_margin, summary.failed, summary.total
    )
}

/// Render events until the run completes or the sender is dropped.
pub fn spawn(mut rx: ProgressReceiver, visible: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let bar = new_bar(visible);
        let mut started = 0u64;
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress display lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event.kind {
                RunEventKind::RunStarted { total } => bar.set_length(u64::from(total)),
                RunEventKind::RowStarted { asin, .. } => {
                    // Position counts finished rows.
                    bar.set_position(started);
                    started += 1;
                    bar.set_message(asin);
                }
                RunEventKind::RowFailed { asin, reason, .. } => {
                    bar.println(format!("  {asin}: {reason}"));
                }
                RunEventKind::RunAborted { reason } => {
                    bar.abandon_with_message(format!("aborted: {reason}"));
                    return;
                }
                RunEventKind::RunComplete { summary } => {
                    bar.set_position(u64::from(summary.attempted()));
                    bar.finish_with_message(summary_line(&summary));
                    return;
                }
                RunEventKind::MarginFound { .. }
                | RunEventKind::MarginWritten { .. }
                | RunEventKind::RowNoMargin { .. } => {}
            }
        }
        bar.finish_and_clear();
    })
}
