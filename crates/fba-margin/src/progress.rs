//! Progress events for a margin run.
//!
//! The pipeline emits [`RunEvent`]s through a `tokio::sync::broadcast`
//! channel to whoever is listening (the CLI progress bar, the REPL). When
//! nobody is subscribed, events are dropped.

use serde::{Deserialize, Serialize};

use crate::types::RunSummary;

/// A progress event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    pub kind: RunEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEventKind {
    /// Identifiers were read; `total` lookups are about to run.
    RunStarted { total: u32 },
    RowStarted { row: u32, asin: String },
    MarginFound { row: u32, asin: String, margin: String },
    MarginWritten { row: u32, asin: String },
    RowNoMargin { row: u32, asin: String },
    RowFailed { row: u32, asin: String, reason: String },
    /// The calculator could not be reset; remaining rows are skipped.
    RunAborted { reason: String },
    RunComplete { summary: RunSummary },
}

pub type ProgressSender = tokio::sync::broadcast::Sender<RunEvent>;
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<RunEvent>;

/// Create a progress channel. 256 events covers a few hundred rows before a
/// slow subscriber starts lagging.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit an event, ignoring the error returned when no receiver exists.
pub fn emit(tx: &Option<ProgressSender>, seq: &mut u64, kind: RunEventKind) {
    if let Some(sender) = tx {
        *seq += 1;
        let _ = sender.send(RunEvent { seq: *seq, kind });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = RunEvent {
            seq: 3,
            kind: RunEventKind::MarginFound {
                row: 2,
                asin: "B000TEST01".to_string(),
                margin: "12%".to_string(),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"MarginFound""#));

        let parsed: RunEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.seq, 3);
        assert_eq!(parsed.kind, event.kind);
    }

    #[test]
    fn test_emit_numbers_events() {
        let (tx, mut rx) = channel();
        let tx = Some(tx);
        let mut seq = 0;
        emit(&tx, &mut seq, RunEventKind::RunStarted { total: 2 });
        emit(
            &tx,
            &mut seq,
            RunEventKind::RunAborted {
                reason: "reset failed".to_string(),
            },
        );
        assert_eq!(rx.try_recv().unwrap().seq, 1);
        assert_eq!(rx.try_recv().unwrap().seq, 2);
    }

    #[test]
    fn test_emit_without_receivers() {
        let (tx, rx) = channel();
        drop(rx);
        emit(&Some(tx), &mut 0, RunEventKind::RunStarted { total: 0 });
        emit(&None, &mut 0, RunEventKind::RunStarted { total: 0 });
    }
}
