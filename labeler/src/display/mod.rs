pub mod board;
pub mod console;
pub mod http;

use frame_labeler_common::frame::CycleId;
use frame_labeler_common::label::RankedLabelSet;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub use board::DisplayBoard;
pub use console::ConsoleDisplay;

pub const SUCCESS_TEXT: &str = "Detection complete. Check labels below.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Red,
}

/// Outcome of the latest applied cycle, as shown on the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure { message: String },
}

impl Status {
    pub fn text(&self) -> String {
        match self {
            Self::Success => SUCCESS_TEXT.to_string(),
            Self::Failure { message } => format!("Model error: {message}"),
        }
    }

    pub fn color(&self) -> StatusColor {
        match self {
            Self::Success => StatusColor::Green,
            Self::Failure { .. } => StatusColor::Red,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One table row: label name and confidence with two decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelRow {
    pub name: String,
    pub confidence: String,
}

impl LabelRow {
    pub fn from_ranked(labels: &RankedLabelSet) -> Vec<Self> {
        labels
            .iter()
            .map(|label| Self {
                name: label.name.clone(),
                confidence: label.confidence_text(),
            })
            .collect()
    }
}

/// Receives the status line of every applied cycle.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, cycle: CycleId, status: &Status);
}

/// Two-column label table. Every call replaces all rows.
pub trait TableSink: Send + Sync {
    fn replace_rows(&self, cycle: CycleId, rows: &[LabelRow]);
}

/// Applies cycle results to the sinks in cycle order.
///
/// A result is applied only if its cycle is not older than the last applied
/// one, so a slow call finishing late cannot overwrite a newer result.
pub struct Display {
    status_sinks: Vec<Arc<dyn StatusSink>>,
    table_sinks: Vec<Arc<dyn TableSink>>,
    last_applied: Mutex<Option<CycleId>>,
}

impl Display {
    pub fn new(status_sinks: Vec<Arc<dyn StatusSink>>, table_sinks: Vec<Arc<dyn TableSink>>) -> Self {
        Self {
            status_sinks,
            table_sinks,
            last_applied: Mutex::new(None),
        }
    }

    /// Replace the rows and mark the status successful. Returns `false` if stale.
    pub fn show_labels(&self, cycle: CycleId, labels: &RankedLabelSet) -> bool {
        let mut last = self.last_applied.lock().unwrap_or_else(PoisonError::into_inner);
        if is_stale(*last, cycle) {
            debug!(%cycle, last = ?*last, "dropping stale label result");
            return false;
        }
        *last = Some(cycle);

        let rows = LabelRow::from_ranked(labels);
        for sink in &self.table_sinks {
            sink.replace_rows(cycle, &rows);
        }
        for sink in &self.status_sinks {
            sink.set_status(cycle, &Status::Success);
        }
        true
    }

    /// Show a failure on the status line; rows are left as they were.
    /// Returns `false` if stale.
    pub fn show_error(&self, cycle: CycleId, message: &str) -> bool {
        let mut last = self.last_applied.lock().unwrap_or_else(PoisonError::into_inner);
        if is_stale(*last, cycle) {
            debug!(%cycle, last = ?*last, "dropping stale error result");
            return false;
        }
        *last = Some(cycle);

        let status = Status::Failure {
            message: message.to_string(),
        };
        for sink in &self.status_sinks {
            sink.set_status(cycle, &status);
        }
        true
    }

    #[allow(dead_code)]
    pub fn last_applied(&self) -> Option<CycleId> {
        *self.last_applied.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_stale(last: Option<CycleId>, cycle: CycleId) -> bool {
    last.is_some_and(|last| cycle < last)
}
