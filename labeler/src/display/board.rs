use chrono::{DateTime, Utc};
use frame_labeler_common::frame::CycleId;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{LabelRow, Status, StatusColor, StatusSink, TableSink};

#[derive(Debug, Default)]
struct BoardState {
    status: Option<Status>,
    status_cycle: Option<CycleId>,
    rows: Vec<LabelRow>,
    rows_cycle: Option<CycleId>,
    updated_at: Option<DateTime<Utc>>,
}

/// In-memory copy of what is on display, read by the HTTP server.
#[derive(Debug, Default)]
pub struct DisplayBoard {
    state: Mutex<BoardState>,
}

/// JSON body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    /// "pending" until the first cycle is applied.
    pub state: &'static str,
    pub text: Option<String>,
    pub color: Option<StatusColor>,
    pub cycle: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// JSON body of `GET /labels`.
#[derive(Debug, Clone, Serialize)]
pub struct LabelsView {
    pub cycle: Option<u64>,
    pub rows: Vec<LabelRow>,
}

impl DisplayBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(dead_code)]
    pub fn status(&self) -> Option<Status> {
        self.lock().status.clone()
    }

    #[allow(dead_code)]
    pub fn rows(&self) -> Vec<LabelRow> {
        self.lock().rows.clone()
    }

    #[allow(dead_code)]
    pub fn rows_cycle(&self) -> Option<CycleId> {
        self.lock().rows_cycle
    }

    pub fn labels_view(&self) -> LabelsView {
        let state = self.lock();
        LabelsView {
            cycle: state.rows_cycle.map(|c| c.0),
            rows: state.rows.clone(),
        }
    }

    pub fn status_view(&self) -> StatusView {
        let state = self.lock();
        match &state.status {
            None => StatusView {
                state: "pending",
                text: None,
                color: None,
                cycle: None,
                updated_at: None,
            },
            Some(status) => StatusView {
                state: if status.is_success() { "success" } else { "failure" },
                text: Some(status.text()),
                color: Some(status.color()),
                cycle: state.status_cycle.map(|c| c.0),
                updated_at: state.updated_at,
            },
        }
    }
}

impl StatusSink for DisplayBoard {
    fn set_status(&self, cycle: CycleId, status: &Status) {
        let mut state = self.lock();
        state.status = Some(status.clone());
        state.status_cycle = Some(cycle);
        state.updated_at = Some(Utc::now());
    }
}

impl TableSink for DisplayBoard {
    fn replace_rows(&self, cycle: CycleId, rows: &[LabelRow]) {
        let mut state = self.lock();
        state.rows = rows.to_vec();
        state.rows_cycle = Some(cycle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_before_first_cycle() {
        let board = DisplayBoard::new();
        let view = board.status_view();
        assert_eq!(view.state, "pending");
        assert!(view.text.is_none());
        assert!(board.rows().is_empty());
    }

    #[test]
    fn failure_view() {
        let board = DisplayBoard::new();
        board.set_status(
            CycleId(7),
            &Status::Failure {
                message: "AccessDeniedException".into(),
            },
        );
        let view = board.status_view();
        assert_eq!(view.state, "failure");
        assert_eq!(view.color, Some(StatusColor::Red));
        assert_eq!(view.cycle, Some(7));
        assert_eq!(view.text.as_deref(), Some("Model error: AccessDeniedException"));
        assert!(view.updated_at.is_some());
    }

    #[test]
    fn rows_replaced_wholesale() {
        let board = DisplayBoard::new();
        let row = |name: &str| LabelRow {
            name: name.into(),
            confidence: "90.00%".into(),
        };
        board.replace_rows(CycleId(1), &[row("A"), row("B")]);
        board.replace_rows(CycleId(2), &[row("C")]);
        assert_eq!(board.rows(), vec![row("C")]);
        assert_eq!(board.rows_cycle(), Some(CycleId(2)));
    }
}
