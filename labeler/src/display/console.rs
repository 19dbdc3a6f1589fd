use frame_labeler_common::frame::CycleId;
use std::ffi::OsStr;
use std::io::{IsTerminal, Write};
use std::sync::Mutex;
use tracing::warn;

use super::{LabelRow, Status, StatusColor, StatusSink, TableSink};

const NAME_WIDTH: usize = 24;
const CONFIDENCE_WIDTH: usize = 10;

/// Terminal rendering of the status line and label table.
pub struct ConsoleDisplay<W = std::io::Stdout> {
    out: Mutex<W>,
    color: bool,
}

impl ConsoleDisplay {
    /// Colour is used only when stdout is a terminal and `NO_COLOR` is unset.
    pub fn stdout() -> Self {
        let out = std::io::stdout();
        let color = color_enabled(out.is_terminal(), std::env::var_os("NO_COLOR").as_deref());
        Self {
            out: Mutex::new(out),
            color,
        }
    }
}

fn color_enabled(is_terminal: bool, no_color: Option<&OsStr>) -> bool {
    is_terminal && no_color.map_or(true, OsStr::is_empty)
}

impl<W: Write> ConsoleDisplay<W> {
    #[allow(dead_code)]
    pub fn with_writer(out: W, color: bool) -> Self {
        Self {
            out: Mutex::new(out),
            color,
        }
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!(error = %e, "failed to write to console display");
        }
    }

    fn paint(&self, text: &str, color: StatusColor) -> String {
        if !self.color {
            return text.to_string();
        }
        let code = match color {
            StatusColor::Green => "32",
            StatusColor::Red => "31",
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn render_table(rows: &[LabelRow]) -> String {
    let rule = |l: &str, m: &str, r: &str| {
        format!(
            "{l}{}{m}{}{r}\n",
            "─".repeat(NAME_WIDTH + 2),
            "─".repeat(CONFIDENCE_WIDTH + 2)
        )
    };
    let mut table = rule("┌", "┬", "┐");
    table.push_str(&format!(
        "│ {:<NAME_WIDTH$} │ {:>CONFIDENCE_WIDTH$} │\n",
        "Label", "Confidence"
    ));
    table.push_str(&rule("├", "┼", "┤"));
    for row in rows {
        let name: String = row.name.chars().take(NAME_WIDTH).collect();
        table.push_str(&format!(
            "│ {:<NAME_WIDTH$} │ {:>CONFIDENCE_WIDTH$} │\n",
            name, row.confidence
        ));
    }
    table.push_str(&rule("└", "┴", "┘"));
    table
}

impl<W: Write + Send> StatusSink for ConsoleDisplay<W> {
    fn set_status(&self, cycle: CycleId, status: &Status) {
        let line = self.paint(&status.text(), status.color());
        self.write(&format!("[{cycle}] {line}\n"));
    }
}

impl<W: Write + Send> TableSink for ConsoleDisplay<W> {
    fn replace_rows(&self, _cycle: CycleId, rows: &[LabelRow]) {
        self.write(&render_table(rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(display: &ConsoleDisplay<Vec<u8>>) -> String {
        String::from_utf8(display.out.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn table_lists_every_row() {
        let display = ConsoleDisplay::with_writer(Vec::new(), false);
        display.replace_rows(
            CycleId(1),
            &[
                LabelRow {
                    name: "Dog".into(),
                    confidence: "99.12%".into(),
                },
                LabelRow {
                    name: "Pet".into(),
                    confidence: "95.00%".into(),
                },
            ],
        );
        let text = output(&display);
        assert!(text.contains("│ Dog "));
        assert!(text.contains("99.12% │"));
        assert!(text.contains("│ Pet "));
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn failure_is_red() {
        let display = ConsoleDisplay::with_writer(Vec::new(), true);
        display.set_status(
            CycleId(3),
            &Status::Failure {
                message: "ThrottlingException".into(),
            },
        );
        let text = output(&display);
        assert!(text.starts_with("[#3] \x1b[31m"));
        assert!(text.contains("Model error: ThrottlingException"));
    }

    #[test]
    fn color_only_on_terminal() {
        assert!(color_enabled(true, None));
        assert!(!color_enabled(false, None));
        assert!(!color_enabled(true, Some(OsStr::new("1"))));
        assert!(color_enabled(true, Some(OsStr::new(""))));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_does_not_panic() {
        let display = ConsoleDisplay::with_writer(BrokenPipe, false);
        display.set_status(CycleId(1), &Status::Success);
        display.replace_rows(CycleId(1), &[]);
    }

    #[test]
    fn plain_output_without_color() {
        let display = ConsoleDisplay::with_writer(Vec::new(), false);
        display.set_status(CycleId(1), &Status::Success);
        assert_eq!(output(&display), "[#1] Detection complete. Check labels below.\n");
    }
}
