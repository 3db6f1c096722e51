use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use tracing::warn;

/// Prints `<exported>/<total> <label> exported` after every batch of a phase.
pub struct ProgressReporter<'w, W: Write> {
    out: &'w mut W,
    label: &'static str,
    total: u64,
    exported: u64,
    lines: u64,
}

impl<'w, W: Write> ProgressReporter<'w, W> {
    pub fn new(out: &'w mut W, label: &'static str, total: u64) -> Self {
        Self {
            out,
            label,
            total,
            exported: 0,
            lines: 0,
        }
    }

    /// Adds `rows` to the exported count and prints the progress line.
    pub fn record(&mut self, rows: u64) {
        self.exported += rows;
        self.report();
    }

    /// Prints the current line without counting anything.
    pub fn report(&mut self) {
        self.lines += 1;
        if let Err(e) = writeln!(
            self.out,
            "{}/{} {} exported",
            self.exported, self.total, self.label
        ) {
            warn!(error = %e, "Failed to write progress line");
        }
    }

    /// Closes the phase; a phase that never reported prints one line so empty
    /// tables still show `0/0`.
    pub fn finish(mut self) {
        if self.lines == 0 {
            self.report();
        }
        if let Err(e) = self.out.flush() {
            warn!(error = %e, "Failed to flush progress output");
        }
    }
}

pub fn make_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(msg.to_string());
    pb
}
