//! Operator-facing output.
//!
//! A [`Ui`] is a one-way channel: steps and the runner write progress and
//! errors to it, nothing ever reads back.

use parking_lot::RwLock;
use std::io::Write;
use tracing::{error, info};

/// Write-only output sink for human-readable progress.
pub trait Ui: Send + Sync {
    /// Reports a progress headline.
    fn say(&self, message: &str);

    /// Reports detail beneath the last headline.
    fn message(&self, message: &str);

    /// Reports an error.
    fn error(&self, message: &str);
}

/// Writes prefixed lines to stdout, errors to stderr.
#[derive(Debug, Clone)]
pub struct ConsoleUi {
    prefix: String,
}

impl ConsoleUi {
    /// Creates a console sink for the named build.
    #[must_use]
    pub fn new(build_name: &str) -> Self {
        Self {
            prefix: build_name.to_string(),
        }
    }

    fn write_line(mut out: impl Write, line: &str) {
        // Output is best-effort; a closed pipe must not fail the build.
        let _ = writeln!(out, "{line}");
    }
}

impl Ui for ConsoleUi {
    fn say(&self, message: &str) {
        Self::write_line(std::io::stdout().lock(), &format!("==> {}: {message}", self.prefix));
    }

    fn message(&self, message: &str) {
        Self::write_line(std::io::stdout().lock(), &format!("    {}: {message}", self.prefix));
    }

    fn error(&self, message: &str) {
        Self::write_line(std::io::stderr().lock(), &format!("==> {}: {message}", self.prefix));
    }
}

/// Routes output through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingUi;

impl Ui for LoggingUi {
    fn say(&self, message: &str) {
        info!(target: "vsphere_iso::ui", "{message}");
    }

    fn message(&self, message: &str) {
        info!(target: "vsphere_iso::ui", detail = true, "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "vsphere_iso::ui", "{message}");
    }
}

/// Kind of a recorded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiLevel {
    /// From [`Ui::say`].
    Say,
    /// From [`Ui::message`].
    Message,
    /// From [`Ui::error`].
    Error,
}

/// Keeps every line in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingUi {
    lines: RwLock<Vec<(UiLevel, String)>>,
}

impl RecordingUi {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded line.
    #[must_use]
    pub fn lines(&self) -> Vec<(UiLevel, String)> {
        self.lines.read().clone()
    }

    /// Returns the recorded lines of one kind.
    #[must_use]
    pub fn lines_of(&self, level: UiLevel) -> Vec<String> {
        self.lines
            .read()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Returns true if any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.read().iter().any(|(_, m)| m.contains(needle))
    }

    fn record(&self, level: UiLevel, message: &str) {
        self.lines.write().push((level, message.to_string()));
    }
}

impl Ui for RecordingUi {
    fn say(&self, message: &str) {
        self.record(UiLevel::Say, message);
    }

    fn message(&self, message: &str) {
        self.record(UiLevel::Message, message);
    }

    fn error(&self, message: &str) {
        self.record(UiLevel::Error, message);
    }
}
