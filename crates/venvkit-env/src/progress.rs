//! Progress events emitted while bootstrap scripts run.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where a progress message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressSource {
    /// The installer itself (start/finish of a script).
    Main,
    /// A line the script wrote to stdout.
    Stdout,
    /// A line the script wrote to stderr.
    Stderr,
}

impl ProgressSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for ProgressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub message: String,
    pub source: ProgressSource,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>, source: ProgressSource) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }
}

/// Receives progress events. Called from the stdout/stderr drain threads, so
/// implementations must be `Sync`.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Default renderer: terse dots on stderr, or every line when verbose.
///
/// Non-verbose output for one script looks like `Installing pip .......done.`
#[derive(Debug, Default)]
pub struct StderrRenderer {
    verbose: bool,
    line_open: AtomicBool,
}

impl StderrRenderer {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            line_open: AtomicBool::new(false),
        }
    }

    /// Render `event` into `out`. Split out from `report` for tests.
    pub fn render(&self, event: &ProgressEvent, out: &mut dyn Write) -> std::io::Result<()> {
        match event.source {
            ProgressSource::Main if self.verbose => writeln!(out, "{}", event.message)?,
            ProgressSource::Main => {
                if self.line_open.swap(false, Ordering::SeqCst) {
                    writeln!(out, "{}", event.message)?;
                } else {
                    write!(out, "{}", event.message)?;
                    self.line_open.store(true, Ordering::SeqCst);
                }
            }
            ProgressSource::Stdout | ProgressSource::Stderr if self.verbose => {
                writeln!(out, "{}", event.message)?
            }
            ProgressSource::Stdout | ProgressSource::Stderr => write!(out, ".")?,
        }
        out.flush()
    }
}

impl ProgressSink for StderrRenderer {
    fn report(&self, event: &ProgressEvent) {
        let stderr = std::io::stderr();
        let mut lock = stderr.lock();
        let _ = self.render(event, &mut lock);
    }
}
