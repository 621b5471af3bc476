use indicatif::{ProgressBar, ProgressStyle};
use sorter_core::progress::{ProgressEvent, ProgressSink};
use sorter_core::ItemOutcome;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

type SharedBar = Arc<Mutex<Option<ProgressBar>>>;

/// Live progress bar on stderr; hidden automatically when stderr is not a terminal.
/// Per-item failures are reported by the log, so the bar only tracks counts.
#[derive(Default)]
pub struct TerminalRenderer {
    bar: SharedBar,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer for the tracing subscriber that clears the bar around each log line.
    pub fn log_writer(&self) -> LogWriter {
        LogWriter {
            bar: self.bar.clone(),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

#[derive(Clone)]
pub struct LogWriter {
    bar: SharedBar,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let active = self.bar.lock().ok().and_then(|guard| guard.clone());
        match active {
            Some(bar) => bar.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn style() -> ProgressStyle {
    ProgressStyle::with_template("Progress: {pos}/{len} [{bar:30}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

pub fn status_message(last: &ItemOutcome, rate: f64) -> String {
    format!("last: {} | Rate: {:.2} images/sec", last.label(), rate)
}

impl ProgressSink for TerminalRenderer {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started {
                dispatched,
                workers,
                ..
            } => {
                if dispatched == 0 {
                    return;
                }
                let bar = ProgressBar::new(dispatched as u64);
                bar.set_style(style());
                bar.set_message(format!("{} workers", workers));
                if let Ok(mut guard) = self.bar.lock() {
                    *guard = Some(bar);
                }
            }
            ProgressEvent::Filtered { .. } => {}
            ProgressEvent::Completed {
                outcome, snapshot, ..
            } => self.with_bar(|bar| {
                bar.set_position(snapshot.completed as u64);
                bar.set_message(status_message(&outcome, snapshot.rate));
            }),
            ProgressEvent::Finished { .. } => {
                if let Ok(mut guard) = self.bar.lock() {
                    if let Some(bar) = guard.take() {
                        bar.finish_and_clear();
                    }
                }
            }
        }
    }
}
