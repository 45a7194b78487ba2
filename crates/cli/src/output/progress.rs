//! Transfer progress for session runs

use indicatif::{ProgressBar, ProgressStyle};
use stow_core::{CommandType, Error, SessionRecord, SessionReporter, TransferItem};

use super::Formatter;
use super::messages::{CopyMessage, SyncMessage};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}";
const PLAIN_BAR_TEMPLATE: &str = "{spinner} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}";

/// Reports a running session through the formatter and a byte progress bar
///
/// The bar is only shown for human output without `--quiet`.
pub struct TransferReporter {
    formatter: Formatter,
    bar: Option<ProgressBar>,
    command_type: CommandType,
    failures: usize,
}

impl TransferReporter {
    pub fn new(formatter: Formatter) -> Self {
        Self {
            formatter,
            bar: None,
            command_type: CommandType::Copy,
            failures: 0,
        }
    }

    /// Number of items that failed during the run
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Run `f` with the progress bar hidden
    fn print(&self, f: impl FnOnce(&Formatter)) {
        match &self.bar {
            Some(bar) => bar.suspend(|| f(&self.formatter)),
            None => f(&self.formatter),
        }
    }
}

impl SessionReporter for TransferReporter {
    fn begin(&mut self, record: &SessionRecord) {
        self.command_type = record.command_type;
        if self.formatter.is_json() || self.formatter.is_quiet() {
            return;
        }

        let bar = ProgressBar::new(record.pending_bytes());
        let template = if self.formatter.colors_enabled() {
            BAR_TEMPLATE
        } else {
            PLAIN_BAR_TEMPLATE
        };
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            bar.set_style(style.progress_chars("=> "));
        }
        self.bar = Some(bar);
    }

    fn item_done(&mut self, item: &TransferItem) {
        if let Some(bar) = &self.bar {
            bar.inc(item.length * item.targets.len() as u64);
            bar.set_message(item.source.clone());
        }
        // Human mode shows the bar; per-item lines are for scripts.
        if !self.formatter.is_json() {
            return;
        }
        match self.command_type {
            CommandType::Copy => {
                for target in &item.targets {
                    self.formatter.record(&CopyMessage {
                        source: item.source.clone(),
                        target: target.clone(),
                        length: item.length,
                    });
                }
            }
            CommandType::Sync => self.formatter.record(&SyncMessage {
                source: item.source.clone(),
                targets: item.targets.clone(),
                length: item.length,
            }),
        }
    }

    fn item_failed(&mut self, item: Option<&TransferItem>, error: &Error) {
        self.failures += 1;
        let message = match item {
            Some(item) => format!("Failed to transfer ‘{}’: {error}", item.source),
            None => error.to_string(),
        };
        self.print(|f| f.error(&message));
    }

    fn info(&mut self, message: &str) {
        self.print(|f| f.info(message));
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
