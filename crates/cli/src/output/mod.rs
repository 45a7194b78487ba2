//! Output formatting
//!
//! Every command prints through a [`Formatter`], which switches between
//! human-readable lines and JSON according to [`OutputConfig`].

mod formatter;
mod messages;
mod progress;

pub use formatter::Formatter;
pub use messages::{ContentMessage, SessionMessage};
pub use progress::TransferReporter;

/// Output settings from the global flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Print JSON instead of human-readable text
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything except errors
    pub quiet: bool,
}
