//! Listing service
//!
//! Drains a client's enumeration stream, handing every entry to the caller as
//! soon as it arrives. Entry-level failures (broken symlinks, vanished or
//! unreadable entries) are reported and skipped; anything else stops the
//! enumeration and is returned annotated with the target URL.

use futures::StreamExt;

use crate::error::{Error, Result};
use crate::traits::{Client, Content};

/// One item handed to the listing callback
#[derive(Debug)]
pub enum Listed {
    Entry(Content),
    /// A non-fatal per-entry error; enumeration continues
    Skipped(Error),
}

/// Enumerate `client`, forwarding each entry to `emit` without buffering
pub async fn list<F>(client: &dyn Client, recursive: bool, mut emit: F) -> Result<()>
where
    F: FnMut(Listed),
{
    let mut stream = client.list(recursive);

    while let Some(item) = stream.next().await {
        match item {
            Ok(content) => emit(Listed::Entry(content)),
            Err(err) if err.is_skippable_entry() => {
                tracing::warn!(error = %err, "Skipping entry");
                emit(Listed::Skipped(err));
            }
            Err(err) => {
                stream.close();
                let url = client.url();
                tracing::debug!(target_url = %url, error = %err, "Listing aborted");
                return Err(err.with_target(url.to_string()));
            }
        }
    }

    Ok(())
}
