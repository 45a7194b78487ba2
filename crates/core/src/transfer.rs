//! Transfer execution
//!
//! An executor takes a session's pending items and reports, through a
//! [`TransferEvents`] stream, what became of each one. It never touches the
//! session record itself. The stream ends with a `done` event once every item
//! has been attempted or the run was cancelled.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::listing::{self, Listed};
use crate::path::{base_name, join_target};
use crate::session::{CommandType, TransferItem};
use crate::stream::{DEFAULT_BUFFER, TaskStream};
use crate::traits::Client;

/// Outcome notification for one item, or the end-of-run marker
#[derive(Debug)]
pub struct TransferEvent {
    pub item: Option<TransferItem>,
    pub error: Option<Error>,
    pub done: bool,
}

impl TransferEvent {
    pub fn completed(item: TransferItem) -> Self {
        Self {
            item: Some(item),
            error: None,
            done: false,
        }
    }

    pub fn failed(item: TransferItem, error: Error) -> Self {
        Self {
            item: Some(item),
            error: Some(error),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            item: None,
            error: None,
            done: true,
        }
    }
}

pub type TransferEvents = TaskStream<TransferEvent>;

/// Runs pending items and reports per-item outcomes
#[cfg_attr(test, mockall::automock)]
pub trait TransferExecutor: Send + Sync {
    /// Start working through `items`; stop early once `cancel` fires
    fn execute(&self, items: Vec<TransferItem>, cancel: CancellationToken) -> TransferEvents;
}

/// One executor per session command type
#[derive(Clone)]
pub struct Executors {
    copy: Arc<dyn TransferExecutor>,
    sync: Arc<dyn TransferExecutor>,
}

impl Executors {
    pub fn new(copy: Arc<dyn TransferExecutor>, sync: Arc<dyn TransferExecutor>) -> Self {
        Self { copy, sync }
    }

    /// The same executor for every command type
    pub fn uniform(executor: Arc<dyn TransferExecutor>) -> Self {
        Self {
            copy: Arc::clone(&executor),
            sync: executor,
        }
    }

    pub fn for_command(&self, command_type: CommandType) -> &dyn TransferExecutor {
        match command_type {
            CommandType::Copy => self.copy.as_ref(),
            CommandType::Sync => self.sync.as_ref(),
        }
    }
}

impl std::fmt::Debug for Executors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executors").finish_non_exhaustive()
    }
}

/// Turns a command-line target into a client for it
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn open(&self, target: &str) -> Result<Box<dyn Client>>;
}

/// Default executor: streams each source object into every target
pub struct ClientTransfer {
    factory: Arc<dyn ClientFactory>,
}

impl ClientTransfer {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self { factory }
    }
}

impl TransferExecutor for ClientTransfer {
    fn execute(&self, items: Vec<TransferItem>, cancel: CancellationToken) -> TransferEvents {
        let factory = Arc::clone(&self.factory);
        TaskStream::spawn(DEFAULT_BUFFER, move |tx| async move {
            for item in items {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!("Transfer cancelled");
                        break;
                    }
                    result = transfer_item(factory.as_ref(), &item) => result,
                };

                let event = match result {
                    Ok(()) => TransferEvent::completed(item),
                    Err(e) => {
                        tracing::warn!(source = %item.source, error = %e, "Transfer failed");
                        TransferEvent::failed(item, e)
                    }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(TransferEvent::done()).await;
        })
    }
}

/// Copy one item's source into each of its targets
///
/// The source is read afresh for every target.
async fn transfer_item(factory: &dyn ClientFactory, item: &TransferItem) -> Result<()> {
    let source = factory.open(&item.source).await?;
    for target in &item.targets {
        let (reader, size) = source
            .get_object(0, 0)
            .await
            .map_err(|e| e.with_target(source.url().to_string()))?;
        let dest = factory.open(target).await?;
        dest.put_object(size, reader)
            .await
            .map_err(|e| e.with_target(dest.url().to_string()))?;
        tracing::debug!(source = %item.source, target = %target, size, "Transferred");
    }
    Ok(())
}

/// Expand command-line sources into transfer items
///
/// `cp` copies files as named and directories (with `recursive`) under their
/// own name, unless the source ends with a separator. `sync` mirrors the
/// contents of a directory source into each target. Entries that cannot be
/// read during enumeration are passed to `skipped`.
pub async fn plan<F>(
    factory: &dyn ClientFactory,
    command_type: CommandType,
    sources: &[String],
    targets: &[String],
    recursive: bool,
    mut skipped: F,
) -> Result<Vec<TransferItem>>
where
    F: FnMut(Error),
{
    let mut items = Vec::new();

    for source in sources {
        let client = factory.open(source).await?;
        let stat = client
            .stat()
            .await
            .map_err(|e| e.with_target(client.url().to_string()))?;

        if !stat.kind.is_dir() {
            let mut resolved = Vec::with_capacity(targets.len());
            for target in targets {
                if sources.len() > 1 || is_directory(factory, target).await {
                    resolved.push(join_target(target, base_name(source)));
                } else {
                    resolved.push(target.clone());
                }
            }
            items.push(TransferItem::new(source.clone(), resolved, stat.size));
            continue;
        }

        let recursive = recursive || command_type == CommandType::Sync;
        if !recursive {
            skipped(Error::InvalidPath(format!(
                "{source} is a directory, use --recursive to copy it"
            )));
            continue;
        }

        let prefix = match command_type {
            CommandType::Copy if !ends_with_separator(source) => base_name(source),
            _ => "",
        };
        let bases: Vec<String> = targets
            .iter()
            .map(|t| {
                if prefix.is_empty() {
                    t.clone()
                } else {
                    join_target(t, prefix)
                }
            })
            .collect();

        listing::list(client.as_ref(), true, |listed| match listed {
            Listed::Entry(content) if !content.kind.is_dir() => {
                items.push(TransferItem::new(
                    join_target(source, &content.name),
                    bases.iter().map(|b| join_target(b, &content.name)).collect(),
                    content.size,
                ));
            }
            Listed::Entry(_) => {}
            Listed::Skipped(err) => skipped(err),
        })
        .await?;
    }

    Ok(items)
}

fn ends_with_separator(target: &str) -> bool {
    target.ends_with('/') || target.ends_with(std::path::MAIN_SEPARATOR)
}

async fn is_directory(factory: &dyn ClientFactory, target: &str) -> bool {
    if ends_with_separator(target) {
        return true;
    }
    match factory.open(target).await {
        Ok(client) => matches!(client.stat().await, Ok(c) if c.kind.is_dir()),
        Err(_) => false,
    }
}
