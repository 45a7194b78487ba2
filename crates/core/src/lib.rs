//! stow-core: Core library for the stow storage client
//!
//! This crate provides the backend-independent parts of stow:
//! - Configuration and alias management
//! - Path parsing and resolution
//! - The `Client` contract every storage backend implements
//! - Listing and single-object retrieval on top of that contract
//! - Resumable transfer sessions
//!
//! Backends live in their own crates (`stow-fs`, `stow-s3`), so everything
//! here can be tested against mocks.

pub mod alias;
pub mod cat;
pub mod config;
pub mod error;
pub mod listing;
pub mod path;
pub mod retry;
pub mod session;
pub mod stream;
pub mod traits;
pub mod transfer;

pub use alias::{Alias, AliasManager, RetryConfig};
pub use config::{Config, ConfigManager};
pub use error::{Error, Result};
pub use listing::Listed;
pub use path::{ParsedPath, RemotePath, parse_path};
pub use retry::{RetryBuilder, is_retryable_error, retry_with_backoff};
pub use session::{
    CleanupPolicy, ClearTarget, CommandType, SessionController, SessionId, SessionOutcome,
    SessionRecord, SessionReporter, SessionSettings, SessionStore, TransferItem,
};
pub use stream::TaskStream;
pub use traits::{BucketAcl, Client, Content, ContentKind, ContentStream, ObjectReader};
pub use transfer::{ClientFactory, ClientTransfer, Executors, TransferEvent, TransferExecutor};
