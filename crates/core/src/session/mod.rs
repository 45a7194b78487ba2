//! Resumable transfer sessions
//!
//! A session records the work of a `cp` or `sync` run so that an interrupted
//! run can be continued later with `stow session resume ID`.

mod id;
mod lifecycle;
mod lock;
mod record;
mod store;

pub use id::{SESSION_ID_LEN, SessionId};
pub use lifecycle::{
    CleanupPolicy, ClearTarget, SessionController, SessionOutcome, SessionReporter,
    SessionSettings, resume_hint,
};
pub use lock::{SessionLock, SessionLockGuard};
pub use record::{CommandType, SESSION_VERSION, SessionRecord, TransferItem};
pub use store::{SessionStorage, SessionStore};

#[cfg(test)]
pub use store::MockSessionStorage;
