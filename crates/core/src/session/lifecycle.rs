//! Session lifecycle: start, resume, list and clear
//!
//! The controller is the only writer of a running session's record. It folds
//! executor events into the in-memory record, persists it once at the `done`
//! checkpoint and then applies the cleanup policy. It never exits the
//! process; the terminal [`SessionOutcome`] goes back to the caller.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::id::SessionId;
use super::record::{CommandType, SessionRecord, TransferItem};
use super::store::SessionStorage;
use crate::error::{Error, Result};
use crate::transfer::Executors;

/// What happens to a session record once all of its work is done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Remove completed sessions, except in quiet mode
    #[default]
    UnlessQuiet,
    Always,
    Never,
}

impl CleanupPolicy {
    pub fn removes_completed(self, quiet: bool) -> bool {
        match self {
            CleanupPolicy::UnlessQuiet => !quiet,
            CleanupPolicy::Always => true,
            CleanupPolicy::Never => false,
        }
    }
}

/// Per-invocation knobs, resolved in `main`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSettings {
    pub quiet: bool,
    pub cleanup: CleanupPolicy,
}

/// Receives progress from a running session
pub trait SessionReporter: Send {
    fn begin(&mut self, record: &SessionRecord);

    fn item_done(&mut self, item: &TransferItem);

    /// A per-item failure; the item stays pending
    fn item_failed(&mut self, item: Option<&TransferItem>, error: &Error);

    fn info(&mut self, message: &str);

    /// Tear down any progress display
    fn finish(&mut self);
}

/// How a session run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// No pending work left; `removed` says whether the record was deleted
    Completed { removed: bool },
    /// Stopped with `pending` items left; the record was kept for resume
    Interrupted { pending: usize },
}

/// Argument of `session clear`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearTarget {
    All,
    One(SessionId),
}

impl FromStr for ClearTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim() == "all" {
            Ok(ClearTarget::All)
        } else {
            Ok(ClearTarget::One(s.parse()?))
        }
    }
}

/// The message shown whenever a session record is kept
pub fn resume_hint(id: &SessionId) -> String {
    format!("Session terminated. To resume session type ‘stow session resume {id}’")
}

/// Drives sessions against a [`SessionStorage`]
#[derive(Debug)]
pub struct SessionController<S> {
    store: S,
    settings: SessionSettings,
}

impl<S: SessionStorage> SessionController<S> {
    pub fn new(store: S, settings: SessionSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list(&self) -> Result<Vec<SessionRecord>> {
        self.store.list()
    }

    /// Remove one session or all of them; returns how many were removed
    pub fn clear(&self, target: &ClearTarget) -> Result<usize> {
        match target {
            ClearTarget::All => self.store.remove_all(),
            ClearTarget::One(id) => {
                self.store.remove(id)?;
                Ok(1)
            }
        }
    }

    /// Create a session for `items` and run it
    pub async fn start(
        &self,
        command_type: CommandType,
        urls: Vec<String>,
        items: Vec<TransferItem>,
        executors: &Executors,
        reporter: &mut dyn SessionReporter,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome> {
        let root = std::env::current_dir()?;
        let created = self.store.create(command_type, root)?;

        let mut lock = self.store.lock(&created.id)?;
        let _guard = lock.try_acquire()?;
        // Fails if another process ran and removed the empty record first.
        let mut record = self.store.load(&created.id)?;
        record.urls = urls;
        record.pending = items;
        self.store.save(&record)?;

        self.run(record, executors, reporter, cancel).await
    }

    /// Continue an interrupted session from its working directory
    pub async fn resume(
        &self,
        id: &SessionId,
        executors: &Executors,
        reporter: &mut dyn SessionReporter,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome> {
        // Unknown ids fail here, before a lock file is created.
        self.store.load(id)?;

        let mut lock = self.store.lock(id)?;
        let _guard = lock.try_acquire()?;
        // Re-read under the lock: the previous holder may have checkpointed.
        let record = self.store.load(id)?;
        let _cwd = WorkingDir::enter(&record.root_path)?;

        self.run(record, executors, reporter, cancel).await
    }

    async fn run(
        &self,
        mut record: SessionRecord,
        executors: &Executors,
        reporter: &mut dyn SessionReporter,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome> {
        reporter.begin(&record);

        let mut events = executors
            .for_command(record.command_type)
            .execute(record.pending.clone(), cancel);

        while let Some(event) = events.next().await {
            let done = event.done;
            match (event.item, event.error) {
                (item, Some(error)) => reporter.item_failed(item.as_ref(), &error),
                (Some(item), None) => {
                    if record.complete(&item) {
                        reporter.item_done(&item);
                    } else {
                        tracing::debug!(source = %item.source, "Ignoring event for unknown item");
                    }
                }
                (None, None) => {}
            }
            // The final event may carry the last item's result.
            if done {
                break;
            }
        }
        events.close();

        self.store.save(&record)?;
        reporter.finish();

        if !record.is_complete() {
            reporter.info(&resume_hint(&record.id));
            return Ok(SessionOutcome::Interrupted {
                pending: record.pending.len(),
            });
        }

        if self.settings.cleanup.removes_completed(self.settings.quiet) {
            self.store.remove(&record.id)?;
            return Ok(SessionOutcome::Completed { removed: true });
        }

        reporter.info(&resume_hint(&record.id));
        Ok(SessionOutcome::Completed { removed: false })
    }
}

/// Working directory switch, undone on drop
struct WorkingDir {
    previous: PathBuf,
}

impl WorkingDir {
    fn enter(path: &Path) -> Result<Self> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(path).map_err(|e| Error::from_io(e, path))?;
        Ok(Self { previous })
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            tracing::warn!(path = %self.previous.display(), error = %e, "Failed to restore working directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::lock::SessionLock;
    use crate::session::store::{MockSessionStorage, SessionStore};
    use crate::stream::TaskStream;
    use crate::transfer::{MockTransferExecutor, TransferEvent};
    use std::sync::Arc;
    use tempfile::TempDir;

    // Resuming changes the process working directory.
    static CWD: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl SessionReporter for Recorder {
        fn begin(&mut self, record: &SessionRecord) {
            self.calls.push(format!("begin {}", record.pending.len()));
        }

        fn item_done(&mut self, item: &TransferItem) {
            self.calls.push(format!("done {}", item.source));
        }

        fn item_failed(&mut self, item: Option<&TransferItem>, error: &Error) {
            let source = item.map(|i| i.source.as_str()).unwrap_or("-");
            self.calls.push(format!("failed {source}: {error}"));
        }

        fn info(&mut self, message: &str) {
            self.calls.push(format!("info {message}"));
        }

        fn finish(&mut self) {
            self.calls.push("finish".to_string());
        }
    }

    fn item(name: &str) -> TransferItem {
        TransferItem::new(name, vec![format!("dst/{name}")], 10)
    }

    fn record_with(id: &SessionId, items: Vec<TransferItem>, root: &Path) -> SessionRecord {
        let mut record = SessionRecord::new(id.clone(), CommandType::Copy, root);
        record.pending = items;
        record
    }

    fn replaying(events: Vec<TransferEvent>) -> Executors {
        let mut executor = MockTransferExecutor::new();
        let mut events = Some(events);
        executor
            .expect_execute()
            .times(1)
            .returning(move |_, _| TaskStream::from_items(events.take().unwrap()));
        Executors::uniform(Arc::new(executor))
    }

    fn mock_store(record: &SessionRecord, locks: &Path) -> MockSessionStorage {
        let mut store = MockSessionStorage::new();
        let loaded = record.clone();
        store
            .expect_load()
            .returning(move |_| Ok(loaded.clone()));
        let locks = locks.to_path_buf();
        store
            .expect_lock()
            .returning(move |id| SessionLock::open(id.clone(), locks.join(format!("{id}.lock"))));
        store
    }

    #[tokio::test]
    async fn test_resume_saves_once_after_done_and_removes() {
        let _cwd = CWD.lock().await;
        let dir = TempDir::new().unwrap();
        let id: SessionId = "ResumeMe".parse().unwrap();
        let record = record_with(&id, vec![item("a"), item("b")], dir.path());

        let mut store = mock_store(&record, dir.path());
        store
            .expect_save()
            .times(1)
            .withf(|r| r.pending.is_empty())
            .returning(|_| Ok(()));
        store
            .expect_remove()
            .times(1)
            .withf(|id| id.as_str() == "ResumeMe")
            .returning(|_| Ok(()));

        let executors = replaying(vec![
            TransferEvent::completed(item("a")),
            TransferEvent::completed(item("b")),
            TransferEvent::done(),
        ]);
        let controller = SessionController::new(store, SessionSettings::default());
        let mut reporter = Recorder::default();

        let outcome = controller
            .resume(&id, &executors, &mut reporter, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Completed { removed: true });
        assert_eq!(
            reporter.calls,
            vec!["begin 2", "done a", "done b", "finish"]
        );
    }

    #[tokio::test]
    async fn test_done_event_carries_last_completion() {
        let _cwd = CWD.lock().await;
        let dir = TempDir::new().unwrap();
        let id: SessionId = "LastItem".parse().unwrap();
        let record = record_with(&id, vec![item("a"), item("b")], dir.path());

        let mut store = mock_store(&record, dir.path());
        store
            .expect_save()
            .times(1)
            .withf(|r| r.pending.is_empty())
            .returning(|_| Ok(()));
        store.expect_remove().times(1).returning(|_| Ok(()));

        let executors = replaying(vec![
            TransferEvent::completed(item("a")),
            TransferEvent {
                item: Some(item("b")),
                error: None,
                done: true,
            },
        ]);
        let controller = SessionController::new(store, SessionSettings::default());
        let mut reporter = Recorder::default();

        let outcome = controller
            .resume(&id, &executors, &mut reporter, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Completed { removed: true });
        assert_eq!(
            reporter.calls,
            vec!["begin 2", "done a", "done b", "finish"]
        );
    }

    #[tokio::test]
    async fn test_done_event_carries_last_failure() {
        let _cwd = CWD.lock().await;
        let dir = TempDir::new().unwrap();
        let id: SessionId = "LastFail".parse().unwrap();
        let record = record_with(&id, vec![item("a")], dir.path());

        let mut store = mock_store(&record, dir.path());
        store
            .expect_save()
            .times(1)
            .withf(|r| r.pending == vec![item("a")])
            .returning(|_| Ok(()));
        store.expect_remove().never();

        let executors = replaying(vec![TransferEvent {
            item: Some(item("a")),
            error: Some(Error::NotFound("a".to_string())),
            done: true,
        }]);
        let controller = SessionController::new(store, SessionSettings::default());
        let mut reporter = Recorder::default();

        let outcome = controller
            .resume(&id, &executors, &mut reporter, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Interrupted { pending: 1 });
        assert!(reporter.calls.contains(&"failed a: Not found: a".to_string()));
    }

    #[tokio::test]
    async fn test_resume_quiet_keeps_completed_record() {
        let _cwd = CWD.lock().await;
        let dir = TempDir::new().unwrap();
        let id: SessionId = "QuietRun".parse().unwrap();
        let record = record_with(&id, vec![item("a")], dir.path());

        let mut store = mock_store(&record, dir.path());
        store.expect_save().times(1).returning(|_| Ok(()));
        store.expect_remove().never();

        let executors = replaying(vec![
            TransferEvent::completed(item("a")),
            TransferEvent::done(),
        ]);
        let settings = SessionSettings {
            quiet: true,
            cleanup: CleanupPolicy::UnlessQuiet,
        };
        let controller = SessionController::new(store, settings);
        let mut reporter = Recorder::default();

        let outcome = controller
            .resume(&id, &executors, &mut reporter, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Completed { removed: false });
        assert_eq!(
            reporter.calls.last().unwrap(),
            "info Session terminated. To resume session type ‘stow session resume QuietRun’"
        );
    }

    #[tokio::test]
    async fn test_failed_items_stay_pending() {
        let _cwd = CWD.lock().await;
        let dir = TempDir::new().unwrap();
        let id: SessionId = "PartFail".parse().unwrap();
        let record = record_with(&id, vec![item("a"), item("b")], dir.path());

        let mut store = mock_store(&record, dir.path());
        store
            .expect_save()
            .times(1)
            .withf(|r| r.pending == vec![item("b")])
            .returning(|_| Ok(()));
        store.expect_remove().never();

        let executors = replaying(vec![
            TransferEvent::completed(item("a")),
            TransferEvent::failed(item("b"), Error::PermissionDenied("dst/b".to_string())),
            TransferEvent::done(),
        ]);
        let controller = SessionController::new(store, SessionSettings::default());
        let mut reporter = Recorder::default();

        let outcome = controller
            .resume(&id, &executors, &mut reporter, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Interrupted { pending: 1 });
        assert!(
            reporter
                .calls
                .contains(&"failed b: Permission denied: dst/b".to_string())
        );
    }

    #[tokio::test]
    async fn test_stream_end_without_done_is_a_checkpoint() {
        let _cwd = CWD.lock().await;
        let dir = TempDir::new().unwrap();
        let id: SessionId = "NoDoneEv".parse().unwrap();
        let record = record_with(&id, vec![item("a"), item("b")], dir.path());

        let mut store = mock_store(&record, dir.path());
        store
            .expect_save()
            .times(1)
            .withf(|r| r.pending == vec![item("b")])
            .returning(|_| Ok(()));

        let executors = replaying(vec![TransferEvent::completed(item("a"))]);
        let controller = SessionController::new(store, SessionSettings::default());
        let mut reporter = Recorder::default();

        let outcome = controller
            .resume(&id, &executors, &mut reporter, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Interrupted { pending: 1 });
    }

    #[tokio::test]
    async fn test_resume_missing_session_runs_nothing() {
        let mut store = MockSessionStorage::new();
        store
            .expect_load()
            .returning(|id| Err(Error::InvalidSessionId(id.to_string())));
        store.expect_save().never();
        store.expect_lock().never();

        let mut executor = MockTransferExecutor::new();
        executor.expect_execute().never();
        let executors = Executors::uniform(Arc::new(executor));

        let controller = SessionController::new(store, SessionSettings::default());
        let id: SessionId = "Missingx".parse().unwrap();
        let err = controller
            .resume(&id, &executors, &mut Recorder::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSessionId(_)));
    }

    #[tokio::test]
    async fn test_resume_restores_working_directory() {
        let _cwd = CWD.lock().await;
        let dir = TempDir::new().unwrap();
        let before = std::env::current_dir().unwrap();
        let id: SessionId = "ChangeWd".parse().unwrap();
        let record = record_with(&id, vec![item("a")], dir.path());

        let mut store = mock_store(&record, dir.path());
        store.expect_save().returning(|_| Ok(()));
        store.expect_remove().returning(|_| Ok(()));

        let root = dir.path().canonicalize().unwrap();
        let mut executor = MockTransferExecutor::new();
        executor.expect_execute().times(1).returning(move |items, _| {
            assert_eq!(std::env::current_dir().unwrap().canonicalize().unwrap(), root);
            TaskStream::from_items(
                items
                    .into_iter()
                    .map(TransferEvent::completed)
                    .chain(std::iter::once(TransferEvent::done()))
                    .collect(),
            )
        });
        let executors = Executors::uniform(Arc::new(executor));

        let controller = SessionController::new(store, SessionSettings::default());
        controller
            .resume(&id, &executors, &mut Recorder::default(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[tokio::test]
    async fn test_start_and_resume_with_real_store() {
        let _cwd = CWD.lock().await;
        let dir = TempDir::new().unwrap();
        let controller = SessionController::new(
            SessionStore::new(dir.path().join("session")),
            SessionSettings::default(),
        );

        // First run stops after one item.
        let first = replaying(vec![TransferEvent::completed(item("a"))]);
        let outcome = controller
            .start(
                CommandType::Copy,
                vec!["src".to_string(), "dst".to_string()],
                vec![item("a"), item("b")],
                &first,
                &mut Recorder::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Interrupted { pending: 1 });

        let sessions = controller.list().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].pending, vec![item("b")]);
        assert_eq!(sessions[0].urls, vec!["src", "dst"]);

        let second = replaying(vec![
            TransferEvent::completed(item("b")),
            TransferEvent::done(),
        ]);
        let outcome = controller
            .resume(
                &sessions[0].id,
                &second,
                &mut Recorder::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Completed { removed: true });
        assert!(controller.list().unwrap().is_empty());
    }

    /// Store whose first `load` returns a stale record while another holder
    /// checkpoints the first pending item to disk.
    struct CheckpointedMeanwhile {
        inner: SessionStore,
        stale: std::sync::Mutex<Option<SessionRecord>>,
    }

    impl SessionStorage for CheckpointedMeanwhile {
        fn create(&self, command_type: CommandType, root_path: PathBuf) -> Result<SessionRecord> {
            self.inner.create(command_type, root_path)
        }

        fn save(&self, record: &SessionRecord) -> Result<()> {
            self.inner.save(record)
        }

        fn load(&self, id: &SessionId) -> Result<SessionRecord> {
            let stale = self.stale.lock().unwrap().take();
            match stale {
                Some(stale) => {
                    let mut newer = stale.clone();
                    newer.pending.remove(0);
                    self.inner.save(&newer)?;
                    Ok(stale)
                }
                None => self.inner.load(id),
            }
        }

        fn list(&self) -> Result<Vec<SessionRecord>> {
            self.inner.list()
        }

        fn remove(&self, id: &SessionId) -> Result<()> {
            self.inner.remove(id)
        }

        fn remove_all(&self) -> Result<usize> {
            self.inner.remove_all()
        }

        fn lock(&self, id: &SessionId) -> Result<SessionLock> {
            self.inner.lock(id)
        }
    }

    #[tokio::test]
    async fn test_resume_runs_the_record_read_under_the_lock() {
        let _cwd = CWD.lock().await;
        let dir = TempDir::new().unwrap();
        let inner = SessionStore::new(dir.path().join("session"));
        let mut record = inner
            .create(CommandType::Copy, dir.path().to_path_buf())
            .unwrap();
        record.pending = vec![item("a"), item("b")];
        inner.save(&record).unwrap();
        let id = record.id.clone();

        let store = CheckpointedMeanwhile {
            inner,
            stale: std::sync::Mutex::new(Some(record)),
        };

        let mut executor = MockTransferExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .withf(|items, _| items == &vec![item("b")])
            .returning(|items, _| {
                TaskStream::from_items(
                    items
                        .into_iter()
                        .map(TransferEvent::completed)
                        .chain(std::iter::once(TransferEvent::done()))
                        .collect(),
                )
            });
        let executors = Executors::uniform(Arc::new(executor));

        let controller = SessionController::new(store, SessionSettings::default());
        let outcome = controller
            .resume(&id, &executors, &mut Recorder::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Completed { removed: true });
    }

    #[tokio::test]
    async fn test_start_locks_before_saving_pending_work() {
        let dir = TempDir::new().unwrap();
        let id: SessionId = "Contends".parse().unwrap();
        let lock_path = dir.path().join("Contends.lock");

        let mut held = SessionLock::open(id.clone(), &lock_path).unwrap();
        let _guard = held.try_acquire().unwrap();

        let mut store = MockSessionStorage::new();
        let created = SessionRecord::new(id.clone(), CommandType::Copy, dir.path());
        store
            .expect_create()
            .times(1)
            .returning(move |_, _| Ok(created.clone()));
        store
            .expect_lock()
            .times(1)
            .returning(move |id| SessionLock::open(id.clone(), &lock_path));
        store.expect_save().never();

        let mut executor = MockTransferExecutor::new();
        executor.expect_execute().never();
        let executors = Executors::uniform(Arc::new(executor));

        let controller = SessionController::new(store, SessionSettings::default());
        let err = controller
            .start(
                CommandType::Copy,
                vec![],
                vec![item("a")],
                &executors,
                &mut Recorder::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionLocked(_)));
    }

    #[tokio::test]
    async fn test_resume_locked_session_fails() {
        let _cwd = CWD.lock().await;
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("session"));
        let record = store.create(CommandType::Sync, dir.path().to_path_buf()).unwrap();

        let mut held = store.lock(&record.id).unwrap();
        let _guard = held.try_acquire().unwrap();

        let mut executor = MockTransferExecutor::new();
        executor.expect_execute().never();
        let executors = Executors::uniform(Arc::new(executor));

        let controller = SessionController::new(store, SessionSettings::default());
        let err = controller
            .resume(&record.id, &executors, &mut Recorder::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionLocked(_)));
    }

    #[test]
    fn test_clear_targets() {
        let mut store = MockSessionStorage::new();
        store.expect_remove_all().times(1).returning(|| Ok(4));
        store
            .expect_remove()
            .times(1)
            .returning(|id| Err(Error::InvalidSessionId(id.to_string())));
        let controller = SessionController::new(store, SessionSettings::default());

        assert_eq!(controller.clear(&"all".parse().unwrap()).unwrap(), 4);
        assert!(matches!(
            controller.clear(&"AbsentId".parse().unwrap()),
            Err(Error::InvalidSessionId(_))
        ));
        assert!("../etc".parse::<ClearTarget>().is_err());
    }

    #[test]
    fn test_cleanup_policy() {
        assert!(CleanupPolicy::UnlessQuiet.removes_completed(false));
        assert!(!CleanupPolicy::UnlessQuiet.removes_completed(true));
        assert!(CleanupPolicy::Always.removes_completed(true));
        assert!(!CleanupPolicy::Never.removes_completed(false));
        assert_eq!(
            serde_json::to_string(&CleanupPolicy::UnlessQuiet).unwrap(),
            "\"unless-quiet\""
        );
    }
}
