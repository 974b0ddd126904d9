use super::models::{
    AggregateResult, CancelToken, RunState, SanitizationProfile, Target, WipeOutcome,
};
use super::privileged::PrivilegedDataEraser;
use super::run_log::{RunLogSinkOperations, RunRecord};
use super::tree_eraser::TreeEraser;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use time::OffsetDateTime;

/*
 * Top-level entry point. Accepts a batch of heterogeneous targets and one
 * sanitization profile, routes every target to the matching backend on a
 * dedicated worker thread, and merges the outcomes into one aggregate
 * result bracketed by start and end timestamps.
 *
 * The state machine over one run is `Idle -> Running -> Finished -> Idle`.
 * At most one run is active at a time; `start_run` while `Running` is a
 * caller error and is rejected synchronously. Item failures never abort a
 * run: the run reaches `Finished` once every target is exhausted.
 */

#[derive(Debug)]
pub enum OrchestratorError {
    AlreadyRunning,
    ResultNotCollected,
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorError::AlreadyRunning => {
                write!(f, "A wipe run is already in progress")
            }
            OrchestratorError::ResultNotCollected => {
                write!(f, "The previous run's result has not been collected; reset first")
            }
        }
    }
}

impl std::error::Error for OrchestratorError {}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/*
 * The capability interface both erasure backends implement. The
 * orchestrator picks a backend once per target based on the target variant
 * and never branches on concrete types beyond that dispatch.
 */
pub trait WipeBackend: Send + Sync {
    fn wipe(&self, target: &Target, profile: SanitizationProfile, cancel: &CancelToken)
    -> WipeOutcome;
}

impl WipeBackend for TreeEraser {
    fn wipe(
        &self,
        target: &Target,
        profile: SanitizationProfile,
        cancel: &CancelToken,
    ) -> WipeOutcome {
        match target {
            Target::Folder(root) => self.erase_target(root, profile, cancel),
            Target::Package(identifier) => {
                log::error!("TreeEraser: Package target {identifier} routed to folder backend.");
                let mut outcome = WipeOutcome::new();
                outcome.record_failed(identifier);
                outcome
            }
        }
    }
}

impl WipeBackend for PrivilegedDataEraser {
    fn wipe(
        &self,
        target: &Target,
        profile: SanitizationProfile,
        cancel: &CancelToken,
    ) -> WipeOutcome {
        // The privileged clear is a single destructive command; the profile
        // selects no pass sequence here.
        let _ = profile;
        match target {
            Target::Package(identifier) => {
                self.erase_packages(std::slice::from_ref(identifier), cancel)
            }
            Target::Folder(root) => {
                log::error!(
                    "PrivilegedDataEraser: Folder target {root:?} routed to package backend."
                );
                let mut outcome = WipeOutcome::new();
                outcome.record_failed(&folder_display_name(root));
                outcome
            }
        }
    }
}

fn folder_display_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.to_string_lossy().into_owned())
}

enum RunStatus {
    Idle,
    Running,
    Finished(AggregateResult),
}

struct RunShared {
    status: Mutex<RunStatus>,
    condvar: Condvar,
}

/*
 * Handle to one run. Cloning shares the underlying run state; the handle
 * observes the run but never mutates its outcomes. The result must be read
 * (`await_result`) before the orchestrator is reset, because reset discards
 * it.
 */
#[derive(Clone)]
pub struct RunHandle {
    shared: Arc<RunShared>,
    cancel: CancelToken,
}

impl RunHandle {
    pub fn poll(&self) -> RunState {
        match *self.shared.status.lock().expect("run state lock poisoned") {
            RunStatus::Idle => RunState::Idle,
            RunStatus::Running => RunState::Running,
            RunStatus::Finished(_) => RunState::Finished,
        }
    }

    /*
     * Blocks the calling thread (never the engine) until the run reaches
     * `Finished`, then returns a copy of the aggregate result.
     */
    pub fn await_result(&self) -> AggregateResult {
        let mut status = self.shared.status.lock().expect("run state lock poisoned");
        loop {
            if let RunStatus::Finished(result) = &*status {
                return result.clone();
            }
            status = self
                .shared
                .condvar
                .wait(status)
                .expect("run state lock poisoned");
        }
    }

    /*
     * Requests cooperative cancellation. The backends check the flag
     * between items; the item in progress still reaches a terminal state,
     * and the run ends in `Finished` with whatever outcomes were
     * accumulated.
     */
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

pub struct WipeOrchestrator {
    folder_backend: Arc<dyn WipeBackend>,
    package_backend: Arc<dyn WipeBackend>,
    run_log: Arc<dyn RunLogSinkOperations>,
    shared: Arc<RunShared>,
}

impl WipeOrchestrator {
    pub fn new(
        folder_backend: Arc<dyn WipeBackend>,
        package_backend: Arc<dyn WipeBackend>,
        run_log: Arc<dyn RunLogSinkOperations>,
    ) -> Self {
        WipeOrchestrator {
            folder_backend,
            package_backend,
            run_log,
            shared: Arc::new(RunShared {
                status: Mutex::new(RunStatus::Idle),
                condvar: Condvar::new(),
            }),
        }
    }

    /*
     * Starts a run over the given targets. Returns immediately with a
     * handle; the targets are processed sequentially on a worker thread.
     * Rejected while a run is in progress, and while a finished result is
     * still waiting to be collected.
     */
    pub fn start_run(
        &self,
        targets: Vec<Target>,
        profile: SanitizationProfile,
    ) -> Result<RunHandle> {
        {
            let mut status = self.shared.status.lock().expect("run state lock poisoned");
            match *status {
                RunStatus::Running => return Err(OrchestratorError::AlreadyRunning),
                RunStatus::Finished(_) => return Err(OrchestratorError::ResultNotCollected),
                RunStatus::Idle => *status = RunStatus::Running,
            }
        }

        let started_at = OffsetDateTime::now_utc();
        let cancel = CancelToken::new();
        let handle = RunHandle {
            shared: Arc::clone(&self.shared),
            cancel: cancel.clone(),
        };

        log::info!(
            "WipeOrchestrator: Starting run of {} target(s) with profile {profile:?}.",
            targets.len()
        );

        let shared = Arc::clone(&self.shared);
        let folder_backend = Arc::clone(&self.folder_backend);
        let package_backend = Arc::clone(&self.package_backend);
        let run_log = Arc::clone(&self.run_log);
        thread::spawn(move || {
            let mut merged = WipeOutcome::new();
            for target in &targets {
                if cancel.is_cancelled() {
                    log::info!("WipeOrchestrator: Run cancelled; remaining targets skipped.");
                    break;
                }
                let backend = match target {
                    Target::Folder(_) => &folder_backend,
                    Target::Package(_) => &package_backend,
                };
                merged.merge(backend.wipe(target, profile, &cancel));
            }
            let finished_at = OffsetDateTime::now_utc();
            let result = AggregateResult::new(merged, started_at, finished_at);

            // The audit record must never fail the run itself.
            let record = RunRecord::from_result(profile, &result);
            if let Err(e) = run_log.record_run(&record) {
                log::warn!("WipeOrchestrator: Could not persist run record: {e}");
            }

            log::info!(
                "WipeOrchestrator: Run finished, {} bytes freed across {} lines.",
                result.total_bytes_freed(),
                result.lines().len()
            );
            let mut status = shared.status.lock().expect("run state lock poisoned");
            *status = RunStatus::Finished(result);
            shared.condvar.notify_all();
        });

        Ok(handle)
    }

    /*
     * Discards the previous run's result and returns to `Idle`. The caller
     * must read the result before resetting. Resetting while `Running` is
     * rejected; resetting an already idle orchestrator is a no-op.
     */
    pub fn reset(&self) -> Result<()> {
        let mut status = self.shared.status.lock().expect("run state lock poisoned");
        match *status {
            RunStatus::Running => Err(OrchestratorError::AlreadyRunning),
            RunStatus::Idle | RunStatus::Finished(_) => {
                *status = RunStatus::Idle;
                Ok(())
            }
        }
    }

    pub fn state(&self) -> RunState {
        match *self.shared.status.lock().expect("run state lock poisoned") {
            RunStatus::Idle => RunState::Idle,
            RunStatus::Running => RunState::Running,
            RunStatus::Finished(_) => RunState::Finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::run_log::{Result as RunLogResult, RunRecord};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

    /*
     * Scripted backend: returns a fixed outcome per call and journals every
     * target it was handed, so tests can assert the routing.
     */
    struct ScriptedBackend {
        label: &'static str,
        bytes_per_target: u64,
        calls: Mutex<Vec<Target>>,
    }

    impl ScriptedBackend {
        fn new(label: &'static str, bytes_per_target: u64) -> Self {
            ScriptedBackend {
                label,
                bytes_per_target,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Target> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl WipeBackend for ScriptedBackend {
        fn wipe(
            &self,
            target: &Target,
            _profile: SanitizationProfile,
            _cancel: &CancelToken,
        ) -> WipeOutcome {
            self.calls.lock().unwrap().push(target.clone());
            let mut outcome = WipeOutcome::new();
            outcome.record_erased(self.label, self.bytes_per_target);
            outcome
        }
    }

    /*
     * Backend that parks on a rendezvous channel until the test releases
     * it, to hold the orchestrator in `Running` deterministically.
     */
    struct BlockingBackend {
        entered: SyncSender<()>,
        release: Mutex<Receiver<()>>,
    }

    impl WipeBackend for BlockingBackend {
        fn wipe(
            &self,
            _target: &Target,
            _profile: SanitizationProfile,
            _cancel: &CancelToken,
        ) -> WipeOutcome {
            self.entered.send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            WipeOutcome::new()
        }
    }

    struct CollectingSink {
        records: Mutex<Vec<RunRecord>>,
    }

    impl CollectingSink {
        fn new() -> Self {
            CollectingSink {
                records: Mutex::new(Vec::new()),
            }
        }
    }

    impl RunLogSinkOperations for CollectingSink {
        fn record_run(&self, record: &RunRecord) -> RunLogResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn profile() -> SanitizationProfile {
        SanitizationProfile::ThreePassOverwrite
    }

    #[test]
    fn test_targets_are_routed_by_variant_and_merged_in_order() {
        // Arrange
        let folder = Arc::new(ScriptedBackend::new("folder-item", 100));
        let package = Arc::new(ScriptedBackend::new("package-item", 200));
        let sink = Arc::new(CollectingSink::new());
        let orchestrator =
            WipeOrchestrator::new(folder.clone(), package.clone(), sink.clone());

        let targets = vec![
            Target::Folder(PathBuf::from("/a")),
            Target::Package("com.one".to_string()),
            Target::Folder(PathBuf::from("/b")),
        ];

        // Act
        let handle = orchestrator.start_run(targets, profile()).unwrap();
        let result = handle.await_result();

        // Assert
        assert_eq!(result.total_bytes_freed(), 400);
        assert_eq!(
            result.lines(),
            &[
                "Archivo: folder-item (100 B)".to_string(),
                "Archivo: package-item (200 B)".to_string(),
                "Archivo: folder-item (100 B)".to_string(),
            ]
        );
        assert_eq!(folder.calls().len(), 2);
        assert_eq!(package.calls().len(), 1);
        assert!(result.finished_at() >= result.started_at());
        assert_eq!(orchestrator.state(), RunState::Finished);
    }

    #[test]
    fn test_second_start_is_rejected_while_running() {
        let (entered_tx, entered_rx) = sync_channel(0);
        let (release_tx, release_rx) = sync_channel::<()>(1);
        let blocking = Arc::new(BlockingBackend {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        });
        let package = Arc::new(ScriptedBackend::new("pkg", 1));
        let orchestrator = WipeOrchestrator::new(
            blocking,
            package,
            Arc::new(CollectingSink::new()),
        );

        let handle = orchestrator
            .start_run(vec![Target::Folder(PathBuf::from("/x"))], profile())
            .unwrap();
        entered_rx.recv().unwrap();
        assert_eq!(handle.poll(), RunState::Running);

        // A second start while the worker is inside the backend must fail.
        let second = orchestrator.start_run(vec![], profile());
        assert!(matches!(second, Err(OrchestratorError::AlreadyRunning)));

        release_tx.send(()).unwrap();
        handle.await_result();
        assert_eq!(handle.poll(), RunState::Finished);
    }

    #[test]
    fn test_start_after_finish_requires_reset() {
        let folder = Arc::new(ScriptedBackend::new("f", 1));
        let package = Arc::new(ScriptedBackend::new("p", 1));
        let orchestrator =
            WipeOrchestrator::new(folder, package, Arc::new(CollectingSink::new()));

        let handle = orchestrator
            .start_run(vec![Target::Folder(PathBuf::from("/x"))], profile())
            .unwrap();
        handle.await_result();

        let rejected = orchestrator.start_run(vec![], profile());
        assert!(matches!(rejected, Err(OrchestratorError::ResultNotCollected)));

        orchestrator.reset().unwrap();
        assert_eq!(orchestrator.state(), RunState::Idle);

        let handle = orchestrator.start_run(vec![], profile()).unwrap();
        let result = handle.await_result();
        assert_eq!(result.total_bytes_freed(), 0);
    }

    #[test]
    fn test_run_record_is_persisted_once_per_run() {
        let folder = Arc::new(ScriptedBackend::new("f", 5));
        let package = Arc::new(ScriptedBackend::new("p", 7));
        let sink = Arc::new(CollectingSink::new());
        let orchestrator = WipeOrchestrator::new(folder, package, sink.clone());

        let handle = orchestrator
            .start_run(
                vec![
                    Target::Folder(PathBuf::from("/x")),
                    Target::Package("com.app".to_string()),
                ],
                profile(),
            )
            .unwrap();
        handle.await_result();

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_bytes_freed, 12);
        assert_eq!(records[0].profile, profile());
        assert_eq!(records[0].lines.len(), 2);
    }

    #[test]
    fn test_cancel_skips_remaining_targets_but_still_finishes() {
        let (entered_tx, entered_rx) = sync_channel(0);
        let (release_tx, release_rx) = sync_channel::<()>(1);
        let blocking = Arc::new(BlockingBackend {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        });
        let package = Arc::new(ScriptedBackend::new("pkg", 1));
        let orchestrator = WipeOrchestrator::new(
            blocking,
            package.clone(),
            Arc::new(CollectingSink::new()),
        );

        let handle = orchestrator
            .start_run(
                vec![
                    Target::Folder(PathBuf::from("/first")),
                    Target::Package("com.never".to_string()),
                ],
                profile(),
            )
            .unwrap();

        // Cancel while the worker is inside the first target.
        entered_rx.recv().unwrap();
        handle.cancel();
        release_tx.send(()).unwrap();

        let result = handle.await_result();
        assert!(package.calls().is_empty(), "second target must be skipped");
        assert_eq!(result.total_bytes_freed(), 0);
        assert_eq!(handle.poll(), RunState::Finished);
    }

    #[test]
    fn test_misrouted_target_becomes_error_line() {
        // Direct backend call; the orchestrator itself never routes this way.
        let eraser = TreeEraser::new(Arc::new(
            crate::core::provider::FsContentProvider::new(),
        ));
        let outcome = eraser.wipe(
            &Target::Package("com.lost".to_string()),
            profile(),
            &CancelToken::new(),
        );
        assert_eq!(outcome.lines(), &["ERROR: com.lost".to_string()]);
        assert_eq!(outcome.total_bytes_freed(), 0);
    }
}
