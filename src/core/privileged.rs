use super::models::{CancelToken, EraseError, WipeOutcome};
use std::io;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/*
 * The second erasure backend: clears an application's private storage
 * through a privileged command channel. The channel itself is an opaque
 * capability (`CommandExecutorOperations`); this module only decides which
 * commands to issue, in which order, and how strictly to interpret their
 * output. The one hard ordering rule: the storage footprint is measured
 * before the clear command runs, because the size becomes unrecoverable
 * afterwards.
 */

pub const PACKAGE_DATA_ROOT: &str = "/data/data";
pub const PACKAGE_CODE_ROOT: &str = "/data/app";
const CLEAR_SUCCESS_TOKEN: &str = "Success";

#[derive(Debug)]
pub enum ExecutorError {
    EmptyCommand,
    Spawn(io::Error),
    Timeout,
}

impl From<io::Error> for ExecutorError {
    fn from(err: io::Error) -> Self {
        ExecutorError::Spawn(err)
    }
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorError::EmptyCommand => write!(f, "Empty command line"),
            ExecutorError::Spawn(e) => write!(f, "Command could not be executed: {e}"),
            ExecutorError::Timeout => write!(f, "Command did not terminate within the bounded wait"),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/*
 * The privileged command channel, supplied externally. Synchronous by
 * contract; implementations must bound the wait on process completion so a
 * command that never terminates surfaces as `ExecutorError::Timeout`
 * instead of hanging the run.
 */
pub trait CommandExecutorOperations: Send + Sync {
    fn run(&self, argv: &[&str]) -> ExecutorResult<CommandOutput>;
}

/*
 * Concrete executor over `std::process::Command`. The child's output is
 * collected on a helper thread and awaited with a timeout; on timeout the
 * helper thread (and the child process) are left to the OS while the run
 * moves on, which is the lesser evil compared to blocking the whole batch.
 */
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        SystemCommandExecutor { timeout }
    }
}

impl CommandExecutorOperations for SystemCommandExecutor {
    fn run(&self, argv: &[&str]) -> ExecutorResult<CommandOutput> {
        let (program, args) = argv.split_first().ok_or(ExecutorError::EmptyCommand)?;
        log::debug!("SystemCommandExecutor: Running {argv:?}");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(child.wait_with_output());
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(output)) => Ok(CommandOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(e)) => Err(ExecutorError::Spawn(e)),
            Err(_) => {
                log::warn!("SystemCommandExecutor: {argv:?} timed out after {:?}.", self.timeout);
                Err(ExecutorError::Timeout)
            }
        }
    }
}

/*
 * Clears application-private storage package by package. All commands flow
 * through the injected executor; the eraser itself never builds
 * shell-interpreted strings beyond the already-validated package identifier.
 */
pub struct PrivilegedDataEraser {
    executor: std::sync::Arc<dyn CommandExecutorOperations>,
}

impl PrivilegedDataEraser {
    pub fn new(executor: std::sync::Arc<dyn CommandExecutorOperations>) -> Self {
        PrivilegedDataEraser { executor }
    }

    /*
     * Checks whether a package is installed, via the package manager's list
     * command. Exposed so the front end can validate identifiers before
     * enqueueing them; the erase path assumes this was already done.
     */
    pub fn package_exists(&self, identifier: &str) -> Result<bool, EraseError> {
        let output = self
            .executor
            .run(&["pm", "list", "packages", identifier])
            .map_err(|e| EraseError::HandleUnavailable(format!("existence check failed: {e}")))?;
        if output.exit_code != 0 {
            return Ok(false);
        }
        let needle = format!("package:{identifier}");
        Ok(output.stdout.lines().any(|line| line.trim() == needle))
    }

    /*
     * Measures the package's storage footprint by summing the disk usage of
     * its private data root (which includes the cache directory) and its
     * code root. The data root must be measurable; a missing code root
     * contributes zero, since code paths are versioned on some platforms.
     */
    pub fn measure_package(&self, identifier: &str) -> Result<u64, EraseError> {
        let data_dir = format!("{PACKAGE_DATA_ROOT}/{identifier}");
        let code_dir = format!("{PACKAGE_CODE_ROOT}/{identifier}");

        let mut total = self.du_bytes(&data_dir).ok_or_else(|| {
            EraseError::HandleUnavailable(format!("cannot measure data of {identifier}"))
        })?;
        if let Some(code_bytes) = self.du_bytes(&code_dir) {
            total += code_bytes;
        }
        Ok(total)
    }

    fn du_bytes(&self, dir: &str) -> Option<u64> {
        let output = match self.executor.run(&["du", "-s", "-k", dir]) {
            Ok(output) if output.exit_code == 0 => output,
            Ok(output) => {
                log::debug!("PrivilegedDataEraser: du on {dir} exited {}.", output.exit_code);
                return None;
            }
            Err(e) => {
                log::debug!("PrivilegedDataEraser: du on {dir} failed: {e}");
                return None;
            }
        };
        let kilobytes: u64 = output.stdout.split_whitespace().next()?.parse().ok()?;
        Some(kilobytes * 1024)
    }

    /*
     * Erases one package: measure first, then invoke the privileged clear
     * command. Success is strictly exit status zero plus the exact expected
     * token on standard output; any other combination, including a command
     * timeout, is a failure. Returns the bytes measured before the clear.
     */
    pub fn erase_package(&self, identifier: &str) -> Result<u64, EraseError> {
        let bytes = self.measure_package(identifier)?;

        let output = self
            .executor
            .run(&["pm", "clear", identifier])
            .map_err(|e| EraseError::WriteFailed(format!("clear command failed: {e}")))?;

        if output.exit_code == 0 && output.stdout.trim() == CLEAR_SUCCESS_TOKEN {
            log::debug!("PrivilegedDataEraser: Cleared {identifier}, {bytes} bytes freed.");
            Ok(bytes)
        } else {
            Err(EraseError::WriteFailed(format!(
                "clear of {identifier} returned exit {} with output {:?}",
                output.exit_code,
                output.stdout.trim()
            )))
        }
    }

    /*
     * Batch variant: processes identifiers sequentially, one outcome line
     * per package, continuing past individual failures exactly as the
     * folder backend does. Cancellation is honored between packages.
     */
    pub fn erase_packages(&self, identifiers: &[String], cancel: &CancelToken) -> WipeOutcome {
        let mut outcome = WipeOutcome::new();
        for identifier in identifiers {
            if cancel.is_cancelled() {
                log::info!("PrivilegedDataEraser: Cancelled before package {identifier}.");
                return outcome;
            }
            match self.erase_package(identifier) {
                Ok(bytes) => outcome.record_cleared_package(identifier, bytes),
                Err(e) => {
                    log::warn!("PrivilegedDataEraser: Failed to clear {identifier}: {e}");
                    outcome.record_failed(identifier);
                }
            }
        }
        outcome
    }
}
