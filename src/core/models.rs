use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;

/*
 * Defines the data model shared by the erasure backends and the orchestrator:
 * targets, sanitization profiles, fill patterns, discovered nodes, per-target
 * outcomes and the per-run aggregate. These types carry no I/O of their own;
 * the invariants they protect (no partial byte credit, containers outlive
 * their children) are enforced by keeping the accounting fields private.
 */

/*
 * One unit submitted for erasure. A `Folder` target is a path into a
 * hierarchical content provider (a directory tree or a single file); a
 * `Package` target names an application whose private storage is cleared
 * through the privileged command channel. Immutable once enqueued.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Folder(PathBuf),
    Package(String),
}

/*
 * The published sanitization profile chosen once per run. It determines the
 * overwrite pass sequence through `policy::pattern_sequence`.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SanitizationProfile {
    SinglePassDelete,
    ThreePassOverwrite,
    SevenPassOverwrite,
}

impl std::str::FromStr for SanitizationProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "1" => Ok(SanitizationProfile::SinglePassDelete),
            "three" | "3" => Ok(SanitizationProfile::ThreePassOverwrite),
            "seven" | "7" => Ok(SanitizationProfile::SevenPassOverwrite),
            other => Err(format!(
                "Unknown sanitization profile '{other}' (expected single, three or seven)"
            )),
        }
    }
}

/*
 * The fill value used for one overwrite pass. `CryptographicRandom` is
 * re-randomized for every pass it appears in.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPattern {
    AllZero,
    AllOne,
    CryptographicRandom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    Leaf,
}

/*
 * A discovered entry within a folder target. The byte length of a leaf is
 * measured during discovery, before any mutation, and is never recomputed
 * once overwriting starts. Containers always carry length 0.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub path: PathBuf,
    pub name: String,
    pub kind: NodeKind,
    pub length: u64,
}

impl Node {
    pub fn container(path: PathBuf, name: String) -> Self {
        Node {
            path,
            name,
            kind: NodeKind::Container,
            length: 0,
        }
    }

    pub fn leaf(path: PathBuf, name: String, length: u64) -> Self {
        Node {
            path,
            name,
            kind: NodeKind::Leaf,
            length,
        }
    }

}

/*
 * Shared failure taxonomy of both erasure backends. `HandleUnavailable`
 * covers anything that prevents the destructive operation from starting
 * (open failure, unmeasurable package), `WriteFailed` covers an overwrite
 * pass or privileged clear command that did not complete cleanly (including
 * a command timeout), and `DeleteFailed` marks the
 * overwritten-but-not-deleted case, which is a failure, never a partial
 * success.
 */
#[derive(Debug)]
pub enum EraseError {
    HandleUnavailable(String),
    WriteFailed(String),
    DeleteFailed(String),
}

impl std::fmt::Display for EraseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EraseError::HandleUnavailable(detail) => {
                write!(f, "Target unavailable for erasure: {detail}")
            }
            EraseError::WriteFailed(detail) => write!(f, "Overwrite failed: {detail}"),
            EraseError::DeleteFailed(detail) => {
                write!(f, "Final removal failed after overwrite: {detail}")
            }
        }
    }
}

impl std::error::Error for EraseError {}

/*
 * Formats a byte count using binary units, as embedded in the outcome log
 * lines themselves: 4096 becomes "4.00 KB".
 */
pub fn format_byte_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/*
 * The per-target accumulator: one human-readable line per erased or failed
 * item plus the total number of bytes freed. The fields are private so that
 * a failed item can never contribute a partial byte count; the total only
 * grows through `record_erased` and `record_cleared_package`, which append
 * the matching success line in the same call.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WipeOutcome {
    lines: Vec<String>,
    total_bytes_freed: u64,
}

impl WipeOutcome {
    pub fn new() -> Self {
        WipeOutcome::default()
    }

    /* A leaf whose overwrite passes and final delete all succeeded. */
    pub fn record_erased(&mut self, name: &str, bytes: u64) {
        self.lines
            .push(format!("Archivo: {name} ({})", format_byte_size(bytes)));
        self.total_bytes_freed += bytes;
    }

    /* A container removed after its descendants reached a terminal outcome. */
    pub fn record_removed_container(&mut self, name: &str) {
        self.lines.push(format!("Carpeta: {name}"));
    }

    /* A package whose private storage was cleared through the privileged channel. */
    pub fn record_cleared_package(&mut self, identifier: &str, bytes: u64) {
        self.lines.push(format!(
            "Paquete: {identifier} ({})",
            format_byte_size(bytes)
        ));
        self.total_bytes_freed += bytes;
    }

    /* Any item that failed terminally. Contributes one line and zero bytes. */
    pub fn record_failed(&mut self, name: &str) {
        self.lines.push(format!("ERROR: {name}"));
    }

    pub fn merge(&mut self, other: WipeOutcome) {
        self.lines.extend(other.lines);
        self.total_bytes_freed += other.total_bytes_freed;
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn total_bytes_freed(&self) -> u64 {
        self.total_bytes_freed
    }
}

/*
 * The merged result of one completed run: every target's outcome folded into
 * one, bracketed by the run's start and end timestamps. Owned exclusively by
 * the in-flight run while it is being built; immutable and freely shareable
 * once the run reaches `Finished`.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateResult {
    outcome: WipeOutcome,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
}

impl AggregateResult {
    pub fn new(
        outcome: WipeOutcome,
        started_at: OffsetDateTime,
        finished_at: OffsetDateTime,
    ) -> Self {
        AggregateResult {
            outcome,
            started_at,
            finished_at,
        }
    }

    pub fn lines(&self) -> &[String] {
        self.outcome.lines()
    }

    pub fn total_bytes_freed(&self) -> u64 {
        self.outcome.total_bytes_freed()
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn finished_at(&self) -> OffsetDateTime {
        self.finished_at
    }

    pub fn elapsed(&self) -> time::Duration {
        self.finished_at - self.started_at
    }
}

/*
 * The externally observable state of the orchestrator's run state machine.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Finished,
}

/*
 * Cooperative cancellation flag checked by the backends between items, never
 * in the middle of a pass. Cloning shares the same flag.
 */
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
