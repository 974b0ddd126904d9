/*
 * This module consolidates the platform-agnostic erasure engine. It
 * re-exports the data model and the key abstractions
 * (`ContentProviderOperations`, `CommandExecutorOperations`,
 * `RunLogSinkOperations`, `WipeBackend`) together with the concrete
 * backends (`TreeEraser`, `PrivilegedDataEraser`) and the orchestrator
 * that drives them.
 */
pub mod discoverer;
pub mod leaf_eraser;
pub mod models;
pub mod orchestrator;
pub mod path_utils;
pub mod policy;
pub mod privileged;
pub mod provider;
pub mod run_log;
pub mod tree_eraser;

// Re-export key structures and enums
pub use models::{
    AggregateResult, CancelToken, EraseError, FillPattern, Node, NodeKind, RunState,
    SanitizationProfile, Target, WipeOutcome, format_byte_size,
};

// Re-export provider boundary items
pub use provider::{
    ChildEntry, ContentProviderOperations, FsContentProvider, ProviderError, WritableByteTarget,
};

// Re-export backend items
pub use discoverer::{Discovery, discover};
pub use leaf_eraser::{OVERWRITE_BUFFER_LEN, erase_leaf};
pub use policy::pattern_sequence;
pub use privileged::{
    CommandExecutorOperations, CommandOutput, ExecutorError, PrivilegedDataEraser,
    SystemCommandExecutor,
};
pub use tree_eraser::TreeEraser;

// Re-export orchestration items
pub use orchestrator::{OrchestratorError, RunHandle, WipeBackend, WipeOrchestrator};

// Re-export run-log items
pub use run_log::{
    JsonlRunLogSink, NullRunLogSink, RunLogError, RunLogSinkOperations, RunRecord,
};
