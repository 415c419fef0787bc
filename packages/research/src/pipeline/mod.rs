//! Research pipeline: task state machine, progress events and the
//! orchestrator driving search, fetch, extraction and summarization.

pub mod orchestrator;
pub mod progress;
pub mod task;

pub use orchestrator::{OrchestratorBuilder, ResearchOrchestrator, ResearchOutput, RunOutcome};
pub use progress::{ProgressEvent, Termination};
pub use task::{Exclusion, FailureReason, PageTask, Stage, TaskState, TaskTable};
