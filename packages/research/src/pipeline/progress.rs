//! Progress notifications emitted by the orchestrator.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;
use uuid::Uuid;

use super::task::TaskState;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Every task reached `Done` or `Failed`.
    Completed,
    /// The wall-clock deadline elapsed first.
    TimedOut,
    /// The cancellation token fired.
    Cancelled,
}

/// One observable step of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    RunStarted {
        run_id: Uuid,
        query: String,
    },
    SearchCompleted {
        queries: Vec<String>,
        results: usize,
    },
    TaskChanged {
        task: usize,
        rank: usize,
        url: Url,
        state: TaskState,
    },
    RunFinished {
        run_id: Uuid,
        termination: Termination,
        done: usize,
        failed: usize,
        elapsed: Duration,
    },
}

/// Optional event sink. Sending never blocks and a dropped receiver is
/// ignored.
#[derive(Debug, Clone, Default)]
pub(crate) struct Progress(Option<UnboundedSender<ProgressEvent>>);

impl Progress {
    pub(crate) fn new(sender: Option<UnboundedSender<ProgressEvent>>) -> Self {
        Self(sender)
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.0 {
            let _ = sender.send(event);
        }
    }
}
