//! Per-page task states and the table that owns them.
//!
//! A task moves forward one step at a time (`Queued`, `Fetching`,
//! `Extracting`, `Summarizing`, `Done`) or drops to `Failed` from any
//! non-terminal state. Nothing moves backwards and terminal states are
//! final. [`TaskTable`] is the only place states change.

use serde::Serialize;
use std::fmt;
use url::Url;

use crate::error::{ErrorKind, TransitionError};
use crate::traits::searcher::SearchResult;
use crate::types::summary::Summary;

/// Pipeline stage a task was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Fetching,
    Extracting,
    Summarizing,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Summarizing => "summarizing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// A stage failed with a classified error.
    Error {
        stage: Stage,
        kind: ErrorKind,
        message: String,
    },
    /// The run hit its deadline or was cancelled while the task was pending.
    Cancelled { stage: Stage },
}

impl FailureReason {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Error { stage, .. } | Self::Cancelled { stage } => *stage,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error {
                stage,
                kind,
                message,
            } => write!(f, "{kind} while {stage}: {message}"),
            Self::Cancelled { stage } => write!(f, "cancelled while {stage}"),
        }
    }
}

/// State of one page task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Fetching,
    Extracting,
    Summarizing,
    Done,
    Failed { reason: FailureReason },
}

impl TaskState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Summarizing => "summarizing",
            Self::Done => "done",
            Self::Failed { .. } => "failed",
        }
    }

    fn step(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Fetching => 1,
            Self::Extracting => 2,
            Self::Summarizing => 3,
            Self::Done => 4,
            Self::Failed { .. } => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }

    /// The stage a non-terminal state belongs to.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Queued => Some(Stage::Queued),
            Self::Fetching => Some(Stage::Fetching),
            Self::Extracting => Some(Stage::Extracting),
            Self::Summarizing => Some(Stage::Summarizing),
            Self::Done | Self::Failed { .. } => None,
        }
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_move_to(&self, next: &TaskState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed { .. } => true,
            _ => next.step() == self.step() + 1,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// One search result moving through the pipeline.
#[derive(Debug, Clone)]
pub struct PageTask {
    pub id: usize,
    pub result: SearchResult,
    state: TaskState,
    history: Vec<&'static str>,
    summary: Option<Summary>,
}

impl PageTask {
    fn new(id: usize, result: SearchResult) -> Self {
        Self {
            id,
            result,
            state: TaskState::Queued,
            history: vec![TaskState::Queued.name()],
            summary: None,
        }
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    /// Names of every state the task has been in, oldest first.
    pub fn history(&self) -> &[&'static str] {
        &self.history
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn url(&self) -> &Url {
        &self.result.url
    }

    pub fn rank(&self) -> usize {
        self.result.rank
    }
}

/// A page left out of the report, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exclusion {
    pub url: Url,
    pub rank: usize,
    pub reason: FailureReason,
}

/// Owner of every task's state.
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: Vec<PageTask>,
}

impl TaskTable {
    /// One queued task per search result, ids in result order.
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            tasks: results
                .into_iter()
                .enumerate()
                .map(|(id, result)| PageTask::new(id, result))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&PageTask> {
        self.tasks.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageTask> {
        self.tasks.iter()
    }

    /// Move a task to `next`, refusing illegal transitions.
    pub fn transition(&mut self, id: usize, next: TaskState) -> Result<&PageTask, TransitionError> {
        let Some(task) = self.tasks.get_mut(id) else {
            return Err(TransitionError {
                task: id,
                from: "missing",
                to: next.name(),
            });
        };

        if !task.state.can_move_to(&next) {
            return Err(TransitionError {
                task: id,
                from: task.state.name(),
                to: next.name(),
            });
        }

        task.history.push(next.name());
        task.state = next;
        Ok(task)
    }

    /// Move a task from `Summarizing` to `Done`, keeping its summary.
    pub fn complete(&mut self, id: usize, summary: Summary) -> Result<&PageTask, TransitionError> {
        self.transition(id, TaskState::Done)?;
        let task = &mut self.tasks[id];
        task.summary = Some(summary);
        Ok(task)
    }

    pub fn fail(&mut self, id: usize, reason: FailureReason) -> Result<&PageTask, TransitionError> {
        self.transition(id, TaskState::Failed { reason })
    }

    /// Fail every task that has not finished. Returns the ids touched.
    pub fn cancel_pending(&mut self) -> Vec<usize> {
        let pending: Vec<(usize, Stage)> = self
            .tasks
            .iter()
            .filter_map(|t| t.state.stage().map(|stage| (t.id, stage)))
            .collect();

        pending
            .into_iter()
            .filter(|(id, stage)| self.fail(*id, FailureReason::Cancelled { stage: *stage }).is_ok())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn count_done(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(t.state, TaskState::Done))
            .count()
    }

    pub fn count_failed(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(t.state, TaskState::Failed { .. }))
            .count()
    }

    pub fn all_terminal(&self) -> bool {
        self.tasks.iter().all(|t| t.state.is_terminal())
    }

    /// Summaries of `Done` tasks, ordered by rank then URL.
    pub fn summaries_in_rank_order(&self) -> Vec<Summary> {
        let mut summaries: Vec<Summary> = self
            .tasks
            .iter()
            .filter(|t| matches!(t.state, TaskState::Done))
            .filter_map(|t| t.summary.clone())
            .collect();
        summaries.sort_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then_with(|| a.source_url.as_str().cmp(b.source_url.as_str()))
        });
        summaries
    }

    /// Every failed task, in rank order.
    pub fn exclusions(&self) -> Vec<Exclusion> {
        let mut excluded: Vec<Exclusion> = self
            .tasks
            .iter()
            .filter_map(|t| match &t.state {
                TaskState::Failed { reason } => Some(Exclusion {
                    url: t.result.url.clone(),
                    rank: t.result.rank,
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect();
        excluded.sort_by_key(|e| e.rank);
        excluded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(n: usize) -> TaskTable {
        TaskTable::new(
            (0..n)
                .map(|i| SearchResult::from_url(&format!("https://site{i}.com/"), i + 1).unwrap())
                .collect(),
        )
    }

    fn error(stage: Stage) -> FailureReason {
        FailureReason::Error {
            stage,
            kind: ErrorKind::TransientNetwork,
            message: "timeout".into(),
        }
    }

    #[test]
    fn test_forward_path() {
        let mut t = table(1);
        t.transition(0, TaskState::Fetching).unwrap();
        t.transition(0, TaskState::Extracting).unwrap();
        t.transition(0, TaskState::Summarizing).unwrap();
        let summary = Summary::new(t.get(0).unwrap().url().clone(), 1, "text");
        t.complete(0, summary).unwrap();

        let task = t.get(0).unwrap();
        assert_eq!(task.state(), &TaskState::Done);
        assert_eq!(
            task.history(),
            &["queued", "fetching", "extracting", "summarizing", "done"]
        );
        assert_eq!(t.count_done(), 1);
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        let mut t = table(1);
        assert!(t.transition(0, TaskState::Extracting).is_err());
        t.transition(0, TaskState::Fetching).unwrap();
        assert!(t.transition(0, TaskState::Queued).is_err());
        assert!(t.transition(0, TaskState::Fetching).is_err());
        assert!(t.transition(0, TaskState::Done).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut t = table(1);
        t.transition(0, TaskState::Fetching).unwrap();
        t.fail(0, error(Stage::Fetching)).unwrap();

        assert!(t.transition(0, TaskState::Extracting).is_err());
        assert!(t.fail(0, error(Stage::Fetching)).is_err());
        assert_eq!(t.count_failed(), 1);
    }

    #[test]
    fn test_failed_extraction_never_summarizes() {
        let mut t = table(1);
        t.transition(0, TaskState::Fetching).unwrap();
        t.transition(0, TaskState::Extracting).unwrap();
        t.fail(0, error(Stage::Extracting)).unwrap();

        assert!(t.transition(0, TaskState::Summarizing).is_err());
        assert!(!t.get(0).unwrap().history().contains(&"summarizing"));
    }

    #[test]
    fn test_cancel_pending() {
        let mut t = table(3);
        t.transition(0, TaskState::Fetching).unwrap();
        t.transition(1, TaskState::Fetching).unwrap();
        t.fail(1, error(Stage::Fetching)).unwrap();

        let cancelled = t.cancel_pending();
        assert_eq!(cancelled, vec![0, 2]);
        assert!(t.all_terminal());

        let exclusions = t.exclusions();
        assert_eq!(exclusions.len(), 3);
        assert_eq!(
            exclusions[0].reason,
            FailureReason::Cancelled {
                stage: Stage::Fetching
            }
        );
        assert_eq!(
            exclusions[2].reason,
            FailureReason::Cancelled { stage: Stage::Queued }
        );
    }

    #[test]
    fn test_summaries_in_rank_order() {
        let mut t = table(3);
        for id in [2, 0] {
            t.transition(id, TaskState::Fetching).unwrap();
            t.transition(id, TaskState::Extracting).unwrap();
            t.transition(id, TaskState::Summarizing).unwrap();
            let task = t.get(id).unwrap();
            let summary = Summary::new(task.url().clone(), task.rank(), "s");
            t.complete(id, summary).unwrap();
        }

        let ranks: Vec<_> = t.summaries_in_rank_order().iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 3]);
    }
}
