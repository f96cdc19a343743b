//! Fan-out/fan-in coordinator for independent sub-tasks.
//!
//! Sub-tasks run concurrently on a `JoinSet` with no shared mutable state;
//! results and failures are merged into maps keyed by sub-task id, so the
//! outcome is deterministic regardless of completion order.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::task::TaskSpec;

/// Merged result of a fan-out run.
///
/// One sub-task's failure never aborts its siblings: failed sub-tasks land in
/// `failed_ids` while the rest complete normally. A panic inside a sub-task
/// is recorded as that sub-task's fatal failure.
#[derive(Debug)]
pub struct ParallelOutcome<T> {
    pub results_by_id: BTreeMap<String, T>,
    pub failed_ids: BTreeMap<String, PipelineError>,
}

impl<T> ParallelOutcome<T> {
    /// True when every sub-task completed without error.
    pub fn all_succeeded(&self) -> bool {
        self.failed_ids.is_empty()
    }
}

/// Runs `runner` for each sub-task concurrently and merges by sub-task id.
///
/// Duplicate sub-task ids are rejected before anything is dispatched; the
/// merge contract is keyed by id, so a duplicate can only be a caller bug.
/// If `cancel` fires, in-flight sub-tasks are aborted and the call returns
/// `Err(Cancelled)`, discarding any completed results.
pub async fn run_parallel<T, F, Fut>(
    subtasks: Vec<TaskSpec>,
    cancel: CancellationToken,
    runner: F,
) -> Result<ParallelOutcome<T>, PipelineError>
where
    T: Send + 'static,
    F: Fn(TaskSpec) -> Fut,
    Fut: Future<Output = Result<T, PipelineError>> + Send + 'static,
{
    let mut seen = BTreeSet::new();
    for task in &subtasks {
        if !seen.insert(task.id.clone()) {
            return Err(PipelineError::Fatal(format!(
                "duplicate sub-task id: {}",
                task.id
            )));
        }
    }
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    tracing::info!(subtasks = subtasks.len(), "Starting fan-out");
    let mut set = JoinSet::new();
    for task in subtasks {
        let id = task.id.clone();
        let fut = runner(task);
        set.spawn(async move {
            // Contain panics so they count as this sub-task's failure
            // instead of tearing down the join set.
            let result = match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Fatal("sub-task panicked".to_string())),
            };
            (id, result)
        });
    }

    let mut results_by_id = BTreeMap::new();
    let mut failed_ids = BTreeMap::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                set.abort_all();
                tracing::info!("Fan-out cancelled");
                return Err(PipelineError::Cancelled);
            }
            joined = set.join_next() => match joined {
                None => break,
                Some(Ok((id, Ok(value)))) => {
                    tracing::debug!(subtask_id = %id, "Sub-task complete");
                    results_by_id.insert(id, value);
                }
                Some(Ok((id, Err(e)))) => {
                    tracing::debug!(subtask_id = %id, error = %e, "Sub-task failed");
                    failed_ids.insert(id, e);
                }
                // Panics are contained above; a join error here can only be
                // an abort, which is handled by the cancellation arm.
                Some(Err(_)) => {}
            }
        }
    }

    tracing::info!(
        succeeded = results_by_id.len(),
        failed = failed_ids.len(),
        "Fan-out complete"
    );
    Ok(ParallelOutcome {
        results_by_id,
        failed_ids,
    })
}
