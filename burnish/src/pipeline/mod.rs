//! The revision loop: an explicit producer → evaluator → refiner state machine.
//!
//! One `produce` call creates the version-0 artifact; each pass through the
//! loop evaluates the current version in full (no cached verdicts) and either
//! terminates (approved, exhausted, fatal) or refines into the next version.
//! The iteration budget bounds the run to at most `max_iterations + 1`
//! producer/refiner calls.

pub mod logging;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::artifact::{Evaluation, PipelineOutcome, TerminalReason};
use crate::error::PipelineError;
use crate::fanout::{self, ParallelOutcome};
use crate::stage::{Evaluator, Producer, Refiner};
use crate::task::TaskSpec;

/// Knobs for one revision loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    /// Refinement iterations allowed after the initial draft. 0 means the
    /// first draft is evaluated once and never refined.
    pub max_iterations: u32,
    /// Inclusive approval threshold: `score >= threshold && safe` passes.
    pub approval_threshold: u8,
    /// Wall-clock limit per stage invocation. `None` disables the limit.
    pub stage_timeout: Option<Duration>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            approval_threshold: 7,
            stage_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl From<&env_config::Settings> for LoopSettings {
    fn from(settings: &env_config::Settings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            approval_threshold: settings.approval_threshold,
            stage_timeout: Some(Duration::from_secs(settings.stage_timeout_secs)),
        }
    }
}

/// Result of one bounded, cancellation-aware stage invocation.
enum StageCall<T> {
    Ok(T),
    Failed(PipelineError),
    TimedOut,
}

/// Drives a task through produce → evaluate → refine until the gate passes
/// or the budget runs out.
///
/// Cheap to clone; stages are shared behind `Arc` so clones can run
/// concurrently (the fan-out coordinator relies on this).
#[derive(Clone)]
pub struct RevisionLoop {
    producer: Arc<dyn Producer>,
    evaluator: Arc<dyn Evaluator>,
    refiner: Arc<dyn Refiner>,
    settings: LoopSettings,
    cancel: CancellationToken,
}

impl RevisionLoop {
    pub fn new(
        producer: Arc<dyn Producer>,
        evaluator: Arc<dyn Evaluator>,
        refiner: Arc<dyn Refiner>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            producer,
            evaluator,
            refiner,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external cancellation token (builder). Cancelling the token
    /// aborts in-flight stage calls and fails the run with `Cancelled`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Runs the full loop for one task.
    ///
    /// Returns a [`PipelineOutcome`] on approval or budget exhaustion;
    /// producer/refiner failures, escalated evaluator transients, and broken
    /// stage contracts surface as `Err`.
    pub async fn run(&self, task: &TaskSpec) -> Result<PipelineOutcome, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        logging::log_run_start(&run_id, &task.id, self.settings.max_iterations);
        let result = self.run_inner(&run_id, task).await;
        match &result {
            Ok(outcome) => logging::log_run_complete(
                &run_id,
                &outcome.reason.to_string(),
                outcome.iterations_used,
            ),
            Err(e) => logging::log_run_error(&run_id, e),
        }
        result
    }

    /// Runs the full loop for each sub-task concurrently; see [`fanout::run_parallel`].
    pub async fn run_parallel(
        &self,
        subtasks: Vec<TaskSpec>,
    ) -> Result<ParallelOutcome<PipelineOutcome>, PipelineError> {
        let this = self.clone();
        fanout::run_parallel(subtasks, self.cancel.clone(), move |task| {
            let this = this.clone();
            async move { this.run(&task).await }
        })
        .await
    }

    async fn run_inner(
        &self,
        run_id: &str,
        task: &TaskSpec,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut iteration: u32 = 0;

        logging::log_stage_start(run_id, "producer", iteration);
        let mut artifact = match self.call_stage(self.producer.produce(task)).await {
            StageCall::Ok(a) => a,
            StageCall::Failed(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
            StageCall::Failed(e) => {
                return Err(PipelineError::Fatal(format!("producer failed: {e}")))
            }
            StageCall::TimedOut => {
                return Err(PipelineError::Fatal("producer timed out".to_string()))
            }
        };
        logging::log_stage_complete(run_id, "producer", iteration);

        loop {
            let evaluation = self
                .evaluate_with_retry(run_id, task, &artifact, iteration)
                .await?
                .stamped(self.settings.approval_threshold);
            logging::log_verdict(run_id, iteration, &evaluation);

            if evaluation.approved {
                return Ok(PipelineOutcome {
                    artifact,
                    evaluation,
                    iterations_used: iteration,
                    reason: TerminalReason::Approved,
                });
            }
            // A rejection without feedback leaves the refiner nothing to act on.
            if evaluation.feedback.is_empty() {
                return Err(PipelineError::Fatal(
                    "evaluator rejected without feedback".to_string(),
                ));
            }
            if iteration >= self.settings.max_iterations {
                return Ok(PipelineOutcome {
                    artifact,
                    evaluation,
                    iterations_used: iteration,
                    reason: TerminalReason::Exhausted,
                });
            }

            iteration += 1;
            logging::log_stage_start(run_id, "refiner", iteration);
            let revised = match self
                .call_stage(self.refiner.refine(&artifact, &evaluation.feedback, task))
                .await
            {
                StageCall::Ok(a) => a,
                StageCall::Failed(PipelineError::Cancelled) => {
                    return Err(PipelineError::Cancelled)
                }
                StageCall::Failed(e) => {
                    return Err(PipelineError::Fatal(format!("refiner failed: {e}")))
                }
                StageCall::TimedOut => {
                    return Err(PipelineError::Fatal("refiner timed out".to_string()))
                }
            };
            if revised.version != artifact.version + 1 {
                return Err(PipelineError::Fatal(format!(
                    "refiner returned version {} for input version {}",
                    revised.version, artifact.version
                )));
            }
            logging::log_stage_complete(run_id, "refiner", iteration);
            artifact = revised;
        }
    }

    /// One evaluation pass with a single transient retry at the same
    /// iteration. Timeouts count as transient; `RejectedQuery` propagates
    /// unchanged; everything else escalates to fatal.
    async fn evaluate_with_retry(
        &self,
        run_id: &str,
        task: &TaskSpec,
        artifact: &crate::artifact::CandidateArtifact,
        iteration: u32,
    ) -> Result<Evaluation, PipelineError> {
        let mut retried = false;
        loop {
            logging::log_stage_start(run_id, "evaluator", iteration);
            let transient = match self.call_stage(self.evaluator.evaluate(artifact, task)).await {
                StageCall::Ok(eval) => {
                    logging::log_stage_complete(run_id, "evaluator", iteration);
                    return Ok(eval);
                }
                StageCall::Failed(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
                StageCall::Failed(PipelineError::RejectedQuery(m)) => {
                    return Err(PipelineError::RejectedQuery(m))
                }
                StageCall::Failed(PipelineError::EvaluationTransient(m)) => m,
                StageCall::Failed(e) => {
                    return Err(PipelineError::Fatal(format!("evaluator failed: {e}")))
                }
                StageCall::TimedOut => "evaluation timed out".to_string(),
            };
            if retried {
                return Err(PipelineError::Fatal(format!(
                    "evaluation failed after retry: {transient}"
                )));
            }
            retried = true;
            tracing::warn!(
                run_id = run_id,
                iteration = iteration,
                message = %transient,
                "Transient evaluation failure, retrying once"
            );
        }
    }

    /// Applies the cancellation race and the per-stage timeout to one stage
    /// future. A pre-cancelled token returns without polling the stage.
    async fn call_stage<T>(
        &self,
        fut: impl Future<Output = Result<T, PipelineError>>,
    ) -> StageCall<T> {
        if self.cancel.is_cancelled() {
            return StageCall::Failed(PipelineError::Cancelled);
        }
        let bounded = async {
            match self.settings.stage_timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(Ok(value)) => StageCall::Ok(value),
                    Ok(Err(e)) => StageCall::Failed(e),
                    Err(_) => StageCall::TimedOut,
                },
                None => match fut.await {
                    Ok(value) => StageCall::Ok(value),
                    Err(e) => StageCall::Failed(e),
                },
            }
        };
        tokio::select! {
            _ = self.cancel.cancelled() => StageCall::Failed(PipelineError::Cancelled),
            out = bounded => out,
        }
    }
}
