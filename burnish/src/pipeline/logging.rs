//! Logging utilities for pipeline execution.
//!
//! Provides structured logging for run lifecycle, stage execution, and
//! evaluator verdicts. Run lifecycle is info, per-stage detail is debug,
//! fatal paths are error.

use crate::artifact::Evaluation;
use crate::error::PipelineError;

/// Log run start.
pub fn log_run_start(run_id: &str, task_id: &str, max_iterations: u32) {
    tracing::info!(
        run_id = run_id,
        task_id = task_id,
        max_iterations = max_iterations,
        "Starting pipeline run"
    );
}

/// Log stage invocation start.
pub fn log_stage_start(run_id: &str, stage: &str, iteration: u32) {
    tracing::debug!(
        run_id = run_id,
        stage = stage,
        iteration = iteration,
        "Starting stage"
    );
}

/// Log stage completion.
pub fn log_stage_complete(run_id: &str, stage: &str, iteration: u32) {
    tracing::debug!(
        run_id = run_id,
        stage = stage,
        iteration = iteration,
        "Stage complete"
    );
}

/// Log the evaluator's stamped verdict for one artifact version.
pub fn log_verdict(run_id: &str, iteration: u32, evaluation: &Evaluation) {
    tracing::debug!(
        run_id = run_id,
        iteration = iteration,
        score = evaluation.score,
        safe = evaluation.safe,
        approved = evaluation.approved,
        feedback_items = evaluation.feedback.len(),
        "Evaluator verdict"
    );
}

/// Log normal run completion.
pub fn log_run_complete(run_id: &str, reason: &str, iterations_used: u32) {
    tracing::info!(
        run_id = run_id,
        reason = reason,
        iterations_used = iterations_used,
        "Pipeline run complete"
    );
}

/// Log fatal run termination.
pub fn log_run_error(run_id: &str, error: &PipelineError) {
    tracing::error!(run_id = run_id, ?error, "Pipeline run failed");
}
