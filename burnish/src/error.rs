//! Pipeline error types.
//!
//! Used by the revision loop, the fan-out coordinator, and all capability
//! backends. Budget exhaustion is deliberately **not** an error: it is the
//! `Exhausted` terminal reason on a normal [`crate::artifact::PipelineOutcome`].

use thiserror::Error;

/// Pipeline execution error.
///
/// Capability backends map their failures into the first four variants;
/// the revision loop maps stage failures into `Fatal` and reports its own
/// transient/cancellation conditions with the remaining variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Text or image generation failed (backend error, malformed response).
    #[error("generation failed: {0}")]
    Generation(String),

    /// Web search failed (HTTP error, bad payload).
    #[error("search failed: {0}")]
    Search(String),

    /// Query execution failed at runtime (connection, SQL error).
    #[error("query failed: {0}")]
    Query(String),

    /// Query rejected by the read-only guard before dispatch.
    ///
    /// A policy violation, never a runtime fault; the loop propagates it
    /// unchanged and never retries it.
    #[error("query rejected: {0}")]
    RejectedQuery(String),

    /// Evaluator infrastructure hiccup (timeout, malformed review output).
    ///
    /// Retried exactly once at the same iteration without consuming the
    /// revision budget; a second occurrence escalates to `Fatal`.
    #[error("evaluation transient failure: {0}")]
    EvaluationTransient(String),

    /// Unrecoverable pipeline failure (producer/refiner error or timeout,
    /// escalated transient, broken stage contract).
    #[error("fatal pipeline failure: {0}")]
    Fatal(String),

    /// The run was cancelled via its cancellation token.
    #[error("pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    /// True for the variants the revision loop may retry or route specially;
    /// everything else is escalated to `Fatal` when it leaks out of a stage.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::EvaluationTransient(_))
    }
}
