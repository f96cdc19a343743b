//! Stage traits: producer, evaluator, refiner.
//!
//! The revision loop is generic over these three seams; anything async and
//! `Send + Sync` can plug in. Real implementations live in the pipeline
//! flavor modules ([`crate::nl2sql`], [`crate::content`]); scripted mocks for
//! tests live in [`mock`].

pub mod mock;

use async_trait::async_trait;

use crate::artifact::{CandidateArtifact, Evaluation};
use crate::error::PipelineError;
use crate::task::TaskSpec;

/// Creates the initial candidate artifact (version 0) for a task.
///
/// Producers do not retry internally; a failure is fatal to the run.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, task: &TaskSpec) -> Result<CandidateArtifact, PipelineError>;
}

/// Judges one artifact version against the task.
///
/// Evaluators report score, safety, and feedback; the loop stamps approval.
/// Infrastructure hiccups (timeouts, malformed review output) are reported as
/// [`PipelineError::EvaluationTransient`] so the loop can retry them once.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        artifact: &CandidateArtifact,
        task: &TaskSpec,
    ) -> Result<Evaluation, PipelineError>;
}

/// Revises a rejected artifact using the evaluator's feedback.
///
/// Must return a new artifact with the version incremented; the loop verifies
/// this and fails the run on a broken contract. Refiners fail fast when
/// handed empty feedback.
#[async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(
        &self,
        artifact: &CandidateArtifact,
        feedback: &[String],
        task: &TaskSpec,
    ) -> Result<CandidateArtifact, PipelineError>;
}
