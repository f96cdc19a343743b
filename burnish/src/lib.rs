//! Burnish: bounded iterative refinement pipelines with an evaluator gate.
//!
//! A producer drafts a candidate artifact, an evaluator scores it, and a
//! refiner revises it with the evaluator's feedback until the gate passes or
//! the revision budget runs out. The same loop drives "draft content → review
//! → revise" and "generate SQL → execute → diagnose → repair"; a fan-out
//! coordinator runs independent sub-tasks concurrently and merges results
//! deterministically by sub-task id.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use burnish::pipeline::{LoopSettings, RevisionLoop};
//! use burnish::stage::mock::{RecordingRefiner, ScriptedEvaluator, StaticProducer};
//! use burnish::{Evaluation, TaskSpec};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), burnish::PipelineError> {
//! let pipeline = RevisionLoop::new(
//!     Arc::new(StaticProducer::new("first draft")),
//!     Arc::new(ScriptedEvaluator::always(Evaluation::new(9, true, vec![]))),
//!     Arc::new(RecordingRefiner::new()),
//!     LoopSettings::default(),
//! );
//! let outcome = pipeline.run(&TaskSpec::new("post-1", "announce the launch")).await?;
//! assert!(outcome.is_approved());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod capability;
pub mod content;
pub mod error;
pub mod fanout;
pub mod memory;
pub mod nl2sql;
pub mod pipeline;
pub mod prompts;
pub mod stage;
pub mod task;

pub use artifact::{CandidateArtifact, Evaluation, PipelineOutcome, TerminalReason};
pub use error::PipelineError;
pub use fanout::{run_parallel, ParallelOutcome};
pub use pipeline::{LoopSettings, RevisionLoop};
pub use stage::{Evaluator, Producer, Refiner};
pub use task::TaskSpec;
