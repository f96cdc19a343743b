//! NL → SQL self-healing flavor.
//!
//! The producer translates a natural-language question into one `SELECT`
//! statement, the evaluator executes it, and the refiner repairs it from the
//! execution error. Approval means the statement ran; a guard rejection
//! aborts the run immediately instead of burning budget on a policy
//! violation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::artifact::{CandidateArtifact, Evaluation};
use crate::capability::{QueryExecutor, QueryRows, TextGenerator};
use crate::error::PipelineError;
use crate::pipeline::{LoopSettings, RevisionLoop};
use crate::prompts;
use crate::stage::{Evaluator, Producer, Refiner};
use crate::task::TaskSpec;

/// Removes a surrounding Markdown code fence (with optional language tag).
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    let rest = match rest.split_once('\n') {
        Some((tag, body)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body,
        _ => rest,
    };
    rest.trim().to_string()
}

/// Translates the task objective into an initial SELECT statement.
pub struct SqlProducer {
    llm: Arc<dyn TextGenerator>,
    schema: String,
}

impl SqlProducer {
    /// `schema` is the summary handed to the model, e.g. from
    /// [`crate::capability::sqlite::SqliteExecutor::schema_summary`].
    pub fn new(llm: Arc<dyn TextGenerator>, schema: impl Into<String>) -> Self {
        Self {
            llm,
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl Producer for SqlProducer {
    async fn produce(&self, task: &TaskSpec) -> Result<CandidateArtifact, PipelineError> {
        let prompt = prompts::sql_translation(&task.objective, &self.schema);
        let raw = self.llm.generate_text(&prompt, &task.constraints).await?;
        Ok(CandidateArtifact::initial(strip_code_fences(&raw)))
    }
}

/// Executes the candidate statement; success approves, an execution error
/// rejects with the error text as feedback.
///
/// A guard rejection (`RejectedQuery`) propagates unchanged so the loop
/// aborts instead of trying to "repair" a policy violation. The rows of the
/// last successful execution are kept and exposed via [`Self::last_result`].
pub struct SqlEvaluator {
    executor: Arc<dyn QueryExecutor>,
    last_result: Mutex<Option<QueryRows>>,
}

impl SqlEvaluator {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            executor,
            last_result: Mutex::new(None),
        }
    }

    /// Rows returned by the approved statement, if the run got that far.
    pub fn last_result(&self) -> Option<QueryRows> {
        self.last_result.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl Evaluator for SqlEvaluator {
    async fn evaluate(
        &self,
        artifact: &CandidateArtifact,
        _task: &TaskSpec,
    ) -> Result<Evaluation, PipelineError> {
        match self.executor.execute_query(&artifact.content).await {
            Ok(rows) => {
                if let Ok(mut slot) = self.last_result.lock() {
                    *slot = Some(rows);
                }
                Ok(Evaluation::new(10, true, vec![]))
            }
            Err(PipelineError::RejectedQuery(m)) => Err(PipelineError::RejectedQuery(m)),
            Err(PipelineError::Query(m)) => {
                Ok(Evaluation::new(1, true, vec![format!("query failed: {m}")]))
            }
            Err(other) => Err(other),
        }
    }
}

/// Repairs the failing statement from the execution error feedback.
pub struct SqlRefiner {
    llm: Arc<dyn TextGenerator>,
}

impl SqlRefiner {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Refiner for SqlRefiner {
    async fn refine(
        &self,
        artifact: &CandidateArtifact,
        feedback: &[String],
        task: &TaskSpec,
    ) -> Result<CandidateArtifact, PipelineError> {
        let prompt = prompts::sql_repair(&task.objective, &artifact.content, feedback);
        let raw = self.llm.generate_text(&prompt, &task.constraints).await?;
        Ok(artifact.revised(strip_code_fences(&raw)))
    }
}

/// Wires the three SQL stages into a [`RevisionLoop`].
///
/// Also returns the evaluator so the caller can read the approved
/// statement's rows via [`SqlEvaluator::last_result`] after the run.
pub fn pipeline(
    llm: Arc<dyn TextGenerator>,
    executor: Arc<dyn QueryExecutor>,
    schema: impl Into<String>,
    settings: LoopSettings,
) -> (RevisionLoop, Arc<SqlEvaluator>) {
    let evaluator = Arc::new(SqlEvaluator::new(executor));
    let pipeline = RevisionLoop::new(
        Arc::new(SqlProducer::new(llm.clone(), schema)),
        evaluator.clone(),
        Arc::new(SqlRefiner::new(llm)),
        settings,
    );
    (pipeline, evaluator)
}
