//! Scripted stage implementations for tests and examples.
//!
//! Mirrors the shape of the real stages: a producer with fixed output, an
//! evaluator that replays a scripted sequence of verdicts, and a refiner that
//! records the feedback it was handed. All three count their calls and can be
//! given an artificial delay for timeout and cancellation tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::artifact::{CandidateArtifact, Evaluation};
use crate::error::PipelineError;
use crate::stage::{Evaluator, Producer, Refiner};
use crate::task::TaskSpec;

/// Producer returning fixed content, or a scripted failure.
pub struct StaticProducer {
    content: String,
    fail_with: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticProducer {
    /// Creates a producer that always returns `content` at version 0.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            fail_with: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a producer that always fails with a fatal error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            fail_with: Some(message.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before responding (builder).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of produce() calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Producer for StaticProducer {
    async fn produce(&self, _task: &TaskSpec) -> Result<CandidateArtifact, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if let Some(msg) = &self.fail_with {
            return Err(PipelineError::Fatal(msg.clone()));
        }
        Ok(CandidateArtifact::initial(self.content.clone()))
    }
}

/// Evaluator replaying a scripted sequence of verdicts, one per call.
///
/// When the script runs dry the last repeating verdict (if configured) is
/// returned; otherwise running dry is a fatal error so tests notice an
/// unexpected extra call.
pub struct ScriptedEvaluator {
    script: Mutex<VecDeque<Result<Evaluation, PipelineError>>>,
    repeat: Option<Evaluation>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedEvaluator {
    /// Creates an evaluator that returns the same verdict on every call.
    pub fn always(evaluation: Evaluation) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(evaluation),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates an evaluator that consumes `script` front to back.
    pub fn from_script(script: Vec<Result<Evaluation, PipelineError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// After the script runs dry, keep returning this verdict (builder).
    pub fn then_repeat(mut self, evaluation: Evaluation) -> Self {
        self.repeat = Some(evaluation);
        self
    }

    /// Sleep this long before responding (builder).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of evaluate() calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        _artifact: &CandidateArtifact,
        _task: &TaskSpec,
    ) -> Result<Evaluation, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(verdict) => verdict,
            None => match &self.repeat {
                Some(eval) => Ok(eval.clone()),
                None => Err(PipelineError::Fatal(
                    "evaluator script exhausted".to_string(),
                )),
            },
        }
    }
}

/// Refiner that records received feedback and appends a revision marker.
pub struct RecordingRefiner {
    received: Mutex<Vec<Vec<String>>>,
    fail_with: Option<String>,
    bump_version: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl RecordingRefiner {
    /// Creates a refiner that revises content to `"<old> [revised N]"`.
    pub fn new() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            fail_with: None,
            bump_version: true,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a refiner that always fails with a fatal error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::new()
        }
    }

    /// Creates a misbehaving refiner that forgets to increment the version.
    /// Used to test the loop's contract check.
    pub fn without_version_bump() -> Self {
        Self {
            bump_version: false,
            ..Self::new()
        }
    }

    /// Sleep this long before responding (builder).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of refine() calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Feedback lists received, in call order.
    pub fn received_feedback(&self) -> Vec<Vec<String>> {
        self.received.lock().unwrap().clone()
    }
}

impl Default for RecordingRefiner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Refiner for RecordingRefiner {
    async fn refine(
        &self,
        artifact: &CandidateArtifact,
        feedback: &[String],
        _task: &TaskSpec,
    ) -> Result<CandidateArtifact, PipelineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.received.lock().unwrap().push(feedback.to_vec());
        if let Some(msg) = &self.fail_with {
            return Err(PipelineError::Fatal(msg.clone()));
        }
        let mut revised = artifact.revised(format!("{} [revised {}]", artifact.content, call));
        if !self.bump_version {
            revised.version = artifact.version;
        }
        Ok(revised)
    }
}
