//! Candidate artifacts, evaluations, and pipeline outcomes.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One version of the produced artifact.
///
/// The producer emits version 0; each refinement emits a fresh value with the
/// version incremented. Prior versions are never mutated in place, so callers
/// can keep the full revision history if they choose to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateArtifact {
    /// The artifact body (content text, a SQL statement...).
    pub content: String,
    /// 0 for the initial draft, +1 per refinement.
    pub version: u32,
    /// Stage-attached metadata (e.g. the formatted query result).
    pub metadata: BTreeMap<String, String>,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
}

impl CandidateArtifact {
    /// Creates a version-0 artifact with the given content.
    pub fn initial(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            version: 0,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Creates the next version of this artifact with new content.
    /// Metadata does not carry over; each version speaks for itself.
    pub fn revised(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            version: self.version + 1,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach one metadata entry (builder).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The evaluator's verdict on one artifact version.
///
/// `approved` is stamped by the loop's gate, not by the evaluator itself;
/// evaluators report score, safety, and feedback, and the gate applies the
/// inclusive threshold. A rejection must carry at least one feedback item or
/// the refiner has nothing to act on; the loop treats that as a broken
/// contract and fails the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Quality score, 1-10.
    pub score: u8,
    /// False when the artifact violates a safety constraint; gates approval
    /// regardless of score.
    pub safe: bool,
    /// Actionable revision feedback; must be non-empty on rejection.
    pub feedback: Vec<String>,
    /// Whether the gate passed this artifact. Stamped by the loop.
    pub approved: bool,
}

impl Evaluation {
    /// Creates an un-stamped evaluation (`approved` starts false).
    pub fn new(score: u8, safe: bool, feedback: Vec<String>) -> Self {
        Self {
            score,
            safe,
            feedback,
            approved: false,
        }
    }

    /// Applies the inclusive gate and returns the stamped evaluation.
    pub fn stamped(mut self, threshold: u8) -> Self {
        self.approved = self.score >= threshold && self.safe;
        self
    }
}

/// Why a run terminated normally. Fatal termination is the `Err` channel,
/// never a reason value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalReason {
    /// The evaluator gate passed the artifact.
    Approved,
    /// The revision budget ran out; the last artifact is returned as-is,
    /// labeled so callers can tell it was never approved.
    Exhausted,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalReason::Approved => write!(f, "approved"),
            TerminalReason::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// The normal result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// The final artifact version.
    pub artifact: CandidateArtifact,
    /// The evaluation of that version (rejecting one when exhausted).
    pub evaluation: Evaluation,
    /// Refinement iterations consumed (0 when the first draft was approved).
    pub iterations_used: u32,
    /// How the run ended.
    pub reason: TerminalReason,
}

impl PipelineOutcome {
    /// True when the gate approved the final artifact.
    pub fn is_approved(&self) -> bool {
        self.reason == TerminalReason::Approved
    }
}
