//! Content crew flavor: research, draft, review, rewrite.
//!
//! The producer optionally researches the topic and drafts, the evaluator
//! asks the model for a fixed-format review, and the refiner rewrites from
//! the reviewer's feedback. [`parse_review`] is pure so the verdict format is
//! testable without a model.

use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::{CandidateArtifact, Evaluation};
use crate::capability::{GeneratedImage, ImageGenerator, SearchProvider, TextGenerator};
use crate::error::PipelineError;
use crate::pipeline::{LoopSettings, RevisionLoop};
use crate::prompts;
use crate::stage::{Evaluator, Producer, Refiner};
use crate::task::TaskSpec;

/// Drafts the initial content, optionally grounded in search results.
pub struct ContentProducer {
    llm: Arc<dyn TextGenerator>,
    search: Option<Arc<dyn SearchProvider>>,
}

impl ContentProducer {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm, search: None }
    }

    /// Research the objective before drafting (builder).
    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }
}

#[async_trait]
impl Producer for ContentProducer {
    async fn produce(&self, task: &TaskSpec) -> Result<CandidateArtifact, PipelineError> {
        let research = match &self.search {
            Some(search) => {
                let hits = search.search(&task.objective).await?;
                if hits.is_empty() {
                    None
                } else {
                    Some(prompts::research_digest(&hits))
                }
            }
            None => None,
        };
        let prompt = prompts::content_draft(
            &task.objective,
            task.format.as_deref(),
            &task.constraints,
            research.as_deref(),
        );
        let draft = self.llm.generate_text(&prompt, &task.constraints).await?;
        Ok(CandidateArtifact::initial(draft))
    }
}

/// Parses the fixed `SCORE:` / `SAFE:` / `FEEDBACK:` review format.
///
/// Labels are matched case-insensitively with surrounding whitespace
/// tolerated. Missing or unparseable fields are an
/// [`PipelineError::EvaluationTransient`], so the loop retries a garbled
/// review once before giving up.
pub fn parse_review(text: &str) -> Result<Evaluation, PipelineError> {
    let mut score: Option<u8> = None;
    let mut safe: Option<bool> = None;
    let mut feedback: Vec<String> = Vec::new();
    let mut in_feedback = false;

    for line in text.lines() {
        let line = line.trim();
        let upper = line.to_uppercase();
        if let Some(value) = upper.strip_prefix("SCORE:") {
            let parsed: u8 = value.trim().parse().map_err(|_| {
                PipelineError::EvaluationTransient(format!("malformed review score: {line:?}"))
            })?;
            if !(1..=10).contains(&parsed) {
                return Err(PipelineError::EvaluationTransient(format!(
                    "review score out of range: {parsed}"
                )));
            }
            score = Some(parsed);
            in_feedback = false;
        } else if let Some(value) = upper.strip_prefix("SAFE:") {
            safe = Some(match value.trim() {
                "YES" | "TRUE" => true,
                "NO" | "FALSE" => false,
                other => {
                    return Err(PipelineError::EvaluationTransient(format!(
                        "malformed review safety: {other:?}"
                    )))
                }
            });
            in_feedback = false;
        } else if upper.starts_with("FEEDBACK:") {
            in_feedback = true;
        } else if in_feedback {
            let item = line.trim_start_matches('-').trim();
            if !item.is_empty() {
                feedback.push(item.to_string());
            }
        }
    }

    match (score, safe) {
        (Some(score), Some(safe)) => Ok(Evaluation::new(score, safe, feedback)),
        _ => Err(PipelineError::EvaluationTransient(
            "review missing SCORE or SAFE field".to_string(),
        )),
    }
}

/// Asks the model for a review and parses the verdict.
pub struct ContentEvaluator {
    llm: Arc<dyn TextGenerator>,
}

impl ContentEvaluator {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Evaluator for ContentEvaluator {
    async fn evaluate(
        &self,
        artifact: &CandidateArtifact,
        task: &TaskSpec,
    ) -> Result<Evaluation, PipelineError> {
        let prompt = prompts::content_review(&artifact.content, &task.objective);
        // A failed review call is an infrastructure hiccup, not a verdict.
        let raw = self
            .llm
            .generate_text(&prompt, &task.constraints)
            .await
            .map_err(|e| match e {
                PipelineError::Generation(m) => PipelineError::EvaluationTransient(m),
                other => other,
            })?;
        parse_review(&raw)
    }
}

/// Rewrites the content from the reviewer's feedback.
pub struct ContentRefiner {
    llm: Arc<dyn TextGenerator>,
}

impl ContentRefiner {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Refiner for ContentRefiner {
    async fn refine(
        &self,
        artifact: &CandidateArtifact,
        feedback: &[String],
        task: &TaskSpec,
    ) -> Result<CandidateArtifact, PipelineError> {
        if feedback.is_empty() {
            return Err(PipelineError::Fatal(
                "refine called without feedback".to_string(),
            ));
        }
        let prompt = prompts::content_rewrite(&artifact.content, &task.objective, feedback);
        let rewritten = self.llm.generate_text(&prompt, &task.constraints).await?;
        Ok(artifact.revised(rewritten))
    }
}

/// Builds the image prompt for an approved post about `topic` on `platform`.
pub fn build_image_prompt(topic: &str, platform: &str) -> String {
    prompts::image_prompt(topic, platform)
}

/// Generates a companion image for an approved post.
pub async fn illustrate(
    generator: &dyn ImageGenerator,
    topic: &str,
    platform: &str,
) -> Result<GeneratedImage, PipelineError> {
    generator
        .generate_image(&build_image_prompt(topic, platform), None)
        .await
}

/// Wires the three content stages into a [`RevisionLoop`].
pub fn pipeline(
    llm: Arc<dyn TextGenerator>,
    search: Option<Arc<dyn SearchProvider>>,
    settings: LoopSettings,
) -> RevisionLoop {
    let mut producer = ContentProducer::new(llm.clone());
    if let Some(search) = search {
        producer = producer.with_search(search);
    }
    RevisionLoop::new(
        Arc::new(producer),
        Arc::new(ContentEvaluator::new(llm.clone())),
        Arc::new(ContentRefiner::new(llm)),
        settings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: parse_review accepts the canonical format.
    #[test]
    fn parse_review_canonical_format() {
        let review = "SCORE: 8\nSAFE: yes\nFEEDBACK:\n- tighten the hook\n- add a CTA\n";
        let evaluation = parse_review(review).unwrap();
        assert_eq!(evaluation.score, 8);
        assert!(evaluation.safe);
        assert_eq!(evaluation.feedback, vec!["tighten the hook", "add a CTA"]);
    }

    /// **Scenario**: parse_review tolerates case and surrounding whitespace.
    #[test]
    fn parse_review_tolerates_case_and_whitespace() {
        let review = "  score: 9 \n  Safe: NO \n feedback: \n   - remove the claim \n";
        let evaluation = parse_review(review).unwrap();
        assert_eq!(evaluation.score, 9);
        assert!(!evaluation.safe);
        assert_eq!(evaluation.feedback, vec!["remove the claim"]);
    }

    /// **Scenario**: Missing fields and out-of-range scores are transient
    /// errors, not verdicts.
    #[test]
    fn parse_review_malformed_is_transient() {
        for bad in [
            "FEEDBACK:\n- something",
            "SCORE: eleven\nSAFE: yes\nFEEDBACK:",
            "SCORE: 0\nSAFE: yes\nFEEDBACK:",
            "SCORE: 8\nSAFE: maybe\nFEEDBACK:",
        ] {
            assert!(
                matches!(
                    parse_review(bad),
                    Err(PipelineError::EvaluationTransient(_))
                ),
                "should be transient: {bad:?}"
            );
        }
    }

    /// **Scenario**: The producer folds search hits into the draft prompt and
    /// the evaluator call failure surfaces as transient.
    #[tokio::test]
    async fn producer_researches_before_drafting() {
        use crate::capability::mock::{ScriptedGenerator, StaticSearch};
        use crate::capability::SearchHit;

        let llm = Arc::new(ScriptedGenerator::always("a fine draft"));
        let search = Arc::new(StaticSearch::new(vec![SearchHit {
            title: "Launch notes".to_string(),
            url: "https://n.example".to_string(),
            snippet: "all the details".to_string(),
        }]));
        let producer = ContentProducer::new(llm.clone()).with_search(search.clone());
        let task = TaskSpec::new("p", "announce the launch");

        let artifact = producer.produce(&task).await.unwrap();
        assert_eq!(artifact.content, "a fine draft");
        assert_eq!(search.calls(), 1);
        assert!(llm.prompts()[0].contains("Launch notes"));
    }

    /// **Scenario**: A failed review call is reported as EvaluationTransient.
    #[tokio::test]
    async fn failed_review_call_is_transient() {
        use crate::capability::mock::ScriptedGenerator;
        let llm = Arc::new(ScriptedGenerator::from_script(vec![Err(
            PipelineError::Generation("503".to_string()),
        )]));
        let evaluator = ContentEvaluator::new(llm);
        let artifact = CandidateArtifact::initial("draft");
        let task = TaskSpec::new("p", "objective");

        let result = evaluator.evaluate(&artifact, &task).await;
        assert!(matches!(
            result,
            Err(PipelineError::EvaluationTransient(_))
        ));
    }
}
