//! Integration tests for the revision loop: budget, gate, retry, timeout,
//! and cancellation behavior.

mod init_logging;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use burnish::pipeline::{LoopSettings, RevisionLoop};
use burnish::stage::mock::{RecordingRefiner, ScriptedEvaluator, StaticProducer};
use burnish::{Evaluation, PipelineError, TaskSpec, TerminalReason};

fn task() -> TaskSpec {
    TaskSpec::new("t1", "write something good")
}

fn settings(max_iterations: u32) -> LoopSettings {
    LoopSettings {
        max_iterations,
        approval_threshold: 7,
        stage_timeout: None,
    }
}

fn reject(feedback: &str) -> Evaluation {
    Evaluation::new(3, true, vec![feedback.to_string()])
}

/// An always-rejecting evaluator exhausts the budget: the final artifact is
/// version `max_iterations`, the outcome carries the rejecting evaluation,
/// and the refiner ran exactly `max_iterations` times.
#[tokio::test]
async fn always_reject_exhausts_budget() {
    init_logging::init();
    let evaluator = Arc::new(ScriptedEvaluator::always(reject("not good enough")));
    let refiner = Arc::new(RecordingRefiner::new());
    let pipeline = RevisionLoop::new(
        Arc::new(StaticProducer::new("draft")),
        evaluator.clone(),
        refiner.clone(),
        settings(3),
    );

    let outcome = pipeline.run(&task()).await.unwrap();

    assert_eq!(outcome.reason, TerminalReason::Exhausted);
    assert_eq!(outcome.iterations_used, 3);
    assert_eq!(outcome.artifact.version, 3);
    assert!(!outcome.evaluation.approved);
    assert_eq!(outcome.evaluation.feedback, vec!["not good enough"]);
    // One evaluation per version: initial draft plus three revisions.
    assert_eq!(evaluator.calls(), 4);
    assert_eq!(refiner.calls(), 3);
}

/// A score exactly at the threshold approves (inclusive boundary).
#[tokio::test]
async fn score_at_threshold_approves() {
    init_logging::init();
    let pipeline = RevisionLoop::new(
        Arc::new(StaticProducer::new("draft")),
        Arc::new(ScriptedEvaluator::always(Evaluation::new(7, true, vec![]))),
        Arc::new(RecordingRefiner::new()),
        settings(3),
    );

    let outcome = pipeline.run(&task()).await.unwrap();
    assert_eq!(outcome.reason, TerminalReason::Approved);
    assert_eq!(outcome.evaluation.score, 7);
}

/// With max_iterations = 0 a rejected first draft is returned exhausted
/// without any refinement.
#[tokio::test]
async fn zero_budget_evaluates_once_and_exhausts() {
    init_logging::init();
    let refiner = Arc::new(RecordingRefiner::new());
    let pipeline = RevisionLoop::new(
        Arc::new(StaticProducer::new("draft")),
        Arc::new(ScriptedEvaluator::always(reject("needs work"))),
        refiner.clone(),
        settings(0),
    );

    let outcome = pipeline.run(&task()).await.unwrap();

    assert_eq!(outcome.reason, TerminalReason::Exhausted);
    assert_eq!(outcome.iterations_used, 0);
    assert_eq!(outcome.artifact.version, 0);
    assert_eq!(refiner.calls(), 0);
}

/// A failing producer is fatal before the evaluator or refiner ever runs.
#[tokio::test]
async fn producer_failure_is_fatal_with_zero_downstream_calls() {
    init_logging::init();
    let evaluator = Arc::new(ScriptedEvaluator::always(Evaluation::new(9, true, vec![])));
    let refiner = Arc::new(RecordingRefiner::new());
    let pipeline = RevisionLoop::new(
        Arc::new(StaticProducer::failing("model unavailable")),
        evaluator.clone(),
        refiner.clone(),
        settings(3),
    );

    let result = pipeline.run(&task()).await;

    assert!(matches!(result, Err(PipelineError::Fatal(_))));
    assert_eq!(evaluator.calls(), 0);
    assert_eq!(refiner.calls(), 0);
}

/// A transient evaluator failure is retried exactly once at the same
/// iteration and does not consume revision budget.
#[tokio::test]
async fn evaluator_transient_retried_once_without_consuming_budget() {
    init_logging::init();
    let evaluator = Arc::new(ScriptedEvaluator::from_script(vec![
        Err(PipelineError::EvaluationTransient("hiccup".to_string())),
        Ok(Evaluation::new(8, true, vec![])),
    ]));
    let pipeline = RevisionLoop::new(
        Arc::new(StaticProducer::new("draft")),
        evaluator.clone(),
        Arc::new(RecordingRefiner::new()),
        settings(3),
    );

    let outcome = pipeline.run(&task()).await.unwrap();

    assert_eq!(outcome.reason, TerminalReason::Approved);
    assert_eq!(outcome.iterations_used, 0);
    assert_eq!(evaluator.calls(), 2);
}

/// A second consecutive transient failure escalates to fatal.
#[tokio::test]
async fn evaluator_transient_twice_escalates_to_fatal() {
    init_logging::init();
    let evaluator = Arc::new(ScriptedEvaluator::from_script(vec![
        Err(PipelineError::EvaluationTransient("hiccup".to_string())),
        Err(PipelineError::EvaluationTransient("hiccup again".to_string())),
    ]));
    let pipeline = RevisionLoop::new(
        Arc::new(StaticProducer::new("draft")),
        evaluator.clone(),
        Arc::new(RecordingRefiner::new()),
        settings(3),
    );

    let result = pipeline.run(&task()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, PipelineError::Fatal(_)));
    assert!(err.to_string().contains("after retry"));
    assert_eq!(evaluator.calls(), 2);
}

/// A RejectedQuery from the evaluator propagates unchanged: no retry, no
/// refinement, no rewrapping.
#[tokio::test]
async fn rejected_query_propagates_unchanged() {
    init_logging::init();
    let evaluator = Arc::new(ScriptedEvaluator::from_script(vec![Err(
        PipelineError::RejectedQuery("forbidden keyword: DROP".to_string()),
    )]));
    let refiner = Arc::new(RecordingRefiner::new());
    let pipeline = RevisionLoop::new(
        Arc::new(StaticProducer::new("DROP TABLE users")),
        evaluator.clone(),
        refiner.clone(),
        settings(3),
    );

    let result = pipeline.run(&task()).await;

    match result {
        Err(PipelineError::RejectedQuery(m)) => assert_eq!(m, "forbidden keyword: DROP"),
        other => panic!("expected RejectedQuery, got {other:?}"),
    }
    assert_eq!(evaluator.calls(), 1);
    assert_eq!(refiner.calls(), 0);
}

/// A slow producer trips the stage timeout and fails the run.
#[tokio::test]
async fn producer_timeout_is_fatal() {
    init_logging::init();
    let pipeline = RevisionLoop::new(
        Arc::new(StaticProducer::new("draft").with_delay(Duration::from_secs(60))),
        Arc::new(ScriptedEvaluator::always(Evaluation::new(9, true, vec![]))),
        Arc::new(RecordingRefiner::new()),
        LoopSettings {
            max_iterations: 3,
            approval_threshold: 7,
            stage_timeout: Some(Duration::from_millis(20)),
        },
    );

    let result = pipeline.run(&task()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, PipelineError::Fatal(_)));
    assert!(err.to_string().contains("timed out"));
}

/// A slow evaluator counts as transient: one retry, then fatal.
#[tokio::test]
async fn evaluator_timeout_counts_as_transient() {
    init_logging::init();
    let evaluator = Arc::new(
        ScriptedEvaluator::always(Evaluation::new(9, true, vec![]))
            .with_delay(Duration::from_secs(60)),
    );
    let pipeline = RevisionLoop::new(
        Arc::new(StaticProducer::new("draft")),
        evaluator.clone(),
        Arc::new(RecordingRefiner::new()),
        LoopSettings {
            max_iterations: 3,
            approval_threshold: 7,
            stage_timeout: Some(Duration::from_millis(20)),
        },
    );

    let result = pipeline.run(&task()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, PipelineError::Fatal(_)));
    // Timed out, retried once, timed out again.
    assert_eq!(evaluator.calls(), 2);
}

/// A pre-cancelled token fails fast with Cancelled and performs zero stage
/// calls.
#[tokio::test]
async fn pre_cancelled_token_performs_no_stage_calls() {
    init_logging::init();
    let producer = Arc::new(StaticProducer::new("draft"));
    let evaluator = Arc::new(ScriptedEvaluator::always(Evaluation::new(9, true, vec![])));
    let refiner = Arc::new(RecordingRefiner::new());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let pipeline = RevisionLoop::new(producer.clone(), evaluator.clone(), refiner.clone(), settings(3))
        .with_cancellation(cancel);

    let result = pipeline.run(&task()).await;

    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert_eq!(producer.calls(), 0);
    assert_eq!(evaluator.calls(), 0);
    assert_eq!(refiner.calls(), 0);
}

/// Cancelling during an in-flight stage aborts the run with Cancelled.
#[tokio::test]
async fn cancellation_races_in_flight_stage() {
    init_logging::init();
    let cancel = CancellationToken::new();
    let pipeline = RevisionLoop::new(
        Arc::new(StaticProducer::new("draft").with_delay(Duration::from_secs(60))),
        Arc::new(ScriptedEvaluator::always(Evaluation::new(9, true, vec![]))),
        Arc::new(RecordingRefiner::new()),
        settings(3),
    )
    .with_cancellation(cancel.clone());

    let handle = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run(&TaskSpec::new("t", "slow")).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(PipelineError::Cancelled)));
}
