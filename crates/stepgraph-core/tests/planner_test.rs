//! End-to-end tests for `Planner` driven by a scripted model source.

use std::time::Duration;

use stepgraph_core::Planner;
use stepgraph_core::plan::{PlanError, PlanPolicy, ValidationError};
use stepgraph_core::source::SourceError;
use stepgraph_test_utils::{ScriptedSource, chain, diamond, record, response, wrapped_response};

fn planner(source: &ScriptedSource, policy: PlanPolicy) -> Planner {
    Planner::new(Box::new(source.clone()), policy)
}

#[tokio::test]
async fn generates_plan_from_scripted_response() {
    let source = ScriptedSource::new().respond(wrapped_response("diamond", &diamond()));
    let planner = planner(&source, PlanPolicy::default());

    let plan = planner.generate_plan("split the module").await.unwrap();
    assert_eq!(plan.user_request, "split the module");
    assert_eq!(plan.order(), vec!["step_1", "step_2", "step_3", "step_4"]);
    assert_eq!(plan.reasoning, "diamond");
}

#[tokio::test]
async fn prompt_carries_request_and_policy() {
    let source = ScriptedSource::new().respond(response(&chain(2)));
    let policy = PlanPolicy {
        require_reasoning: false,
        max_steps: 17,
    };
    let planner = planner(&source, policy).with_workspace("/srv/app");

    planner.generate_plan("add a healthcheck endpoint").await.unwrap();

    let prompts = source.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].ends_with("add a healthcheck endpoint\n"));
    assert!(prompts[0].contains("at most 17 steps"));
    assert!(prompts[0].contains("/srv/app"));
    assert_eq!(prompts[0], planner.prompt_for("add a healthcheck endpoint"));
}

#[tokio::test]
async fn source_failure_surfaces_without_parsing() {
    let source = ScriptedSource::new().fail(SourceError::Timeout(Duration::from_secs(30)));
    let planner = planner(&source, PlanPolicy::default());

    let err = planner.generate_plan("anything").await.unwrap_err();
    assert!(
        matches!(err, PlanError::Source(SourceError::Timeout(_))),
        "got {err}"
    );
}

#[tokio::test]
async fn invalid_response_is_reported() {
    let source = ScriptedSource::new().respond(response(&[record(1, "chmod", "bin/run", &[])]));
    let planner = planner(&source, PlanPolicy::default());

    let err = planner.generate_plan("make it executable").await.unwrap_err();
    assert!(
        matches!(err, PlanError::Validation(ValidationError::InvalidAction { .. })),
        "got {err}"
    );
}

#[tokio::test]
async fn require_reasoning_policy_applies() {
    let source = ScriptedSource::new().respond(response(&chain(3)));
    let policy = PlanPolicy {
        require_reasoning: true,
        ..PlanPolicy::default()
    };
    let planner = planner(&source, policy);

    let err = planner.generate_plan("r").await.unwrap_err();
    assert!(matches!(err, PlanError::MissingReasoning), "got {err}");
    assert!(source.prompts()[0].contains("`reasoning` field is required"));
}

#[tokio::test]
async fn calls_are_independent() {
    let source = ScriptedSource::new()
        .respond("not a plan")
        .respond(response(&chain(2)));
    let planner = planner(&source, PlanPolicy::default());

    assert!(planner.generate_plan("first").await.is_err());
    let plan = planner.generate_plan("second").await.unwrap();
    assert_eq!(plan.user_request, "second");
    assert_eq!(plan.steps.len(), 2);
}

#[tokio::test]
async fn availability_comes_from_the_source() {
    let up = planner(&ScriptedSource::new(), PlanPolicy::default());
    assert!(up.is_available().await);
    assert_eq!(up.source_name(), "scripted");

    let down = planner(&ScriptedSource::new().unavailable(), PlanPolicy::default());
    assert!(!down.is_available().await);
}
