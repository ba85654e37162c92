// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline scenarios driven end-to-end through the event loop.

use super::{setup, wait_for_stopped};
use convoy_core::{Health, JobSetTemplate, RunStatus, StepKind, StepTemplate};
use convoy_runner::test_support::{running_ok, stopped_error, stopped_ok};
use std::collections::HashMap;
use std::sync::Arc;

fn agent(name: &str) -> StepTemplate {
    StepTemplate::Agent { agent_name: name.into() }
}

#[tokio::test]
async fn linear_pipeline_happy_path() {
    let (controller, connector) = setup(5, &["a", "b"]);
    connector.script("a", vec![running_ok(5), stopped_ok(5)]);
    connector.script("b", vec![running_ok(5), stopped_ok(5)]);
    controller
        .add_job_set_template(JobSetTemplate::new("t", vec![agent("a"), agent("b")]))
        .unwrap();
    controller.start(Arc::new(connector.clone())).unwrap();

    let js_id = controller.start_job_set("t", HashMap::new()).await.unwrap();
    let js = wait_for_stopped(&controller, js_id).await;
    assert_eq!(js.health_status, Health::Ok);

    let jobs = controller.get_all_jobs_for_job_set(js_id);
    assert_eq!(jobs.len(), 2);
    let job_a = &jobs[0];
    let job_b = &jobs[1];
    assert_eq!(job_a.agent_name, "a");
    assert_eq!(job_b.agent_name, "b");
    assert!(job_a.job_id < job_b.job_id);
    assert_eq!(job_a.status.run_status, RunStatus::Stopped);
    assert_eq!(job_b.status.run_status, RunStatus::Stopped);

    // b's only input is a's output.
    let expected_source = format!("a.{}.{}", js_id, job_a.job_id);
    assert_eq!(job_b.cfg.code_inputs.len(), 1);
    assert_eq!(job_b.cfg.code_inputs[0].source, expected_source);
    assert_eq!(job_b.cfg.spdx_inputs[0].source, expected_source);
    assert_eq!(
        job_b.cfg.code_inputs[0].paths,
        vec![format!("/vol/code/{}/a/{}", js_id, job_a.job_id)]
    );
    assert!(job_a.cfg.code_inputs.is_empty());

    // Strictly sequential: the two sessions never overlapped.
    assert_eq!(connector.peak_sessions(), 1);

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn concurrent_group_runs_together_then_feeds_the_next_step() {
    let (controller, connector) = setup(5, &["a", "b", "c"]);
    connector.script("a", vec![running_ok(5), stopped_ok(20)]);
    connector.script("b", vec![running_ok(5), stopped_ok(20)]);
    connector.script("c", vec![stopped_ok(5)]);
    controller
        .add_job_set_template(JobSetTemplate::new(
            "t",
            vec![StepTemplate::Concurrent { steps: vec![agent("a"), agent("b")] }, agent("c")],
        ))
        .unwrap();
    controller.start(Arc::new(connector.clone())).unwrap();

    let js_id = controller.start_job_set("t", HashMap::new()).await.unwrap();
    let js = wait_for_stopped(&controller, js_id).await;
    assert_eq!(js.health_status, Health::Ok);

    let jobs = controller.get_all_jobs_for_job_set(js_id);
    assert_eq!(jobs.len(), 3);
    let job_c = jobs.iter().find(|j| j.agent_name == "c").unwrap();

    // c's inputs include entries for both concurrent children.
    let sources: Vec<&str> = job_c.cfg.code_inputs.iter().map(|i| i.source.as_str()).collect();
    assert_eq!(sources.len(), 2);
    assert!(sources.iter().any(|s| s.starts_with("a.")));
    assert!(sources.iter().any(|s| s.starts_with("b.")));

    // a and b overlapped; c ran alone afterwards.
    assert_eq!(connector.peak_sessions(), 2);

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn concurrent_failure_terminates_the_pipeline() {
    let (controller, connector) = setup(5, &["a", "b", "c"]);
    connector.script("a", vec![running_ok(5), stopped_ok(5)]);
    connector.script("b", vec![running_ok(5), stopped_error(10, "scan failed")]);
    connector.script("c", vec![stopped_ok(5)]);
    controller
        .add_job_set_template(JobSetTemplate::new(
            "t",
            vec![StepTemplate::Concurrent { steps: vec![agent("a"), agent("b")] }, agent("c")],
        ))
        .unwrap();
    controller.start(Arc::new(connector)).unwrap();

    let js_id = controller.start_job_set("t", HashMap::new()).await.unwrap();
    let js = wait_for_stopped(&controller, js_id).await;
    assert_eq!(js.health_status, Health::Error);

    // c was never dispatched.
    let jobs = controller.get_all_jobs_for_job_set(js_id);
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.agent_name != "c"));

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn capacity_cap_limits_parallel_dispatch() {
    let (controller, connector) = setup(2, &["a"]);
    connector.script("a", vec![running_ok(5), stopped_ok(20)]);
    // One concurrent group exposing four ready agent steps at once.
    controller
        .add_job_set_template(JobSetTemplate::new(
            "t",
            vec![StepTemplate::Concurrent {
                steps: vec![
                    StepTemplate::Concurrent { steps: vec![agent("a")] },
                    StepTemplate::Concurrent { steps: vec![agent("a")] },
                    StepTemplate::Concurrent { steps: vec![agent("a")] },
                    StepTemplate::Concurrent { steps: vec![agent("a")] },
                ],
            }],
        ))
        .unwrap();
    controller.start(Arc::new(connector.clone())).unwrap();

    let js_id = controller.start_job_set("t", HashMap::new()).await.unwrap();
    let js = wait_for_stopped(&controller, js_id).await;
    assert_eq!(js.health_status, Health::Ok);

    let jobs = controller.get_all_jobs_for_job_set(js_id);
    assert_eq!(jobs.len(), 4);
    assert!(jobs.iter().all(|j| j.status.run_status == RunStatus::Stopped));
    assert!(connector.peak_sessions() <= 2, "cap exceeded: {}", connector.peak_sessions());

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn sub_pipeline_composition() {
    let (controller, connector) = setup(5, &["a", "b", "c"]);
    connector.script("a", vec![stopped_ok(10)]);
    connector.script("b", vec![stopped_ok(10)]);
    connector.script("c", vec![stopped_ok(10)]);
    controller
        .add_job_set_template(JobSetTemplate::new("inner", vec![agent("b")]))
        .unwrap();
    controller
        .add_job_set_template(JobSetTemplate::new(
            "outer",
            vec![agent("a"), StepTemplate::SubJobSet { template_name: "inner".into() }, agent("c")],
        ))
        .unwrap();
    controller.start(Arc::new(connector.clone())).unwrap();

    let mut configs = HashMap::new();
    configs.insert("branch".to_string(), "main".to_string());
    let outer_id = controller.start_job_set("outer", configs).await.unwrap();
    let outer = wait_for_stopped(&controller, outer_id).await;
    assert_eq!(outer.health_status, Health::Ok);

    // Exactly one outer and one inner jobset exist.
    let all = controller.get_all_job_sets();
    assert_eq!(all.len(), 2);
    let inner = all.iter().find(|js| js.template_name == "inner").unwrap();

    // The sub step points at the inner pipeline, which points back.
    let sub_step_id = match &outer.steps[1].kind {
        StepKind::SubJobSet { sub_job_set_id, .. } => {
            assert_eq!(*sub_job_set_id, inner.job_set_id);
            outer.steps[1].step_id
        }
        other => panic!("expected sub-pipeline step, got {:?}", other),
    };
    assert_eq!(inner.parent_job_set_id, outer_id);
    assert_eq!(inner.parent_job_step_id, sub_step_id);

    // Inner inherited outer's configs.
    assert_eq!(inner.configs.get("branch").map(String::as_str), Some("main"));
    assert_eq!(inner.run_status, RunStatus::Stopped);
    assert_eq!(inner.health_status, Health::Ok);

    // Dispatch order was a, then b, then c; never overlapping.
    let jobs = controller.get_all_jobs();
    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[0].agent_name, "a");
    assert_eq!(jobs[1].agent_name, "b");
    assert_eq!(jobs[2].agent_name, "c");
    assert_eq!(connector.peak_sessions(), 1);

    // c's inputs include the entry derived from inner's final job (b).
    let job_b = &jobs[1];
    let job_c = &jobs[2];
    let expected = format!("b.{}.{}", inner.job_set_id, job_b.job_id);
    assert!(job_c.cfg.code_inputs.iter().any(|i| i.source == expected));

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_agent_fails_the_pipeline_without_jobs() {
    let (controller, connector) = setup(5, &["a"]);
    connector.script("a", vec![stopped_ok(0)]);
    controller
        .add_job_set_template(JobSetTemplate::new("t", vec![agent("zz")]))
        .unwrap();
    controller.start(Arc::new(connector)).unwrap();

    // Validation is deferred: the request itself succeeds.
    let js_id = controller.start_job_set("t", HashMap::new()).await.unwrap();
    let js = wait_for_stopped(&controller, js_id).await;
    assert_eq!(js.health_status, Health::Error);
    assert!(js.error_messages.contains("zz"));

    // No jobs were launched.
    assert!(controller.get_all_jobs_for_job_set(js_id).is_empty());

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_template_fails_the_pipeline() {
    let (controller, connector) = setup(5, &["a"]);
    connector.script("a", vec![stopped_ok(0)]);
    controller.start(Arc::new(connector)).unwrap();

    let js_id = controller.start_job_set("mystery", HashMap::new()).await.unwrap();
    let js = wait_for_stopped(&controller, js_id).await;
    assert_eq!(js.health_status, Health::Error);
    assert!(js.error_messages.contains("mystery"));

    controller.stop().await.unwrap();
}
