// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end controller tests over the scripted mock agent harness.

mod invariants;
mod pipelines;

use super::*;
use crate::error::ControllerError;
use convoy_core::{Health, JobSet, RunStatus};
use convoy_runner::test_support::MockConnector;
use std::time::Duration;

pub(super) fn agent_cfg(name: &str) -> AgentConfig {
    AgentConfig {
        name: name.into(),
        url: "localhost".into(),
        port: 9000,
        kind: "worker".into(),
        kv: HashMap::new(),
    }
}

/// Controller plus mock connector, agents registered but not started.
pub(super) fn setup(max_jobs: usize, agents: &[&str]) -> (Controller, MockConnector) {
    let controller = Controller::new(ControllerConfig::new("/vol", max_jobs));
    for name in agents {
        controller.add_agent(agent_cfg(name)).unwrap();
    }
    (controller, MockConnector::new())
}

/// Poll until the jobset exists and reaches its terminal status.
pub(super) async fn wait_for_stopped(controller: &Controller, js_id: JobSetId) -> JobSet {
    let deadline = Duration::from_secs(10);
    let poll = Duration::from_millis(10);
    let started = tokio::time::Instant::now();
    loop {
        if let Ok(js) = controller.get_job_set(js_id) {
            if js.run_status == RunStatus::Stopped {
                return js;
            }
        }
        if started.elapsed() > deadline {
            panic!("jobset {} did not stop within {:?}", js_id, deadline);
        }
        tokio::time::sleep(poll).await;
    }
}

#[tokio::test]
async fn agents_are_frozen_after_start() {
    let (controller, connector) = setup(4, &["a"]);
    connector.script("a", vec![]);
    controller.start(Arc::new(connector)).unwrap();

    let err = controller.add_agent(agent_cfg("late")).unwrap_err();
    assert_eq!(err, ControllerError::AgentsFrozen);

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn start_requires_at_least_one_agent() {
    let controller = Controller::new(ControllerConfig::new("/vol", 4));
    let err = controller.start(Arc::new(MockConnector::new())).unwrap_err();
    assert_eq!(err, ControllerError::NoAgentsRegistered);
}

#[tokio::test]
async fn repeated_starts_are_rejected() {
    let (controller, connector) = setup(4, &["a"]);
    controller.start(Arc::new(connector.clone())).unwrap();
    let err = controller.start(Arc::new(connector)).unwrap_err();
    assert_eq!(err, ControllerError::AlreadyStarted);
    controller.stop().await.unwrap();
}

#[tokio::test]
async fn duplicate_registrations_are_rejected() {
    let (controller, _connector) = setup(4, &["a"]);
    assert_eq!(
        controller.add_agent(agent_cfg("a")).unwrap_err(),
        ControllerError::AgentAlreadyRegistered("a".into())
    );

    let template = JobSetTemplate::new(
        "t",
        vec![convoy_core::StepTemplate::Agent { agent_name: "a".into() }],
    );
    controller.add_job_set_template(template.clone()).unwrap();
    assert_eq!(
        controller.add_job_set_template(template).unwrap_err(),
        ControllerError::TemplateAlreadyRegistered("t".into())
    );
}

#[tokio::test]
async fn templates_may_be_added_after_start() {
    let (controller, connector) = setup(4, &["a"]);
    connector.script("a", vec![convoy_runner::test_support::stopped_ok(0)]);
    controller.start(Arc::new(connector)).unwrap();

    let template = JobSetTemplate::new(
        "late",
        vec![convoy_core::StepTemplate::Agent { agent_name: "a".into() }],
    );
    controller.add_job_set_template(template).unwrap();

    let js_id = controller.start_job_set("late", HashMap::new()).await.unwrap();
    let js = wait_for_stopped(&controller, js_id).await;
    assert_eq!(js.health_status, Health::Ok);

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn start_job_set_requires_running_controller() {
    let (controller, _connector) = setup(4, &["a"]);
    let err = controller.start_job_set("t", HashMap::new()).await.unwrap_err();
    assert_eq!(err, ControllerError::NotRunning);
}

#[tokio::test]
async fn stop_without_start_is_an_error() {
    let (controller, _connector) = setup(4, &["a"]);
    assert_eq!(controller.stop().await.unwrap_err(), ControllerError::NotRunning);
}

#[tokio::test]
async fn stop_reaches_stopped_and_concludes_live_jobs() {
    let (controller, connector) = setup(4, &["a"]);
    // A job that would run far longer than the test.
    connector.script(
        "a",
        vec![
            convoy_runner::test_support::running_ok(0),
            convoy_runner::test_support::running_ok(60_000),
        ],
    );
    controller
        .add_job_set_template(JobSetTemplate::new(
            "t",
            vec![convoy_core::StepTemplate::Agent { agent_name: "a".into() }],
        ))
        .unwrap();
    controller.start(Arc::new(connector)).unwrap();

    let js_id = controller.start_job_set("t", HashMap::new()).await.unwrap();

    // Wait for the job to be dispatched and running.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let jobs = controller.get_all_jobs_for_job_set(js_id);
        if jobs.iter().any(|j| j.status.run_status == RunStatus::Running) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "job never started running");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    controller.stop().await.unwrap();

    let status = controller.status();
    assert_eq!(status.run_status, ControllerStatus::Stopped);

    // The drain surfaced a terminal record for the live job.
    let jobs = controller.get_all_jobs_for_job_set(js_id);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status.run_status, RunStatus::Stopped);

    // Requests after stop are refused.
    let err = controller.start_job_set("t", HashMap::new()).await.unwrap_err();
    assert_eq!(err, ControllerError::NotAcceptingRequests);
}

#[tokio::test]
async fn initial_status_is_not_started_and_healthy() {
    let (controller, _connector) = setup(4, &["a"]);
    let status = controller.status();
    assert_eq!(status.run_status, ControllerStatus::NotStarted);
    assert_eq!(status.health_status, Health::Ok);
    assert!(status.error_messages.is_empty());
}
