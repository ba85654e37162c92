// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::ControllerConfig;
use crate::controller::apply_job_record;
use crate::instantiate::instantiate_pending;
use crate::status::ControllerStatus;
use convoy_core::{AgentConfig, FakeClock, JobConfig, JobId, JobSetTemplate, StepTemplate};
use convoy_runner::JobRecord;
use std::collections::HashMap;

fn setup(max_jobs: usize, agents: &[&str]) -> (ControllerState, FakeClock) {
    let mut state = ControllerState::new(&ControllerConfig::new("/vol", max_jobs));
    state.run_status = ControllerStatus::Running;
    state.open_for_requests = true;
    for name in agents {
        state.agents.insert(
            name.to_string(),
            AgentConfig {
                name: name.to_string(),
                url: "localhost".into(),
                port: 9000,
                kind: "worker".into(),
                kv: HashMap::new(),
            },
        );
    }
    (state, FakeClock::new())
}

fn agent(name: &str) -> StepTemplate {
    StepTemplate::Agent { agent_name: name.into() }
}

fn start(state: &mut ControllerState, clock: &FakeClock, template: &str) -> JobSetId {
    let id = state.alloc_job_set_id();
    state
        .pending_requests
        .push_back(convoy_core::JobSetRequest::root(template, HashMap::new(), id));
    instantiate_pending(state, clock);
    id
}

/// Deliver a terminal record for a job and run the next pass.
fn finish_job(
    state: &mut ControllerState,
    clock: &FakeClock,
    job_id: JobId,
    health: Health,
) -> Vec<convoy_runner::JobRequest> {
    let agent_name = state.jobs[&job_id].agent_name.clone();
    let status = StatusReport {
        run_status: RunStatus::Stopped,
        health_status: health,
        time_started_ms: None,
        time_finished_ms: None,
        output_messages: String::new(),
        error_messages: String::new(),
    };
    apply_job_record(
        state,
        &JobRecord { job_id, agent_name, cfg: JobConfig::default(), status },
        clock,
    );
    run_scheduler(state, clock)
}

#[test]
fn linear_template_runs_one_step_at_a_time() {
    let (mut state, clock) = setup(5, &["a", "b"]);
    state.templates.insert(
        "t".into(),
        JobSetTemplate::new("t", vec![agent("a"), agent("b")]),
    );
    let js_id = start(&mut state, &clock, "t");

    let first = run_scheduler(&mut state, &clock);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].agent_name, "a");
    assert_eq!(state.job_sets[&js_id].run_status, RunStatus::Running);

    // Nothing else starts while the first job runs.
    assert!(run_scheduler(&mut state, &clock).is_empty());

    let second = finish_job(&mut state, &clock, first[0].job_id, Health::Ok);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].agent_name, "b");
    assert!(second[0].job_id > first[0].job_id);

    let rest = finish_job(&mut state, &clock, second[0].job_id, Health::Ok);
    assert!(rest.is_empty());

    let js = &state.job_sets[&js_id];
    assert_eq!(js.run_status, RunStatus::Stopped);
    assert_eq!(js.health_status, Health::Ok);
    assert!(state.active_job_sets.is_empty());
    assert!(state.active_jobs.is_empty());
}

#[test]
fn concurrent_group_dispatches_in_one_pass() {
    let (mut state, clock) = setup(5, &["a", "b", "c"]);
    state.templates.insert(
        "t".into(),
        JobSetTemplate::new(
            "t",
            vec![
                StepTemplate::Concurrent { steps: vec![agent("a"), agent("b")] },
                agent("c"),
            ],
        ),
    );
    let js_id = start(&mut state, &clock, "t");

    let first = run_scheduler(&mut state, &clock);
    let names: Vec<&str> = first.iter().map(|r| r.agent_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);

    // c waits until both concurrent children stop.
    let after_a = finish_job(&mut state, &clock, first[0].job_id, Health::Ok);
    assert!(after_a.is_empty());

    let after_b = finish_job(&mut state, &clock, first[1].job_id, Health::Ok);
    assert_eq!(after_b.len(), 1);
    assert_eq!(after_b[0].agent_name, "c");

    // c's inputs cover both concurrent children.
    let sources: Vec<&str> =
        after_b[0].cfg.code_inputs.iter().map(|i| i.source.as_str()).collect();
    assert_eq!(sources.len(), 2);
    assert!(sources[0].starts_with("a."));
    assert!(sources[1].starts_with("b."));

    finish_job(&mut state, &clock, after_b[0].job_id, Health::Ok);
    assert_eq!(state.job_sets[&js_id].run_status, RunStatus::Stopped);
    assert_eq!(state.job_sets[&js_id].health_status, Health::Ok);
}

#[test]
fn concurrent_failure_blocks_followers() {
    let (mut state, clock) = setup(5, &["a", "b", "c"]);
    state.templates.insert(
        "t".into(),
        JobSetTemplate::new(
            "t",
            vec![
                StepTemplate::Concurrent { steps: vec![agent("a"), agent("b")] },
                agent("c"),
            ],
        ),
    );
    let js_id = start(&mut state, &clock, "t");
    let first = run_scheduler(&mut state, &clock);

    // a succeeds, b fails. Once both are stopped the group resolves to
    // error and c is never dispatched.
    assert!(finish_job(&mut state, &clock, first[0].job_id, Health::Ok).is_empty());
    assert!(finish_job(&mut state, &clock, first[1].job_id, Health::Error).is_empty());

    let js = &state.job_sets[&js_id];
    assert_eq!(js.run_status, RunStatus::Stopped);
    assert_eq!(js.health_status, Health::Error);
    assert!(!state.active_job_sets.contains(&js_id));
    // Only the two concurrent jobs ever existed.
    assert_eq!(state.jobs.len(), 2);
}

#[test]
fn degraded_outcome_does_not_block() {
    let (mut state, clock) = setup(5, &["a", "b"]);
    state.templates.insert(
        "t".into(),
        JobSetTemplate::new("t", vec![agent("a"), agent("b")]),
    );
    let js_id = start(&mut state, &clock, "t");

    let first = run_scheduler(&mut state, &clock);
    let second = finish_job(&mut state, &clock, first[0].job_id, Health::Degraded);
    assert_eq!(second.len(), 1);

    finish_job(&mut state, &clock, second[0].job_id, Health::Ok);
    let js = &state.job_sets[&js_id];
    assert_eq!(js.run_status, RunStatus::Stopped);
    assert_eq!(js.health_status, Health::Degraded);
}

#[test]
fn capacity_cap_is_never_exceeded() {
    let (mut state, clock) = setup(2, &["a"]);
    state.templates.insert(
        "t".into(),
        JobSetTemplate::new(
            "t",
            vec![StepTemplate::Concurrent {
                steps: vec![
                    StepTemplate::Concurrent { steps: vec![agent("a")] },
                    StepTemplate::Concurrent { steps: vec![agent("a")] },
                    StepTemplate::Concurrent { steps: vec![agent("a")] },
                    StepTemplate::Concurrent { steps: vec![agent("a")] },
                ],
            }],
        ),
    );
    start(&mut state, &clock, "t");

    let first = run_scheduler(&mut state, &clock);
    assert_eq!(first.len(), 2);
    assert_eq!(state.active_jobs.len(), 2);

    let mut completed = 0;
    let mut pending: Vec<JobId> = first.iter().map(|r| r.job_id).collect();
    while let Some(job_id) = pending.pop() {
        let next = finish_job(&mut state, &clock, job_id, Health::Ok);
        completed += 1;
        assert!(state.active_jobs.len() <= 2);
        pending.extend(next.iter().map(|r| r.job_id));
    }
    assert_eq!(completed, 4);
    assert_eq!(state.jobs.len(), 4);
}

#[test]
fn unknown_agent_fails_the_step_without_a_job() {
    let (mut state, clock) = setup(5, &["a"]);
    state
        .templates
        .insert("t".into(), JobSetTemplate::new("t", vec![agent("zz")]));
    let js_id = start(&mut state, &clock, "t");

    let dispatches = run_scheduler(&mut state, &clock);
    assert!(dispatches.is_empty());
    assert!(state.jobs.is_empty());

    // The next pass folds the errored step into the jobset.
    run_scheduler(&mut state, &clock);
    let js = &state.job_sets[&js_id];
    assert_eq!(js.run_status, RunStatus::Stopped);
    assert_eq!(js.health_status, Health::Error);
    assert!(js.error_messages.contains("zz"));
}

#[test]
fn sub_pipeline_waits_for_its_parent_step() {
    let (mut state, clock) = setup(5, &["a", "b", "c"]);
    state
        .templates
        .insert("inner".into(), JobSetTemplate::new("inner", vec![agent("b")]));
    state.templates.insert(
        "outer".into(),
        JobSetTemplate::new(
            "outer",
            vec![
                agent("a"),
                StepTemplate::SubJobSet { template_name: "inner".into() },
                agent("c"),
            ],
        ),
    );
    let outer_id = start(&mut state, &clock, "outer");
    let inner_id = state
        .job_sets
        .values()
        .find(|js| js.template_name == "inner")
        .map(|js| js.job_set_id)
        .unwrap();

    // Only a runs; the eagerly-created inner pipeline is dormant.
    let first = run_scheduler(&mut state, &clock);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].agent_name, "a");
    assert_eq!(state.job_sets[&inner_id].run_status, RunStatus::Startup);

    // a completes: inner wakes up and b dispatches.
    let second = finish_job(&mut state, &clock, first[0].job_id, Health::Ok);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].agent_name, "b");
    assert_eq!(state.job_sets[&inner_id].run_status, RunStatus::Running);

    // b completes: inner finishes, c dispatches with b's output as input.
    let third = finish_job(&mut state, &clock, second[0].job_id, Health::Ok);
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].agent_name, "c");
    assert_eq!(state.job_sets[&inner_id].run_status, RunStatus::Stopped);
    let sources: Vec<&str> =
        third[0].cfg.code_inputs.iter().map(|i| i.source.as_str()).collect();
    assert!(sources.iter().any(|s| s.starts_with("b.")));

    finish_job(&mut state, &clock, third[0].job_id, Health::Ok);
    assert_eq!(state.job_sets[&outer_id].run_status, RunStatus::Stopped);
    assert_eq!(state.job_sets[&outer_id].health_status, Health::Ok);
}

#[test]
fn startup_jobsets_are_promoted_to_running() {
    let (mut state, clock) = setup(5, &["a"]);
    state
        .templates
        .insert("t".into(), JobSetTemplate::new("t", vec![agent("a")]));
    let js_id = start(&mut state, &clock, "t");

    assert_eq!(state.job_sets[&js_id].run_status, RunStatus::Startup);
    run_scheduler(&mut state, &clock);
    assert_eq!(state.job_sets[&js_id].run_status, RunStatus::Running);
}
