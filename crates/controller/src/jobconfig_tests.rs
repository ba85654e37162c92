// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::ControllerConfig;
use convoy_core::{Health, JobSetId, RunStatus, StatusReport, Step};
use std::collections::HashMap;

fn state() -> ControllerState {
    ControllerState::new(&ControllerConfig::new("/vol", 4))
}

fn job_set(id: u64, steps: Vec<Step>) -> JobSet {
    JobSet {
        job_set_id: JobSetId::new(id),
        template_name: "t".into(),
        run_status: RunStatus::Running,
        health_status: Health::Ok,
        time_started_ms: Some(0),
        time_finished_ms: None,
        steps,
        configs: HashMap::new(),
        output_messages: String::new(),
        error_messages: String::new(),
        parent_job_set_id: JobSetId::UNASSIGNED,
        parent_job_step_id: StepId::UNASSIGNED,
    }
}

fn agent_step(js: u64, id: u64, name: &str, job: u64) -> Step {
    Step::new(
        JobSetId::new(js),
        StepId::new(id),
        StepKind::Agent { agent_name: name.into(), job_id: JobId::new(job) },
    )
}

fn record_job(state: &mut ControllerState, job: u64, js: u64, step: u64, agent: &str) {
    state.jobs.insert(
        JobId::new(job),
        Job {
            job_id: JobId::new(job),
            job_set_id: JobSetId::new(js),
            job_set_step_id: StepId::new(step),
            job_set_step_order: step,
            agent_name: agent.into(),
            cfg: JobConfig::default(),
            status: StatusReport::startup(),
        },
    );
}

#[test]
fn output_dirs_and_sorted_jkvs() {
    let state = state();
    let mut js = job_set(3, vec![agent_step(3, 1, "writer", 0)]);
    js.configs.insert("zeta".into(), "2".into());
    js.configs.insert("alpha".into(), "1".into());

    let cfg = job_config_for_step(&state, &js, StepId::new(1), "writer", JobId::new(9));
    assert_eq!(cfg.code_output_dir, "/vol/code/3/writer/9");
    assert_eq!(cfg.spdx_output_dir, "/vol/spdx/3/writer/9");
    assert!(cfg.code_inputs.is_empty());
    assert_eq!(cfg.jkvs.len(), 2);
    assert_eq!(cfg.jkvs[0].key, "alpha");
    assert_eq!(cfg.jkvs[1].key, "zeta");
}

#[test]
fn prior_agent_leaves_become_inputs() {
    let mut state = state();
    let js = job_set(
        1,
        vec![
            agent_step(1, 1, "getter", 10),
            Step::new(
                JobSetId::new(1),
                StepId::new(2),
                StepKind::Concurrent {
                    children: vec![
                        agent_step(1, 3, "idsearcher", 11),
                        agent_step(1, 4, "licensee", 12),
                    ],
                },
            ),
            agent_step(1, 5, "writer", 0),
        ],
    );
    record_job(&mut state, 10, 1, 1, "getter");
    record_job(&mut state, 11, 1, 3, "idsearcher");
    record_job(&mut state, 12, 1, 4, "licensee");

    let cfg = job_config_for_step(&state, &js, StepId::new(5), "writer", JobId::new(13));
    let sources: Vec<&str> = cfg.code_inputs.iter().map(|i| i.source.as_str()).collect();
    assert_eq!(sources, vec!["getter.1.10", "idsearcher.1.11", "licensee.1.12"]);
    assert_eq!(cfg.code_inputs[0].paths, vec!["/vol/code/1/getter/10".to_string()]);
    assert_eq!(cfg.spdx_inputs[2].paths, vec!["/vol/spdx/1/licensee/12".to_string()]);
}

#[test]
fn prior_sub_pipeline_contributes_its_final_job() {
    let mut state = state();

    // Inner pipeline 2 whose final step ran job 20 on agent "b".
    let inner = job_set(2, vec![agent_step(2, 1, "b", 20)]);
    record_job(&mut state, 20, 2, 1, "b");
    state.job_sets.insert(JobSetId::new(2), inner);

    // Outer pipeline 1: [sub(inner), writer].
    let mut sub = Step::new(
        JobSetId::new(1),
        StepId::new(1),
        StepKind::SubJobSet {
            template_name: "inner".into(),
            sub_job_set_id: JobSetId::new(2),
            request_submitted: true,
        },
    );
    sub.run_status = RunStatus::Stopped;
    let outer = job_set(1, vec![sub, agent_step(1, 2, "writer", 0)]);

    let cfg = job_config_for_step(&state, &outer, StepId::new(2), "writer", JobId::new(30));
    assert_eq!(cfg.code_inputs.len(), 1);
    // The input is identified by the inner job's own identity.
    assert_eq!(cfg.code_inputs[0].source, "b.2.20");
    assert_eq!(cfg.code_inputs[0].paths, vec!["/vol/code/2/b/20".to_string()]);
}

#[test]
fn nested_final_job_is_found_through_pipelines() {
    let mut state = state();

    // Innermost pipeline 3 ends with job 40.
    let innermost = job_set(3, vec![agent_step(3, 1, "deep", 40)]);
    record_job(&mut state, 40, 3, 1, "deep");
    state.job_sets.insert(JobSetId::new(3), innermost);

    // Middle pipeline 2 ends with a sub-pipeline step referencing 3.
    let middle = job_set(
        2,
        vec![Step::new(
            JobSetId::new(2),
            StepId::new(1),
            StepKind::SubJobSet {
                template_name: "innermost".into(),
                sub_job_set_id: JobSetId::new(3),
                request_submitted: true,
            },
        )],
    );
    state.job_sets.insert(JobSetId::new(2), middle);

    let found = final_job_id(&state, &state.job_sets[&JobSetId::new(2)]);
    assert_eq!(found, Some(JobId::new(40)));
}

#[test]
fn missing_prior_jobs_are_skipped_silently() {
    let state = state();
    let js = job_set(
        1,
        vec![
            // Job 99 was never recorded; unassigned job on a second leaf.
            agent_step(1, 1, "getter", 99),
            agent_step(1, 2, "idsearcher", 0),
            agent_step(1, 3, "writer", 0),
        ],
    );

    let cfg = job_config_for_step(&state, &js, StepId::new(3), "writer", JobId::new(5));
    assert!(cfg.code_inputs.is_empty());
    assert!(cfg.spdx_inputs.is_empty());
}
