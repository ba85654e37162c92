// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests: randomized step trees driven to completion against
//! the scripted agent harness, checking the structural invariants.

use super::{setup, wait_for_stopped};
use crate::state::ControllerState;
use convoy_core::{JobId, JobSetTemplate, RunStatus, Step, StepKind, StepTemplate};
use convoy_runner::test_support::{running_ok, stopped_degraded, stopped_ok};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

const MAX_JOBS: usize = 3;

fn arb_step_tree(depth: u32) -> BoxedStrategy<StepTemplate> {
    let leaf = prop_oneof![
        Just(StepTemplate::Agent { agent_name: "alpha".into() }),
        Just(StepTemplate::Agent { agent_name: "beta".into() }),
        Just(StepTemplate::Agent { agent_name: "gamma".into() }),
        Just(StepTemplate::SubJobSet { template_name: "leaf".into() }),
    ];
    if depth == 0 {
        leaf.boxed()
    } else {
        prop_oneof![
            3 => leaf,
            1 => proptest::collection::vec(arb_step_tree(depth - 1), 1..3)
                .prop_map(|steps| StepTemplate::Concurrent { steps }),
        ]
        .boxed()
    }
}

/// Every sub-pipeline step in a finished tree must reference a stopped
/// pipeline whose parent pointers point back at the step.
fn check_sub_steps(state: &ControllerState, steps: &[Step]) {
    for step in steps {
        match &step.kind {
            StepKind::SubJobSet { sub_job_set_id, .. } => {
                assert!(sub_job_set_id.is_assigned(), "unresolved sub-pipeline step");
                let sub = state
                    .job_sets
                    .get(sub_job_set_id)
                    .unwrap_or_else(|| panic!("sub-jobset {} missing", sub_job_set_id));
                assert_eq!(sub.parent_job_set_id, step.job_set_id);
                assert_eq!(sub.parent_job_step_id, step.step_id);
            }
            StepKind::Concurrent { children } => check_sub_steps(state, children),
            StepKind::Agent { .. } => {}
        }
    }
}

async fn drive(steps: Vec<StepTemplate>) {
    let (controller, connector) = setup(MAX_JOBS, &["alpha", "beta", "gamma"]);
    connector.script("alpha", vec![running_ok(1), stopped_ok(1)]);
    connector.script("beta", vec![running_ok(1), stopped_degraded(1)]);
    connector.script("gamma", vec![stopped_ok(1)]);

    controller
        .add_job_set_template(JobSetTemplate::new(
            "leaf",
            vec![StepTemplate::Agent { agent_name: "alpha".into() }],
        ))
        .unwrap();
    controller.add_job_set_template(JobSetTemplate::new("root", steps)).unwrap();
    controller.start(Arc::new(connector.clone())).unwrap();

    let root_id = controller.start_job_set("root", HashMap::new()).await.unwrap();
    wait_for_stopped(&controller, root_id).await;

    // Give trailing sub-pipelines a moment, then wait for every pipeline
    // to settle (concurrent leaves can outlive the root's terminal fold
    // only briefly; normally everything stops with the root).
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
    loop {
        let all = controller.get_all_job_sets();
        if !all.is_empty() && all.iter().all(|js| js.run_status == RunStatus::Stopped) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "pipelines never settled");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    // The cap held the whole run.
    assert!(
        connector.peak_sessions() <= MAX_JOBS,
        "cap exceeded: {} > {}",
        connector.peak_sessions(),
        MAX_JOBS
    );

    let state = controller.state.read();

    // Active sets drained, and were always subsets of the main maps.
    for job_id in &state.active_jobs {
        assert!(state.jobs.contains_key(job_id));
    }
    for js_id in &state.active_job_sets {
        assert!(state.job_sets.contains_key(js_id));
    }

    // IDs are unique and monotonic from 1.
    let mut job_ids: Vec<JobId> = state.jobs.keys().copied().collect();
    job_ids.sort();
    for (index, job_id) in job_ids.iter().enumerate() {
        assert_eq!(job_id.value(), index as u64 + 1);
    }

    // Every job the controller created reached a terminal status.
    for job in state.jobs.values() {
        assert!(job.status.is_terminal(), "job {} never concluded", job.job_id);
        assert!(job.status.time_started_ms.is_some());
    }

    // Parent pointers are consistent across every step tree.
    for js in state.job_sets.values() {
        check_sub_steps(&state, &js.steps);
    }

    // No pipeline is left unfinished.
    for js in state.job_sets.values() {
        assert_eq!(js.run_status, RunStatus::Stopped, "jobset {} still live", js.job_set_id);
    }
    assert!(state.pending_requests.is_empty());

    drop(state);
    controller.stop().await.unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 12, ..ProptestConfig::default() })]

    #[test]
    fn random_pipelines_preserve_invariants(
        steps in proptest::collection::vec(arb_step_tree(3), 1..4)
    ) {
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
        runtime.block_on(drive(steps));
    }
}
