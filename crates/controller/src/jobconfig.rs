// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deriving the JobConfig for a ready agent step.
//!
//! Output directories follow the volume path scheme; inputs are built
//! from every prior leaf at the step's structural level. A prior
//! sub-pipeline contributes its final agent job. Missing jobs or
//! pipelines are skipped silently: the step just runs with fewer inputs.

use crate::state::ControllerState;
use crate::steps::{final_step, prior_leaves, PriorLeaf};
use convoy_core::{paths, InputSpec, Job, JobConfig, JobId, JobKv, JobSet, StepId, StepKind};

pub(crate) fn job_config_for_step(
    state: &ControllerState,
    js: &JobSet,
    step_id: StepId,
    agent_name: &str,
    job_id: JobId,
) -> JobConfig {
    let mut cfg = JobConfig {
        code_output_dir: paths::code_output_dir(&state.vol_prefix, js.job_set_id, agent_name, job_id),
        spdx_output_dir: paths::spdx_output_dir(&state.vol_prefix, js.job_set_id, agent_name, job_id),
        ..JobConfig::default()
    };

    for leaf in prior_leaves(&js.steps, step_id) {
        let prior_job = match leaf {
            PriorLeaf::Agent(prior_id) => lookup_job(state, prior_id),
            PriorLeaf::SubJobSet(sub_id) => {
                if !sub_id.is_assigned() {
                    continue;
                }
                state
                    .job_sets
                    .get(&sub_id)
                    .and_then(|sub| final_job_id(state, sub))
                    .and_then(|final_id| lookup_job(state, final_id))
            }
        };
        let Some(job) = prior_job else { continue };

        let (source, code_path) =
            paths::code_input(&state.vol_prefix, job.job_set_id, &job.agent_name, job.job_id);
        cfg.code_inputs.push(InputSpec { source, paths: vec![code_path] });

        let (source, spdx_path) =
            paths::spdx_input(&state.vol_prefix, job.job_set_id, &job.agent_name, job.job_id);
        cfg.spdx_inputs.push(InputSpec { source, paths: vec![spdx_path] });
    }

    // Materialize the jobset configs in a stable order.
    let mut keys: Vec<&String> = js.configs.keys().collect();
    keys.sort();
    cfg.jkvs = keys
        .into_iter()
        .map(|key| JobKv { key: key.clone(), value: js.configs[key].clone() })
        .collect();

    cfg
}

fn lookup_job(state: &ControllerState, job_id: JobId) -> Option<&Job> {
    if !job_id.is_assigned() {
        return None;
    }
    state.jobs.get(&job_id)
}

/// The job that produced a pipeline's final output: the job of its
/// structurally final step, descending into nested pipelines.
pub(crate) fn final_job_id(state: &ControllerState, js: &JobSet) -> Option<JobId> {
    let last = final_step(&js.steps)?;
    match &last.kind {
        StepKind::Agent { job_id, .. } => job_id.is_assigned().then_some(*job_id),
        StepKind::SubJobSet { sub_job_set_id, .. } => {
            if !sub_job_set_id.is_assigned() {
                return None;
            }
            let sub = state.job_sets.get(sub_job_set_id)?;
            final_job_id(state, sub)
        }
        StepKind::Concurrent { .. } => None,
    }
}

#[cfg(test)]
#[path = "jobconfig_tests.rs"]
mod tests;
