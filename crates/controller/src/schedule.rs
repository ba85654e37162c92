// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler pass.
//!
//! Runs after every event the loop handles: retires stopped jobs and
//! pipelines, re-folds statuses, then walks active pipelines dispatching
//! ready agent steps up to the parallelism cap. Returns the job
//! requests to publish to the runner; the caller sends them after
//! releasing the state lock.

use crate::bubble::bubble_job_set;
use crate::jobconfig::job_config_for_step;
use crate::state::ControllerState;
use crate::steps::{find_step, find_step_mut, ready_frontier};
use convoy_core::{
    Clock, Health, Job, JobSetId, JobSetRequest, RunStatus, StatusReport, StepId, StepKind,
};
use convoy_runner::JobRequest;

/// The retire-and-fold half of a scheduler pass, also used on its own
/// while draining records during shutdown (no new dispatches then).
pub(crate) fn settle(state: &mut ControllerState, clock: &impl Clock) {
    // Retire stopped jobs from the active set. Their steps were already
    // updated when the terminal record arrived; the fold below bubbles
    // the change into their pipelines.
    let mut stopped: Vec<_> = state
        .active_jobs
        .iter()
        .copied()
        .filter(|id| state.jobs.get(id).is_none_or(|job| job.status.is_terminal()))
        .collect();
    stopped.sort();
    for job_id in stopped {
        if let Some(job) = state.jobs.get_mut(&job_id) {
            if job.status.time_finished_ms.is_none() {
                job.status.time_finished_ms = Some(clock.epoch_ms());
            }
        }
        state.active_jobs.remove(&job_id);
    }

    // Re-fold every active pipeline, children before parents: a child's
    // ID always exceeds its parent's, so descending ID order propagates
    // a child's terminal status to its parent within this same pass.
    let mut ids: Vec<JobSetId> = state.active_job_sets.iter().copied().collect();
    ids.sort_by(|a, b| b.cmp(a));
    for js_id in ids {
        bubble_job_set(state, js_id, clock);
    }

    // Retire stopped pipelines.
    let finished: Vec<_> = state
        .active_job_sets
        .iter()
        .copied()
        .filter(|id| state.job_sets.get(id).is_none_or(|js| !js.is_active()))
        .collect();
    for js_id in finished {
        state.active_job_sets.remove(&js_id);
    }
}

pub(crate) fn run_scheduler(state: &mut ControllerState, clock: &impl Clock) -> Vec<JobRequest> {
    settle(state, clock);

    let mut dispatches = Vec::new();
    if state.active_jobs.len() >= state.max_jobs_running {
        return dispatches;
    }

    // Readiness traversal, in ID order for determinism.
    let mut ids: Vec<JobSetId> = state.active_job_sets.iter().copied().collect();
    ids.sort();
    for js_id in ids {
        if !gate_open(state, js_id) {
            // A sub-pipeline stays dormant until its parent step is live.
            continue;
        }

        if let Some(js) = state.job_sets.get_mut(&js_id) {
            if js.run_status == RunStatus::Startup {
                js.run_status = RunStatus::Running;
            }
        }

        let frontier = match state.job_sets.get(&js_id) {
            Some(js) => ready_frontier(&js.steps),
            None => continue,
        };
        if frontier.blocked {
            // An errored step; the fold above has already terminated (or
            // will terminate) this pipeline.
            continue;
        }

        if state.open_for_requests {
            for step_id in &frontier.sub_job_sets {
                submit_sub_request(state, js_id, *step_id);
            }
        }

        for step_id in frontier.agents {
            if state.active_jobs.len() >= state.max_jobs_running {
                return dispatches;
            }
            if let Some(request) = dispatch_agent_step(state, js_id, step_id, clock) {
                dispatches.push(request);
            }
        }
    }

    dispatches
}

/// Enqueue the pipeline request for a ready sub-pipeline step that has
/// not been submitted yet. Normally requests are submitted eagerly at
/// instantiation; this path covers steps that missed that.
fn submit_sub_request(state: &mut ControllerState, js_id: JobSetId, step_id: StepId) {
    let Some(js) = state.job_sets.get(&js_id) else { return };
    let Some(step) = find_step(&js.steps, step_id) else { return };
    let template_name = match &step.kind {
        StepKind::SubJobSet { request_submitted: false, template_name, .. } => {
            template_name.clone()
        }
        _ => return,
    };

    let request = JobSetRequest {
        template_name,
        configs: js.configs.clone(),
        parent_job_set_id: js_id,
        parent_job_step_id: step_id,
        requested_job_set_id: JobSetId::UNASSIGNED,
    };
    state.pending_requests.push_back(request);

    if let Some(js) = state.job_sets.get_mut(&js_id) {
        if let Some(step) = find_step_mut(&mut js.steps, step_id) {
            if let StepKind::SubJobSet { request_submitted, .. } = &mut step.kind {
                *request_submitted = true;
            }
        }
    }
}

/// Turn one ready agent step into a job: allocate the ID, build the
/// config, record the job, promote the step. Returns the request for
/// the runner, or `None` when the step references an unknown agent (the
/// step is failed in place and no job is created).
fn dispatch_agent_step(
    state: &mut ControllerState,
    js_id: JobSetId,
    step_id: StepId,
    clock: &impl Clock,
) -> Option<JobRequest> {
    let agent_name = {
        let js = state.job_sets.get(&js_id)?;
        if !js.is_active() {
            // An earlier step in this pass already failed the pipeline.
            return None;
        }
        let step = find_step(&js.steps, step_id)?;
        match &step.kind {
            StepKind::Agent { agent_name, .. } => agent_name.clone(),
            _ => return None,
        }
    };

    if !state.agents.contains_key(&agent_name) {
        tracing::warn!(job_set_id = %js_id, step_id = %step_id, agent = %agent_name, "step references unknown agent");
        {
            let js = state.job_sets.get_mut(&js_id)?;
            if let Some(step) = find_step_mut(&mut js.steps, step_id) {
                step.run_status = RunStatus::Stopped;
                step.health_status = Health::Error;
            }
            js.error_messages
                .push_str(&format!("{} is not a known agent name\n", agent_name));
        }
        // Fold immediately: no further event will arrive to do it.
        bubble_job_set(state, js_id, clock);
        return None;
    }

    let job_id = state.alloc_job_id();
    let (cfg, step_order) = {
        let js = state.job_sets.get(&js_id)?;
        let cfg = job_config_for_step(state, js, step_id, &agent_name, job_id);
        let step = find_step(&js.steps, step_id)?;
        (cfg, step.step_order)
    };

    {
        let js = state.job_sets.get_mut(&js_id)?;
        let step = find_step_mut(&mut js.steps, step_id)?;
        step.run_status = RunStatus::Running;
        if let StepKind::Agent { job_id: assigned, .. } = &mut step.kind {
            *assigned = job_id;
        }
    }

    let mut status = StatusReport::startup();
    status.time_started_ms = Some(clock.epoch_ms());
    let job = Job {
        job_id,
        job_set_id: js_id,
        job_set_step_id: step_id,
        job_set_step_order: step_order,
        agent_name: agent_name.clone(),
        cfg: cfg.clone(),
        status,
    };
    state.jobs.insert(job_id, job);
    state.active_jobs.insert(job_id);

    tracing::info!(
        job_id = %job_id,
        job_set_id = %js_id,
        step_id = %step_id,
        agent = %agent_name,
        "job dispatched"
    );

    Some(JobRequest { job_id, agent_name, cfg })
}

/// Whether a pipeline is allowed to run. Root pipelines always are; a
/// sub-pipeline runs only once its parent step is live (already running,
/// or in its level's startup frontier), recursively up the parent chain.
fn gate_open(state: &ControllerState, js_id: JobSetId) -> bool {
    let mut current = match state.job_sets.get(&js_id) {
        Some(js) => js,
        None => return false,
    };

    loop {
        if !current.parent_job_set_id.is_assigned() {
            return true;
        }
        let Some(parent) = state.job_sets.get(&current.parent_job_set_id) else {
            return false;
        };
        let Some(step) = find_step(&parent.steps, current.parent_job_step_id) else {
            return false;
        };
        match step.run_status {
            RunStatus::Running => {}
            RunStatus::Startup => {
                let frontier = ready_frontier(&parent.steps);
                if frontier.blocked || !frontier.sub_job_sets.contains(&step.step_id) {
                    return false;
                }
            }
            _ => return false,
        }
        current = parent;
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
