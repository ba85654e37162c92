// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline instantiation: turning queued JobSetRequests into JobSets.
//!
//! The pending queue is drained front-to-back and may grow while being
//! drained: building a step tree eagerly enqueues one request per
//! sub-pipeline step. Those nested requests are processed in the same
//! drain, so after `instantiate_pending` returns every requested
//! pipeline (at any nesting depth) exists.

use crate::state::ControllerState;
use crate::steps::find_step_mut;
use convoy_core::{
    Clock, Health, JobSet, JobSetId, JobSetRequest, RunStatus, Step, StepId, StepKind,
    StepTemplate,
};
use std::collections::{HashMap, VecDeque};

pub(crate) fn instantiate_pending(state: &mut ControllerState, clock: &impl Clock) {
    while let Some(jsr) = state.pending_requests.pop_front() {
        instantiate_one(state, jsr, clock);
    }
}

fn instantiate_one(state: &mut ControllerState, jsr: JobSetRequest, clock: &impl Clock) {
    let js_id = if jsr.requested_job_set_id.is_assigned() {
        jsr.requested_job_set_id
    } else {
        state.alloc_job_set_id()
    };
    let now = clock.epoch_ms();

    let mut js = JobSet {
        job_set_id: js_id,
        template_name: jsr.template_name.clone(),
        run_status: RunStatus::Startup,
        health_status: Health::Ok,
        time_started_ms: Some(now),
        time_finished_ms: None,
        steps: Vec::new(),
        configs: HashMap::new(),
        output_messages: String::new(),
        error_messages: String::new(),
        parent_job_set_id: jsr.parent_job_set_id,
        parent_job_step_id: jsr.parent_job_step_id,
    };

    let template_steps = state.templates.get(&jsr.template_name).map(|t| t.steps.clone());
    match template_steps {
        Some(template_steps) => {
            js.configs = jsr.configs.clone();
            let mut next_step_id = 1;
            js.steps = build_steps(
                js_id,
                &js.configs,
                &template_steps,
                &mut next_step_id,
                &mut state.pending_requests,
            );
            if js.steps.is_empty() {
                // Nothing to run: immediately terminal, healthy.
                js.run_status = RunStatus::Stopped;
                js.time_finished_ms = Some(now);
            }
            tracing::info!(
                job_set_id = %js_id,
                template = %jsr.template_name,
                steps = js.steps.len(),
                "jobset instantiated"
            );
        }
        None => {
            tracing::warn!(job_set_id = %js_id, template = %jsr.template_name, "unknown template");
            js.error_messages =
                format!("{} is not a known jobset template name", jsr.template_name);
            js.run_status = RunStatus::Stopped;
            js.health_status = Health::Error;
            js.time_finished_ms = Some(now);
        }
    }

    state.job_sets.insert(js_id, js);
    state.active_job_sets.insert(js_id);

    // Tell the parent step which pipeline fulfills it. This runs even
    // when the template was unknown, so the parent observes the failed
    // sub-pipeline instead of waiting on it forever.
    if jsr.parent_job_set_id.is_assigned() {
        write_back_parent(state, js_id, jsr.parent_job_set_id, jsr.parent_job_step_id);
    }
}

/// Build a step tree from template steps, assigning IDs depth-first and
/// eagerly enqueueing one request per sub-pipeline step. Those requests
/// are born submitted, so a sub-pipeline is instantiated exactly once.
fn build_steps(
    js_id: JobSetId,
    configs: &HashMap<String, String>,
    templates: &[StepTemplate],
    next_step_id: &mut u64,
    pending: &mut VecDeque<JobSetRequest>,
) -> Vec<Step> {
    let mut steps = Vec::with_capacity(templates.len());
    for template in templates {
        let step_id = StepId::new(*next_step_id);
        *next_step_id += 1;

        let kind = match template {
            StepTemplate::Agent { agent_name } => StepKind::Agent {
                agent_name: agent_name.clone(),
                job_id: convoy_core::JobId::UNASSIGNED,
            },
            StepTemplate::SubJobSet { template_name } => {
                pending.push_back(JobSetRequest {
                    template_name: template_name.clone(),
                    configs: configs.clone(),
                    parent_job_set_id: js_id,
                    parent_job_step_id: step_id,
                    requested_job_set_id: JobSetId::UNASSIGNED,
                });
                StepKind::SubJobSet {
                    template_name: template_name.clone(),
                    sub_job_set_id: JobSetId::UNASSIGNED,
                    request_submitted: true,
                }
            }
            StepTemplate::Concurrent { steps: children } => StepKind::Concurrent {
                children: build_steps(js_id, configs, children, next_step_id, pending),
            },
        };

        steps.push(Step::new(js_id, step_id, kind));
    }
    steps
}

fn write_back_parent(
    state: &mut ControllerState,
    js_id: JobSetId,
    parent_id: JobSetId,
    parent_step_id: StepId,
) {
    let fault = match state.job_sets.get_mut(&parent_id) {
        None => Some(format!(
            "jobset request named parent ID {} but no such jobset exists",
            parent_id
        )),
        Some(parent) => match find_step_mut(&mut parent.steps, parent_step_id) {
            None => Some(format!(
                "jobset request named step ID {} in parent jobset {} but no such step exists",
                parent_step_id, parent_id
            )),
            Some(step) => match &mut step.kind {
                StepKind::SubJobSet { sub_job_set_id, .. } => {
                    *sub_job_set_id = js_id;
                    None
                }
                _ => Some(format!(
                    "step ID {} in parent jobset {} is not a sub-pipeline step",
                    parent_step_id, parent_id
                )),
            },
        },
    };

    if let Some(msg) = fault {
        mark_corrupt(state, js_id);
        state.record_fault(msg);
    }
}

/// A parent-pointer failure is a data-integrity bug; the affected
/// pipeline is failed in place before the controller escalates.
fn mark_corrupt(state: &mut ControllerState, js_id: JobSetId) {
    if let Some(js) = state.job_sets.get_mut(&js_id) {
        js.run_status = RunStatus::Stopped;
        js.health_status = Health::Error;
        js.error_messages.push_str("parent jobset lookup failed\n");
    }
}

#[cfg(test)]
#[path = "instantiate_tests.rs"]
mod tests;
