// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status bubbling: folding step statuses up to their JobSet.
//!
//! The fold recomputes a JobSet's `(run, health)` from its step tree.
//! Concurrent groups fold their children into themselves first;
//! sub-pipeline steps copy their pipeline's current status. The fold is
//! idempotent: applying it twice with no intervening update yields the
//! same result.

use crate::state::ControllerState;
use convoy_core::{Clock, Health, JobSet, JobSetId, RunStatus, Step, StepKind};
use std::collections::HashMap;

/// Fold one step list. Returns the `(run, health)` to merge into the
/// owner, with `Same` meaning "leave unchanged". Missing sub-pipeline
/// references are reported in `diags`; they indicate state corruption.
pub(crate) fn fold_steps(
    job_sets: &HashMap<JobSetId, JobSet>,
    steps: &mut [Step],
    diags: &mut Vec<String>,
) -> (RunStatus, Health) {
    let mut all_stopped = true;
    let mut out_status = RunStatus::Same;
    let mut out_health = Health::Same;

    for step in steps {
        match &mut step.kind {
            StepKind::Concurrent { children } => {
                let (sub_status, sub_health) = fold_steps(job_sets, children, diags);
                step.run_status.merge(sub_status);
                step.health_status.merge(sub_health);
            }
            StepKind::SubJobSet { sub_job_set_id, .. } => {
                if sub_job_set_id.is_assigned() {
                    match job_sets.get(sub_job_set_id) {
                        Some(sub) => {
                            step.run_status = sub.run_status;
                            step.health_status = sub.health_status;
                        }
                        None => diags.push(format!(
                            "step {} in jobset {} references unknown sub-jobset {}",
                            step.step_id, step.job_set_id, sub_job_set_id
                        )),
                    }
                }
            }
            // Agent steps carry their job's latest status already.
            StepKind::Agent { .. } => {}
        }

        if step.run_status != RunStatus::Stopped {
            all_stopped = false;
        }
        if step.health_status == Health::Degraded && out_health != Health::Error {
            out_health = Health::Degraded;
        }
        if step.health_status == Health::Error {
            // An errored child terminates the whole list in error.
            out_status = RunStatus::Stopped;
            out_health = Health::Error;
        }
    }

    if all_stopped {
        out_status = RunStatus::Stopped;
    }

    (out_status, out_health)
}

/// Recompute one JobSet's status from its steps and apply it.
pub(crate) fn bubble_job_set(state: &mut ControllerState, js_id: JobSetId, clock: &impl Clock) {
    // Take the steps out so the fold can consult other jobsets in the
    // map. A step never references its own jobset (IDs are allocated
    // parent-first), so the emptied entry is not consulted.
    let Some(js) = state.job_sets.get_mut(&js_id) else {
        return;
    };
    let mut steps = std::mem::take(&mut js.steps);
    let was_stopped = js.run_status == RunStatus::Stopped;

    let mut diags = Vec::new();
    let (run, health) = fold_steps(&state.job_sets, &mut steps, &mut diags);

    let Some(js) = state.job_sets.get_mut(&js_id) else {
        return;
    };
    js.steps = steps;
    if !was_stopped {
        // Terminal status is final; a stopped jobset is never revived.
        js.run_status.merge(run);
        js.health_status.merge(health);
        if js.run_status == RunStatus::Stopped && js.time_finished_ms.is_none() {
            js.time_finished_ms = Some(clock.epoch_ms());
            tracing::info!(
                job_set_id = %js_id,
                health = %js.health_status,
                "jobset finished"
            );
        }
    }

    for diag in diags {
        state.record_fault(diag);
    }
}

#[cfg(test)]
#[path = "bubble_tests.rs"]
mod tests;
