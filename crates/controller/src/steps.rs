// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step tree traversal.
//!
//! Steps form a recursive tree of agent, sub-pipeline and concurrent
//! nodes. There are no parent pointers; every question is answered by
//! descent from a JobSet's top-level step list.

use convoy_core::{Health, JobId, JobSetId, RunStatus, Step, StepId, StepKind};

/// Result of a readiness walk over one step list.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Frontier {
    /// Agent steps ready to dispatch, in depth-first order.
    pub agents: Vec<StepId>,
    /// Sub-pipeline steps at the frontier, whether or not their request
    /// has been submitted yet. Dispatch filters on `request_submitted`;
    /// gating of dormant sub-pipelines checks membership here.
    pub sub_job_sets: Vec<StepId>,
    /// A step has stopped in error (or carries an invalid status);
    /// nothing further may start at this level.
    pub blocked: bool,
}

impl Frontier {
    fn blocked() -> Self {
        Self { blocked: true, ..Self::default() }
    }
}

/// Walk a step list in order and find the current frontier: the steps
/// that are ready to start now.
///
/// A running predecessor means nothing else can start at this level. A
/// stopped predecessor is skipped unless it stopped in error, which
/// blocks the whole level. The first `startup` step is the frontier; a
/// concurrent frontier contributes every `startup` descendant.
pub(crate) fn ready_frontier(steps: &[Step]) -> Frontier {
    for step in steps {
        match step.run_status {
            RunStatus::Running => return Frontier::default(),
            RunStatus::Stopped => {
                if step.health_status == Health::Error {
                    return Frontier::blocked();
                }
            }
            RunStatus::Startup => {
                let mut frontier = Frontier::default();
                match &step.kind {
                    StepKind::Agent { .. } => frontier.agents.push(step.step_id),
                    StepKind::SubJobSet { .. } => frontier.sub_job_sets.push(step.step_id),
                    StepKind::Concurrent { children } => collect_startup(children, &mut frontier),
                }
                return frontier;
            }
            RunStatus::Same => return Frontier::blocked(),
        }
    }
    // All steps stopped cleanly; nothing left to start.
    Frontier::default()
}

/// Collect every `startup` descendant of a concurrent subtree,
/// unfolding nested concurrent groups.
fn collect_startup(steps: &[Step], frontier: &mut Frontier) {
    for step in steps {
        if step.run_status != RunStatus::Startup {
            continue;
        }
        match &step.kind {
            StepKind::Agent { .. } => frontier.agents.push(step.step_id),
            StepKind::SubJobSet { .. } => frontier.sub_job_sets.push(step.step_id),
            StepKind::Concurrent { children } => collect_startup(children, frontier),
        }
    }
}

/// Find a step by ID, descending through concurrent children.
pub(crate) fn find_step(steps: &[Step], step_id: StepId) -> Option<&Step> {
    for step in steps {
        if step.step_id == step_id {
            return Some(step);
        }
        if let StepKind::Concurrent { children } = &step.kind {
            if let Some(found) = find_step(children, step_id) {
                return Some(found);
            }
        }
    }
    None
}

/// Mutable variant of [`find_step`].
pub(crate) fn find_step_mut(steps: &mut [Step], step_id: StepId) -> Option<&mut Step> {
    for step in steps {
        if step.step_id == step_id {
            return Some(step);
        }
        if let StepKind::Concurrent { children } = &mut step.kind {
            if let Some(found) = find_step_mut(children, step_id) {
                return Some(found);
            }
        }
    }
    None
}

/// The structurally final step of a list: the last entry, descending
/// into the last child of trailing concurrent groups.
pub(crate) fn final_step(steps: &[Step]) -> Option<&Step> {
    let last = steps.last()?;
    match &last.kind {
        StepKind::Agent { .. } | StepKind::SubJobSet { .. } => Some(last),
        StepKind::Concurrent { children } => final_step(children),
    }
}

/// A flattened leaf from steps prior to some step: the identity of the
/// unit whose outputs feed later steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PriorLeaf {
    Agent(JobId),
    SubJobSet(JobSetId),
}

/// Flatten all steps prior to the top-level step containing `step_id`
/// into agent and sub-pipeline leaves. Concurrent groups contribute all
/// of their descendants. Returns an empty list when the step cannot be
/// located.
pub(crate) fn prior_leaves(steps: &[Step], step_id: StepId) -> Vec<PriorLeaf> {
    let Some(position) = steps.iter().position(|step| {
        step.step_id == step_id
            || matches!(&step.kind, StepKind::Concurrent { children } if find_step(children, step_id).is_some())
    }) else {
        return Vec::new();
    };

    let mut leaves = Vec::new();
    for step in &steps[..position] {
        push_leaves(step, &mut leaves);
    }
    leaves
}

fn push_leaves(step: &Step, leaves: &mut Vec<PriorLeaf>) {
    match &step.kind {
        StepKind::Agent { job_id, .. } => leaves.push(PriorLeaf::Agent(*job_id)),
        StepKind::SubJobSet { sub_job_set_id, .. } => {
            leaves.push(PriorLeaf::SubJobSet(*sub_job_set_id))
        }
        StepKind::Concurrent { children } => {
            for child in children {
                push_leaves(child, leaves);
            }
        }
    }
}

#[cfg(test)]
#[path = "steps_tests.rs"]
mod tests;
