// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline instances and their step trees.

use crate::id::{JobId, JobSetId, StepId};
use crate::status::{Health, RunStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Variant payload of a [`Step`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// One job on one agent.
    Agent {
        agent_name: String,
        /// Assigned once the scheduler dispatches the job; unassigned
        /// until then.
        job_id: JobId,
    },
    /// A nested pipeline with its own steps.
    SubJobSet {
        template_name: String,
        /// Filled in when the sub-pipeline is instantiated.
        sub_job_set_id: JobSetId,
        /// Whether a JobSetRequest has been enqueued for this step.
        /// Initialized true at instantiation, since sub-pipeline requests
        /// are enqueued eagerly while the step tree is built.
        request_submitted: bool,
    },
    /// Children that may run concurrently with one another.
    Concurrent { children: Vec<Step> },
}

/// One node in a JobSet's step tree.
///
/// Step IDs are assigned depth-first at instantiation, starting at 1,
/// and are stable for the JobSet's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: StepId,
    pub step_order: u64,
    /// The JobSet owning this step.
    pub job_set_id: JobSetId,
    pub run_status: RunStatus,
    pub health_status: Health,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    /// A freshly-instantiated step in `STARTUP/OK`.
    pub fn new(job_set_id: JobSetId, step_id: StepId, kind: StepKind) -> Self {
        Self {
            step_id,
            step_order: step_id.value(),
            job_set_id,
            run_status: RunStatus::Startup,
            health_status: Health::Ok,
            kind,
        }
    }
}

/// One pipeline instance: a step tree plus shared configs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSet {
    pub job_set_id: JobSetId,
    pub template_name: String,
    pub run_status: RunStatus,
    pub health_status: Health,
    pub time_started_ms: Option<u64>,
    pub time_finished_ms: Option<u64>,
    pub steps: Vec<Step>,
    pub configs: HashMap<String, String>,
    pub output_messages: String,
    pub error_messages: String,
    /// Owning JobSet when this pipeline was created as a sub-pipeline
    /// step; unassigned for root pipelines.
    pub parent_job_set_id: JobSetId,
    /// Step within the parent that this pipeline fulfills.
    pub parent_job_step_id: StepId,
}

impl JobSet {
    /// A JobSet is active until it reaches its terminal status.
    pub fn is_active(&self) -> bool {
        self.run_status != RunStatus::Stopped
    }
}

/// Queued intent to instantiate a pipeline from a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSetRequest {
    pub template_name: String,
    pub configs: HashMap<String, String>,
    /// Unassigned for operator-started (root) pipelines.
    pub parent_job_set_id: JobSetId,
    pub parent_job_step_id: StepId,
    /// Pre-allocated ID, so the operator API can return the ID before
    /// the event loop instantiates the pipeline. Unassigned for nested
    /// requests, which are allocated at instantiation.
    pub requested_job_set_id: JobSetId,
}

impl JobSetRequest {
    /// A root request started by the operator API.
    pub fn root(
        template_name: impl Into<String>,
        configs: HashMap<String, String>,
        requested_job_set_id: JobSetId,
    ) -> Self {
        Self {
            template_name: template_name.into(),
            configs,
            parent_job_set_id: JobSetId::UNASSIGNED,
            parent_job_step_id: StepId::UNASSIGNED,
            requested_job_set_id,
        }
    }
}
