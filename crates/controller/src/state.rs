// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller's owned state.
//!
//! Everything here sits behind one reader-writer lock. The event loop is
//! the exclusive writer; all the scheduling algorithms are plain
//! functions over `&mut ControllerState`, which keeps them directly
//! testable without any tasks or channels.

use crate::config::ControllerConfig;
use crate::status::ControllerStatus;
use convoy_core::{
    AgentConfig, Health, Job, JobId, JobSet, JobSetId, JobSetRequest, JobSetTemplate,
};
use std::collections::{HashMap, HashSet, VecDeque};

pub(crate) struct ControllerState {
    // Configuration, frozen at creation.
    pub vol_prefix: String,
    pub max_jobs_running: usize,

    // Overall status.
    pub run_status: ControllerStatus,
    pub health_status: Health,
    pub output_messages: String,
    pub error_messages: String,
    pub open_for_requests: bool,

    // Agents, frozen once the controller starts.
    pub agents: HashMap<String, AgentConfig>,

    // Templates, insertion-only.
    pub templates: HashMap<String, JobSetTemplate>,

    // Jobs. Every member of `active_jobs` is a key in `jobs`.
    pub jobs: HashMap<JobId, Job>,
    pub active_jobs: HashSet<JobId>,
    next_job_id: u64,

    // JobSets. Every member of `active_job_sets` is a key in `job_sets`.
    pub job_sets: HashMap<JobSetId, JobSet>,
    pub active_job_sets: HashSet<JobSetId>,
    next_job_set_id: u64,

    // Queued pipeline instantiation intents. Appended to while being
    // drained (nested pipelines enqueue more requests).
    pub pending_requests: VecDeque<JobSetRequest>,
}

impl ControllerState {
    pub fn new(cfg: &ControllerConfig) -> Self {
        Self {
            vol_prefix: cfg.vol_prefix.clone(),
            max_jobs_running: cfg.max_jobs_running,
            run_status: ControllerStatus::NotStarted,
            health_status: Health::Ok,
            output_messages: String::new(),
            error_messages: String::new(),
            open_for_requests: false,
            agents: HashMap::new(),
            templates: HashMap::new(),
            jobs: HashMap::new(),
            active_jobs: HashSet::new(),
            next_job_id: 1,
            job_sets: HashMap::new(),
            active_job_sets: HashSet::new(),
            next_job_set_id: 1,
            pending_requests: VecDeque::new(),
        }
    }

    /// Allocate the next job ID. IDs are never reused.
    pub fn alloc_job_id(&mut self) -> JobId {
        let id = JobId::new(self.next_job_id);
        self.next_job_id += 1;
        id
    }

    /// Allocate the next jobset ID. IDs are never reused.
    pub fn alloc_job_set_id(&mut self) -> JobSetId {
        let id = JobSetId::new(self.next_job_set_id);
        self.next_job_set_id += 1;
        id
    }

    /// Record an unrecoverable internal fault: the controller goes to
    /// `error` health and begins shutting down.
    pub fn record_fault(&mut self, msg: impl AsRef<str>) {
        tracing::error!(error = msg.as_ref(), "controller fault");
        self.health_status = Health::Error;
        self.error_messages.push_str(msg.as_ref());
        self.error_messages.push('\n');
        if self.run_status == ControllerStatus::Running {
            self.run_status = ControllerStatus::Stopping;
        }
        self.open_for_requests = false;
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
