// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator read API.
//!
//! Everything here takes the shared read lock and returns owned copies,
//! so callers can never alias or mutate controller state. Collection
//! queries return results in ID (or name) order.

use crate::controller::Controller;
use crate::error::ControllerError;
use convoy_core::{AgentConfig, Clock, Job, JobId, JobSet, JobSetId, JobSetTemplate};

impl<C: Clock> Controller<C> {
    pub fn get_agent(&self, name: &str) -> Result<AgentConfig, ControllerError> {
        self.state
            .read()
            .agents
            .get(name)
            .cloned()
            .ok_or_else(|| ControllerError::AgentNotFound(name.to_string()))
    }

    pub fn get_all_agents(&self) -> Vec<AgentConfig> {
        let state = self.state.read();
        let mut agents: Vec<AgentConfig> = state.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        agents
    }

    pub fn get_job_set_template(&self, name: &str) -> Result<JobSetTemplate, ControllerError> {
        self.state
            .read()
            .templates
            .get(name)
            .cloned()
            .ok_or_else(|| ControllerError::TemplateNotFound(name.to_string()))
    }

    pub fn get_all_job_set_templates(&self) -> Vec<JobSetTemplate> {
        let state = self.state.read();
        let mut templates: Vec<JobSetTemplate> = state.templates.values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    pub fn get_job(&self, job_id: JobId) -> Result<Job, ControllerError> {
        self.state
            .read()
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(ControllerError::JobNotFound(job_id))
    }

    pub fn get_all_jobs(&self) -> Vec<Job> {
        let state = self.state.read();
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.job_id);
        jobs
    }

    pub fn get_all_jobs_for_job_set(&self, js_id: JobSetId) -> Vec<Job> {
        let state = self.state.read();
        let mut jobs: Vec<Job> =
            state.jobs.values().filter(|job| job.job_set_id == js_id).cloned().collect();
        jobs.sort_by_key(|job| job.job_id);
        jobs
    }

    pub fn get_job_set(&self, js_id: JobSetId) -> Result<JobSet, ControllerError> {
        self.state
            .read()
            .job_sets
            .get(&js_id)
            .cloned()
            .ok_or(ControllerError::JobSetNotFound(js_id))
    }

    pub fn get_all_job_sets(&self) -> Vec<JobSet> {
        let state = self.state.read();
        let mut job_sets: Vec<JobSet> = state.job_sets.values().cloned().collect();
        job_sets.sort_by_key(|js| js.job_set_id);
        job_sets
    }
}
