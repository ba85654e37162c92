// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job runner: a registry of agents plus a multiplexer task.
//!
//! Accepts job requests, spawns one agent session per request, and
//! publishes every state change of every tracked job on a single record
//! stream. Shutdown blocks until every session has exited: each session
//! holds a clone of the update sender, so the update channel only closes
//! once the runner has dropped its own clone and the last session is
//! gone.

use crate::connect::AgentConnector;
use crate::session::{run_session, JobUpdate};
use convoy_core::{AgentRef, JobConfig, JobId, StatusReport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Runner configuration: the agent registry plus session knobs.
#[derive(Clone)]
pub struct RunnerConfig {
    /// All agents the runner knows about, by logical name.
    pub agents: HashMap<String, AgentRef>,
    /// Bound on dialing an agent. Once the stream is open the session
    /// runs until the stream ends.
    pub connect_timeout: Duration,
    /// Optional bound on silence between agent reports.
    pub idle_timeout: Option<Duration>,
}

impl RunnerConfig {
    pub fn new(agents: HashMap<String, AgentRef>) -> Self {
        Self { agents, connect_timeout: Duration::from_secs(20), idle_timeout: None }
    }
}

/// A request to run one job. The caller pre-allocates the job ID; the
/// runner's own counter is only a fallback for unassigned requests.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: JobId,
    pub agent_name: String,
    pub cfg: JobConfig,
}

/// The runner's record of one job: agent, config, merged status.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: JobId,
    pub agent_name: String,
    pub cfg: JobConfig,
    pub status: StatusReport,
}

/// Fatal runner-level failures. Publishing one of these means the runner
/// itself is compromised and readers should begin shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("duplicate job ID {0} submitted to runner")]
    DuplicateJobId(JobId),
}

/// Channel surface handed to the runner's owner.
pub struct RunnerHandle {
    /// Submit job requests here. Closing this channel tells the runner
    /// to drain and exit.
    pub jobs: mpsc::Sender<JobRequest>,
    /// Ask for a republish of one job's record (unassigned = all jobs).
    pub refresh: mpsc::Sender<JobId>,
    /// Every state change to any tracked job, plus explicit refreshes.
    pub records: mpsc::Receiver<JobRecord>,
    /// Fatal runner error, capacity 1.
    pub errors: mpsc::Receiver<RunnerError>,
}

/// Spawns the multiplexer task and returns its channel surface.
pub struct JobRunner;

impl JobRunner {
    pub fn spawn(
        cfg: RunnerConfig,
        connector: Arc<dyn AgentConnector>,
        cancel: CancellationToken,
    ) -> RunnerHandle {
        let (jobs_tx, jobs_rx) = mpsc::channel(1);
        let (refresh_tx, refresh_rx) = mpsc::channel(16);
        let (records_tx, records_rx) = mpsc::channel(32);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        let (update_tx, update_rx) = mpsc::channel(32);

        let task = RunnerTask {
            cfg,
            connector,
            records_tx,
            errors_tx,
            update_tx: Some(update_tx),
            jobs: HashMap::new(),
            next_fallback_id: 1,
        };
        tokio::spawn(task.run(jobs_rx, refresh_rx, update_rx, cancel));

        RunnerHandle { jobs: jobs_tx, refresh: refresh_tx, records: records_rx, errors: errors_rx }
    }
}

struct RunnerTask {
    cfg: RunnerConfig,
    connector: Arc<dyn AgentConnector>,
    records_tx: mpsc::Sender<JobRecord>,
    errors_tx: mpsc::Sender<RunnerError>,
    /// The runner's own clone of the session update sender. Dropped when
    /// exiting so the update channel closes once all sessions are done.
    update_tx: Option<mpsc::Sender<JobUpdate>>,
    jobs: HashMap<JobId, JobRecord>,
    next_fallback_id: u64,
}

impl RunnerTask {
    async fn run(
        mut self,
        mut jobs_rx: mpsc::Receiver<JobRequest>,
        mut refresh_rx: mpsc::Receiver<JobId>,
        mut update_rx: mpsc::Receiver<JobUpdate>,
        cancel: CancellationToken,
    ) {
        let mut exiting = false;
        let mut refresh_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled(), if !exiting => {
                    tracing::info!("job runner cancelled, draining sessions");
                    exiting = true;
                    jobs_rx.close();
                    self.update_tx = None;
                }
                maybe_req = jobs_rx.recv(), if !exiting => match maybe_req {
                    Some(req) => self.handle_request(req, &cancel).await,
                    None => {
                        // Input channel closed: drain and exit.
                        tracing::info!("job request channel closed, draining sessions");
                        exiting = true;
                        self.update_tx = None;
                    }
                },
                maybe_id = refresh_rx.recv(), if refresh_open => match maybe_id {
                    Some(job_id) => self.handle_refresh(job_id).await,
                    None => refresh_open = false,
                },
                maybe_update = update_rx.recv() => match maybe_update {
                    Some(update) => self.handle_update(update).await,
                    // All sessions exited and our own sender is gone.
                    None if exiting => break,
                    None => {
                        self.update_tx = None;
                        break;
                    }
                },
            }
        }

        tracing::info!("job runner exited");
        // records_tx drops here, closing the record stream.
    }

    async fn handle_request(&mut self, req: JobRequest, cancel: &CancellationToken) {
        let job_id = if req.job_id.is_assigned() {
            req.job_id
        } else {
            let id = JobId::new(self.next_fallback_id);
            self.next_fallback_id += 1;
            id
        };

        if self.jobs.contains_key(&job_id) {
            tracing::error!(job_id = %job_id, "duplicate job ID submitted");
            let _ = self.errors_tx.try_send(RunnerError::DuplicateJobId(job_id));
            return;
        }

        let mut record = JobRecord {
            job_id,
            agent_name: req.agent_name.clone(),
            cfg: req.cfg.clone(),
            status: StatusReport::startup(),
        };

        match self.cfg.agents.get(&req.agent_name) {
            Some(agent) => {
                if let Some(update_tx) = &self.update_tx {
                    tokio::spawn(run_session(
                        job_id,
                        agent.clone(),
                        req.cfg,
                        Arc::clone(&self.connector),
                        update_tx.clone(),
                        self.cfg.idle_timeout,
                        cancel.child_token(),
                    ));
                }
            }
            None => {
                tracing::warn!(job_id = %job_id, agent = %req.agent_name, "unknown agent name");
                record.status =
                    StatusReport::terminal_error(format!("unknown agent name: {}", req.agent_name));
            }
        }

        self.publish(record.clone()).await;
        self.jobs.insert(job_id, record);
    }

    async fn handle_update(&mut self, update: JobUpdate) {
        let Some(record) = self.jobs.get_mut(&update.job_id) else {
            // A report for a job we never tracked; nothing to publish.
            tracing::warn!(job_id = %update.job_id, "status update for unknown job");
            return;
        };
        record.status.merge_from(&update.status);
        let record = record.clone();
        self.publish(record).await;
    }

    async fn handle_refresh(&mut self, job_id: JobId) {
        if job_id.is_assigned() {
            if let Some(record) = self.jobs.get(&job_id) {
                let record = record.clone();
                self.publish(record).await;
            }
            return;
        }
        // Unassigned means "refresh all", in ID order.
        let mut ids: Vec<JobId> = self.jobs.keys().copied().collect();
        ids.sort();
        for id in ids {
            if let Some(record) = self.jobs.get(&id) {
                let record = record.clone();
                self.publish(record).await;
            }
        }
    }

    async fn publish(&mut self, record: JobRecord) {
        // The receiver only disappears once the controller is gone; there
        // is nobody left to notify at that point.
        let _ = self.records_tx.send(record).await;
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
