// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller handle and its event loop.
//!
//! `Controller` is the public face: registration before start, the
//! operator API afterwards. `Start` builds the job runner and launches
//! the event loop task, which is the sole mutator of controller state.
//! Mutation requests reach it over channels; read APIs take the shared
//! read lock and clone.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::instantiate::instantiate_pending;
use crate::schedule::run_scheduler;
use crate::state::ControllerState;
use crate::status::{ControllerStatus, StatusSnapshot};
use crate::steps::find_step_mut;
use convoy_core::{
    AgentConfig, AgentRef, Clock, JobSetId, JobSetRequest, JobSetTemplate, RunStatus, SystemClock,
};
use convoy_runner::{AgentConnector, JobRecord, JobRequest, JobRunner, RunnerConfig, RunnerHandle};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct LoopHandles {
    request_tx: mpsc::Sender<JobSetRequest>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

/// The pipeline orchestrator.
pub struct Controller<C: Clock = SystemClock> {
    cfg: ControllerConfig,
    clock: C,
    pub(crate) state: Arc<RwLock<ControllerState>>,
    handles: Mutex<Option<LoopHandles>>,
}

impl Controller<SystemClock> {
    pub fn new(cfg: ControllerConfig) -> Self {
        Self::with_clock(cfg, SystemClock)
    }
}

impl<C: Clock> Controller<C> {
    pub fn with_clock(cfg: ControllerConfig, clock: C) -> Self {
        let state = ControllerState::new(&cfg);
        Self { cfg, clock, state: Arc::new(RwLock::new(state)), handles: Mutex::new(None) }
    }

    /// Register an agent. Only permitted before the controller starts;
    /// the agent table is frozen at `start`.
    pub fn add_agent(&self, agent: AgentConfig) -> Result<(), ControllerError> {
        if agent.name.is_empty() {
            return Err(ControllerError::EmptyAgentName);
        }
        let mut state = self.state.write();
        if state.run_status != ControllerStatus::NotStarted {
            return Err(ControllerError::AgentsFrozen);
        }
        if state.agents.contains_key(&agent.name) {
            return Err(ControllerError::AgentAlreadyRegistered(agent.name));
        }
        state.agents.insert(agent.name.clone(), agent);
        Ok(())
    }

    /// Register a pipeline template. Registration is insertion-only and
    /// permitted at any time; duplicate names are rejected.
    pub fn add_job_set_template(&self, template: JobSetTemplate) -> Result<(), ControllerError> {
        template.validate()?;
        let mut state = self.state.write();
        if state.templates.contains_key(&template.name) {
            return Err(ControllerError::TemplateAlreadyRegistered(template.name));
        }
        state.templates.insert(template.name.clone(), template);
        Ok(())
    }

    /// Start the controller: build the job runner over the registered
    /// agents, open the pipeline request channel, and launch the event
    /// loop. Requires at least one agent; repeated starts are rejected.
    pub fn start(&self, connector: Arc<dyn AgentConnector>) -> Result<(), ControllerError> {
        let agents: HashMap<String, AgentRef> = {
            let mut state = self.state.write();
            if state.run_status != ControllerStatus::NotStarted {
                return Err(ControllerError::AlreadyStarted);
            }
            if state.agents.is_empty() {
                return Err(ControllerError::NoAgentsRegistered);
            }
            state.run_status = ControllerStatus::Running;
            state.open_for_requests = true;
            state.agents.values().map(|a| (a.name.clone(), a.agent_ref())).collect()
        };

        let mut runner_cfg = RunnerConfig::new(agents);
        runner_cfg.connect_timeout = self.cfg.connect_timeout;
        runner_cfg.idle_timeout = self.cfg.idle_timeout;

        let cancel = CancellationToken::new();
        let runner_cancel = cancel.child_token();
        let runner = JobRunner::spawn(runner_cfg, connector, runner_cancel.clone());

        let (request_tx, request_rx) = mpsc::channel(16);
        let join = tokio::spawn(event_loop(
            Arc::clone(&self.state),
            self.clock.clone(),
            runner,
            request_rx,
            cancel.clone(),
            runner_cancel,
        ));

        tracing::info!("controller started");
        *self.handles.lock() = Some(LoopHandles { request_tx, cancel, join: Some(join) });
        Ok(())
    }

    /// Stop the controller and wait for the event loop to finish its
    /// shutdown sequence (cancel the runner, drain remaining records).
    pub async fn stop(&self) -> Result<(), ControllerError> {
        let (cancel, join) = {
            let mut handles = self.handles.lock();
            let Some(h) = handles.as_mut() else {
                return Err(ControllerError::NotRunning);
            };
            let Some(join) = h.join.take() else {
                return Err(ControllerError::NotRunning);
            };
            (h.cancel.clone(), join)
        };

        {
            let mut state = self.state.write();
            state.open_for_requests = false;
            if state.run_status == ControllerStatus::Running {
                state.run_status = ControllerStatus::Stopping;
            }
        }
        cancel.cancel();
        let _ = join.await;
        tracing::info!("controller stopped");
        Ok(())
    }

    /// Request a new pipeline from a registered template. Returns the
    /// allocated jobset ID; instantiation happens on the event loop
    /// (template resolution is deferred, so an unknown template yields a
    /// failed jobset rather than a synchronous error).
    pub async fn start_job_set(
        &self,
        template_name: &str,
        configs: HashMap<String, String>,
    ) -> Result<JobSetId, ControllerError> {
        let request_tx = {
            let handles = self.handles.lock();
            let Some(h) = handles.as_ref() else {
                return Err(ControllerError::NotRunning);
            };
            h.request_tx.clone()
        };

        let js_id = {
            let mut state = self.state.write();
            if state.run_status != ControllerStatus::Running || !state.open_for_requests {
                return Err(ControllerError::NotAcceptingRequests);
            }
            state.alloc_job_set_id()
        };

        let request = JobSetRequest::root(template_name, configs, js_id);
        request_tx
            .send(request)
            .await
            .map_err(|_| ControllerError::NotAcceptingRequests)?;
        Ok(js_id)
    }

    /// Overall controller status.
    pub fn status(&self) -> StatusSnapshot {
        let state = self.state.read();
        StatusSnapshot {
            run_status: state.run_status,
            health_status: state.health_status,
            output_messages: state.output_messages.clone(),
            error_messages: state.error_messages.clone(),
        }
    }
}

/// Merge a runner record into the owning job and its step.
pub(crate) fn apply_job_record(
    state: &mut ControllerState,
    record: &JobRecord,
    clock: &impl Clock,
) {
    let Some(job) = state.jobs.get_mut(&record.job_id) else {
        state.record_fault(format!(
            "received job record for job with ID {} but no such job found",
            record.job_id
        ));
        return;
    };
    job.status.merge_from(&record.status);
    if job.status.is_terminal() && job.status.time_finished_ms.is_none() {
        job.status.time_finished_ms = Some(clock.epoch_ms());
    }
    let js_id = job.job_set_id;
    let step_id = job.job_set_step_id;
    let run = job.status.run_status;
    let health = job.status.health_status;

    // A step's run status only ever advances. The runner republishes the
    // freshly-created record (still `startup`) after the scheduler has
    // already promoted the step to `running`; a plain merge would regress
    // the step and re-dispatch it.
    fn run_rank(run: RunStatus) -> u8 {
        match run {
            RunStatus::Same => 0,
            RunStatus::Startup => 1,
            RunStatus::Running => 2,
            RunStatus::Stopped => 3,
        }
    }

    let applied = state
        .job_sets
        .get_mut(&js_id)
        .and_then(|js| find_step_mut(&mut js.steps, step_id))
        .map(|step| {
            if run_rank(run) > run_rank(step.run_status) {
                step.run_status = run;
            }
            step.health_status.merge(health);
        })
        .is_some();
    if !applied {
        state.record_fault(format!(
            "job {} references missing jobset {} step {}",
            record.job_id, js_id, step_id
        ));
    }
}

/// Instantiate pending pipelines and run scheduler passes until the
/// pending queue is exhausted. Returns the dispatches to publish.
fn drain_and_schedule(state: &mut ControllerState, clock: &impl Clock) -> Vec<JobRequest> {
    let mut dispatches = Vec::new();
    loop {
        instantiate_pending(state, clock);
        dispatches.extend(run_scheduler(state, clock));
        if state.pending_requests.is_empty() {
            break;
        }
    }
    dispatches
}

async fn event_loop<C: Clock>(
    state: Arc<RwLock<ControllerState>>,
    clock: C,
    mut runner: RunnerHandle,
    mut request_rx: mpsc::Receiver<JobSetRequest>,
    cancel: CancellationToken,
    runner_cancel: CancellationToken,
) {
    let mut errors_open = true;
    let mut requests_open = true;

    'events: loop {
        tokio::select! {
            _ = cancel.cancelled() => break 'events,
            maybe_request = request_rx.recv(), if requests_open => match maybe_request {
                Some(request) => state.write().pending_requests.push_back(request),
                None => requests_open = false,
            },
            maybe_record = runner.records.recv() => match maybe_record {
                Some(record) => apply_job_record(&mut state.write(), &record, &clock),
                None => {
                    // The runner never closes its stream unprompted.
                    state.write().record_fault("job runner record stream closed unexpectedly");
                    break 'events;
                }
            },
            maybe_error = runner.errors.recv(), if errors_open => match maybe_error {
                Some(err) => {
                    state.write().record_fault(format!("job runner fatal error: {}", err));
                    break 'events;
                }
                None => errors_open = false,
            },
        }

        // Run scheduler passes and publish the resulting dispatches.
        // While waiting for send capacity, keep consuming records so a
        // runner blocked on publishing can never deadlock the loop; any
        // records consumed here feed another pass.
        loop {
            let dispatches = {
                let mut state = state.write();
                if state.run_status == ControllerStatus::Running {
                    drain_and_schedule(&mut state, &clock)
                } else {
                    Vec::new()
                }
            };
            if dispatches.is_empty() {
                break;
            }

            let mut consumed_record = false;
            for request in dispatches {
                let mut request = Some(request);
                while let Some(pending) = request.take() {
                    tokio::select! {
                        permit = runner.jobs.reserve() => match permit {
                            Ok(permit) => permit.send(pending),
                            Err(_) => {
                                state.write().record_fault("job runner input channel closed");
                                break 'events;
                            }
                        },
                        maybe_record = runner.records.recv() => match maybe_record {
                            Some(record) => {
                                apply_job_record(&mut state.write(), &record, &clock);
                                consumed_record = true;
                                request = Some(pending);
                            }
                            None => {
                                state.write().record_fault(
                                    "job runner record stream closed unexpectedly",
                                );
                                break 'events;
                            }
                        },
                    }
                }
            }
            if !consumed_record {
                break;
            }
        }

        if state.read().run_status != ControllerStatus::Running {
            break 'events;
        }
    }

    shutdown(&state, &clock, runner, runner_cancel).await;
}

/// Shutdown sequence: refuse new pipeline requests, close the channels
/// we own toward the runner, cancel it, then drain its record stream
/// until it closes so terminal records for still-live jobs are
/// surfaced.
async fn shutdown<C: Clock>(
    state: &Arc<RwLock<ControllerState>>,
    clock: &C,
    runner: RunnerHandle,
    runner_cancel: CancellationToken,
) {
    {
        let mut state = state.write();
        state.open_for_requests = false;
        if state.run_status == ControllerStatus::Running {
            state.run_status = ControllerStatus::Stopping;
        }
    }

    let RunnerHandle { jobs, refresh, mut records, errors } = runner;
    drop(jobs);
    drop(refresh);
    drop(errors);
    runner_cancel.cancel();

    while let Some(record) = records.recv().await {
        let mut state = state.write();
        apply_job_record(&mut state, &record, clock);
        crate::schedule::settle(&mut state, clock);
    }

    let mut state = state.write();
    state.run_status = ControllerStatus::Stopped;
    tracing::info!(health = %state.health_status, "controller event loop exited");
}

#[cfg(test)]
#[path = "controller_tests/mod.rs"]
mod tests;
