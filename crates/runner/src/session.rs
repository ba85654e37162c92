// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One agent session per running job.
//!
//! A session opens the stream, sends a single `Start`, then relays the
//! agent's status reports until the stream ends, the transport errors,
//! or cancellation fires. It never retries: any failure is terminal for
//! the job. Unless the session is cancelled, it always emits at least
//! one terminal (`stopped`) update before exiting; the runner and the
//! controller rely on that to conclude jobs.

use crate::connect::AgentConnector;
use convoy_core::{AgentRef, Health, JobConfig, JobId, RunStatus, StatusReport};
use convoy_wire::{AgentMsg, ControllerMsg};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One status update from a session, keyed by the owning job.
#[derive(Debug, Clone)]
pub(crate) struct JobUpdate {
    pub job_id: JobId,
    pub status: StatusReport,
}

enum Recv {
    Msg(Option<Result<AgentMsg, crate::connect::TransportError>>),
    Idle,
}

pub(crate) async fn run_session(
    job_id: JobId,
    agent: AgentRef,
    cfg: JobConfig,
    connector: Arc<dyn AgentConnector>,
    updates: mpsc::Sender<JobUpdate>,
    idle_timeout: Option<Duration>,
    cancel: CancellationToken,
) {
    let emit = |status: StatusReport| {
        let updates = updates.clone();
        async move {
            let _ = updates.send(JobUpdate { job_id, status }).await;
        }
    };

    let mut stream = match connector.connect(&agent).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(job_id = %job_id, agent = %agent.name, error = %e, "agent connect failed");
            emit(StatusReport::terminal_error(format!(
                "could not connect to {} ({}): {}",
                agent.name, agent.address, e
            )))
            .await;
            return;
        }
    };

    if let Err(e) = stream.send(ControllerMsg::Start { config: cfg }).await {
        tracing::warn!(job_id = %job_id, agent = %agent.name, error = %e, "job start failed");
        emit(StatusReport::terminal_error(format!(
            "could not start job on {} ({}): {}",
            agent.name, agent.address, e
        )))
        .await;
        return;
    }

    tracing::info!(job_id = %job_id, agent = %agent.name, "agent session started");

    let mut saw_terminal = false;
    loop {
        let next = async {
            match idle_timeout {
                Some(idle) => match tokio::time::timeout(idle, stream.recv()).await {
                    Ok(msg) => Recv::Msg(msg),
                    Err(_) => Recv::Idle,
                },
                None => Recv::Msg(stream.recv().await),
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %job_id, agent = %agent.name, "agent session cancelled");
                let _ = stream.close_send().await;
                if !saw_terminal {
                    emit(StatusReport::terminal_error("session cancelled before job completed")).await;
                }
                return;
            }
            recv = next => match recv {
                Recv::Msg(Some(Ok(AgentMsg::Status { report }))) => {
                    if report.run_status == RunStatus::Stopped {
                        saw_terminal = true;
                    }
                    emit(report).await;
                }
                Recv::Msg(Some(Ok(AgentMsg::Describe { report }))) => {
                    tracing::debug!(job_id = %job_id, agent = %agent.name, ?report, "ignoring describe report on job stream");
                }
                Recv::Msg(Some(Err(e))) => {
                    tracing::warn!(job_id = %job_id, agent = %agent.name, error = %e, "agent stream error");
                    emit(StatusReport::terminal_error(format!(
                        "stream error for {} ({}): {}",
                        agent.name, agent.address, e
                    )))
                    .await;
                    return;
                }
                Recv::Msg(None) => {
                    // Agent closed its side: job done.
                    let _ = stream.close_send().await;
                    if !saw_terminal {
                        // The agent never sent a terminal report; conclude
                        // the job without overwriting its last health.
                        emit(StatusReport {
                            run_status: RunStatus::Stopped,
                            health_status: Health::Same,
                            time_started_ms: None,
                            time_finished_ms: None,
                            output_messages: String::new(),
                            error_messages: String::new(),
                        })
                        .await;
                    }
                    tracing::info!(job_id = %job_id, agent = %agent.name, "agent session finished");
                    return;
                }
                Recv::Idle => {
                    tracing::warn!(job_id = %job_id, agent = %agent.name, "agent idle timeout");
                    emit(StatusReport::terminal_error(format!(
                        "no report from {} within {:?}",
                        agent.name,
                        idle_timeout.unwrap_or_default()
                    )))
                    .await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
