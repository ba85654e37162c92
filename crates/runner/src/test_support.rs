// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted mock agents for exercising sessions, the runner, and the
//! controller without real network agents.
//!
//! A script is a sequence of actions played back on `recv`. Scripts are
//! keyed by agent name; every job dispatched to that agent replays the
//! same script from the top.

use crate::connect::{AgentConnector, AgentStream, TransportError};
use async_trait::async_trait;
use convoy_core::{AgentRef, Health, RunStatus, StatusReport};
use convoy_wire::{AgentMsg, ControllerMsg};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One scripted action, played when the session asks for the next
/// message.
#[derive(Debug, Clone)]
pub enum ScriptAction {
    /// Deliver a status report after a delay.
    Report { delay_ms: u64, report: StatusReport },
    /// Close the stream (normal agent-side termination).
    CloseStream,
    /// Fail the stream with a transport error.
    TransportError(String),
}

/// Report builder: `running/ok` after `delay_ms`.
pub fn running_ok(delay_ms: u64) -> ScriptAction {
    report_action(delay_ms, RunStatus::Running, Health::Ok, "")
}

/// Report builder: terminal `stopped/ok` after `delay_ms`.
pub fn stopped_ok(delay_ms: u64) -> ScriptAction {
    report_action(delay_ms, RunStatus::Stopped, Health::Ok, "")
}

/// Report builder: terminal `stopped/degraded` after `delay_ms`.
pub fn stopped_degraded(delay_ms: u64) -> ScriptAction {
    report_action(delay_ms, RunStatus::Stopped, Health::Degraded, "")
}

/// Report builder: terminal `stopped/error` after `delay_ms`.
pub fn stopped_error(delay_ms: u64, message: &str) -> ScriptAction {
    report_action(delay_ms, RunStatus::Stopped, Health::Error, message)
}

fn report_action(delay_ms: u64, run: RunStatus, health: Health, error: &str) -> ScriptAction {
    ScriptAction::Report {
        delay_ms,
        report: StatusReport {
            run_status: run,
            health_status: health,
            time_started_ms: None,
            time_finished_ms: None,
            output_messages: String::new(),
            error_messages: error.to_string(),
        },
    }
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<String, Vec<ScriptAction>>,
    fail_connect: HashMap<String, String>,
}

/// Connector returning scripted streams, with concurrency accounting so
/// tests can assert scheduler caps.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the script played for every job on the named agent.
    pub fn script(&self, agent_name: &str, actions: Vec<ScriptAction>) {
        self.state.lock().scripts.insert(agent_name.to_string(), actions);
    }

    /// Make connects to the named agent fail with the given reason.
    pub fn fail_connect(&self, agent_name: &str, reason: &str) {
        self.state.lock().fail_connect.insert(agent_name.to_string(), reason.to_string());
    }

    /// Sessions currently open.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// High-water mark of concurrently open sessions.
    pub fn peak_sessions(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentConnector for MockConnector {
    async fn connect(&self, agent: &AgentRef) -> Result<Box<dyn AgentStream>, TransportError> {
        let actions = {
            let state = self.state.lock();
            if let Some(reason) = state.fail_connect.get(&agent.name) {
                return Err(TransportError::Stream(reason.clone()));
            }
            state
                .scripts
                .get(&agent.name)
                .cloned()
                .ok_or_else(|| TransportError::Stream(format!("no script for agent {}", agent.name)))?
        };

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(MockStream {
            actions: actions.into(),
            active: Arc::clone(&self.active),
            released: false,
        }))
    }
}

struct MockStream {
    actions: VecDeque<ScriptAction>,
    active: Arc<AtomicUsize>,
    released: bool,
}

impl MockStream {
    /// Mark this session as no longer running. Called as soon as the
    /// script reaches a terminal outcome so concurrency assertions see
    /// the session end before its terminal report is processed.
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl AgentStream for MockStream {
    async fn send(&mut self, _msg: ControllerMsg) -> Result<(), TransportError> {
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<AgentMsg, TransportError>> {
        match self.actions.pop_front() {
            Some(ScriptAction::Report { delay_ms, report }) => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                if report.run_status == RunStatus::Stopped {
                    self.release();
                }
                Some(Ok(AgentMsg::Status { report }))
            }
            Some(ScriptAction::CloseStream) | None => {
                self.release();
                None
            }
            Some(ScriptAction::TransportError(reason)) => {
                self.release();
                Some(Err(TransportError::Stream(reason)))
            }
        }
    }

    async fn close_send(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
