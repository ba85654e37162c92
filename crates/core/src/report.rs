// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic status reports sent by agents and merged into job records.

use crate::status::{Health, RunStatus};
use serde::{Deserialize, Serialize};

/// One status report for one job.
///
/// Agents send these periodically over the job stream. `Same` statuses,
/// `None` timestamps and empty message strings all mean "unchanged from
/// the last report"; [`StatusReport::merge_from`] applies that rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub run_status: RunStatus,
    pub health_status: Health,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_started_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_finished_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_messages: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_messages: String,
}

impl StatusReport {
    /// Initial record state for a job that has been created but whose
    /// agent has not reported yet.
    pub fn startup() -> Self {
        Self {
            run_status: RunStatus::Startup,
            health_status: Health::Ok,
            time_started_ms: None,
            time_finished_ms: None,
            output_messages: String::new(),
            error_messages: String::new(),
        }
    }

    /// Synthetic terminal report for a job that failed on the controller
    /// side (transport error, failed start, unknown agent).
    pub fn terminal_error(reason: impl Into<String>) -> Self {
        Self {
            run_status: RunStatus::Stopped,
            health_status: Health::Error,
            time_started_ms: None,
            time_finished_ms: None,
            output_messages: String::new(),
            error_messages: reason.into(),
        }
    }

    /// Merge an incoming report into this one, keeping existing values
    /// wherever the incoming report says "unchanged".
    pub fn merge_from(&mut self, incoming: &StatusReport) {
        self.run_status.merge(incoming.run_status);
        self.health_status.merge(incoming.health_status);
        if incoming.time_started_ms.is_some() {
            self.time_started_ms = incoming.time_started_ms;
        }
        if incoming.time_finished_ms.is_some() {
            self.time_finished_ms = incoming.time_finished_ms;
        }
        if !incoming.output_messages.is_empty() {
            self.output_messages = incoming.output_messages.clone();
        }
        if !incoming.error_messages.is_empty() {
            self.error_messages = incoming.error_messages.clone();
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.run_status.is_terminal()
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
