// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run-status and health domains shared between the controller, the job
//! runner and the agents.
//!
//! Both enums carry a `Same` variant meaning "unchanged since the last
//! report". `Same` exists only in transit and in fold accumulators;
//! persisted state must never hold it. The merge rule everywhere is
//! "keep the previous value when the incoming one is `Same`".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Run status of a job, step, or pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Transport/fold sentinel: no change from the previous value.
    Same,
    /// Created but not yet running.
    Startup,
    Running,
    /// Terminal. A unit reported stopped never runs again.
    Stopped,
}

impl RunStatus {
    /// Merge an incoming transport value into a persisted one.
    pub fn merge(&mut self, incoming: RunStatus) {
        if incoming != RunStatus::Same {
            *self = incoming;
        }
    }

    pub fn is_terminal(self) -> bool {
        self == RunStatus::Stopped
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Same => "same",
            RunStatus::Startup => "startup",
            RunStatus::Running => "running",
            RunStatus::Stopped => "stopped",
        })
    }
}

/// Health of a job, step, or pipeline, orthogonal to its run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    /// Transport/fold sentinel: no change from the previous value.
    Same,
    Ok,
    Degraded,
    Error,
}

impl Health {
    /// Merge an incoming transport value into a persisted one.
    pub fn merge(&mut self, incoming: Health) {
        if incoming != Health::Same {
            *self = incoming;
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Health::Same => "same",
            Health::Ok => "ok",
            Health::Degraded => "degraded",
            Health::Error => "error",
        })
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
