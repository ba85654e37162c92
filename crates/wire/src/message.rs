// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message unions exchanged with agents.

use convoy_core::{JobConfig, StatusReport};
use serde::{Deserialize, Serialize};

/// Messages sent by the controller to an agent.
///
/// In the job lifecycle only `Start` is used; `Describe` and
/// `StatusRequest` exist for out-of-band tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerMsg {
    /// Ask the agent to describe itself and its capabilities.
    Describe,
    /// Start the job this stream was opened for.
    Start { config: JobConfig },
    /// Ask for an immediate status report.
    StatusRequest,
}

/// Self-description returned by an agent in response to `Describe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeReport {
    pub name: String,
    pub agent_type: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Messages sent by an agent to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMsg {
    Describe { report: DescribeReport },
    Status { report: StatusReport },
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
