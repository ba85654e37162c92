// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registration types.
//!
//! An agent is an external worker process providing one analysis
//! capability (codereader, spdxwriter, ...). The controller only ever
//! addresses it by `{name, host:port}`; anything else in the config is
//! operator metadata.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operator-facing agent configuration, registered before the controller
/// starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique name for this agent instance.
    pub name: String,
    pub url: String,
    pub port: u16,
    /// Declared capability tag (e.g. "codereader", "spdxwriter").
    pub kind: String,
    /// Free-form operator metadata.
    #[serde(default)]
    pub kv: HashMap<String, String>,
}

impl AgentConfig {
    /// Collapse the config into the address form used by the job runner.
    pub fn agent_ref(&self) -> AgentRef {
        AgentRef {
            name: self.name.clone(),
            address: format!("{}:{}", self.url, self.port),
        }
    }
}

/// Resolved agent endpoint: the only thing the runner needs to dial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRef {
    pub name: String,
    /// `host:port` as understood by the transport.
    pub address: String,
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
