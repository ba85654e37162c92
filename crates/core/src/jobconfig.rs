// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job configuration handed to agents.

use serde::{Deserialize, Serialize};

/// One upstream input for a job: where it came from and which paths to
/// read. `source` identifies the producing job as
/// `<agentName>.<jobSetID>.<jobID>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub source: String,
    pub paths: Vec<String>,
}

/// One key-value config entry, materialized from the owning JobSet's
/// configs map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobKv {
    pub key: String,
    pub value: String,
}

/// Everything an agent needs to run one job.
///
/// The directories are path strings composed by the controller (see
/// [`crate::paths`]); the controller never touches the filesystem itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub code_inputs: Vec<InputSpec>,
    #[serde(default)]
    pub code_output_dir: String,
    #[serde(default)]
    pub spdx_inputs: Vec<InputSpec>,
    #[serde(default)]
    pub spdx_output_dir: String,
    /// JobSet config key-values, flattened for the wire.
    #[serde(default)]
    pub jkvs: Vec<JobKv>,
}
