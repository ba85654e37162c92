// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Volume path derivation for job inputs and outputs.
//!
//! The controller only composes these strings; the agents own the actual
//! directory layout. Shape: `<volPrefix>/<kind>/<jobSetID>/<agentName>/<jobID>`
//! with `kind` being `code` or `spdx`.

use crate::id::{JobId, JobSetId};

fn volume_dir(vol_prefix: &str, kind: &str, job_set_id: JobSetId, agent_name: &str, job_id: JobId) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        vol_prefix.trim_end_matches('/'),
        kind,
        job_set_id,
        agent_name,
        job_id
    )
}

/// Directory where a job writes retrieved/transformed code.
pub fn code_output_dir(vol_prefix: &str, job_set_id: JobSetId, agent_name: &str, job_id: JobId) -> String {
    volume_dir(vol_prefix, "code", job_set_id, agent_name, job_id)
}

/// Directory where a job writes SPDX documents.
pub fn spdx_output_dir(vol_prefix: &str, job_set_id: JobSetId, agent_name: &str, job_id: JobId) -> String {
    volume_dir(vol_prefix, "spdx", job_set_id, agent_name, job_id)
}

/// `(source, path)` pair describing a prior job's code output as an input.
pub fn code_input(vol_prefix: &str, job_set_id: JobSetId, agent_name: &str, job_id: JobId) -> (String, String) {
    (
        input_source(job_set_id, agent_name, job_id),
        volume_dir(vol_prefix, "code", job_set_id, agent_name, job_id),
    )
}

/// `(source, path)` pair describing a prior job's SPDX output as an input.
pub fn spdx_input(vol_prefix: &str, job_set_id: JobSetId, agent_name: &str, job_id: JobId) -> (String, String) {
    (
        input_source(job_set_id, agent_name, job_id),
        volume_dir(vol_prefix, "spdx", job_set_id, agent_name, job_id),
    )
}

fn input_source(job_set_id: JobSetId, agent_name: &str, job_id: JobId) -> String {
    format!("{}.{}.{}", agent_name, job_set_id, job_id)
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
