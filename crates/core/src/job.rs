// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job records tracked by the controller.

use crate::id::{JobId, JobSetId, StepId};
use crate::jobconfig::JobConfig;
use crate::report::StatusReport;
use serde::{Deserialize, Serialize};

/// One execution of one agent against one [`JobConfig`].
///
/// Created by the controller when a step is dispatched and kept for the
/// controller's lifetime; status is merged in from the job runner's
/// record stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub job_set_id: JobSetId,
    /// Step within the owning JobSet that this job fulfills.
    pub job_set_step_id: StepId,
    pub job_set_step_order: u64,
    pub agent_name: String,
    pub cfg: JobConfig,
    pub status: StatusReport,
}
