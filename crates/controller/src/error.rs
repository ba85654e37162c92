// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-visible controller errors.
//!
//! These are the synchronous validation failures of the operator API.
//! Per-job and per-pipeline operational failures never surface here;
//! they flow through status bubbling instead.

use convoy_core::{JobId, JobSetId, TemplateError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("agent with name {0} is already registered")]
    AgentAlreadyRegistered(String),

    #[error("agent name is empty")]
    EmptyAgentName,

    #[error("agents can only be added before the controller starts")]
    AgentsFrozen,

    #[error("no agent found with name {0}")]
    AgentNotFound(String),

    #[error("template with name {0} is already registered")]
    TemplateAlreadyRegistered(String),

    #[error("no template found with name {0}")]
    TemplateNotFound(String),

    #[error("invalid template: {0}")]
    InvalidTemplate(#[from] TemplateError),

    #[error("no agents defined prior to start request")]
    NoAgentsRegistered,

    #[error("controller has already been started")]
    AlreadyStarted,

    #[error("controller is not running")]
    NotRunning,

    #[error("controller is not accepting new jobset requests")]
    NotAcceptingRequests,

    #[error("no job found with ID {0}")]
    JobNotFound(JobId),

    #[error("no jobset found with ID {0}")]
    JobSetNotFound(JobSetId),
}
