// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller lifecycle status.

use convoy_core::Health;
use std::fmt;

/// One-way lifecycle of the controller itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControllerStatus::NotStarted => "not started",
            ControllerStatus::Running => "running",
            ControllerStatus::Stopping => "stopping",
            ControllerStatus::Stopped => "stopped",
        })
    }
}

/// Point-in-time copy of the controller's overall status.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub run_status: ControllerStatus,
    pub health_status: Health,
    pub output_messages: String,
    pub error_messages: String,
}
