// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline templates.
//!
//! A template is a named, immutable pipeline shape. Steps reference
//! agents and other templates by name only; resolution is deferred to
//! instantiation time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural validation failures for a submitted template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template name is empty")]
    EmptyName,
    #[error("agent step has an empty agent name")]
    EmptyAgentName,
    #[error("sub-pipeline step has an empty template name")]
    EmptySubTemplateName,
    #[error("concurrent step has no children")]
    EmptyConcurrent,
}

/// One step in a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepTemplate {
    /// Run one job on the named agent.
    Agent { agent_name: String },
    /// Run a separate pipeline built from the named template.
    SubJobSet { template_name: String },
    /// Run the child steps concurrently with one another.
    Concurrent { steps: Vec<StepTemplate> },
}

impl StepTemplate {
    fn validate(&self) -> Result<(), TemplateError> {
        match self {
            StepTemplate::Agent { agent_name } => {
                if agent_name.is_empty() {
                    return Err(TemplateError::EmptyAgentName);
                }
            }
            StepTemplate::SubJobSet { template_name } => {
                if template_name.is_empty() {
                    return Err(TemplateError::EmptySubTemplateName);
                }
            }
            StepTemplate::Concurrent { steps } => {
                if steps.is_empty() {
                    return Err(TemplateError::EmptyConcurrent);
                }
                for step in steps {
                    step.validate()?;
                }
            }
        }
        Ok(())
    }
}

/// A named pipeline shape. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSetTemplate {
    pub name: String,
    pub steps: Vec<StepTemplate>,
}

impl JobSetTemplate {
    pub fn new(name: impl Into<String>, steps: Vec<StepTemplate>) -> Self {
        Self { name: name.into(), steps }
    }

    /// Check the template's structure. Name resolution (agents, nested
    /// templates) is not checked here; it is deferred to instantiation.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.name.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        for step in &self.steps {
            step.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
