// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Seam to the external container-orchestration API.
//!
//! The coordination core only needs three operations: submit a task, turn a
//! submission receipt into a task id, and describe a task's lifecycle and
//! network address. Cloud backends implement [`Orchestrator`] out of tree;
//! [`ProcessOrchestrator`] runs tasks as local child processes for dev runs
//! and [`MockOrchestrator`] scripts responses for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

mod mock;
mod process;

pub use mock::MockOrchestrator;
pub use process::ProcessOrchestrator;

/// One remote worker task to submit. The command is a structured argv,
/// never a joined shell string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub shard_index: usize,
    pub command: Vec<String>,
    pub environment: Vec<(String, String)>,
    /// Port the task's worker listens on, used to form its address.
    pub exposed_port: u16,
}

/// Opaque submission receipt, owned by the orchestrator that produced it.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub shard_index: usize,
    pub receipt: serde_json::Value,
}

/// Identifier of a submitted task, as understood by the orchestration API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a remote task as reported by describe-task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskLifecycle {
    Launching,
    IpPending,
    Running,
    Stopped,
    Failed,
}

impl TaskLifecycle {
    /// Terminal states: the task will never report an address again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for TaskLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launching => write!(f, "launching"),
            Self::IpPending => write!(f, "ip_pending"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a task from describe-task.
#[derive(Debug, Clone)]
pub struct TaskDescription {
    pub lifecycle: TaskLifecycle,
    pub address: Option<String>,
    /// Exit code, present once the task has stopped.
    pub exit_code: Option<i32>,
}

impl TaskDescription {
    pub fn new(lifecycle: TaskLifecycle) -> Self {
        Self {
            lifecycle,
            address: None,
            exit_code: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }
}

/// The orchestration API consumed by the coordination core.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Submit one task; the returned handle wraps the raw submission
    /// response.
    async fn submit_task(&self, spec: TaskSpec) -> Result<TaskHandle>;

    /// Parse a submission receipt into a task id. Failure here is fatal for
    /// the whole batch; the caller never accepts partial launches.
    async fn resolve_task_id(&self, handle: &TaskHandle) -> Result<TaskId>;

    /// Describe a task's current lifecycle status and address, if any.
    async fn describe_task(&self, id: &TaskId) -> Result<TaskDescription>;
}
