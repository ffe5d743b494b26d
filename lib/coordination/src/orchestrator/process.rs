// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use uuid::Uuid;

use super::{Orchestrator, TaskDescription, TaskHandle, TaskId, TaskLifecycle, TaskSpec};
use crate::{error, ErrorContext, Result};

struct LocalTask {
    address: String,
    // None while the process is still running
    exit_code: Arc<Mutex<Option<Option<i32>>>>,
}

/// Local-process implementation of [`Orchestrator`].
///
/// "Remote" tasks are child processes on this host, addressed as
/// `127.0.0.1:{exposed_port}`. This backs dev runs of the full pipeline
/// without a cloud account; a real cluster backend implements the same
/// trait out of tree.
#[derive(Clone, Default)]
pub struct ProcessOrchestrator {
    tasks: Arc<Mutex<HashMap<String, LocalTask>>>,
}

impl ProcessOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Orchestrator for ProcessOrchestrator {
    async fn submit_task(&self, spec: TaskSpec) -> Result<TaskHandle> {
        let program = spec
            .command
            .first()
            .ok_or_else(|| error!("empty command for shard {}", spec.shard_index))?;

        let mut child = Command::new(program)
            .args(&spec.command[1..])
            .envs(spec.environment.iter().cloned())
            .spawn()
            .with_context(|| format!("spawning task for shard {}", spec.shard_index))?;

        let task_id = format!("local-{}", Uuid::new_v4().simple());
        let exit_code: Arc<Mutex<Option<Option<i32>>>> = Arc::new(Mutex::new(None));

        let exit_slot = exit_code.clone();
        tokio::spawn(async move {
            let status = child.wait().await;
            let code = status.ok().and_then(|s| s.code());
            *exit_slot.lock().unwrap() = Some(code);
        });

        self.tasks.lock().unwrap().insert(
            task_id.clone(),
            LocalTask {
                address: format!("127.0.0.1:{}", spec.exposed_port),
                exit_code,
            },
        );

        Ok(TaskHandle {
            shard_index: spec.shard_index,
            receipt: json!({ "task_id": task_id }),
        })
    }

    async fn resolve_task_id(&self, handle: &TaskHandle) -> Result<TaskId> {
        handle
            .receipt
            .get("task_id")
            .and_then(|v| v.as_str())
            .map(|s| TaskId(s.to_string()))
            .ok_or_else(|| error!("no task id in submission response: {}", handle.receipt))
    }

    async fn describe_task(&self, id: &TaskId) -> Result<TaskDescription> {
        let tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get(&id.0)
            .ok_or_else(|| error!("unknown task id {id}"))?;

        let description = match *task.exit_code.lock().unwrap() {
            Some(code) => {
                let mut d = TaskDescription::new(TaskLifecycle::Stopped)
                    .with_address(task.address.clone());
                d.exit_code = code;
                d
            }
            None => TaskDescription::new(TaskLifecycle::Running).with_address(task.address.clone()),
        };
        Ok(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration};

    fn spec(shard_index: usize, command: &[&str], port: u16) -> TaskSpec {
        TaskSpec {
            shard_index,
            command: command.iter().map(|s| s.to_string()).collect(),
            environment: vec![],
            exposed_port: port,
        }
    }

    #[tokio::test]
    async fn test_task_runs_then_stops_with_exit_code() {
        let orchestrator = ProcessOrchestrator::new();
        let handle = orchestrator
            .submit_task(spec(0, &["sh", "-c", "exit 7"], 15200))
            .await
            .unwrap();
        let id = orchestrator.resolve_task_id(&handle).await.unwrap();

        // wait for the child to exit
        for _ in 0..100 {
            let d = orchestrator.describe_task(&id).await.unwrap();
            if d.lifecycle == TaskLifecycle::Stopped {
                assert_eq!(d.exit_code, Some(7));
                assert_eq!(d.address.as_deref(), Some("127.0.0.1:15200"));
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("task never stopped");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_submission_error() {
        let orchestrator = ProcessOrchestrator::new();
        let result = orchestrator
            .submit_task(spec(0, &["/nonexistent/pid-worker"], 15200))
            .await;
        assert!(result.is_err());
    }
}
