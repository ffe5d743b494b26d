// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::{Orchestrator, TaskDescription, TaskHandle, TaskId, TaskLifecycle, TaskSpec};
use crate::{error, Result};

#[derive(Default)]
struct MockState {
    submitted: Vec<TaskSpec>,
    scripts: HashMap<String, VecDeque<TaskDescription>>,
    poll_counts: HashMap<String, usize>,
    bad_receipt_shards: Vec<usize>,
}

/// Mock implementation of [`Orchestrator`] for testing.
///
/// Submissions are recorded; `describe_task` replays a scripted sequence of
/// responses per task id, repeating the final entry once the script is
/// exhausted.
#[derive(Clone, Default)]
pub struct MockOrchestrator {
    state: Arc<Mutex<MockState>>,
}

impl MockOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task id assigned to submissions for `shard_index`.
    pub fn task_id_for(shard_index: usize) -> TaskId {
        TaskId(format!("task-{shard_index}"))
    }

    /// Script the sequence of describe responses for a task id.
    pub fn script(&self, task_id: &TaskId, responses: Vec<TaskDescription>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(task_id.0.clone(), responses.into());
    }

    /// Make `shard_index`'s submission receipt unparseable.
    pub fn break_receipt_for(&self, shard_index: usize) {
        self.state.lock().unwrap().bad_receipt_shards.push(shard_index);
    }

    pub fn submissions(&self) -> Vec<TaskSpec> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn poll_count(&self, task_id: &TaskId) -> usize {
        self.state
            .lock()
            .unwrap()
            .poll_counts
            .get(&task_id.0)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    async fn submit_task(&self, spec: TaskSpec) -> Result<TaskHandle> {
        let mut state = self.state.lock().unwrap();
        let shard_index = spec.shard_index;
        let receipt = if state.bad_receipt_shards.contains(&shard_index) {
            json!({ "failures": [{ "reason": "RESOURCE:MEMORY" }] })
        } else {
            json!({ "task_id": format!("task-{shard_index}") })
        };
        state.submitted.push(spec);
        Ok(TaskHandle {
            shard_index,
            receipt,
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
        let mut state = self.state.lock().unwrap();
        *state.poll_counts.entry(id.0.clone()).or_insert(0) += 1;
        let script = state
            .scripts
            .get_mut(&id.0)
            .ok_or_else(|| error!("unknown task id {id}"))?;
        // Repeat the last response once the script runs out.
        if script.len() > 1 {
            Ok(script.pop_front().unwrap())
        } else {
            script
                .front()
                .cloned()
                .ok_or_else(|| error!("empty describe script for task {id}"))
        }
    }
}
