// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-shard remote task submission and completion tracking.
//!
//! One worker task is submitted per shard, in index order, with a fixed
//! inter-submission delay to stay under the orchestration API's rate
//! limits. Role and variant invariants are checked before the first
//! submission; a batch is all-or-nothing.

use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::config::CoordinationConfig;
use crate::error::CoordinationError;
use crate::orchestrator::{Orchestrator, TaskHandle, TaskId, TaskSpec};
use crate::protocol::{shard_path, ProtocolVariant, Role};
use crate::Result;

/// Environment variable names the worker containers read credentials from.
pub const ACCESS_KEY_ENV: &str = "PID_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "PID_SECRET_ACCESS_KEY";
pub const REGION_ENV: &str = "PID_REGION";

/// One match-stage launch request.
#[derive(Debug)]
pub struct LaunchRequest<'a> {
    pub shard_count: usize,
    pub role: Role,
    pub variant: ProtocolVariant,
    pub input_base: &'a str,
    pub output_base: &'a str,
    /// Required for the shuffler variant; checked upstream.
    pub encryption_keys: Option<&'a str>,
    /// Partner only: one publisher address per shard, index-aligned.
    pub peer_addresses: Option<&'a [String]>,
}

pub struct TaskLauncher {
    config: CoordinationConfig,
    orchestrator: Arc<dyn Orchestrator>,
}

impl TaskLauncher {
    pub fn new(config: CoordinationConfig, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Submit one task per shard, in index order.
    pub async fn launch(&self, request: &LaunchRequest<'_>) -> Result<Vec<TaskHandle>> {
        self.validate(request)?;

        let mut handles = Vec::with_capacity(request.shard_count);
        for i in 0..request.shard_count {
            if i > 0 {
                sleep(Duration::from_millis(self.config.launch_delay_ms)).await;
            }
            let spec = self.build_spec(request, i)?;
            info!(shard = i, role = %request.role, "submitting worker task");
            handles.push(self.orchestrator.submit_task(spec).await?);
        }
        Ok(handles)
    }

    fn validate(&self, request: &LaunchRequest<'_>) -> Result<()> {
        if request.shard_count == 0 {
            return Err(CoordinationError::config("shard_count must be >= 1 for launch").into());
        }
        // fail the whole batch before submitting anything
        self.config.worker_port(request.shard_count - 1)?;
        match (request.role, request.peer_addresses) {
            (Role::Partner, None) => {
                Err(CoordinationError::config("partner launch requires peer_addresses").into())
            }
            (Role::Partner, Some(addresses)) if addresses.len() != request.shard_count => {
                Err(CoordinationError::config(format!(
                    "peer_addresses has {} entries, expected shard_count {}",
                    addresses.len(),
                    request.shard_count
                ))
                .into())
            }
            (Role::Publisher, Some(_)) => Err(CoordinationError::config(
                "publisher launch must not receive peer_addresses",
            )
            .into()),
            _ => Ok(()),
        }
    }

    /// Structured argv and environment for shard `i`'s worker task.
    fn build_spec(&self, request: &LaunchRequest<'_>, i: usize) -> Result<TaskSpec> {
        let port = self.config.worker_port(i)?;
        let mut command = vec![
            self.config.worker_binary.clone(),
            request.variant.match_subcommand().to_string(),
            request.role.to_string(),
            shard_path(request.input_base, i),
            shard_path(request.output_base, i),
        ];
        if let (Role::Partner, Some(addresses)) = (request.role, request.peer_addresses) {
            command.push(addresses[i].clone());
        }
        command.push(format!("--port={port}"));
        if let Some(keys) = request.encryption_keys {
            command.push(format!("--encryption_keys={keys}"));
        }

        let credentials = &self.config.credentials;
        Ok(TaskSpec {
            shard_index: i,
            command,
            environment: vec![
                (ACCESS_KEY_ENV.to_string(), credentials.access_key_id.clone()),
                (
                    SECRET_KEY_ENV.to_string(),
                    credentials.secret_access_key.clone(),
                ),
                (REGION_ENV.to_string(), self.config.cloud.region.clone()),
            ],
            exposed_port: port,
        })
    }

    /// Resolve every submission receipt into a task id, in index order.
    /// A single unparseable receipt fails the whole batch.
    pub async fn resolve_handles_to_ids(&self, handles: &[TaskHandle]) -> Result<Vec<TaskId>> {
        let mut ids = Vec::with_capacity(handles.len());
        for handle in handles {
            let id = self
                .orchestrator
                .resolve_task_id(handle)
                .await
                .map_err(|e| CoordinationError::Submission {
                    shard_index: handle.shard_index,
                    message: e.to_string(),
                })?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Block until every task has stopped, polling each in index order.
    /// Failed tasks are recorded while the remaining siblings are still
    /// waited on; the batch then fails as a whole.
    pub async fn wait_for_completion(&self, task_ids: &[TaskId]) -> Result<()> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut exits: Vec<(usize, Option<i32>)> = Vec::with_capacity(task_ids.len());
        for (i, id) in task_ids.iter().enumerate() {
            loop {
                let description = self.orchestrator.describe_task(id).await?;
                if description.lifecycle.is_terminal() {
                    let code = description.exit_code;
                    if code != Some(0) {
                        warn!(shard = i, task = %id, exit = ?code, "remote task failed");
                    }
                    exits.push((i, code));
                    break;
                }
                sleep(interval).await;
            }
        }

        if let Some(&(first_failed, _)) = exits.iter().find(|(_, code)| *code != Some(0)) {
            return Err(CoordinationError::TasksFailed {
                first_failed,
                exit_codes: CoordinationError::render_exits(&exits),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{MockOrchestrator, TaskDescription, TaskLifecycle};

    fn test_config() -> CoordinationConfig {
        CoordinationConfig {
            launch_delay_ms: 1,
            poll_interval_ms: 1,
            ..Default::default()
        }
    }

    fn launcher() -> (TaskLauncher, MockOrchestrator) {
        let mock = MockOrchestrator::new();
        let launcher = TaskLauncher::new(test_config(), Arc::new(mock.clone()));
        (launcher, mock)
    }

    fn publisher_request(shard_count: usize) -> LaunchRequest<'static> {
        LaunchRequest {
            shard_count,
            role: Role::Publisher,
            variant: ProtocolVariant::SingleKey,
            input_base: "/data/prepared",
            output_base: "/data/matched",
            encryption_keys: None,
            peer_addresses: None,
        }
    }

    #[tokio::test]
    async fn test_publisher_launch_submits_in_index_order() {
        let (launcher, mock) = launcher();
        let handles = launcher.launch(&publisher_request(3)).await.unwrap();
        assert_eq!(handles.len(), 3);

        let submissions = mock.submissions();
        for (i, spec) in submissions.iter().enumerate() {
            assert_eq!(spec.shard_index, i);
            assert_eq!(spec.command[1], "run");
            assert_eq!(spec.command[2], "publisher");
            assert_eq!(spec.command[3], format!("/data/prepared_{i}"));
            assert_eq!(spec.command[4], format!("/data/matched_{i}"));
            assert!(spec.command.contains(&format!("--port={}", 15200 + i)));
            assert!(spec
                .environment
                .iter()
                .any(|(k, _)| k == ACCESS_KEY_ENV));
        }
    }

    #[tokio::test]
    async fn test_shard_count_beyond_port_range_rejected_before_launch() {
        let (launcher, mock) = launcher();
        // default base 15200 leaves fewer than 60_000 ports above it
        let err = launcher.launch(&publisher_request(60_000)).await.unwrap_err();
        assert!(err.to_string().contains("port range"));
        assert!(mock.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_partner_requires_exact_peer_count() {
        let (launcher, mock) = launcher();
        let addresses = vec!["10.0.0.1:15200".to_string(), "10.0.0.2:15201".to_string()];
        let request = LaunchRequest {
            role: Role::Partner,
            peer_addresses: Some(&addresses),
            ..publisher_request(3)
        };

        let err = launcher.launch(&request).await.unwrap_err();
        assert!(err.to_string().contains("expected shard_count 3"));
        // nothing may have been submitted
        assert!(mock.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_partner_missing_peers_rejected_before_launch() {
        let (launcher, mock) = launcher();
        let request = LaunchRequest {
            role: Role::Partner,
            ..publisher_request(2)
        };
        assert!(launcher.launch(&request).await.is_err());
        assert!(mock.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_publisher_with_peers_rejected() {
        let (launcher, mock) = launcher();
        let addresses = vec!["10.0.0.1:15200".to_string()];
        let request = LaunchRequest {
            peer_addresses: Some(&addresses),
            ..publisher_request(1)
        };
        assert!(launcher.launch(&request).await.is_err());
        assert!(mock.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_partner_command_carries_peer_address_per_shard() {
        let (launcher, mock) = launcher();
        let addresses = vec!["10.0.0.1:15200".to_string(), "10.0.0.2:15201".to_string()];
        let request = LaunchRequest {
            role: Role::Partner,
            variant: ProtocolVariant::MultiKey,
            peer_addresses: Some(&addresses),
            ..publisher_request(2)
        };
        launcher.launch(&request).await.unwrap();

        let submissions = mock.submissions();
        assert_eq!(submissions[0].command[1], "run_mk");
        assert_eq!(submissions[0].command[5], "10.0.0.1:15200");
        assert_eq!(submissions[1].command[5], "10.0.0.2:15201");
    }

    #[tokio::test]
    async fn test_shuffler_command_carries_encryption_keys() {
        let (launcher, mock) = launcher();
        let request = LaunchRequest {
            variant: ProtocolVariant::MultiKeyShuffler,
            encryption_keys: Some("/keys/enc"),
            ..publisher_request(1)
        };
        launcher.launch(&request).await.unwrap();
        let command = &mock.submissions()[0].command;
        assert_eq!(command[1], "shuffler");
        assert!(command.contains(&"--encryption_keys=/keys/enc".to_string()));
    }

    #[tokio::test]
    async fn test_bad_receipt_fails_whole_batch() {
        let (launcher, mock) = launcher();
        mock.break_receipt_for(1);
        let handles = launcher.launch(&publisher_request(3)).await.unwrap();

        let err = launcher.resolve_handles_to_ids(&handles).await.unwrap_err();
        assert!(err.to_string().contains("shard 1"));
    }

    #[tokio::test]
    async fn test_wait_for_completion_waits_all_and_names_first_failure() {
        let (launcher, mock) = launcher();
        let ids: Vec<TaskId> = (0..3).map(MockOrchestrator::task_id_for).collect();
        mock.script(
            &ids[0],
            vec![TaskDescription::new(TaskLifecycle::Stopped).with_exit_code(0)],
        );
        mock.script(
            &ids[1],
            vec![
                TaskDescription::new(TaskLifecycle::Running),
                TaskDescription::new(TaskLifecycle::Stopped).with_exit_code(9),
            ],
        );
        mock.script(
            &ids[2],
            vec![TaskDescription::new(TaskLifecycle::Stopped).with_exit_code(0)],
        );

        let err = launcher.wait_for_completion(&ids).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("shard 1"), "unexpected error: {msg}");
        assert!(msg.contains("1:9"));
        // the sibling after the failure was still polled to completion
        assert!(mock.poll_count(&ids[2]) >= 1);
    }
}
