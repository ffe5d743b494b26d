// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Address exchange between publisher and partner.
//!
//! The publisher polls the orchestration API until every one of its tasks is
//! running with a discoverable address, then persists the index-ordered
//! manifest to shared storage. The partner reads the manifest back and
//! validates the line count against the agreed shard count before
//! connecting anything.

use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info};

use crate::error::CoordinationError;
use crate::orchestrator::{Orchestrator, TaskId, TaskLifecycle};
use crate::storage::StorageRouter;
use crate::{ErrorContext, Result};

pub struct AddressExchange {
    orchestrator: Arc<dyn Orchestrator>,
    poll_interval: Duration,
    /// Per-task cap on polling. `None` polls without bound.
    poll_timeout: Option<Duration>,
}

impl AddressExchange {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        poll_interval: Duration,
        poll_timeout: Option<Duration>,
    ) -> Self {
        Self {
            orchestrator,
            poll_interval,
            poll_timeout,
        }
    }

    /// Resolve one address per task id, index-aligned with the input.
    ///
    /// Each task is polled until it is running with an address. A task that
    /// reaches a terminal state first kills resolution for all shards; one
    /// dead shard fails the whole stage.
    pub async fn resolve_addresses(&self, task_ids: &[TaskId]) -> Result<Vec<String>> {
        let mut addresses = Vec::with_capacity(task_ids.len());
        for (i, id) in task_ids.iter().enumerate() {
            addresses.push(self.resolve_one(i, id).await?);
        }
        Ok(addresses)
    }

    async fn resolve_one(&self, shard_index: usize, id: &TaskId) -> Result<String> {
        let started = Instant::now();
        let mut address_seen = false;
        loop {
            let description = self.orchestrator.describe_task(id).await?;

            // Log the address the first time it shows up, even before the
            // task reports running.
            if let Some(address) = description.address.as_deref() {
                if !address_seen {
                    info!(shard = shard_index, task = %id, %address, "task address discovered");
                    address_seen = true;
                }
            }

            if description.lifecycle.is_terminal() {
                return Err(CoordinationError::TaskDied {
                    shard_index,
                    task_id: id.0.clone(),
                    status: description.lifecycle.to_string(),
                }
                .into());
            }

            if description.lifecycle == TaskLifecycle::Running {
                if let Some(address) = description.address {
                    return Ok(address);
                }
            }

            if let Some(timeout) = self.poll_timeout {
                if started.elapsed() >= timeout {
                    return Err(CoordinationError::PollTimeout {
                        shard_index,
                        task_id: id.0.clone(),
                        waited_secs: started.elapsed().as_secs(),
                    }
                    .into());
                }
            }

            debug!(shard = shard_index, task = %id, status = %description.lifecycle, "still waiting for address");
            sleep(self.poll_interval).await;
        }
    }
}

/// Persist the manifest as one newline-terminated address per line; line `i`
/// corresponds to shard `i`, with no trailing metadata.
pub async fn write_manifest(
    storage: &StorageRouter,
    path: &str,
    addresses: &[String],
) -> Result<()> {
    let mut body = String::new();
    for address in addresses {
        body.push_str(address);
        body.push('\n');
    }
    storage
        .put(path, body.as_bytes())
        .await
        .with_context(|| format!("writing address manifest to {path}"))
}

/// Read the manifest back, validating line count against the shard count
/// both parties agreed on out of band.
pub async fn read_manifest(
    storage: &StorageRouter,
    path: &str,
    expected: usize,
) -> Result<Vec<String>> {
    let raw = storage
        .get(path)
        .await
        .with_context(|| format!("reading address manifest from {path}"))?;
    let text = String::from_utf8(raw)
        .map_err(|_| CoordinationError::config(format!("manifest at {path} is not UTF-8 text")))?;

    let addresses: Vec<String> = text.lines().map(|l| l.to_string()).collect();
    if addresses.len() != expected {
        return Err(CoordinationError::ManifestMismatch {
            path: path.to_string(),
            expected,
            actual: addresses.len(),
        }
        .into());
    }
    Ok(addresses)
}
