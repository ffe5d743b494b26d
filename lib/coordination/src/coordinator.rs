// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Top-level stage state machine.
//!
//! Stages run `SHARD -> PREPARE -> MATCH -> COMBINE`, with `AGGREGATE`
//! reachable after combine as an explicit not-implemented stub. The
//! coordinator performs exactly one stage per invocation; the external
//! driver sequences invocations and schedules the publisher and partner as
//! separate processes. Upstream artifacts are validated implicitly: a
//! missing input makes the downstream stage's own read fail.
//!
//! The match stage is asymmetric. The publisher launches its tasks, resolves
//! their addresses, persists the manifest, and returns without waiting for
//! the partner. The partner reads the manifest, launches tasks connected to
//! each publisher address, and blocks until all of its tasks finish; partner
//! completion is authoritative for the stage.

use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;

use crate::address::{self, AddressExchange};
use crate::config::CoordinationConfig;
use crate::error::CoordinationError;
use crate::launcher::{LaunchRequest, TaskLauncher};
use crate::orchestrator::Orchestrator;
use crate::protocol::{shard_path, ProtocolVariant, Role, Stage};
use crate::stage::{StageExecutor, StageResult, UploadTarget};
use crate::storage::{is_remote_path, StorageRouter};
use crate::{ErrorContext, Result};

/// One match-stage invocation.
#[derive(Debug)]
pub struct MatchRequest<'a> {
    pub role: Role,
    pub variant: ProtocolVariant,
    pub shard_count: usize,
    pub input_base: &'a str,
    pub output_base: &'a str,
    /// Shared-storage path the address manifest is exchanged through.
    pub manifest_path: &'a str,
    pub encryption_keys: Option<&'a str>,
}

pub struct Coordinator {
    config: CoordinationConfig,
    orchestrator: Arc<dyn Orchestrator>,
    storage: StorageRouter,
    executor: StageExecutor,
}

impl Coordinator {
    pub fn new(
        config: CoordinationConfig,
        orchestrator: Arc<dyn Orchestrator>,
        storage: StorageRouter,
    ) -> Result<Self> {
        config.validate()?;
        let executor = StageExecutor::new(storage.clone());
        Ok(Self {
            config,
            orchestrator,
            storage,
            executor,
        })
    }

    /// Split the input into `shard_count` shard files.
    pub async fn run_shard(
        &self,
        role: Role,
        input: &str,
        output_base: &str,
        shard_count: usize,
    ) -> Result<StageResult> {
        let (local_base, upload) = self.stage_target(Stage::Shard, output_base).await?;
        let worker = self.config.worker_binary.clone();
        let input = input.to_string();
        self.executor
            .run_stage(Stage::Shard, shard_count, &local_base, upload, |i| {
                vec![
                    worker.clone(),
                    "shard".to_string(),
                    role.to_string(),
                    input.clone(),
                    shard_path(&local_base, i),
                    format!("--shard_index={i}"),
                    format!("--total_shards={shard_count}"),
                ]
            })
            .await
    }

    /// Normalize each shard file for matching.
    pub async fn run_prepare(
        &self,
        role: Role,
        input_base: &str,
        output_base: &str,
        shard_count: usize,
    ) -> Result<StageResult> {
        let (local_base, upload) = self.stage_target(Stage::Prepare, output_base).await?;
        let worker = self.config.worker_binary.clone();
        let input_base = input_base.to_string();
        self.executor
            .run_stage(Stage::Prepare, shard_count, &local_base, upload, |i| {
                vec![
                    worker.clone(),
                    "prepare".to_string(),
                    role.to_string(),
                    shard_path(&input_base, i),
                    shard_path(&local_base, i),
                ]
            })
            .await
    }

    /// Run the match stage for one role.
    pub async fn run_match(&self, request: &MatchRequest<'_>) -> Result<StageResult> {
        if request.shard_count == 0 {
            return Err(CoordinationError::config("shard_count must be >= 1 for match").into());
        }
        if request.variant.requires_encryption_keys() && request.encryption_keys.is_none() {
            return Err(CoordinationError::config(format!(
                "protocol '{}' requires --encryption_keys",
                request.variant
            ))
            .into());
        }

        match request.role {
            Role::Publisher => self.run_publisher(request).await,
            Role::Partner => self.run_partner(request).await,
        }
    }

    /// Publisher: launch, resolve addresses, persist the manifest, return.
    /// Does not wait for the partner.
    async fn run_publisher(&self, request: &MatchRequest<'_>) -> Result<StageResult> {
        let launcher = self.launcher();
        let handles = launcher
            .launch(&LaunchRequest {
                shard_count: request.shard_count,
                role: Role::Publisher,
                variant: request.variant,
                input_base: request.input_base,
                output_base: request.output_base,
                encryption_keys: request.encryption_keys,
                peer_addresses: None,
            })
            .await?;
        let task_ids = launcher.resolve_handles_to_ids(&handles).await?;

        let addresses = self.address_exchange().resolve_addresses(&task_ids).await?;
        address::write_manifest(&self.storage, request.manifest_path, &addresses).await?;
        info!(
            shards = request.shard_count,
            manifest = request.manifest_path,
            "publisher address manifest persisted"
        );

        Ok(self.match_outputs(request))
    }

    /// Partner: read the manifest, launch tasks connected to each publisher
    /// address, and wait for all of them sequentially in shard-index order.
    async fn run_partner(&self, request: &MatchRequest<'_>) -> Result<StageResult> {
        let addresses =
            address::read_manifest(&self.storage, request.manifest_path, request.shard_count)
                .await?;

        let launcher = self.launcher();
        let handles = launcher
            .launch(&LaunchRequest {
                shard_count: request.shard_count,
                role: Role::Partner,
                variant: request.variant,
                input_base: request.input_base,
                output_base: request.output_base,
                encryption_keys: request.encryption_keys,
                peer_addresses: Some(&addresses),
            })
            .await?;
        let task_ids = launcher.resolve_handles_to_ids(&handles).await?;
        launcher.wait_for_completion(&task_ids).await?;
        info!(shards = request.shard_count, "all partner tasks finished");

        Ok(self.match_outputs(request))
    }

    /// Merge the per-shard match outputs into the final artifact. Driven
    /// through the executor as a single logical shard so the zero-shard
    /// guard and failure policy stay uniform.
    pub async fn run_combine(
        &self,
        role: Role,
        input_base: &str,
        output_base: &str,
        shard_count: usize,
    ) -> Result<StageResult> {
        if shard_count == 0 {
            return Err(CoordinationError::config("shard_count must be >= 1 for combine").into());
        }
        let (local_base, upload) = self.stage_target(Stage::Combine, output_base).await?;
        let worker = self.config.worker_binary.clone();
        let input_base = input_base.to_string();
        self.executor
            .run_stage(Stage::Combine, 1, &local_base, upload, |i| {
                vec![
                    worker.clone(),
                    "combine".to_string(),
                    role.to_string(),
                    input_base.clone(),
                    shard_path(&local_base, i),
                    format!("--total_shards={shard_count}"),
                ]
            })
            .await
    }

    /// Cross-deployment aggregation is a documented future stage.
    pub async fn run_aggregate(&self) -> Result<StageResult> {
        Err(CoordinationError::Unimplemented("aggregate").into())
    }

    /// For a remote output base, shard processes write under a fresh
    /// per-run staging subdirectory and the executor uploads afterwards;
    /// local outputs are written in place. The subdirectory is created
    /// here and never reused across runs.
    async fn stage_target(
        &self,
        stage: Stage,
        output_base: &str,
    ) -> Result<(String, Option<UploadTarget>)> {
        if is_remote_path(output_base) {
            let run_dir = format!("{}/{}", self.config.staging_dir, uuid::Uuid::new_v4());
            tokio::fs::create_dir_all(&run_dir)
                .await
                .with_context(|| format!("failed to create staging directory {run_dir}"))?;
            Ok((
                format!("{run_dir}/{stage}_out"),
                Some(UploadTarget {
                    remote_base: output_base.to_string(),
                }),
            ))
        } else {
            Ok((output_base.to_string(), None))
        }
    }

    fn launcher(&self) -> TaskLauncher {
        TaskLauncher::new(self.config.clone(), self.orchestrator.clone())
    }

    fn address_exchange(&self) -> AddressExchange {
        AddressExchange::new(
            self.orchestrator.clone(),
            Duration::from_millis(self.config.poll_interval_ms),
            self.config.poll_timeout_secs.map(Duration::from_secs),
        )
    }

    fn match_outputs(&self, request: &MatchRequest<'_>) -> StageResult {
        StageResult {
            outputs: (0..request.shard_count)
                .map(|i| shard_path(request.output_base, i))
                .collect(),
        }
    }
}
