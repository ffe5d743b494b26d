// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Generic fan-out/fan-in driver for per-shard commands.
//!
//! All shard processes are spawned up front and every one of them is waited
//! on before the stage's outcome is evaluated, so a failing shard never
//! leaves siblings orphaned. Partial outputs of a failed stage are left in
//! place for diagnosis.

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::CoordinationError;
use crate::protocol::{shard_path, Stage};
use crate::storage::StorageRouter;
use crate::Result;

/// Remote persistence target for a stage's outputs.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub remote_base: String,
}

/// Output artifact paths of a completed stage.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub outputs: Vec<String>,
}

pub struct StageExecutor {
    storage: StorageRouter,
}

impl StageExecutor {
    pub fn new(storage: StorageRouter) -> Self {
        Self { storage }
    }

    /// Run one stage: invoke `command(i)` for every shard, spawn each as an
    /// independent process, wait for all of them, then (optionally) upload
    /// each shard's output to `{remote_base}_{i}` sequentially in index
    /// order, aborting on the first upload failure.
    pub async fn run_stage<F>(
        &self,
        stage: Stage,
        shard_count: usize,
        output_base: &str,
        upload: Option<UploadTarget>,
        mut command: F,
    ) -> Result<StageResult>
    where
        F: FnMut(usize) -> Vec<String>,
    {
        if shard_count == 0 {
            return Err(CoordinationError::config(format!(
                "shard_count must be >= 1 for stage '{stage}'"
            ))
            .into());
        }

        let mut children: Vec<(usize, Result<Child>)> = Vec::with_capacity(shard_count);
        for i in 0..shard_count {
            let argv = command(i);
            children.push((i, Self::spawn(stage, i, argv)));
        }

        // Wait on every shard before judging the stage, even after a spawn
        // or exit failure, so no process is left running unobserved.
        let mut exits: Vec<(usize, Option<i32>)> = Vec::with_capacity(shard_count);
        let mut spawn_failure: Option<(usize, crate::Error)> = None;
        for (i, child) in children {
            match child {
                Ok(mut child) => {
                    let code = match child.wait().await {
                        Ok(status) => status.code(),
                        Err(e) => {
                            warn!(stage = %stage, shard = i, error = %e, "wait failed");
                            None
                        }
                    };
                    if code != Some(0) {
                        warn!(stage = %stage, shard = i, exit = ?code, "shard process failed");
                    }
                    exits.push((i, code));
                }
                Err(e) => {
                    if spawn_failure.is_none() {
                        spawn_failure = Some((i, e));
                    }
                    exits.push((i, None));
                }
            }
        }

        if let Some((i, e)) = spawn_failure {
            return Err(e.context(format!("spawning shard {i} of stage '{stage}'")));
        }
        if let Some(&(first_failed, _)) = exits.iter().find(|(_, code)| *code != Some(0)) {
            return Err(CoordinationError::ShardsFailed {
                first_failed,
                exit_codes: CoordinationError::render_exits(&exits),
            }
            .into());
        }

        // Exactly one artifact per shard index, or the stage failed.
        for i in 0..shard_count {
            let path = shard_path(output_base, i);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(CoordinationError::MissingArtifact {
                    shard_index: i,
                    path,
                }
                .into());
            }
        }

        let outputs = match upload {
            Some(target) => self.upload_outputs(shard_count, output_base, &target).await?,
            None => (0..shard_count).map(|i| shard_path(output_base, i)).collect(),
        };

        debug!(stage = %stage, shards = shard_count, "stage complete");
        Ok(StageResult { outputs })
    }

    fn spawn(stage: Stage, shard_index: usize, argv: Vec<String>) -> Result<Child> {
        let program = argv.first().ok_or_else(|| {
            CoordinationError::config(format!(
                "empty command for shard {shard_index} of stage '{stage}'"
            ))
        })?;
        debug!(stage = %stage, shard = shard_index, command = ?argv, "spawning shard process");
        Ok(Command::new(program).args(&argv[1..]).spawn()?)
    }

    /// Sequential, index-ordered uploads; the first failure aborts the rest.
    async fn upload_outputs(
        &self,
        shard_count: usize,
        local_base: &str,
        target: &UploadTarget,
    ) -> Result<Vec<String>> {
        let mut outputs = Vec::with_capacity(shard_count);
        for i in 0..shard_count {
            let local = shard_path(local_base, i);
            let remote = shard_path(&target.remote_base, i);
            self.storage.copy(&local, &remote).await.map_err(|e| {
                CoordinationError::Upload {
                    shard_index: i,
                    path: remote.clone(),
                    source: e,
                }
            })?;
            debug!(shard = i, path = %remote, "uploaded shard output");
            outputs.push(remote);
        }
        Ok(outputs)
    }
}
