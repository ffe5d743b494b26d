// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the coordination core.
//!
//! There are no retries anywhere in this crate: a single shard, poll, or
//! upload failure escalates to failing the entire stage, with the offending
//! shard index or parameter embedded in the error. Retrying a stage is the
//! responsibility of the external driver.

use thiserror::Error;

/// Errors raised while coordinating a PID-match pipeline stage.
#[derive(Error, Debug)]
pub enum CoordinationError {
    /// Invalid or inconsistent configuration. Never retried.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A launch response could not be resolved into a task id. Fatal for
    /// the whole batch; downstream stages assume full shard coverage.
    #[error("failed to resolve task id for shard {shard_index}: {message}")]
    Submission { shard_index: usize, message: String },

    /// A task left the running path while its address was being resolved.
    #[error("task {task_id} (shard {shard_index}) entered {status} during address resolution")]
    TaskDied {
        shard_index: usize,
        task_id: String,
        status: String,
    },

    /// Address polling exceeded the configured timeout.
    #[error("timed out after {waited_secs}s waiting for an address for task {task_id} (shard {shard_index})")]
    PollTimeout {
        shard_index: usize,
        task_id: String,
        waited_secs: u64,
    },

    /// One or more shard processes exited non-zero. All siblings were
    /// waited on before this was raised.
    #[error("shard {first_failed} failed; per-shard exit codes: [{exit_codes}]")]
    ShardsFailed {
        first_failed: usize,
        exit_codes: String,
    },

    /// A remote task finished with a non-zero exit. All siblings were
    /// waited on before this was raised.
    #[error("remote task for shard {first_failed} failed; per-shard exits: [{exit_codes}]")]
    TasksFailed {
        first_failed: usize,
        exit_codes: String,
    },

    /// A shard process exited successfully but left no output artifact.
    #[error("shard {shard_index} produced no artifact at {path}")]
    MissingArtifact { shard_index: usize, path: String },

    /// An output artifact could not be persisted to remote storage.
    /// Remaining uploads in the stage were not attempted.
    #[error("failed to upload shard {shard_index} output to {path}")]
    Upload {
        shard_index: usize,
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// The address manifest does not cover the agreed shard count.
    #[error("address manifest at {path} has {actual} entries, expected {expected}")]
    ManifestMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    /// A stage that is part of the command surface but not yet built.
    #[error("stage '{0}' is not implemented")]
    Unimplemented(&'static str),
}

impl CoordinationError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Render `(index, exit_code)` pairs for the *Failed variants.
    pub(crate) fn render_exits(exits: &[(usize, Option<i32>)]) -> String {
        exits
            .iter()
            .map(|(i, code)| match code {
                Some(c) => format!("{i}:{c}"),
                None => format!("{i}:killed"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_exits() {
        let exits = vec![(0, Some(0)), (1, Some(3)), (2, None)];
        assert_eq!(CoordinationError::render_exits(&exits), "0:0, 1:3, 2:killed");
    }

    #[test]
    fn test_shards_failed_display_names_first_index() {
        let err = CoordinationError::ShardsFailed {
            first_failed: 1,
            exit_codes: "0:0, 1:3, 2:0".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("shard 1 failed"));
        assert!(msg.contains("1:3"));
    }
}
