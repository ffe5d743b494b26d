// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Typed configuration for the coordination core.
//!
//! Configuration is loaded once at the boundary and validated there; the
//! rest of the crate only ever sees these structs. Sources, lowest priority
//! first:
//!   1. Built-in defaults.
//!   2. Optional TOML file passed by the caller.
//!   3. `PIDMATCH_*` environment variables (nested fields split on `__`,
//!      e.g. `PIDMATCH_CLOUD__REGION`).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoordinationError;
use crate::Result;

/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "PIDMATCH_";

/// Container cluster parameters for remote worker tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Cloud region the cluster lives in.
    pub region: String,
    /// Container cluster to submit tasks to.
    pub cluster: String,
    /// Task definition used for every worker task.
    pub task_definition: String,
    /// Container name inside the task definition whose command is overridden.
    pub container: String,
    /// Subnets the tasks attach to.
    pub subnets: Vec<String>,
    /// Security group applied to every task.
    pub security_group: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
            cluster: String::new(),
            task_definition: String::new(),
            container: "pid-worker".to_string(),
            subnets: Vec::new(),
            security_group: String::new(),
        }
    }
}

/// Credentials injected into every worker task's environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Top-level configuration for a coordination run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Path of the PID worker executable inside the container image.
    pub worker_binary: String,

    pub cloud: CloudConfig,
    pub credentials: CredentialsConfig,

    /// Delay between task submissions, to stay under the orchestration
    /// API's rate limits. Must be non-zero.
    pub launch_delay_ms: u64,

    /// Sleep between describe-task polls during address resolution and
    /// completion waits.
    pub poll_interval_ms: u64,

    /// Optional cap on how long address resolution may poll a single task.
    /// `None` polls without bound.
    pub poll_timeout_secs: Option<u64>,

    /// Publisher task for shard `i` listens on `worker_port_base + i`.
    pub worker_port_base: u16,

    /// Directory for local shard outputs of stages whose real target is
    /// remote storage; uploads read from here.
    pub staging_dir: String,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            worker_binary: "/usr/local/bin/pid-worker".to_string(),
            cloud: CloudConfig::default(),
            credentials: CredentialsConfig::default(),
            launch_delay_ms: 5000,
            poll_interval_ms: 5000,
            poll_timeout_secs: None,
            worker_port_base: 15200,
            staging_dir: "/tmp/pidmatch".to_string(),
        }
    }
}

impl CoordinationConfig {
    /// Load configuration from defaults, an optional TOML file, and
    /// `PIDMATCH_*` environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| CoordinationError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// One-shot validation of cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.worker_binary.is_empty() {
            return Err(CoordinationError::config("worker_binary must not be empty").into());
        }
        if self.launch_delay_ms == 0 {
            return Err(
                CoordinationError::config("launch_delay_ms must be non-zero (rate limiting)")
                    .into(),
            );
        }
        if self.poll_interval_ms == 0 {
            return Err(CoordinationError::config("poll_interval_ms must be non-zero").into());
        }
        Ok(())
    }

    /// Port a publisher task for `shard_index` listens on.
    pub fn worker_port(&self, shard_index: usize) -> Result<u16> {
        u16::try_from(shard_index)
            .ok()
            .and_then(|i| self.worker_port_base.checked_add(i))
            .ok_or_else(|| {
                CoordinationError::config(format!(
                    "shard index {shard_index} exceeds the port range above worker_port_base {}",
                    self.worker_port_base
                ))
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        CoordinationConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_launch_delay_rejected() {
        let config = CoordinationConfig {
            launch_delay_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("launch_delay_ms"));
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            launch_delay_ms = 250
            poll_timeout_secs = 600

            [cloud]
            region = "eu-west-1"
            cluster = "pid-cluster"
            task_definition = "pid-task:7"
            container = "pid-worker"
            subnets = ["subnet-a"]
            security_group = "sg-1"
            "#
        )
        .unwrap();

        let config = CoordinationConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.launch_delay_ms, 250);
        assert_eq!(config.poll_timeout_secs, Some(600));
        assert_eq!(config.cloud.region, "eu-west-1");
        assert_eq!(config.cloud.cluster, "pid-cluster");
        // untouched fields keep their defaults
        assert_eq!(config.worker_port_base, 15200);
    }

    #[test]
    fn test_worker_port_is_shard_indexed() {
        let config = CoordinationConfig::default();
        assert_eq!(config.worker_port(0).unwrap(), 15200);
        assert_eq!(config.worker_port(3).unwrap(), 15203);
    }

    #[test]
    fn test_worker_port_rejects_indexes_beyond_port_range() {
        let config = CoordinationConfig::default();
        let err = config.worker_port(u16::MAX as usize).unwrap_err();
        assert!(err.to_string().contains("port range"));
        // truncation of indexes past u16 must not wrap back into range
        assert!(config.worker_port(usize::from(u16::MAX) + 1).is_err());
    }
}
