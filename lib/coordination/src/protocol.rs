// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Protocol-level enums and shard naming.
//!
//! Role and variant dispatch happens through these enums and pattern
//! matching, never through string comparison; the worker subcommand for a
//! variant is derived here and nowhere else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoordinationError;

/// The two mutually distrusting computation roles.
///
/// The publisher is the network-connection target and never receives remote
/// addresses; the partner resolves and connects to one publisher address per
/// shard before launching its own tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Publisher,
    Partner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publisher => write!(f, "publisher"),
            Self::Partner => write!(f, "partner"),
        }
    }
}

impl FromStr for Role {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "publisher" => Ok(Self::Publisher),
            "partner" => Ok(Self::Partner),
            _ => Err(CoordinationError::config(format!(
                "invalid role '{s}'; valid options are 'publisher', 'partner'"
            ))),
        }
    }
}

/// Which matching protocol the remote workers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    SingleKey,
    MultiKey,
    /// Multi-key with shuffling; additionally requires an encryption-keys
    /// artifact.
    MultiKeyShuffler,
}

impl ProtocolVariant {
    /// Worker subcommand for the match stage of this variant.
    pub fn match_subcommand(&self) -> &'static str {
        match self {
            Self::SingleKey => "run",
            Self::MultiKey => "run_mk",
            Self::MultiKeyShuffler => "shuffler",
        }
    }

    /// Whether this variant needs the encryption-keys artifact.
    pub fn requires_encryption_keys(&self) -> bool {
        matches!(self, Self::MultiKeyShuffler)
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleKey => write!(f, "single_key"),
            Self::MultiKey => write!(f, "multi_key"),
            Self::MultiKeyShuffler => write!(f, "multi_key_shuffler"),
        }
    }
}

impl FromStr for ProtocolVariant {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_key" => Ok(Self::SingleKey),
            "multi_key" => Ok(Self::MultiKey),
            "multi_key_shuffler" => Ok(Self::MultiKeyShuffler),
            _ => Err(CoordinationError::config(format!(
                "invalid protocol '{s}'; valid options are 'single_key', 'multi_key', 'multi_key_shuffler'"
            ))),
        }
    }
}

/// Pipeline stages, in order. The coordinator performs exactly one stage per
/// invocation; sequencing across invocations belongs to the external driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Shard,
    Prepare,
    Match,
    Combine,
    /// Cross-deployment aggregation. Reachable only after combine in
    /// multi-shard deployments; currently an explicit not-implemented stub.
    Aggregate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shard => write!(f, "shard"),
            Self::Prepare => write!(f, "prepare"),
            Self::Match => write!(f, "match"),
            Self::Combine => write!(f, "combine"),
            Self::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// Shard-indexed artifact path: `{base}_{index}` at every stage.
pub fn shard_path(base: &str, index: usize) -> String {
    format!("{base}_{index}")
}
