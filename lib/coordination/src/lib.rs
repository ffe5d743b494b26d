// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Coordination core for two-party private-identity-matching pipelines.
//!
//! Two mutually distrusting parties (a *publisher* and a *partner*) run a
//! multi-stage set-intersection computation on ephemeral cloud containers.
//! This crate owns the coordination: sharding the input, launching and
//! tracking one remote worker task per shard, exchanging discovered network
//! addresses through durable storage, enforcing stage ordering, and fanning
//! per-shard results back in.
//!
//! The PID-matching worker binary, the container-orchestration API, and the
//! cloud blob store are external collaborators, reached through the
//! [`orchestrator::Orchestrator`] and [`storage::BlobStore`] seams.

pub use anyhow::{
    anyhow as error, bail as raise, Context as ErrorContext, Error, Ok as OK, Result,
};

pub mod address;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod orchestrator;
pub mod protocol;
pub mod stage;
pub mod storage;

pub use config::CoordinationConfig;
pub use coordinator::Coordinator;
pub use error::CoordinationError;
pub use protocol::{ProtocolVariant, Role, Stage};
