// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! CLI driver for the PID-match coordinator.
//!
//! Each invocation performs exactly one pipeline stage; sequencing the
//! stages (and scheduling the publisher before the partner) belongs to the
//! external scheduler that invokes this binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use pidmatch_coordination::coordinator::MatchRequest;
use pidmatch_coordination::orchestrator::ProcessOrchestrator;
use pidmatch_coordination::storage::StorageRouter;
use pidmatch_coordination::{
    logging, CoordinationConfig, Coordinator, ProtocolVariant, Result, Role,
};

#[derive(Parser)]
#[command(name = "pidmatch-ctl")]
#[command(author, version, about = "Coordinate one stage of a PID-match pipeline", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; PIDMATCH_* env vars override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::Args)]
struct StageArgs {
    /// Computation role
    role: Role,

    /// Input path (base path for shard-indexed stages)
    input: String,

    /// Output base path; `{output}_{i}` per shard
    output: String,

    /// Number of shards, agreed out of band by both parties
    #[arg(long)]
    num_shards: usize,
}

#[derive(Debug, Clone, clap::Args)]
struct MatchArgs {
    #[command(flatten)]
    stage: StageArgs,

    /// Shared-storage path the address manifest is exchanged through
    #[arg(long)]
    manifest: String,
}

#[derive(Subcommand)]
enum Command {
    /// Split the input into shard files
    Shard(StageArgs),
    /// Normalize each shard for matching
    Prepare(StageArgs),
    /// Run the single-key match protocol
    Run(MatchArgs),
    /// Run the multi-key match protocol
    RunMk(MatchArgs),
    /// Run the multi-key protocol with shuffling
    Shuffler {
        #[command(flatten)]
        args: MatchArgs,

        /// Encryption-keys artifact required by the shuffler protocol
        #[arg(long)]
        encryption_keys: String,
    },
    /// Merge per-shard match outputs into the final artifact
    Combine(StageArgs),
    /// Aggregate results across deployments (not yet implemented)
    Aggregate,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let config = CoordinationConfig::load(cli.config.as_deref())?;
    let coordinator = Coordinator::new(
        config,
        Arc::new(ProcessOrchestrator::new()),
        StorageRouter::local_only(),
    )?;

    let result = match &cli.command {
        Command::Shard(args) => {
            coordinator
                .run_shard(args.role, &args.input, &args.output, args.num_shards)
                .await?
        }
        Command::Prepare(args) => {
            coordinator
                .run_prepare(args.role, &args.input, &args.output, args.num_shards)
                .await?
        }
        Command::Run(args) => {
            run_match(&coordinator, args, ProtocolVariant::SingleKey, None).await?
        }
        Command::RunMk(args) => {
            run_match(&coordinator, args, ProtocolVariant::MultiKey, None).await?
        }
        Command::Shuffler {
            args,
            encryption_keys,
        } => {
            run_match(
                &coordinator,
                args,
                ProtocolVariant::MultiKeyShuffler,
                Some(encryption_keys.as_str()),
            )
            .await?
        }
        Command::Combine(args) => {
            coordinator
                .run_combine(args.role, &args.input, &args.output, args.num_shards)
                .await?
        }
        Command::Aggregate => coordinator.run_aggregate().await?,
    };

    info!(outputs = ?result.outputs, "stage complete");
    Ok(())
}

async fn run_match(
    coordinator: &Coordinator,
    args: &MatchArgs,
    variant: ProtocolVariant,
    encryption_keys: Option<&str>,
) -> Result<pidmatch_coordination::stage::StageResult> {
    coordinator
        .run_match(&MatchRequest {
            role: args.stage.role,
            variant,
            shard_count: args.stage.num_shards,
            input_base: &args.stage.input,
            output_base: &args.stage.output,
            manifest_path: &args.manifest,
            encryption_keys,
        })
        .await
}
