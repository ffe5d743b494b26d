// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Full pipeline over local child processes: shard -> prepare -> match
//! (publisher then partner) -> combine, with the address manifest exchanged
//! through a file, the way two separately scheduled role processes would.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use pidmatch_coordination::coordinator::MatchRequest;
use pidmatch_coordination::orchestrator::ProcessOrchestrator;
use pidmatch_coordination::storage::StorageRouter;
use pidmatch_coordination::{CoordinationConfig, Coordinator, ProtocolVariant, Role};

/// Stand-in worker binary. Match-stage publisher tasks stay alive after
/// writing output so their address can be resolved; partner tasks exit as
/// soon as their output is written.
fn write_fake_worker(dir: &Path) -> String {
    let path = dir.join("pid-worker");
    let script = r#"#!/bin/sh
cmd="$1"; role="$2"; in="$3"; out="$4"
case "$cmd" in
  shard|prepare) cp "$in" "$out" ;;
  run|run_mk|shuffler)
    cp "$in" "$out"
    if [ "$role" = "publisher" ]; then sleep 2; fi
    ;;
  combine) cat "$in"_* > "$out" ;;
esac
"#;
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_str().unwrap().to_string()
}

fn coordinator(worker_binary: String) -> Coordinator {
    let config = CoordinationConfig {
        worker_binary,
        launch_delay_ms: 1,
        poll_interval_ms: 5,
        ..Default::default()
    };
    Coordinator::new(
        config,
        Arc::new(ProcessOrchestrator::new()),
        StorageRouter::local_only(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_full_pipeline_publisher_then_partner() {
    let dir = tempfile::tempdir().unwrap();
    let worker = write_fake_worker(dir.path());
    let base = |name: &str| dir.path().join(name).to_str().unwrap().to_string();

    let input = base("input.csv");
    std::fs::write(&input, "id,email\n1,a@x\n2,b@y\n").unwrap();

    let shard_count = 2;
    let publisher = coordinator(worker.clone());
    let partner = coordinator(worker);

    // each party shards and prepares its own input
    publisher
        .run_shard(Role::Publisher, &input, &base("shards"), shard_count)
        .await
        .unwrap();
    publisher
        .run_prepare(Role::Publisher, &base("shards"), &base("prepared"), shard_count)
        .await
        .unwrap();

    // publisher side of the match: persists the manifest and returns
    let manifest = base("ips");
    publisher
        .run_match(&MatchRequest {
            role: Role::Publisher,
            variant: ProtocolVariant::SingleKey,
            shard_count,
            input_base: &base("prepared"),
            output_base: &base("pub_matched"),
            manifest_path: &manifest,
            encryption_keys: None,
        })
        .await
        .unwrap();

    let manifest_body = std::fs::read_to_string(&manifest).unwrap();
    let lines: Vec<&str> = manifest_body.lines().collect();
    assert_eq!(lines.len(), shard_count);
    assert_eq!(lines[0], "127.0.0.1:15200");
    assert_eq!(lines[1], "127.0.0.1:15201");

    // partner side: reads the manifest, runs to completion
    partner
        .run_shard(Role::Partner, &input, &base("p_shards"), shard_count)
        .await
        .unwrap();
    partner
        .run_prepare(Role::Partner, &base("p_shards"), &base("p_prepared"), shard_count)
        .await
        .unwrap();
    partner
        .run_match(&MatchRequest {
            role: Role::Partner,
            variant: ProtocolVariant::SingleKey,
            shard_count,
            input_base: &base("p_prepared"),
            output_base: &base("p_matched"),
            manifest_path: &manifest,
            encryption_keys: None,
        })
        .await
        .unwrap();

    for i in 0..shard_count {
        assert!(Path::new(&format!("{}_{i}", base("p_matched"))).exists());
    }

    // fan the partner's match outputs back in
    let result = partner
        .run_combine(Role::Partner, &base("p_matched"), &base("final"), shard_count)
        .await
        .unwrap();
    let combined = std::fs::read_to_string(&result.outputs[0]).unwrap();
    assert_eq!(combined, "id,email\n1,a@x\n2,b@y\n".repeat(2));
}
