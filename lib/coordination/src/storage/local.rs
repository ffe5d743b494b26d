// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::path::Path;

use super::BlobStore;
use crate::{ErrorContext, Result};

/// Local-filesystem blob store. Parent directories are created on write.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStore;

#[async_trait]
impl BlobStore for LocalStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {path}"))
    }

    async fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating parent of {path}"))?;
        }
        tokio::fs::write(path, data)
            .await
            .with_context(|| format!("writing {path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("blob");
        let path = path.to_str().unwrap();

        let store = LocalStore;
        store.put(path, b"payload").await.unwrap();
        assert_eq!(store.get(path).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_get_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        assert!(LocalStore.get(path.to_str().unwrap()).await.is_err());
    }
}
