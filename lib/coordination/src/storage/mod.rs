// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Uniform byte-blob storage addressed by path.
//!
//! Paths beginning with a URL scheme (`s3://...`, `https://...`) are routed
//! to an injected remote store; everything else is local filesystem. The
//! dispatch is purely by path-prefix inspection, with no separate flag.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::CoordinationError;
use crate::Result;

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

/// Read/write of byte blobs addressed by path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Vec<u8>>;
    async fn put(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// True if `path` carries a cloud-URL scheme and belongs to remote storage.
pub fn is_remote_path(path: &str) -> bool {
    path.split_once("://")
        .is_some_and(|(scheme, _)| !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-'))
}

/// Routes each path to local disk or the configured remote store.
#[derive(Clone)]
pub struct StorageRouter {
    local: Arc<dyn BlobStore>,
    remote: Option<Arc<dyn BlobStore>>,
}

impl StorageRouter {
    /// Router over local disk only; any remote path is a configuration error.
    pub fn local_only() -> Self {
        Self {
            local: Arc::new(LocalStore),
            remote: None,
        }
    }

    pub fn with_remote(remote: Arc<dyn BlobStore>) -> Self {
        Self {
            local: Arc::new(LocalStore),
            remote: Some(remote),
        }
    }

    fn route(&self, path: &str) -> Result<&Arc<dyn BlobStore>> {
        if is_remote_path(path) {
            self.remote.as_ref().ok_or_else(|| {
                CoordinationError::config(format!(
                    "remote path '{path}' used but no remote store is configured"
                ))
                .into()
            })
        } else {
            Ok(&self.local)
        }
    }

    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.route(path)?.get(path).await
    }

    pub async fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        self.route(path)?.put(path, data).await
    }

    /// Copy one blob between stores, e.g. a local stage output to its
    /// remote target.
    pub async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let data = self.get(from).await?;
        self.put(to, &data).await
    }
}
