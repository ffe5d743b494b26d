// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::BlobStore;
use crate::{error, Result};

/// In-memory blob store backing tests, with optional per-path write faults.
#[derive(Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_puts: Arc<Mutex<Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put` to `path` fail, for exercising upload-abort paths.
    pub fn fail_put(&self, path: impl Into<String>) {
        self.fail_puts.lock().unwrap().push(path.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(path)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| error!("no blob at {path}"))
    }

    async fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        if self.fail_puts.lock().unwrap().iter().any(|p| p == path) {
            return Err(error!("injected write failure at {path}"));
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_put_failure() {
        let store = MemoryStore::new();
        store.fail_put("s3://bucket/out_1");

        store.put("s3://bucket/out_0", b"a").await.unwrap();
        assert!(store.put("s3://bucket/out_1", b"b").await.is_err());
        assert!(store.contains("s3://bucket/out_0"));
        assert!(!store.contains("s3://bucket/out_1"));
    }
}
