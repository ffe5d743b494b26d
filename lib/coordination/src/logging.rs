// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Logging for the coordination core.
//!
//! Output takes two forms: `READABLE` (default) or `JSONL`, selected by
//! setting the `PIDMATCH_LOG_JSONL` environment variable to `1`. Filters are
//! configured through the `PIDMATCH_LOG` environment variable as
//! comma-separated `target=level` directives; the default level is `info`.

use std::sync::Once;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// ENV used to set the log filter
const FILTER_ENV: &str = "PIDMATCH_LOG";

/// ENV used to switch to JSONL output
const JSONL_ENV: &str = "PIDMATCH_LOG_JSONL";

/// Once instance to ensure the logger is only initialized once
static INIT: Once = Once::new();

/// Initialize the global tracing subscriber. Safe to call more than once;
/// only the first call has any effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .with_env_var(FILTER_ENV)
            .from_env_lossy();

        let jsonl = std::env::var(JSONL_ENV).map(|v| v == "1").unwrap_or(false);

        if jsonl {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        } else {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
