// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured logging setup. `RUST_LOG` controls verbosity; defaults to
//! `info` when unset.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
