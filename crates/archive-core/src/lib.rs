// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! The replication and integrity engine: ingestion, fan-out, and repair.

pub mod adapter_manager;
pub mod ingester;

pub use adapter_manager::{AdapterConfig, AdapterManager};
pub use ingester::Ingester;
