// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod error;
pub mod model;

pub use error::{ArchiveError, Result};
pub use model::{
    CheckReport, Copy, CopyState, Level, LevelAdapter, ObjectMetadataEntry, RepairOutcome, Resource,
};

/// Sentinel resource id used by `AdapterManager::verify_adapter`'s
/// self-test, kept from the original implementation so a self-test run
/// never collides with a real ingested UUID.
pub const VERIFY_ADAPTER_TEST_FILENAME: &str = "archivist_test_resource.txt";

/// Fixed UUID for the `verify_adapter` self-test resource row.
pub fn verify_adapter_test_uuid() -> uuid::Uuid {
    uuid::Uuid::from_u128(1)
}
