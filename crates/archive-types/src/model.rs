// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ingested object. `uuid` and `checksum` are immutable once the row
/// exists, except that `update` replaces `checksum` (and the canonical
/// `locator`) transactionally under the same `uuid` — see spec §3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub uuid: Uuid,
    pub filename: String,
    pub checksum: String,
    pub levels: Vec<String>,
    pub canonical_locator: String,
    pub description: String,
}

impl Resource {
    /// Parse the comma-joined `levels` column into its component names.
    pub fn levels_from_column(column: &str) -> Vec<String> {
        column
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }

    pub fn levels_to_column(levels: &[String]) -> String {
        levels.join(",")
    }
}

/// One physical copy of a resource held by one adapter. Column order
/// fixed per SPEC_FULL §10: `(resource_uuid, adapter_id, locator,
/// checksum, adapter_type, canonical)`, surrogate `copy_id` first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Copy {
    pub copy_id: i64,
    pub resource_uuid: Uuid,
    pub adapter_id: String,
    pub adapter_type: String,
    pub locator: String,
    pub checksum: String,
    pub canonical: bool,
}

/// A named durability policy: assigning a level to a resource means a
/// copy must exist in every adapter the level lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: i64,
    pub name: String,
    pub check_frequency: i64,
    pub adapters: Vec<LevelAdapter>,
    pub copies_per_adapter: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelAdapter {
    pub id: String,
    #[serde(rename = "type")]
    pub adapter_type: String,
}

/// One user-defined key/value pair attached to a resource. Orthogonal
/// to replication; deleted with the resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadataEntry {
    pub id: i64,
    pub object_uuid: Uuid,
    pub key: String,
    pub value: String,
}

/// Per-adapter outcome of a repair pass, returned from check operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub resource_uuid: Uuid,
    pub adapter_id: String,
    pub state: CopyState,
    pub checked_at: DateTime<Utc>,
}

/// The repair state machine's per-adapter state (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyState {
    Absent,
    PresentGood,
    PresentMismatch,
    AbsentFlagged,
}

/// Aggregate result of `RunCheck` / `CheckSingleResource`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckReport {
    pub outcomes: Vec<RepairOutcome>,
}

impl CheckReport {
    pub fn all_healthy(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o.state, CopyState::PresentGood))
    }
}
