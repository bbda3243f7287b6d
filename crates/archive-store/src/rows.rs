// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! Manual row-to-model mapping. Hand-written rather than `FromRow`
//! derive or compile-time `query!` macros, since neither the `uuid`
//! feature's sqlite support nor a live database to check queries
//! against can be assumed here.

use archive_types::{ArchiveError, Copy, Level, ObjectMetadataEntry, Resource, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| ArchiveError::ConfigurationError(format!("bad uuid: {e}")))
}

pub fn resource_from_row(row: &SqliteRow) -> Result<Resource> {
    let uuid_raw: String = row.try_get("uuid")?;
    let levels_raw: String = row.try_get("levels")?;
    Ok(Resource {
        id: row.try_get("id")?,
        uuid: parse_uuid(&uuid_raw)?,
        filename: row.try_get("filename")?,
        checksum: row.try_get("checksum")?,
        levels: Resource::levels_from_column(&levels_raw),
        canonical_locator: row.try_get("canonical_locator")?,
        description: row.try_get("description")?,
    })
}

pub fn copy_from_row(row: &SqliteRow) -> Result<Copy> {
    let resource_uuid_raw: String = row.try_get("resource_uuid")?;
    Ok(Copy {
        copy_id: row.try_get("copy_id")?,
        resource_uuid: parse_uuid(&resource_uuid_raw)?,
        adapter_id: row.try_get("adapter_id")?,
        adapter_type: row.try_get("adapter_type")?,
        locator: row.try_get("locator")?,
        checksum: row.try_get("checksum")?,
        canonical: row.try_get("canonical")?,
    })
}

pub fn level_from_row(row: &SqliteRow) -> Result<Level> {
    let adapters_json: String = row.try_get("adapters_json")?;
    let adapters = serde_json::from_str(&adapters_json)
        .map_err(|e| ArchiveError::ConfigurationError(e.to_string()))?;
    Ok(Level {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        check_frequency: row.try_get("frequency")?,
        adapters,
        copies_per_adapter: row.try_get("copies")?,
    })
}

pub fn object_metadata_from_row(row: &SqliteRow) -> Result<ObjectMetadataEntry> {
    let object_uuid_raw: String = row.try_get("object_uuid")?;
    Ok(ObjectMetadataEntry {
        id: row.try_get("id")?,
        object_uuid: parse_uuid(&object_uuid_raw)?,
        key: row.try_get("key")?,
        value: row.try_get("value")?,
    })
}
