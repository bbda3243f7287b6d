// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! The Metadata Store: a durable catalog of resources, copies, levels,
//! and per-object user metadata. Sole source of truth about what should
//! exist where (spec §4.4). Owns no bytes — all object bytes live in
//! adapters.

mod rows;

use std::str::FromStr;

use archive_types::{
    ArchiveError, Copy, Level, LevelAdapter, ObjectMetadataEntry, Resource, Result,
};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

const MIGRATION: &str = include_str!("../migrations/0001_init.sql");

/// Owned handle to the metadata database. Lifecycle is tied to the
/// process that opened it; no shared global connection (spec §9 design
/// note: "global cursors ... re-architected as owned handles").
#[derive(Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    /// Open (creating if absent) the SQLite file at `db_file` and apply
    /// the catalog schema. Use `"sqlite::memory:"` for tests.
    pub async fn connect(db_file: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(db_file)
            .map_err(|e| ArchiveError::ConfigurationError(format!("invalid db_file: {e}")))?
            .create_if_missing(true);
        // A bare `:memory:` database is private per connection; pooling
        // more than one would make writes on one invisible to reads on
        // another. Single-connection pool for in-memory use.
        let max_connections = if db_file.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        debug!(db_file, "metadata store ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in MIGRATION.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ---- resources ----------------------------------------------------

    pub async fn insert_resource(
        &self,
        uuid: Uuid,
        canonical_locator: &str,
        levels: &[String],
        filename: &str,
        checksum: &str,
        description: &str,
    ) -> Result<Resource> {
        let levels_col = Resource::levels_to_column(levels);
        let id = sqlx::query(
            "insert into resources (canonical_locator, levels, filename, checksum, uuid, description) \
             values (?, ?, ?, ?, ?, ?)",
        )
        .bind(canonical_locator)
        .bind(&levels_col)
        .bind(filename)
        .bind(checksum)
        .bind(uuid.to_string())
        .bind(description)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!(%uuid, filename, "resource ingested into catalog");
        Ok(Resource {
            id,
            uuid,
            filename: filename.to_string(),
            checksum: checksum.to_string(),
            levels: levels.to_vec(),
            canonical_locator: canonical_locator.to_string(),
            description: description.to_string(),
        })
    }

    pub async fn get_resource(&self, uuid: Uuid) -> Result<Resource> {
        let row = sqlx::query("select * from resources where uuid = ?")
            .bind(uuid.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ArchiveError::ResourceNotIngested(uuid))?;
        rows::resource_from_row(&row)
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>> {
        let rows = sqlx::query("select * from resources")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(rows::resource_from_row).collect()
    }

    /// Substring match on filename, canonical locator, uuid, or
    /// description — see SPEC_FULL §10.
    pub async fn search(&self, term: &str) -> Result<Vec<Resource>> {
        let pattern = format!("%{term}%");
        let rows = sqlx::query(
            "select * from resources where filename like ? or canonical_locator like ? \
             or uuid like ? or description like ?",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rows::resource_from_row).collect()
    }

    pub async fn update_resource_levels(&self, uuid: Uuid, levels: &[String]) -> Result<()> {
        let levels_col = Resource::levels_to_column(levels);
        sqlx::query("update resources set levels = ? where uuid = ?")
            .bind(levels_col)
            .bind(uuid.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace checksum and canonical locator for `Update` (spec §6).
    pub async fn update_resource_contents(
        &self,
        uuid: Uuid,
        checksum: &str,
        canonical_locator: &str,
    ) -> Result<()> {
        sqlx::query("update resources set checksum = ?, canonical_locator = ? where uuid = ?")
            .bind(checksum)
            .bind(canonical_locator)
            .bind(uuid.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_resource(&self, uuid: Uuid) -> Result<()> {
        sqlx::query("delete from resources where uuid = ?")
            .bind(uuid.to_string())
            .execute(&self.pool)
            .await?;
        debug!(%uuid, "resource removed from catalog");
        Ok(())
    }

    // ---- copies ---------------------------------------------------------

    /// Insert a Copy row. Idempotent per spec Invariant 8: if a matching
    /// row already exists, returns it instead of inserting a duplicate.
    pub async fn add_copy(
        &self,
        resource_uuid: Uuid,
        adapter_id: &str,
        adapter_type: &str,
        locator: &str,
        checksum: &str,
        canonical: bool,
    ) -> Result<Copy> {
        if let Some(existing) = self.get_copy(resource_uuid, adapter_id, canonical).await? {
            return Ok(existing);
        }
        let copy_id = sqlx::query(
            "insert into copies (resource_uuid, adapter_id, locator, checksum, adapter_type, canonical) \
             values (?, ?, ?, ?, ?, ?)",
        )
        .bind(resource_uuid.to_string())
        .bind(adapter_id)
        .bind(locator)
        .bind(checksum)
        .bind(adapter_type)
        .bind(canonical)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Copy {
            copy_id,
            resource_uuid,
            adapter_id: adapter_id.to_string(),
            adapter_type: adapter_type.to_string(),
            locator: locator.to_string(),
            checksum: checksum.to_string(),
            canonical,
        })
    }

    pub async fn get_copy(
        &self,
        resource_uuid: Uuid,
        adapter_id: &str,
        canonical: bool,
    ) -> Result<Option<Copy>> {
        let row = sqlx::query(
            "select * from copies where resource_uuid = ? and adapter_id = ? and canonical = ? limit 1",
        )
        .bind(resource_uuid.to_string())
        .bind(adapter_id)
        .bind(canonical)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(rows::copy_from_row).transpose()
    }

    pub async fn get_canonical_copy(&self, resource_uuid: Uuid) -> Result<Option<Copy>> {
        let row = sqlx::query("select * from copies where resource_uuid = ? and canonical = 1")
            .bind(resource_uuid.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(rows::copy_from_row).transpose()
    }

    pub async fn list_copies(&self, resource_uuid: Uuid) -> Result<Vec<Copy>> {
        let rows = sqlx::query("select * from copies where resource_uuid = ?")
            .bind(resource_uuid.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(rows::copy_from_row).collect()
    }

    /// Delete succeeds even if no matching row exists — idempotent
    /// cleanup, per spec §4.4.
    pub async fn delete_copy(&self, resource_uuid: Uuid, adapter_id: &str, canonical: bool) -> Result<()> {
        sqlx::query("delete from copies where resource_uuid = ? and adapter_id = ? and canonical = ?")
            .bind(resource_uuid.to_string())
            .bind(adapter_id)
            .bind(canonical)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- levels -----------------------------------------------------------

    pub async fn add_level(
        &self,
        name: &str,
        frequency: i64,
        adapters: &[LevelAdapter],
        copies_per_adapter: i64,
    ) -> Result<Level> {
        let adapters_json = serde_json::to_string(adapters)
            .map_err(|e| ArchiveError::ConfigurationError(e.to_string()))?;
        let id = sqlx::query(
            "insert into levels (name, frequency, adapters_json, copies) values (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(frequency)
        .bind(&adapters_json)
        .bind(copies_per_adapter)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Level {
            id,
            name: name.to_string(),
            check_frequency: frequency,
            adapters: adapters.to_vec(),
            copies_per_adapter,
        })
    }

    pub async fn get_level(&self, name: &str) -> Result<Level> {
        let row = sqlx::query("select * from levels where name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ArchiveError::LevelNotFound(name.to_string()))?;
        rows::level_from_row(&row)
    }

    pub async fn list_levels(&self) -> Result<Vec<Level>> {
        let rows = sqlx::query("select * from levels").fetch_all(&self.pool).await?;
        rows.iter().map(rows::level_from_row).collect()
    }

    /// Deletes the level, then strips its name from every resource's
    /// `levels` list (spec §4.4: "repair of orphaned assignments").
    pub async fn delete_level(&self, name: &str) -> Result<()> {
        sqlx::query("delete from levels where name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        for resource in self.list_resources().await? {
            if resource.levels.iter().any(|l| l == name) {
                let remaining: Vec<String> =
                    resource.levels.into_iter().filter(|l| l != name).collect();
                warn!(level = name, uuid = %resource.uuid, "stripping orphaned level assignment");
                self.update_resource_levels(resource.uuid, &remaining).await?;
            }
        }
        Ok(())
    }

    // ---- object metadata ----------------------------------------------------

    pub async fn set_metadata_schema(&self, object_uuid: Uuid, schema: &Value) -> Result<()> {
        let schema_json = schema.to_string();
        sqlx::query("delete from object_metadata_schema where object_uuid = ?")
            .bind(object_uuid.to_string())
            .execute(&self.pool)
            .await?;
        sqlx::query("insert into object_metadata_schema (object_uuid, schema_json) values (?, ?)")
            .bind(object_uuid.to_string())
            .bind(schema_json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_metadata_schema(&self, object_uuid: Uuid) -> Result<Option<Value>> {
        let row = sqlx::query("select schema_json from object_metadata_schema where object_uuid = ?")
            .bind(object_uuid.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let raw: String = row.try_get("schema_json")?;
                Ok(Some(serde_json::from_str(&raw).map_err(|e| {
                    ArchiveError::ConfigurationError(e.to_string())
                })?))
            }
            None => Ok(None),
        }
    }

    pub async fn set_metadata(&self, object_uuid: Uuid, key: &str, value: &str) -> Result<()> {
        sqlx::query("insert into object_metadata (object_uuid, key, value) values (?, ?, ?)")
            .bind(object_uuid.to_string())
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_metadata(&self, object_uuid: Uuid) -> Result<Vec<ObjectMetadataEntry>> {
        let rows = sqlx::query("select * from object_metadata where object_uuid = ?")
            .bind(object_uuid.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(rows::object_metadata_from_row).collect()
    }

    pub async fn delete_metadata(&self, object_uuid: Uuid) -> Result<()> {
        sqlx::query("delete from object_metadata where object_uuid = ?")
            .bind(object_uuid.to_string())
            .execute(&self.pool)
            .await?;
        sqlx::query("delete from object_metadata_schema where object_uuid = ?")
            .bind(object_uuid.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> MetadataStore {
        MetadataStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_resource_roundtrips() {
        let store = store().await;
        let uuid = Uuid::new_v4();
        store
            .insert_resource(
                uuid,
                "canonical_loc",
                &["low".to_string()],
                "grace.jpg",
                "deadbeef",
                "cat",
            )
            .await
            .unwrap();

        let got = store.get_resource(uuid).await.unwrap();
        assert_eq!(got.filename, "grace.jpg");
        assert_eq!(got.levels, vec!["low".to_string()]);
    }

    #[tokio::test]
    async fn get_missing_resource_is_not_ingested() {
        let store = store().await;
        let err = store.get_resource(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ArchiveError::ResourceNotIngested(_)));
    }

    #[tokio::test]
    async fn canonical_copy_uniqueness_is_enforced() {
        let store = store().await;
        let uuid = Uuid::new_v4();
        store
            .add_copy(uuid, "local1", "LocalFs", "loc1", "sum", true)
            .await
            .unwrap();
        // Idempotent re-insert of the identical copy succeeds.
        let again = store
            .add_copy(uuid, "local1", "LocalFs", "loc1", "sum", true)
            .await
            .unwrap();
        assert_eq!(again.adapter_id, "local1");

        // A second, distinct canonical row for the same resource violates
        // the DB-level invariant.
        let err = sqlx::query(
            "insert into copies (resource_uuid, adapter_id, locator, checksum, adapter_type, canonical) \
             values (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid.to_string())
        .bind("local2")
        .bind("loc2")
        .bind("sum2")
        .bind("LocalFs")
        .bind(true)
        .execute(&store.pool)
        .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn search_matches_across_columns() {
        let store = store().await;
        let uuid = Uuid::new_v4();
        store
            .insert_resource(uuid, "loc", &["low".into()], "grace.jpg", "sum", "a cat photo")
            .await
            .unwrap();
        let hits = store.search("cat").await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits = store.search("grace").await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits = store.search("nonexistent").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_level_strips_orphaned_assignment() {
        let store = store().await;
        let uuid = Uuid::new_v4();
        store
            .insert_resource(uuid, "loc", &["low".into(), "medium".into()], "f", "sum", "")
            .await
            .unwrap();
        store.add_level("low", 60, &[], 1).await.unwrap();
        store.delete_level("low").await.unwrap();
        let resource = store.get_resource(uuid).await.unwrap();
        assert_eq!(resource.levels, vec!["medium".to_string()]);
    }
}
