// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! Turns a staged file into a tracked Resource with a canonical copy
//! (spec §4.2).

use std::path::Path;

use archive_adapters::{sha1_hex, Adapter};
use archive_store::MetadataStore;
use archive_types::{ArchiveError, Result};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

pub struct Ingester {
    canonical_adapter_id: String,
}

impl Ingester {
    pub fn new(canonical_adapter_id: impl Into<String>) -> Self {
        Self {
            canonical_adapter_id: canonical_adapter_id.into(),
        }
    }

    /// Step 1-6 of spec §4.2. The Resource row is written only after
    /// the canonical copy exists; if this function returns `Err` after
    /// having called `store_canonical`, the canonical bytes are an
    /// orphan that a later out-of-band sweep must reconcile.
    #[allow(clippy::too_many_arguments)]
    pub async fn ingest(
        &self,
        store: &MetadataStore,
        canonical_adapter: &dyn Adapter,
        path: &Path,
        levels: &[String],
        description: &str,
        delete_after: bool,
        metadata_schema: Option<&Value>,
        metadata: &[(String, String)],
    ) -> Result<Uuid> {
        let bytes = tokio::fs::read(path).await?;
        let checksum = sha1_hex(&bytes);
        let uuid = Uuid::new_v4();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ArchiveError::StorageFailed(format!("not a regular file path: {path:?}")))?
            .to_string();

        let locator = canonical_adapter
            .store_canonical(store, path, uuid, &checksum, &filename)
            .await?;
        debug!(%uuid, adapter = canonical_adapter.id(), "canonical copy written");

        store
            .insert_resource(uuid, &locator, levels, &filename, &checksum, description)
            .await?;

        if let Some(schema) = metadata_schema {
            store.set_metadata_schema(uuid, schema).await?;
        }
        for (key, value) in metadata {
            store.set_metadata(uuid, key, value).await?;
        }

        if delete_after {
            tokio::fs::remove_file(path).await?;
        }

        info!(%uuid, filename, "resource ingested");
        Ok(uuid)
    }

    /// `Delete(uuid)`: canonical checksum must still match the recorded
    /// Resource checksum. On drift the caller must escalate via the
    /// repair path rather than delete silently.
    pub async fn delete(
        &self,
        store: &MetadataStore,
        canonical_adapter: &dyn Adapter,
        uuid: Uuid,
    ) -> Result<()> {
        let resource = store.get_resource(uuid).await?;
        let actual = canonical_adapter.actual_checksum(store, uuid).await?;
        if actual != resource.checksum {
            return Err(ArchiveError::ChecksumMismatch {
                uuid,
                adapter_id: self.canonical_adapter_id.clone(),
                expected: resource.checksum,
                actual,
            });
        }
        canonical_adapter.delete_canonical(store, uuid).await?;
        store.delete_metadata(uuid).await?;
        store.delete_resource(uuid).await?;
        info!(%uuid, "resource deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_adapters::LocalFsAdapter;
    use tempfile::TempDir;

    #[tokio::test]
    async fn ingest_then_delete_removes_resource() {
        let store = MetadataStore::connect("sqlite::memory:").await.unwrap();
        let dropbox = TempDir::new().unwrap();
        let backend = TempDir::new().unwrap();
        let adapter = LocalFsAdapter::new("local1", backend.path());
        let ingester = Ingester::new("local1");

        let path = dropbox.path().join("grace.jpg");
        tokio::fs::write(&path, b"cat photo bytes").await.unwrap();

        let uuid = ingester
            .ingest(
                &store,
                &adapter,
                &path,
                &["low".to_string()],
                "cat",
                false,
                None,
                &[],
            )
            .await
            .unwrap();

        let resource = store.get_resource(uuid).await.unwrap();
        assert_eq!(resource.filename, "grace.jpg");
        assert_eq!(resource.levels, vec!["low".to_string()]);

        ingester.delete(&store, &adapter, uuid).await.unwrap();
        let err = store.get_resource(uuid).await.unwrap_err();
        assert!(matches!(err, ArchiveError::ResourceNotIngested(_)));
    }
}
