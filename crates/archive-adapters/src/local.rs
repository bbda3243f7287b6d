// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use archive_store::MetadataStore;
use archive_types::{ArchiveError, Result};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::adapter::{sha1_hex, Adapter};

/// Stores bytes under a local directory tree. Can answer
/// `ActualChecksum` without a transfer, since the bytes already live on
/// the same filesystem.
pub struct LocalFsAdapter {
    id: String,
    storage_dir: PathBuf,
}

impl LocalFsAdapter {
    pub fn new(id: impl Into<String>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            storage_dir: storage_dir.into(),
        }
    }

    fn backend_path(&self, locator: &str) -> PathBuf {
        self.storage_dir.join(locator)
    }
}

#[async_trait]
impl Adapter for LocalFsAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> &'static str {
        "LocalFs"
    }

    async fn store(&self, store: &MetadataStore, uuid: Uuid, dropbox_dir: &Path) -> Result<String> {
        if let Some(existing) = store.get_copy(uuid, &self.id, false).await? {
            debug!(%uuid, adapter = %self.id, "copy already present, skipping duplicate store");
            return Ok(existing.locator);
        }

        let resource = store.get_resource(uuid).await?;
        let path = dropbox_dir.join(&resource.filename);
        let bytes = tokio::fs::read(&path).await?;
        let actual = sha1_hex(&bytes);
        if actual != resource.checksum {
            return Err(ArchiveError::ChecksumMismatch {
                uuid,
                adapter_id: self.id.clone(),
                expected: resource.checksum,
                actual,
            });
        }

        let locator = format!("{uuid}_{}", resource.filename);
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        tokio::fs::write(self.backend_path(&locator), &bytes).await?;
        store
            .add_copy(uuid, &self.id, self.adapter_type(), &locator, &actual, false)
            .await?;
        Ok(locator)
    }

    async fn store_canonical(
        &self,
        store: &MetadataStore,
        path: &Path,
        uuid: Uuid,
        checksum: &str,
        filename: &str,
    ) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let actual = sha1_hex(&bytes);
        if actual != checksum {
            return Err(ArchiveError::ChecksumMismatch {
                uuid,
                adapter_id: self.id.clone(),
                expected: checksum.to_string(),
                actual,
            });
        }
        if store.get_canonical_copy(uuid).await?.is_some() {
            return Err(ArchiveError::StorageFailed(format!(
                "canonical copy for {uuid} already exists"
            )));
        }

        let locator = format!("canonical_{uuid}_{filename}");
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        tokio::fs::write(self.backend_path(&locator), &bytes).await?;
        store
            .add_copy(uuid, &self.id, self.adapter_type(), &locator, checksum, true)
            .await?;
        Ok(locator)
    }

    async fn retrieve(&self, store: &MetadataStore, uuid: Uuid, output_dir: &Path) -> Result<PathBuf> {
        let resource = store.get_resource(uuid).await?;
        let copy = match store.get_copy(uuid, &self.id, false).await? {
            Some(copy) => copy,
            None => store
                .get_copy(uuid, &self.id, true)
                .await?
                .ok_or(ArchiveError::NoCopyExists(uuid))?,
        };

        let bytes = tokio::fs::read(self.backend_path(&copy.locator)).await?;
        let actual = sha1_hex(&bytes);
        if actual != copy.checksum {
            return Err(ArchiveError::ChecksumMismatch {
                uuid,
                adapter_id: self.id.clone(),
                expected: copy.checksum,
                actual,
            });
        }

        tokio::fs::create_dir_all(output_dir).await?;
        let dest = output_dir.join(&resource.filename);
        tokio::fs::write(&dest, &bytes).await?;
        Ok(dest)
    }

    async fn delete(&self, store: &MetadataStore, uuid: Uuid) -> Result<()> {
        if let Some(copy) = store.get_copy(uuid, &self.id, false).await? {
            let _ = tokio::fs::remove_file(self.backend_path(&copy.locator)).await;
        }
        store.delete_copy(uuid, &self.id, false).await
    }

    async fn delete_canonical(&self, store: &MetadataStore, uuid: Uuid) -> Result<()> {
        if let Some(copy) = store.get_copy(uuid, &self.id, true).await? {
            let _ = tokio::fs::remove_file(self.backend_path(&copy.locator)).await;
        }
        store.delete_copy(uuid, &self.id, true).await
    }

    async fn actual_checksum(&self, store: &MetadataStore, uuid: Uuid) -> Result<String> {
        let copy = match store.get_copy(uuid, &self.id, false).await? {
            Some(copy) => copy,
            None => store
                .get_copy(uuid, &self.id, true)
                .await?
                .ok_or(ArchiveError::NoCopyExists(uuid))?,
        };
        let bytes = tokio::fs::read(self.backend_path(&copy.locator)).await?;
        Ok(sha1_hex(&bytes))
    }
}
