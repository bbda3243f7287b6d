// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! S3-backed adapter. Put/get/delete are wrapped in exponential backoff
//! retries, following the pattern used for object-store access
//! elsewhere in this codebase.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use archive_store::MetadataStore;
use archive_types::{ArchiveError, Result};
use async_trait::async_trait;
use backoff::future::retry;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::DynObjectStore;
use tracing::{error, warn};
use uuid::Uuid;

use crate::adapter::{sha1_hex, Adapter};

pub struct S3Adapter {
    id: String,
    bucket_name: String,
    store: Arc<DynObjectStore>,
}

impl S3Adapter {
    pub fn new(id: impl Into<String>, bucket_name: impl Into<String>, region: &str) -> Result<Self> {
        let bucket_name = bucket_name.into();
        let store = AmazonS3Builder::new()
            .with_bucket_name(&bucket_name)
            .with_region(region)
            .build()
            .map_err(ArchiveError::ObjectStore)?;
        Ok(Self {
            id: id.into(),
            bucket_name,
            store: Arc::new(store),
        })
    }

    async fn get(&self, locator: &str) -> Result<Bytes> {
        let path = ObjectPath::from(locator);
        let backoff = backoff::ExponentialBackoff::default();
        let store = self.store.clone();
        let bytes = retry(backoff, || {
            let store = store.clone();
            let path = path.clone();
            async move {
                store.get(&path).await.map_err(|e| {
                    error!("failed to read {:?} from s3: {:?}", path, e);
                    backoff::Error::transient(e)
                })
            }
        })
        .await
        .map_err(ArchiveError::ObjectStore)?
        .bytes()
        .await
        .map_err(ArchiveError::ObjectStore)?;
        Ok(bytes)
    }

    async fn put(&self, locator: &str, bytes: Bytes) -> Result<()> {
        let path = ObjectPath::from(locator);
        if bytes.is_empty() {
            warn!("not writing empty object: {:?}", path);
            return Ok(());
        }
        let backoff = backoff::ExponentialBackoff::default();
        let store = self.store.clone();
        retry(backoff, || {
            let store = store.clone();
            let path = path.clone();
            let bytes = bytes.clone();
            async move {
                store.put(&path, bytes).await.map_err(|e| {
                    error!("failed to write {:?} to s3: {:?}", path, e);
                    backoff::Error::transient(e)
                })
            }
        })
        .await
        .map_err(ArchiveError::ObjectStore)?;
        Ok(())
    }

    async fn remove(&self, locator: &str) -> Result<()> {
        let path = ObjectPath::from(locator);
        let backoff = backoff::ExponentialBackoff::default();
        let store = self.store.clone();
        let result = retry(backoff, || {
            let store = store.clone();
            let path = path.clone();
            async move {
                store.delete(&path).await.map_err(|e| {
                    error!("failed to delete {:?} from s3: {:?}", path, e);
                    backoff::Error::transient(e)
                })
            }
        })
        .await;
        // Missing objects are a silent success (spec §4.1: idempotent delete).
        match result {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(ArchiveError::ObjectStore(e)),
        }
    }
}

#[async_trait]
impl Adapter for S3Adapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn adapter_type(&self) -> &'static str {
        "S3"
    }

    async fn store(&self, store: &MetadataStore, uuid: Uuid, dropbox_dir: &Path) -> Result<String> {
        if let Some(existing) = store.get_copy(uuid, &self.id, false).await? {
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

        let locator = format!("{}/{uuid}_{}", self.bucket_name, resource.filename);
        self.put(&locator, Bytes::from(bytes)).await?;
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

        let locator = format!("{}/canonical_{uuid}_{filename}", self.bucket_name);
        self.put(&locator, Bytes::from(bytes)).await?;
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

        let bytes = self.get(&copy.locator).await?;
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
            self.remove(&copy.locator).await?;
        }
        store.delete_copy(uuid, &self.id, false).await
    }

    async fn delete_canonical(&self, store: &MetadataStore, uuid: Uuid) -> Result<()> {
        if let Some(copy) = store.get_copy(uuid, &self.id, true).await? {
            self.remove(&copy.locator).await?;
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
        // S3 cannot answer without a transfer: download, hash, drop the bytes.
        let bytes = self.get(&copy.locator).await?;
        Ok(sha1_hex(&bytes))
    }
}
