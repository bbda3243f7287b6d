// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! Owns the live set of adapters and levels, fans out copies, and
//! drives the repair state machine (spec §4.3).

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use archive_adapters::{create_adapter, sha1_hex, Adapter};
use archive_store::MetadataStore;
use archive_types::{ArchiveError, CheckReport, CopyState, Level, RepairOutcome, Resource, Result};
use chrono::Utc;
use rand::RngCore;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// `(adapter_type, construction params)`, as supplied by configuration.
/// Kept separately from the Metadata Store because construction
/// parameters (bucket names, credential paths, …) are not part of the
/// replication catalog.
pub type AdapterConfig = (String, Value);

pub struct AdapterManager {
    store: MetadataStore,
    adapter_configs: HashMap<String, AdapterConfig>,
    levels: HashMap<String, Level>,
    adapters: HashMap<String, Box<dyn Adapter>>,
    canonical_adapter_id: String,
    dropbox_dir: PathBuf,
    output_dir: PathBuf,
}

impl AdapterManager {
    pub fn new(
        store: MetadataStore,
        adapter_configs: HashMap<String, AdapterConfig>,
        canonical_adapter_id: impl Into<String>,
        dropbox_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            adapter_configs,
            levels: HashMap::new(),
            adapters: HashMap::new(),
            canonical_adapter_id: canonical_adapter_id.into(),
            dropbox_dir: dropbox_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Rebuilds `levels` from the Metadata Store and `adapters` from
    /// configuration. Callers must invoke this after any level or
    /// adapter configuration change (spec §4.3).
    pub async fn reload_levels_adapters(&mut self) -> Result<()> {
        let levels = self.store.list_levels().await?;
        self.levels = levels.into_iter().map(|l| (l.name.clone(), l)).collect();

        let mut adapters: HashMap<String, Box<dyn Adapter>> = HashMap::new();
        for (id, (adapter_type, params)) in &self.adapter_configs {
            adapters.insert(id.clone(), create_adapter(id, adapter_type, params)?);
        }
        self.adapters = adapters;
        Ok(())
    }

    /// Looks up a live adapter instance by id. Public so the Façade can
    /// hand the canonical adapter to the Ingester.
    pub fn adapter(&self, id: &str) -> Result<&dyn Adapter> {
        self.adapters
            .get(id)
            .map(|b| b.as_ref())
            .ok_or_else(|| ArchiveError::AdapterCreationFailed {
                adapter_id: id.to_string(),
                adapter_type: "unknown".to_string(),
                reason: "adapter not registered; call reload_levels_adapters".to_string(),
            })
    }

    pub fn canonical_adapter(&self) -> Result<&dyn Adapter> {
        self.adapter(&self.canonical_adapter_id)
    }

    pub fn canonical_adapter_id(&self) -> &str {
        &self.canonical_adapter_id
    }

    /// Adapters assigned to `resource`, deduplicated across levels, in
    /// level order and then configured adapter order within a level
    /// (spec §5 ordering guarantee 2).
    fn adapters_for_resource(&self, resource: &Resource) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for level_name in &resource.levels {
            if let Some(level) = self.levels.get(level_name) {
                for a in &level.adapters {
                    if seen.insert(a.id.clone()) {
                        ids.push(a.id.clone());
                    }
                }
            }
        }
        ids
    }

    async fn get_any_copy(&self, uuid: Uuid, adapter_id: &str) -> Result<Option<archive_types::Copy>> {
        if let Some(copy) = self.store.get_copy(uuid, adapter_id, false).await? {
            return Ok(Some(copy));
        }
        self.store.get_copy(uuid, adapter_id, true).await
    }

    async fn ensure_staged(&self, resource: &Resource) -> Result<()> {
        let path = self.dropbox_dir.join(&resource.filename);
        let already_good = match tokio::fs::read(&path).await {
            Ok(bytes) => sha1_hex(&bytes) == resource.checksum,
            Err(_) => false,
        };
        if !already_good {
            let canonical = self.canonical_adapter()?;
            canonical.retrieve(&self.store, resource.uuid, &self.dropbox_dir).await?;
        }
        Ok(())
    }

    /// `delete_after` removes the staged dropbox copy once every
    /// adapter the resource's levels require has a copy (spec §4.3).
    pub async fn send_resource_to_adapters(&self, uuid: Uuid, delete_after: bool) -> Result<()> {
        let resource = self.store.get_resource(uuid).await?;
        self.ensure_staged(&resource).await?;
        for id in self.adapters_for_resource(&resource) {
            let adapter = self.adapter(&id)?;
            adapter.store(&self.store, uuid, &self.dropbox_dir).await?;
        }
        if delete_after {
            let staged = self.dropbox_dir.join(&resource.filename);
            let _ = tokio::fs::remove_file(&staged).await;
        }
        Ok(())
    }

    /// Does not touch the canonical copy — that is `Ingester::delete`'s
    /// job.
    pub async fn delete_resource_from_adapters(&self, uuid: Uuid) -> Result<()> {
        let resource = self.store.get_resource(uuid).await?;
        for id in self.adapters_for_resource(&resource) {
            let adapter = self.adapter(&id)?;
            adapter.delete(&self.store, uuid).await?;
        }
        Ok(())
    }

    pub async fn change_resource_level(&mut self, uuid: Uuid, new_levels: Vec<String>) -> Result<()> {
        self.delete_resource_from_adapters(uuid).await?;
        self.store.update_resource_levels(uuid, &new_levels).await?;
        self.reload_levels_adapters().await?;
        self.send_resource_to_adapters(uuid, false).await?;
        Ok(())
    }

    /// Tries the canonical adapter first, then the remaining adapters
    /// in level order; the first successful `Retrieve` wins. A corrupt
    /// copy triggers repair and the loop continues.
    pub async fn retrieve_by_preference(&self, uuid: Uuid) -> Result<PathBuf> {
        let resource = self.store.get_resource(uuid).await?;
        let canonical = self.canonical_adapter()?;
        match canonical.retrieve(&self.store, uuid, &self.output_dir).await {
            Ok(path) => return Ok(path),
            Err(ArchiveError::ChecksumMismatch { .. }) => {
                let _ = self.restore_canonical_copy(uuid).await;
            }
            Err(_) => {}
        }

        for id in self.adapters_for_resource(&resource) {
            if id == self.canonical_adapter_id {
                continue;
            }
            let adapter = self.adapter(&id)?;
            match adapter.retrieve(&self.store, uuid, &self.output_dir).await {
                Ok(path) => return Ok(path),
                Err(ArchiveError::ChecksumMismatch { .. }) => {
                    let _ = self.restore_from_canonical_copy(&id, uuid).await;
                }
                Err(_) => {}
            }
        }
        Err(ArchiveError::NoCopyExists(uuid))
    }

    /// Self-test: round-trips 500 random bytes through `adapter_id` and
    /// leaves no Resource, Copy, or backend object behind.
    pub async fn verify_adapter(&self, adapter_id: &str) -> Result<bool> {
        let adapter = self.adapter(adapter_id)?;
        let mut bytes = vec![0u8; 500];
        rand::thread_rng().fill_bytes(&mut bytes);
        let checksum = sha1_hex(&bytes);
        let uuid = archive_types::verify_adapter_test_uuid();
        let filename = archive_types::VERIFY_ADAPTER_TEST_FILENAME;

        tokio::fs::create_dir_all(&self.dropbox_dir).await?;
        let staged = self.dropbox_dir.join(filename);
        tokio::fs::write(&staged, &bytes).await?;

        // `retrieve` looks up the Resource row before touching any
        // adapter; without one this self-test would always fail with
        // `ResourceNotIngested`, never reaching the adapter at all.
        self.store
            .insert_resource(uuid, "", &[], filename, &checksum, "adapter self-test")
            .await?;

        let outcome = async {
            adapter
                .store_canonical(&self.store, &staged, uuid, &checksum, filename)
                .await?;
            let retrieved = adapter.retrieve(&self.store, uuid, &self.output_dir).await?;
            let got = tokio::fs::read(&retrieved).await?;
            let matched = sha1_hex(&got) == checksum;
            let _ = tokio::fs::remove_file(&retrieved).await;
            Ok::<bool, ArchiveError>(matched)
        }
        .await;

        let _ = adapter.delete_canonical(&self.store, uuid).await;
        let _ = self.store.delete_resource(uuid).await;
        let _ = tokio::fs::remove_file(&staged).await;
        outcome
    }

    /// Shallow mode trusts the catalog; deep mode recomputes from
    /// backend bytes.
    pub async fn verify_copy(&self, uuid: Uuid, adapter_id: &str, deep: bool) -> Result<bool> {
        let resource = self.store.get_resource(uuid).await?;
        if deep {
            let adapter = self.adapter(adapter_id)?;
            let actual = adapter.actual_checksum(&self.store, uuid).await?;
            Ok(actual == resource.checksum)
        } else {
            let copy = self
                .get_any_copy(uuid, adapter_id)
                .await?
                .ok_or(ArchiveError::NoCopyExists(uuid))?;
            Ok(copy.checksum == resource.checksum)
        }
    }

    /// Metadata-trusting pass: creates a missing copy, repairs a stale
    /// one, otherwise reports healthy.
    pub async fn check_single_resource_single_adapter(
        &self,
        uuid: Uuid,
        adapter_id: &str,
    ) -> Result<CopyState> {
        let resource = self.store.get_resource(uuid).await?;
        match self.get_any_copy(uuid, adapter_id).await? {
            None => {
                let adapter = self.adapter(adapter_id)?;
                adapter.store(&self.store, uuid, &self.dropbox_dir).await?;
                Ok(CopyState::PresentGood)
            }
            Some(copy) if copy.checksum != resource.checksum => {
                self.restore_from_canonical_copy(adapter_id, uuid).await
            }
            Some(_) => Ok(CopyState::PresentGood),
        }
    }

    /// Expensive pass: retrieves, recomputes, and on mismatch triggers
    /// repair. Reports the pre-repair comparison (so a corrupt copy is
    /// surfaced once before a subsequent call confirms the repair).
    pub async fn verify_adapter_metadata(&self, adapter_id: &str, uuid: Uuid, keep_temp: bool) -> Result<bool> {
        let resource = self.store.get_resource(uuid).await?;
        let adapter = self.adapter(adapter_id)?;

        // `retrieve` itself validates the transfer and may already raise
        // `ChecksumMismatch` before handing back bytes to recompute from.
        match adapter.retrieve(&self.store, uuid, &self.output_dir).await {
            Ok(path) => {
                let bytes = tokio::fs::read(&path).await?;
                let matched = sha1_hex(&bytes) == resource.checksum;
                if !matched {
                    self.restore_from_canonical_copy(adapter_id, uuid).await?;
                }
                if !keep_temp {
                    let _ = tokio::fs::remove_file(&path).await;
                }
                Ok(matched)
            }
            Err(ArchiveError::ChecksumMismatch { .. }) => {
                self.restore_from_canonical_copy(adapter_id, uuid).await?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn compare_copies(&self, uuid: Uuid, a1: &str, a2: &str, deep: bool) -> Result<bool> {
        if deep {
            let adapter1 = self.adapter(a1)?;
            let adapter2 = self.adapter(a2)?;
            let c1 = adapter1.actual_checksum(&self.store, uuid).await?;
            let c2 = adapter2.actual_checksum(&self.store, uuid).await?;
            Ok(c1 == c2)
        } else {
            let copy1 = self.get_any_copy(uuid, a1).await?.ok_or(ArchiveError::NoCopyExists(uuid))?;
            let copy2 = self.get_any_copy(uuid, a2).await?.ok_or(ArchiveError::NoCopyExists(uuid))?;
            Ok(copy1.checksum == copy2.checksum)
        }
    }

    /// `Delete(uuid)` followed by `Store(uuid)` on `adapter_id` — the
    /// canonical copy is trusted. Returns `Absent-but-flagged` rather
    /// than propagating when the source is itself unrecoverable, per
    /// the repair state machine (spec §4.3).
    pub async fn restore_from_canonical_copy(&self, adapter_id: &str, uuid: Uuid) -> Result<CopyState> {
        let resource = self.store.get_resource(uuid).await?;
        let adapter = self.adapter(adapter_id)?;
        adapter.delete(&self.store, uuid).await?;

        if let Err(e) = self.ensure_staged(&resource).await {
            warn!(%uuid, adapter_id, error = %e, "restoration failed: canonical bytes unavailable");
            return Ok(CopyState::AbsentFlagged);
        }
        match adapter.store(&self.store, uuid, &self.dropbox_dir).await {
            Ok(_) => Ok(CopyState::PresentGood),
            Err(e) => {
                warn!(%uuid, adapter_id, error = %e, "restoration failed");
                Ok(CopyState::AbsentFlagged)
            }
        }
    }

    /// Deletes the faulty canonical, then seeks a surviving replica (in
    /// level order) to promote in its place. Prefers overwrite-in-place
    /// semantics over delete-then-store, since a faulty backend's
    /// delete may not fully clean up (spec §9 open question).
    pub async fn restore_canonical_copy(&self, uuid: Uuid) -> Result<()> {
        let resource = self.store.get_resource(uuid).await?;
        let canonical = self.canonical_adapter()?;
        let _ = canonical.delete_canonical(&self.store, uuid).await;

        let tmp_dir = self.output_dir.join("restore_tmp");
        for id in self.adapters_for_resource(&resource) {
            if id == self.canonical_adapter_id {
                continue;
            }
            let adapter = match self.adapter(&id) {
                Ok(adapter) => adapter,
                Err(_) => continue,
            };
            let retrieved = match adapter.retrieve(&self.store, uuid, &tmp_dir).await {
                Ok(path) => path,
                Err(_) => continue,
            };
            let restore = canonical
                .store_canonical(&self.store, &retrieved, uuid, &resource.checksum, &resource.filename)
                .await;
            let _ = tokio::fs::remove_file(&retrieved).await;
            if let Ok(locator) = restore {
                self.store
                    .update_resource_contents(uuid, &resource.checksum, &locator)
                    .await?;
                return Ok(());
            }
        }
        Err(ArchiveError::RestorationFailed {
            uuid,
            reason: "no surviving replica could restore the canonical copy".to_string(),
        })
    }

    pub async fn check_single_resource(&self, uuid: Uuid, deep: bool) -> Result<CheckReport> {
        let resource = self.store.get_resource(uuid).await?;
        let mut outcomes = Vec::new();
        for id in self.adapters_for_resource(&resource) {
            let state = if deep {
                match self.verify_adapter_metadata(&id, uuid, false).await {
                    Ok(true) => CopyState::PresentGood,
                    Ok(false) => CopyState::PresentMismatch,
                    Err(_) => CopyState::AbsentFlagged,
                }
            } else {
                self.check_single_resource_single_adapter(uuid, &id).await?
            };
            outcomes.push(RepairOutcome {
                resource_uuid: uuid,
                adapter_id: id,
                state,
                checked_at: Utc::now(),
            });
        }
        Ok(CheckReport { outcomes })
    }

    pub async fn run_check(&self, deep: bool) -> Result<CheckReport> {
        let mut outcomes = Vec::new();
        for resource in self.store.list_resources().await? {
            let report = self.check_single_resource(resource.uuid, deep).await?;
            outcomes.extend(report.outcomes);
        }
        Ok(CheckReport { outcomes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_types::LevelAdapter;
    use serde_json::json;
    use tempfile::TempDir;

    async fn manager_with_two_locals(
        dropbox: &TempDir,
        output: &TempDir,
        backend1: &TempDir,
        backend2: &TempDir,
    ) -> AdapterManager {
        let store = MetadataStore::connect("sqlite::memory:").await.unwrap();
        store
            .add_level(
                "low",
                60,
                &[
                    LevelAdapter { id: "local1".into(), adapter_type: "LocalFs".into() },
                    LevelAdapter { id: "local2".into(), adapter_type: "LocalFs".into() },
                ],
                1,
            )
            .await
            .unwrap();

        let mut configs = HashMap::new();
        configs.insert(
            "local1".to_string(),
            ("LocalFs".to_string(), json!({"storage_dir": backend1.path().to_str().unwrap()})),
        );
        configs.insert(
            "local2".to_string(),
            ("LocalFs".to_string(), json!({"storage_dir": backend2.path().to_str().unwrap()})),
        );

        let mut manager = AdapterManager::new(
            store,
            configs,
            "local1",
            dropbox.path().to_path_buf(),
            output.path().to_path_buf(),
        );
        manager.reload_levels_adapters().await.unwrap();
        manager
    }

    #[tokio::test]
    async fn send_resource_to_adapters_fans_out_to_both() {
        let dropbox = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let backend1 = TempDir::new().unwrap();
        let backend2 = TempDir::new().unwrap();
        let manager = manager_with_two_locals(&dropbox, &output, &backend1, &backend2).await;

        let bytes = b"grace.jpg bytes";
        let checksum = sha1_hex(bytes);
        let uuid = Uuid::new_v4();
        let path = dropbox.path().join("grace.jpg");
        tokio::fs::write(&path, bytes).await.unwrap();

        manager
            .store
            .insert_resource(uuid, "", &["low".to_string()], "grace.jpg", &checksum, "cat")
            .await
            .unwrap();

        manager.send_resource_to_adapters(uuid, false).await.unwrap();

        let copies = manager.store.list_copies(uuid).await.unwrap();
        assert_eq!(copies.len(), 2);
        assert!(manager.compare_copies(uuid, "local1", "local2", true).await.unwrap());
    }

    #[tokio::test]
    async fn verify_adapter_round_trips_and_cleans_up() {
        let dropbox = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let backend1 = TempDir::new().unwrap();
        let backend2 = TempDir::new().unwrap();
        let manager = manager_with_two_locals(&dropbox, &output, &backend1, &backend2).await;

        assert!(manager.verify_adapter("local1").await.unwrap());
        let uuid = archive_types::verify_adapter_test_uuid();
        assert!(manager.store.get_resource(uuid).await.is_err());
    }
}
