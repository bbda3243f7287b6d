// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! Thin orchestrator binding the core components to the external API
//! (spec §6). Everything here is wiring: the interesting behavior lives
//! in `archive-core` and `archive-store`.

use std::path::Path;

use archive_core::{AdapterManager, Ingester};
use archive_store::MetadataStore;
use archive_types::{CheckReport, Level, LevelAdapter, Resource, Result};
use serde_json::Value;
use uuid::Uuid;

use crate::config::MainConfig;

pub struct Facade {
    store: MetadataStore,
    ingester: Ingester,
    manager: AdapterManager,
}

impl Facade {
    pub async fn new(config: &MainConfig) -> Result<Self> {
        let store = MetadataStore::connect(&config.metadata.db_file).await?;
        let adapter_configs = config.adapter_configs()?;
        let mut manager = AdapterManager::new(
            store.clone(),
            adapter_configs,
            config.canonical_adapter.clone(),
            config.options.dropbox_dir.clone(),
            config.options.output_dir.clone(),
        );
        manager.reload_levels_adapters().await?;

        Ok(Self {
            store,
            ingester: Ingester::new(config.canonical_adapter.clone()),
            manager,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn ingest(
        &mut self,
        path: &Path,
        levels: Vec<String>,
        description: &str,
        delete_after: bool,
        metadata_schema: Option<&Value>,
        metadata: &[(String, String)],
    ) -> Result<Uuid> {
        let uuid = {
            let canonical = self.manager.canonical_adapter()?;
            self.ingester
                .ingest(
                    &self.store,
                    canonical,
                    path,
                    &levels,
                    description,
                    delete_after,
                    metadata_schema,
                    metadata,
                )
                .await?
        };
        self.manager.reload_levels_adapters().await?;
        self.manager.send_resource_to_adapters(uuid, delete_after).await?;
        Ok(uuid)
    }

    pub async fn retrieve(&self, uuid: Uuid) -> Result<std::path::PathBuf> {
        self.manager.retrieve_by_preference(uuid).await
    }

    pub async fn delete(&mut self, uuid: Uuid) -> Result<()> {
        self.manager.delete_resource_from_adapters(uuid).await?;
        let canonical = self.manager.canonical_adapter()?;
        self.ingester.delete(&self.store, canonical, uuid).await
    }

    /// Replaces a resource's bytes under its existing UUID, recomputes
    /// the checksum, and re-fans-out to every adapter its levels
    /// require. Unimplemented in every revision of the source this
    /// system was distilled from; semantics here are this crate's own.
    pub async fn update(&mut self, uuid: Uuid, path: &Path) -> Result<()> {
        let resource = self.store.get_resource(uuid).await?;
        self.manager.delete_resource_from_adapters(uuid).await?;

        let (checksum, locator) = {
            let canonical = self.manager.canonical_adapter()?;
            canonical.delete_canonical(&self.store, uuid).await?;
            let bytes = tokio::fs::read(path).await?;
            let checksum = archive_adapters::sha1_hex(&bytes);
            let locator = canonical
                .store_canonical(&self.store, path, uuid, &checksum, &resource.filename)
                .await?;
            (checksum, locator)
        };
        self.store.update_resource_contents(uuid, &checksum, &locator).await?;

        self.manager.reload_levels_adapters().await?;
        self.manager.send_resource_to_adapters(uuid, false).await?;
        Ok(())
    }

    pub async fn change_resource_level(&mut self, uuid: Uuid, new_levels: Vec<String>) -> Result<()> {
        self.manager.change_resource_level(uuid, new_levels).await
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Resource>> {
        self.store.search(term).await
    }

    pub async fn get_resource_info(&self, uuid: Uuid) -> Result<Resource> {
        self.store.get_resource(uuid).await
    }

    pub async fn run_check(&self, deep: bool) -> Result<CheckReport> {
        self.manager.run_check(deep).await
    }

    pub async fn check_single_resource(&self, uuid: Uuid, deep: bool) -> Result<CheckReport> {
        self.manager.check_single_resource(uuid, deep).await
    }

    pub async fn add_level(
        &mut self,
        name: &str,
        frequency: i64,
        adapters: Vec<LevelAdapter>,
        copies_per_adapter: i64,
    ) -> Result<Level> {
        let level = self
            .store
            .add_level(name, frequency, &adapters, copies_per_adapter)
            .await?;
        self.manager.reload_levels_adapters().await?;
        Ok(level)
    }

    pub async fn delete_level(&mut self, name: &str) -> Result<()> {
        self.store.delete_level(name).await?;
        self.manager.reload_levels_adapters().await?;
        Ok(())
    }
}
