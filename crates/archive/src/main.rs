// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::{Context, Result};
use archive::{Facade, MainConfig};
use archive_types::LevelAdapter;
use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Replication and integrity engine for a distributed digital-object archive.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Path to the main configuration document.
    #[clap(long, default_value = "agent_config.toml")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a file from the staging directory.
    Ingest {
        path: PathBuf,
        #[clap(long = "level", value_delimiter = ',')]
        levels: Vec<String>,
        #[clap(long, default_value = "")]
        description: String,
        #[clap(long)]
        delete_after: bool,
    },
    /// Retrieve a resource into the output directory.
    Retrieve { uuid: Uuid },
    /// Delete a resource and all its copies.
    Delete { uuid: Uuid },
    /// Replace a resource's bytes under its existing UUID.
    Update { uuid: Uuid, path: PathBuf },
    /// Substring search over filename/locator/uuid/description.
    Search { term: String },
    /// Run an integrity check over every resource.
    Check {
        #[clap(long)]
        deep: bool,
    },
    /// Run an integrity check over a single resource.
    CheckResource {
        uuid: Uuid,
        #[clap(long)]
        deep: bool,
    },
    /// Register a new durability level.
    AddLevel {
        name: String,
        frequency: i64,
        /// `id:type` pairs, e.g. `local1:LocalFs,s3:S3`.
        #[clap(long = "adapter", value_delimiter = ',')]
        adapters: Vec<String>,
    },
    /// Remove a durability level.
    DeleteLevel { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    archive::logging::init();

    let cli = Cli::parse();
    let config = MainConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {:?}", cli.config))?;
    let mut facade = Facade::new(&config).await?;

    match cli.command {
        Command::Ingest {
            path,
            levels,
            description,
            delete_after,
        } => {
            let uuid = facade
                .ingest(&path, levels, &description, delete_after, None, &[])
                .await?;
            println!("{uuid}");
        }
        Command::Retrieve { uuid } => {
            let path = facade.retrieve(uuid).await?;
            println!("{}", path.display());
        }
        Command::Delete { uuid } => {
            facade.delete(uuid).await?;
        }
        Command::Update { uuid, path } => {
            facade.update(uuid, &path).await?;
        }
        Command::Search { term } => {
            for resource in facade.search(&term).await? {
                println!("{}\t{}\t{}", resource.uuid, resource.filename, resource.description);
            }
        }
        Command::Check { deep } => {
            let report = facade.run_check(deep).await?;
            println!("{} outcomes, all_healthy={}", report.outcomes.len(), report.all_healthy());
        }
        Command::CheckResource { uuid, deep } => {
            let report = facade.check_single_resource(uuid, deep).await?;
            println!("{} outcomes, all_healthy={}", report.outcomes.len(), report.all_healthy());
        }
        Command::AddLevel { name, frequency, adapters } => {
            let adapters = adapters
                .into_iter()
                .map(|spec| {
                    let (id, adapter_type) = spec
                        .split_once(':')
                        .with_context(|| format!("adapter spec `{spec}` must be `id:type`"))?;
                    Ok(LevelAdapter {
                        id: id.to_string(),
                        adapter_type: adapter_type.to_string(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            facade.add_level(&name, frequency, adapters, 1).await?;
        }
        Command::DeleteLevel { name } => {
            facade.delete_level(&name).await?;
        }
    }

    Ok(())
}
