// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! Adapter construction, keyed by `adapter_type` string. Re-architects
//! the dynamic class lookup of the original implementation as an
//! explicit registry of constructor functions: unknown types fail at
//! configuration time, not at first use (spec §9).

use std::collections::HashMap;

use archive_types::{ArchiveError, Result};
use serde_json::Value;

use crate::adapter::Adapter;
use crate::drive::DriveAdapter;
use crate::local::LocalFsAdapter;
use crate::s3::S3Adapter;

type Constructor = fn(id: &str, params: &Value) -> Result<Box<dyn Adapter>>;

fn registry() -> HashMap<&'static str, Constructor> {
    let mut m: HashMap<&'static str, Constructor> = HashMap::new();
    m.insert("LocalFs", construct_local_fs);
    m.insert("S3", construct_s3);
    m.insert("Drive", construct_drive);
    m
}

fn require_str<'a>(params: &'a Value, id: &str, adapter_type: &str, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ArchiveError::AdapterCreationFailed {
            adapter_id: id.to_string(),
            adapter_type: adapter_type.to_string(),
            reason: format!("missing required field `{key}`"),
        })
}

fn construct_local_fs(id: &str, params: &Value) -> Result<Box<dyn Adapter>> {
    let storage_dir = require_str(params, id, "LocalFs", "storage_dir")?;
    Ok(Box::new(LocalFsAdapter::new(id, storage_dir)))
}

fn construct_s3(id: &str, params: &Value) -> Result<Box<dyn Adapter>> {
    let bucket_name = require_str(params, id, "S3", "bucket_name")?;
    let region = require_str(params, id, "S3", "region")?;
    S3Adapter::new(id, bucket_name, region)
        .map(|a| Box::new(a) as Box<dyn Adapter>)
        .map_err(|e| ArchiveError::AdapterCreationFailed {
            adapter_id: id.to_string(),
            adapter_type: "S3".to_string(),
            reason: e.to_string(),
        })
}

fn construct_drive(id: &str, params: &Value) -> Result<Box<dyn Adapter>> {
    let folder_path = require_str(params, id, "Drive", "folder_path")?;
    Ok(Box::new(DriveAdapter::new(id, folder_path)))
}

/// Build the adapter named by `adapter_type`, failing with
/// `AdapterCreationFailed` for unknown types or missing per-adapter
/// configuration fields.
pub fn create_adapter(id: &str, adapter_type: &str, params: &Value) -> Result<Box<dyn Adapter>> {
    let ctor = registry()
        .get(adapter_type)
        .copied()
        .ok_or_else(|| ArchiveError::AdapterCreationFailed {
            adapter_id: id.to_string(),
            adapter_type: adapter_type.to_string(),
            reason: "unknown adapter type".to_string(),
        })?;
    ctor(id, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_adapter_type_fails_at_construction() {
        let err = create_adapter("x", "Ftp", &json!({})).unwrap_err();
        assert!(matches!(err, ArchiveError::AdapterCreationFailed { .. }));
    }

    #[test]
    fn local_fs_requires_storage_dir() {
        let err = create_adapter("local1", "LocalFs", &json!({})).unwrap_err();
        assert!(matches!(err, ArchiveError::AdapterCreationFailed { .. }));
    }

    #[test]
    fn local_fs_constructs_with_storage_dir() {
        let adapter = create_adapter("local1", "LocalFs", &json!({"storage_dir": "/tmp/archive"})).unwrap();
        assert_eq!(adapter.id(), "local1");
        assert_eq!(adapter.adapter_type(), "LocalFs");
    }
}
