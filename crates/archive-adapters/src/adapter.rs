// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! The Adapter capability (spec §4.1): uniform put/get/delete of object
//! bytes, identified by an opaque, backend-chosen locator.

use std::path::{Path, PathBuf};

use archive_types::Result;
use async_trait::async_trait;
use sha1::{Digest, Sha1};
use uuid::Uuid;

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String cannot fail");
    }
    s
}

/// One storage backend's implementation of the full capability set.
/// `LocalFs`, `S3`, and `Drive` conform to this contract; new backends
/// do the same rather than being special-cased by callers.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable id this adapter is registered under (matches the `id`
    /// field of its `Level`/config entry).
    fn id(&self) -> &str;

    /// Backend discriminant, e.g. `"LocalFs"`, `"S3"`, `"Drive"`.
    fn adapter_type(&self) -> &'static str;

    /// Store non-canonical bytes for `uuid`, reading them from
    /// `<dropbox_dir>/<filename>`. Returns the backend-chosen locator.
    async fn store(
        &self,
        store: &archive_store::MetadataStore,
        uuid: Uuid,
        dropbox_dir: &Path,
    ) -> Result<String>;

    /// Distinguished canonical-write path used only by the Ingester.
    async fn store_canonical(
        &self,
        store: &archive_store::MetadataStore,
        path: &Path,
        uuid: Uuid,
        checksum: &str,
        filename: &str,
    ) -> Result<String>;

    /// Download/copy the bytes for `uuid` into
    /// `<output_dir>/<filename>`, returning that path.
    async fn retrieve(
        &self,
        store: &archive_store::MetadataStore,
        uuid: Uuid,
        output_dir: &Path,
    ) -> Result<PathBuf>;

    /// Remove the non-canonical copy. A missing copy is a silent
    /// success (spec §4.1, idempotent fan-out cleanup).
    async fn delete(&self, store: &archive_store::MetadataStore, uuid: Uuid) -> Result<()>;

    /// Remove the canonical copy. Same idempotence as `delete`.
    async fn delete_canonical(&self, store: &archive_store::MetadataStore, uuid: Uuid) -> Result<()>;

    /// Recompute SHA-1 directly from backend-stored bytes.
    async fn actual_checksum(&self, store: &archive_store::MetadataStore, uuid: Uuid) -> Result<String>;
}
