// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! Storage backend implementations of the Adapter capability (spec
//! §4.1), plus the `adapter_type` construction registry.

pub mod adapter;
pub mod drive;
pub mod local;
pub mod registry;
pub mod s3;

pub use adapter::{sha1_hex, Adapter};
pub use drive::DriveAdapter;
pub use local::LocalFsAdapter;
pub use registry::create_adapter;
pub use s3::S3Adapter;
