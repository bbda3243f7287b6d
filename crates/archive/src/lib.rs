// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

//! Top-level façade binding the replication and integrity engine to a
//! user-facing API, plus its configuration and logging wiring.

pub mod config;
pub mod facade;
pub mod logging;

pub use config::MainConfig;
pub use facade::Facade;
