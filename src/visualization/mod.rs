// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).
//!
//! Visualization module
//!
//! This module handles data presentation over HTTP: the JSON telemetry and
//! report routes, the human-readable status page, and the OpenAPI/RapiDoc
//! browser.

pub mod report;
pub mod server;

pub use report::{derive_report, ScadaReport};
