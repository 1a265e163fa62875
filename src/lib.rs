//! Rust Solar SCADA library
//!
//! This library provides the core of an energy-monitoring gateway: calibrated
//! AC current metering, energy accumulation, simulated environmental
//! telemetry, and three protocol surfaces (HTTP JSON API, Modbus TCP register
//! map, collector uplink) all serving one shared SCADA snapshot.

pub mod acquisition;
pub mod config;
pub mod control;
pub mod daemon;
pub mod metering;
pub mod modbus;
pub mod scada;
pub mod simulation;
pub mod uplink;
pub mod visualization;

pub use scada::{ScadaSnapshot, SystemStatus};
