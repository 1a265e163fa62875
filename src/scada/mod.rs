// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared SCADA state record
//!
//! This module defines the [`ScadaSnapshot`] record that every protocol
//! surface serves from, together with the single-writer/multi-reader
//! handles that enforce the ownership contract:
//!
//! - exactly one [`StateWriter`] exists, owned by the control loop, which
//!   publishes a fully-built snapshot once per slow tick;
//! - any number of [`StateReader`]s are handed to the protocol gateways at
//!   construction time. A reader exposes no mutation, so a gateway cannot
//!   write the record even by accident.
//!
//! A snapshot is published atomically (the lock is held for the whole
//! replacement), so a reader either sees the previous record or the new one,
//! never a partially-updated mix.

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::{Arc, RwLock};

/// Overall health of the gateway as exposed on every protocol surface.
///
/// Serialized as its integer code (0/1/2) on all wire formats, matching the
/// register-map encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemStatus {
    /// Not yet producing calibrated measurements (boot, calibration phase).
    Offline,
    /// Normal operation.
    Online,
    /// The sensor front end failed repeatedly; values are last-known-good.
    Fault,
}

impl SystemStatus {
    /// Integer code used in JSON payloads and the status holding register.
    pub fn code(&self) -> u8 {
        match self {
            SystemStatus::Offline => 0,
            SystemStatus::Online => 1,
            SystemStatus::Fault => 2,
        }
    }

    /// Reverse of [`SystemStatus::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SystemStatus::Offline),
            1 => Some(SystemStatus::Online),
            2 => Some(SystemStatus::Fault),
            _ => None,
        }
    }
}

impl Serialize for SystemStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for SystemStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        SystemStatus::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid system status code {}", code)))
    }
}

impl JsonSchema for SystemStatus {
    fn schema_name() -> String {
        "SystemStatus".to_string()
    }

    fn json_schema(generator: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        // Integer code on the wire
        <u8>::json_schema(generator)
    }
}

/// Phase of the control loop, exposed so the gateways can render a
/// "calibrating" indicator while the noise floor is being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Init,
    Calibrating,
    Operating,
}

impl LoopPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopPhase::Init => "INIT",
            LoopPhase::Calibrating => "CALIBRATING",
            LoopPhase::Operating => "OPERATING",
        }
    }
}

/// The shared state record: one in-memory snapshot combining measured and
/// simulated fields, the source of truth for all protocol servers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct ScadaSnapshot {
    /// Calibrated RMS current, amps. Never negative; readings below the
    /// noise threshold are reported as exactly zero.
    pub current_rms_amps: f64,
    /// Fixed nominal grid voltage, volts.
    pub voltage_volts: f64,
    /// Instantaneous AC power, kW. Sub-threshold readings are exactly zero.
    pub ac_power_kw: f64,
    /// Accumulated energy since boot, kWh. Non-decreasing for the lifetime
    /// of the process.
    pub total_energy_kwh: f64,
    /// Simulated grid frequency, Hz.
    pub grid_frequency_hz: f64,
    /// Simulated power factor.
    pub power_factor: f64,
    /// Simulated ambient temperature, degrees C.
    pub ambient_temp_c: f64,
    /// Simulated solar irradiance, W/m2.
    pub irradiance_w_m2: f64,
    /// Gateway status code.
    pub system_status: SystemStatus,
    /// Simulated conversion efficiency.
    pub efficiency: f64,
    /// Uptime at which this snapshot was built, milliseconds.
    pub timestamp_millis: u64,
}

impl Default for ScadaSnapshot {
    fn default() -> Self {
        Self {
            current_rms_amps: 0.0,
            voltage_volts: 220.0,
            ac_power_kw: 0.0,
            total_energy_kwh: 0.0,
            grid_frequency_hz: 50.0,
            power_factor: 0.95,
            ambient_temp_c: 25.0,
            irradiance_w_m2: 0.0,
            system_status: SystemStatus::Offline,
            efficiency: 0.96,
            timestamp_millis: 0,
        }
    }
}

struct Shared {
    snapshot: ScadaSnapshot,
    phase: LoopPhase,
}

/// Writing half of the shared state. There is exactly one; the control loop
/// owns it and it cannot be cloned.
pub struct StateWriter {
    inner: Arc<RwLock<Shared>>,
}

/// Reading half of the shared state, handed to the protocol gateways.
#[derive(Clone)]
pub struct StateReader {
    inner: Arc<RwLock<Shared>>,
}

/// Create the shared state record and split it into its writer and reader
/// handles.
pub fn shared_state(initial: ScadaSnapshot) -> (StateWriter, StateReader) {
    let inner = Arc::new(RwLock::new(Shared {
        snapshot: initial,
        phase: LoopPhase::Init,
    }));
    (
        StateWriter {
            inner: inner.clone(),
        },
        StateReader { inner },
    )
}

impl StateWriter {
    /// Replace the published snapshot. The write completes fully before any
    /// reader can observe the new record.
    pub fn publish(&self, snapshot: ScadaSnapshot) {
        let mut shared = self.inner.write().unwrap_or_else(|e| e.into_inner());
        shared.snapshot = snapshot;
    }

    /// Update the control-loop phase indicator.
    pub fn set_phase(&self, phase: LoopPhase) {
        let mut shared = self.inner.write().unwrap_or_else(|e| e.into_inner());
        shared.phase = phase;
    }

    /// Obtain an additional read-only view.
    pub fn reader(&self) -> StateReader {
        StateReader {
            inner: self.inner.clone(),
        }
    }
}

impl StateReader {
    /// Copy out the last published snapshot.
    pub fn snapshot(&self) -> ScadaSnapshot {
        let shared = self.inner.read().unwrap_or_else(|e| e.into_inner());
        shared.snapshot
    }

    /// Current control-loop phase.
    pub fn phase(&self) -> LoopPhase {
        let shared = self.inner.read().unwrap_or_else(|e| e.into_inner());
        shared.phase
    }
}
