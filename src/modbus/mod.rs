// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//!
//! ## Usage
//!
//! The Modbus server is started as part of the application daemon when
//! `modbus.enabled` is set; the control loop rewrites every address from the
//! current SCADA snapshot once per slow tick.
//!
//! ## Register Map
//!
//! ### Holding Registers (Read)
//!
//! - Register 0: AC power (kW × 1000, i.e. watts)
//! - Register 1: Total energy (kWh × 100, 0.01 kWh resolution)
//! - Register 2: Grid frequency (Hz × 100, 0.01 Hz resolution)
//! - Register 3: RMS current (A × 1000, i.e. milliamps)
//! - Register 4: Voltage (V × 1)
//! - Register 5: Power factor (× 1000)
//! - Register 6: Ambient temperature (°C × 10, 0.1 °C resolution)
//! - Register 7: Irradiance (W/m² × 1)
//! - Register 8: Efficiency (× 1000)
//! - Register 9: System status code (0=offline, 1=online, 2=fault)
//!
//! ### Coils (derived predicates, recomputed every slow tick)
//!
//! - Coil 0: System online
//! - Coil 1: Generating (power > 0.1 kW)
//! - Coil 2: Daylight (irradiance > 100 W/m²)
//! - Coil 3: Grid OK (49.5 Hz < frequency < 50.5 Hz)
//!
//! ### Discrete Inputs (alarm predicates)
//!
//! - Input 0: High-temperature alarm (ambient > 40 °C)
//! - Input 1: Low-power-factor alarm (PF < 0.9)
//! - Input 2: Low-efficiency alarm (efficiency < 0.9)

pub mod modbus_server;
pub use modbus_server::ScadaModbusServer;

use crate::scada::ScadaSnapshot;

pub const REG_AC_POWER: u16 = 0;
pub const REG_TOTAL_ENERGY: u16 = 1;
pub const REG_GRID_FREQUENCY: u16 = 2;
pub const REG_CURRENT_RMS: u16 = 3;
pub const REG_VOLTAGE: u16 = 4;
pub const REG_POWER_FACTOR: u16 = 5;
pub const REG_AMBIENT_TEMP: u16 = 6;
pub const REG_IRRADIANCE: u16 = 7;
pub const REG_EFFICIENCY: u16 = 8;
pub const REG_SYSTEM_STATUS: u16 = 9;
pub const HOLDING_REGISTER_COUNT: u16 = 10;

pub const COIL_SYSTEM_ONLINE: u16 = 0;
pub const COIL_GENERATING: u16 = 1;
pub const COIL_DAYLIGHT: u16 = 2;
pub const COIL_GRID_OK: u16 = 3;
pub const COIL_COUNT: u16 = 4;

pub const DISCRETE_HIGH_TEMP: u16 = 0;
pub const DISCRETE_LOW_POWER_FACTOR: u16 = 1;
pub const DISCRETE_LOW_EFFICIENCY: u16 = 2;
pub const DISCRETE_COUNT: u16 = 3;

/// Scale a physical value into a register. Saturates at the u16 range
/// rather than wrapping, so an over-range value pins the register instead
/// of aliasing to a small one.
pub fn encode_scaled(value: f64, scale: f64) -> u16 {
    (value * scale).round().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Reverse of [`encode_scaled`], within the resolution implied by the
/// scale.
pub fn decode_scaled(register: u16, scale: f64) -> f64 {
    f64::from(register) / scale
}

/// Coil states derived from a snapshot, indexed by coil address.
pub fn coil_states(snapshot: &ScadaSnapshot) -> [bool; COIL_COUNT as usize] {
    [
        snapshot.system_status == crate::scada::SystemStatus::Online,
        snapshot.ac_power_kw > 0.1,
        snapshot.irradiance_w_m2 > 100.0,
        snapshot.grid_frequency_hz > 49.5 && snapshot.grid_frequency_hz < 50.5,
    ]
}

/// Discrete-input alarm states derived from a snapshot, indexed by address.
pub fn discrete_states(snapshot: &ScadaSnapshot) -> [bool; DISCRETE_COUNT as usize] {
    [
        snapshot.ambient_temp_c > 40.0,
        snapshot.power_factor < 0.9,
        snapshot.efficiency < 0.9,
    ]
}
