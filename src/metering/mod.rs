// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Power and energy derivation from calibrated current
//!
//! Two small pieces live here: the noise-threshold policy that forces
//! sub-threshold readings to exactly zero (so floor noise never shows up as
//! a phantom micro-load), and the monotonic energy accumulator that
//! integrates instantaneous power over elapsed wall-clock time.

/// Comparison slack for the inclusive threshold boundary. A corrected
/// reading landing exactly on the threshold (e.g. 0.05 A raw minus 0.04 A
/// floor) must clamp to zero even when the subtraction is off by an ulp.
const THRESHOLD_EPS: f64 = 1e-9;

/// Apply the current noise threshold: readings at or below `threshold_amps`
/// are reported as exactly `0.0`.
pub fn apply_current_threshold(amps: f64, threshold_amps: f64) -> f64 {
    if amps - threshold_amps < THRESHOLD_EPS {
        0.0
    } else {
        amps
    }
}

/// Apply the power noise threshold: powers at or below `threshold_watts`
/// are reported as exactly `0.0` kW.
pub fn apply_power_threshold(power_kw: f64, threshold_watts: f64) -> f64 {
    if power_kw * 1000.0 - threshold_watts < THRESHOLD_EPS {
        0.0
    } else {
        power_kw
    }
}

/// Derive instantaneous AC power (kW) from calibrated current and the
/// nominal grid voltage, with the sub-threshold-to-zero rule applied.
pub fn ac_power_kw(current_amps: f64, voltage_volts: f64, threshold_watts: f64) -> f64 {
    apply_power_threshold(current_amps * voltage_volts / 1000.0, threshold_watts)
}

/// Monotonic energy counter.
///
/// Integrates instantaneous power over the elapsed time between slow ticks.
/// The total never decreases and is reset only at process restart. On the
/// very first tick there is no previous timestamp, so the delta is exactly
/// zero rather than being computed from a bogus elapsed time.
#[derive(Debug, Default)]
pub struct EnergyAccumulator {
    total_kwh: f64,
    last_tick_millis: Option<u64>,
}

impl EnergyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate `power_kw` over the interval since the previous call and
    /// add it to the running total. Returns the energy delta in kWh.
    pub fn integrate(&mut self, now_millis: u64, power_kw: f64) -> f64 {
        let delta_kwh = match self.last_tick_millis {
            None => 0.0,
            Some(prev) => {
                let elapsed_ms = now_millis.saturating_sub(prev);
                power_kw.max(0.0) * elapsed_ms as f64 / 3_600_000.0
            }
        };
        self.last_tick_millis = Some(now_millis);
        self.total_kwh += delta_kwh;
        delta_kwh
    }

    /// Accumulated energy since boot, kWh.
    pub fn total_kwh(&self) -> f64 {
        self.total_kwh
    }
}
