// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Environmental telemetry simulation
//!
//! No irradiance, temperature or grid-quality sensors are attached to the
//! gateway, so these fields are synthesized from deterministic time-of-day
//! models plus bounded jitter. The simulator is a pure function of the wall
//! clock: it keeps no state between calls and is restartable at any point.

use rand::Rng;

/// Peak clear-sky irradiance at solar noon, W/m2.
pub const IRRADIANCE_PEAK_W_M2: f64 = 1200.0;
/// Bounded uniform irradiance jitter, W/m2.
pub const IRRADIANCE_JITTER_W_M2: f64 = 100.0;
/// Daylight window, hours of day.
pub const DAWN_HOUR: f64 = 6.0;
pub const DUSK_HOUR: f64 = 18.0;

const FREQUENCY_BASELINE_HZ: f64 = 50.0;
const FREQUENCY_JITTER_HZ: f64 = 0.1;
const POWER_FACTOR_BASELINE: f64 = 0.95;
const POWER_FACTOR_JITTER: f64 = 0.005;
const EFFICIENCY_BASELINE: f64 = 0.96;
const EFFICIENCY_JITTER: f64 = 0.02;
const AMBIENT_TEMP_BASELINE_C: f64 = 25.0;
const AMBIENT_TEMP_JITTER_C: f64 = 3.0;

/// One batch of simulated environmental values.
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentSample {
    pub irradiance_w_m2: f64,
    pub ambient_temp_c: f64,
    pub grid_frequency_hz: f64,
    pub power_factor: f64,
    pub efficiency: f64,
}

/// Time-of-day environmental simulator.
///
/// `offset_secs` shifts the simulated day against uptime so a freshly
/// booted gateway can be placed at any hour (demos usually start at noon).
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentSimulator {
    offset_secs: u64,
}

impl EnvironmentSimulator {
    pub fn new(offset_secs: u64) -> Self {
        Self { offset_secs }
    }

    /// Hour of the simulated day in `[0, 24)` for the given uptime.
    pub fn hour_of_day(&self, now_millis: u64) -> f64 {
        ((now_millis / 1000 + self.offset_secs) % 86_400) as f64 / 3600.0
    }

    /// Solar irradiance for the given uptime: a 24 h sine arc, exactly zero
    /// outside the daylight window, jittered within plus/minus
    /// [`IRRADIANCE_JITTER_W_M2`] otherwise.
    pub fn irradiance(&self, now_millis: u64) -> f64 {
        let hour = self.hour_of_day(now_millis);
        if hour < DAWN_HOUR || hour > DUSK_HOUR {
            return 0.0;
        }
        let arc = (std::f64::consts::PI * (hour - DAWN_HOUR) / 12.0).sin();
        let jitter =
            rand::rng().random_range(-IRRADIANCE_JITTER_W_M2..=IRRADIANCE_JITTER_W_M2);
        (IRRADIANCE_PEAK_W_M2 * arc + jitter).max(0.0)
    }

    /// Produce the full set of simulated fields for the given uptime.
    pub fn simulate(&self, now_millis: u64) -> EnvironmentSample {
        let mut rng = rand::rng();
        EnvironmentSample {
            irradiance_w_m2: self.irradiance(now_millis),
            ambient_temp_c: AMBIENT_TEMP_BASELINE_C
                + rng.random_range(-AMBIENT_TEMP_JITTER_C..=AMBIENT_TEMP_JITTER_C),
            grid_frequency_hz: FREQUENCY_BASELINE_HZ
                + rng.random_range(-FREQUENCY_JITTER_HZ..=FREQUENCY_JITTER_HZ),
            power_factor: POWER_FACTOR_BASELINE
                + rng.random_range(-POWER_FACTOR_JITTER..=POWER_FACTOR_JITTER),
            efficiency: EFFICIENCY_BASELINE
                + rng.random_range(-EFFICIENCY_JITTER..=EFFICIENCY_JITTER),
        }
    }
}

impl Default for EnvironmentSimulator {
    fn default() -> Self {
        Self::new(0)
    }
}
