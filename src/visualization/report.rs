// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Derived generation report
//!
//! A pure transform of the SCADA snapshot into the higher-level view served
//! on `/scada/report`: gross/net generation in MWh, a capacity-factor
//! percentage against the configured plant capacity, and an
//! emission-reduction estimate using a fixed regional grid emission factor.

use crate::scada::ScadaSnapshot;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

/// Regional grid emission factor, tCO2 per MWh displaced.
pub const GRID_EMISSION_FACTOR_TCO2_PER_MWH: f64 = 0.81;

/// Fraction of gross generation that reaches the grid.
pub const EXPORT_EFFICIENCY: f64 = 0.98;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScadaReport {
    pub gross_generation_mwh: f64,
    pub net_export_mwh: f64,
    pub capacity_factor_pct: f64,
    pub average_irradiance: f64,
    pub current_rms: f64,
    pub emission_reduction_estimate_tco2: f64,
}

/// Compute the derived report for one snapshot. No side effects; the same
/// snapshot always yields the same report.
pub fn derive_report(snapshot: &ScadaSnapshot, capacity_kw: f64) -> ScadaReport {
    let gross_generation_mwh = snapshot.total_energy_kwh / 1000.0;
    let net_export_mwh = gross_generation_mwh * EXPORT_EFFICIENCY;
    let capacity_factor_pct = if snapshot.ac_power_kw > 0.0 && capacity_kw > 0.0 {
        snapshot.ac_power_kw / capacity_kw * 100.0
    } else {
        0.0
    };
    ScadaReport {
        gross_generation_mwh,
        net_export_mwh,
        capacity_factor_pct,
        average_irradiance: snapshot.irradiance_w_m2,
        current_rms: snapshot.current_rms_amps,
        emission_reduction_estimate_tco2: net_export_mwh * GRID_EMISSION_FACTOR_TCO2_PER_MWH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scada::SystemStatus;

    #[test]
    fn report_derives_from_snapshot() {
        let snapshot = ScadaSnapshot {
            current_rms_amps: 4.55,
            ac_power_kw: 1.0,
            total_energy_kwh: 500.0,
            irradiance_w_m2: 900.0,
            system_status: SystemStatus::Online,
            ..ScadaSnapshot::default()
        };
        let report = derive_report(&snapshot, 1.0);

        assert!((report.gross_generation_mwh - 0.5).abs() < 1e-12);
        assert!((report.net_export_mwh - 0.49).abs() < 1e-12);
        assert!((report.capacity_factor_pct - 100.0).abs() < 1e-9);
        assert_eq!(report.average_irradiance, 900.0);
        assert_eq!(report.current_rms, 4.55);
        assert!((report.emission_reduction_estimate_tco2 - 0.49 * 0.81).abs() < 1e-12);
    }

    #[test]
    fn idle_plant_reports_zero_capacity_factor() {
        let snapshot = ScadaSnapshot::default();
        let report = derive_report(&snapshot, 1.0);
        assert_eq!(report.capacity_factor_pct, 0.0);
        assert_eq!(report.emission_reduction_estimate_tco2, 0.0);
    }

    #[test]
    fn zero_capacity_never_divides() {
        let mut snapshot = ScadaSnapshot::default();
        snapshot.ac_power_kw = 1.0;
        let report = derive_report(&snapshot, 0.0);
        assert_eq!(report.capacity_factor_pct, 0.0);
    }
}
