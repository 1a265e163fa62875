// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Collector uplink
//!
//! Once per fast tick the gateway POSTs the latest corrected-current reading
//! to a remote collector. The policy is fire-and-forget: a failed or
//! timed-out send is logged and dropped, never retried and never allowed to
//! block the next tick. Durability of readings is the collector's problem.

use crate::config::UplinkConfig;
use crate::scada::{ScadaSnapshot, SystemStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Synthetic epoch for uplink timestamps: 2024-01-01T00:00:00Z.
///
/// The gateway has no battery-backed clock, so wire timestamps are derived
/// from uptime against this fixed epoch. The collector re-stamps readings on
/// receipt.
const EPOCH_UNIX_SECS: i64 = 1_704_067_200;

/// Errors raised by the collector client. All of them are recovered locally
/// by dropping the payload.
#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("invalid collector url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("collector unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collector rejected payload with status {0}")]
    Rejected(u16),
}

/// ISO-8601 timestamp string for the given uptime, against the synthetic
/// epoch.
pub fn synthetic_timestamp(uptime_millis: u64) -> String {
    let base = chrono::DateTime::from_timestamp(EPOCH_UNIX_SECS, 0).unwrap_or_default();
    let stamped = base + chrono::Duration::milliseconds(uptime_millis as i64);
    stamped.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// The JSON body POSTed to the collector. Built once per send, immutable
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UplinkPayload {
    pub device_id: String,
    pub timestamp: String,
    /// Corrected RMS current, amps.
    pub current: f64,
    pub voltage: f64,
    /// Instantaneous power, watts.
    pub power: f64,
    pub ac_power_kw: f64,
    pub total_energy_kwh: f64,
    pub grid_frequency_hz: f64,
    pub power_factor: f64,
    pub ambient_temp_c: f64,
    pub irradiance_w_m2: f64,
    pub system_status: SystemStatus,
    pub efficiency: f64,
}

impl UplinkPayload {
    /// Build a payload from the freshest corrected-current reading merged
    /// with the last published snapshot (the simulated fields refresh on the
    /// slow cadence only).
    pub fn new(
        device_id: &str,
        uptime_millis: u64,
        current_amps: f64,
        power_kw: f64,
        snapshot: &ScadaSnapshot,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            timestamp: synthetic_timestamp(uptime_millis),
            current: round_to(current_amps, 6),
            voltage: round_to(snapshot.voltage_volts, 2),
            power: round_to(power_kw * 1000.0, 2),
            ac_power_kw: round_to(power_kw, 6),
            total_energy_kwh: round_to(snapshot.total_energy_kwh, 6),
            grid_frequency_hz: round_to(snapshot.grid_frequency_hz, 2),
            power_factor: round_to(snapshot.power_factor, 3),
            ambient_temp_c: round_to(snapshot.ambient_temp_c, 2),
            irradiance_w_m2: round_to(snapshot.irradiance_w_m2, 2),
            system_status: snapshot.system_status,
            efficiency: round_to(snapshot.efficiency, 4),
        }
    }
}

/// HTTP client for the remote collector.
#[derive(Clone)]
pub struct CollectorClient {
    client: reqwest::Client,
    url: Url,
    device_id: String,
}

impl CollectorClient {
    /// Build a client from the uplink configuration. The timeout bounds the
    /// whole send (connect + request + response).
    pub fn from_config(config: &UplinkConfig) -> Result<Self, UplinkError> {
        let url = Url::parse(&config.collector_url)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            url,
            device_id: config.device_id.clone(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// POST one payload. Any error is returned for the caller to log; the
    /// payload is gone either way.
    pub async fn send(&self, payload: &UplinkPayload) -> Result<(), UplinkError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UplinkError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
