// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The gateway control loop
//!
//! Exactly one control loop exists and it owns all mutation: acquisition,
//! calibration, simulation, energy accumulation, snapshot publication and
//! register-bank rewrites all happen sequentially inside it. The loop is an
//! explicit state machine (INIT -> CALIBRATING -> OPERATING) with a deadline
//! check per iteration, so the protocol gateways stay responsive during the
//! calibration window instead of being blocked behind it.
//!
//! Two cadences are driven from the same task: the fast tick (acquisition +
//! uplink, ~1 Hz) is the timer; the slow tick (simulation + accumulation +
//! snapshot refresh + register rewrite, every ~5 s) is an elapsed-time check
//! inside the fast tick, never a second timer. Within a slow tick the shared
//! snapshot write completes before the register banks are rewritten.

use anyhow::Result;
use log::{error, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tokio::time::{self, MissedTickBehavior};

use crate::acquisition::calibration::CalibrationState;
use crate::acquisition::{CurrentSource, MeasurementSample};
use crate::config::Config;
use crate::metering::{ac_power_kw, apply_current_threshold, EnergyAccumulator};
use crate::modbus::ScadaModbusServer;
use crate::scada::{LoopPhase, ScadaSnapshot, StateWriter, SystemStatus};
use crate::simulation::EnvironmentSimulator;
use crate::uplink::{CollectorClient, UplinkPayload};

/// Loop parameters distilled from the configuration sections the loop
/// touches.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub fast_interval_ms: u64,
    pub slow_interval_ms: u64,
    pub calibration_ms: u64,
    pub fault_threshold: u32,
    pub voltage_nominal_v: f64,
    pub current_threshold_a: f64,
    pub power_threshold_w: f64,
    pub simulation_offset_secs: u64,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fast_interval_ms: config.acquisition.fast_interval_ms,
            slow_interval_ms: config.acquisition.slow_interval_ms,
            calibration_ms: config.acquisition.calibration_secs * 1000,
            fault_threshold: config.acquisition.fault_threshold,
            voltage_nominal_v: config.metering.voltage_nominal_v,
            current_threshold_a: config.metering.current_threshold_a,
            power_threshold_w: config.metering.power_threshold_w,
            simulation_offset_secs: config.metering.simulation_offset_secs,
        }
    }
}

pub struct ControlLoop {
    source: Box<dyn CurrentSource>,
    writer: StateWriter,
    modbus: Option<ScadaModbusServer>,
    collector: Option<CollectorClient>,
    settings: LoopSettings,
    simulator: EnvironmentSimulator,
    calibration: CalibrationState,
    accumulator: EnergyAccumulator,
    phase: LoopPhase,
    snapshot: ScadaSnapshot,
    last_sample: MeasurementSample,
    latest_corrected_amps: f64,
    consecutive_failures: u32,
    faulted: bool,
    last_slow_tick_ms: Option<u64>,
}

impl ControlLoop {
    pub fn new(
        source: Box<dyn CurrentSource>,
        writer: StateWriter,
        modbus: Option<ScadaModbusServer>,
        collector: Option<CollectorClient>,
        settings: LoopSettings,
    ) -> Self {
        let snapshot = ScadaSnapshot {
            voltage_volts: settings.voltage_nominal_v,
            ..ScadaSnapshot::default()
        };
        let simulator = EnvironmentSimulator::new(settings.simulation_offset_secs);
        Self {
            source,
            writer,
            modbus,
            collector,
            settings,
            simulator,
            calibration: CalibrationState::new(0),
            accumulator: EnergyAccumulator::new(),
            phase: LoopPhase::Init,
            snapshot,
            last_sample: MeasurementSample::default(),
            latest_corrected_amps: 0.0,
            consecutive_failures: 0,
            faulted: false,
            last_slow_tick_ms: None,
        }
    }

    /// Drive the loop on the fast cadence until the running flag clears.
    pub async fn run(mut self, running: Arc<AtomicBool>) -> Result<()> {
        info!(
            "Control loop started (fast {} ms, slow {} ms, calibration {} s)",
            self.settings.fast_interval_ms,
            self.settings.slow_interval_ms,
            self.settings.calibration_ms / 1000
        );
        let start = Instant::now();
        let mut ticker = time::interval(Duration::from_millis(self.settings.fast_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while running.load(Ordering::SeqCst) {
            ticker.tick().await;
            let now_millis = start.elapsed().as_millis() as u64;
            self.tick(now_millis);
        }
        info!("Control loop stopped");
        Ok(())
    }

    /// Advance the loop to the given uptime. One call is one fast tick; the
    /// slow tick runs inside it when due. Exposed so tests can drive the
    /// state machine with explicit timestamps.
    pub fn tick(&mut self, now_millis: u64) {
        match self.phase {
            LoopPhase::Init => {
                self.calibration = CalibrationState::new(now_millis);
                self.set_phase(LoopPhase::Calibrating);
                info!(
                    "Calibrating noise floor for {} s, measurements withheld",
                    self.settings.calibration_ms / 1000
                );
                self.calibrating_tick(now_millis);
            }
            LoopPhase::Calibrating => self.calibrating_tick(now_millis),
            LoopPhase::Operating => self.operating_tick(now_millis),
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: LoopPhase) {
        self.phase = phase;
        self.writer.set_phase(phase);
    }

    fn calibrating_tick(&mut self, now_millis: u64) {
        let (raw_rms, fresh) = self.acquire();
        if fresh {
            self.calibration.record(raw_rms);
        }

        if self
            .calibration
            .window_elapsed(now_millis, self.settings.calibration_ms)
            && self.calibration.finalize()
        {
            info!(
                "Calibration complete: noise floor {:.4} A over {} samples",
                self.calibration.noise_floor_amps(),
                self.calibration.sample_count()
            );
            self.set_phase(LoopPhase::Operating);
        }

        // Keep the gateways fed while calibrating; measured fields stay zero
        if self.slow_due(now_millis) {
            self.refresh_snapshot(now_millis);
        }
    }

    fn operating_tick(&mut self, now_millis: u64) {
        let (raw_rms, _fresh) = self.acquire();
        self.latest_corrected_amps = apply_current_threshold(
            self.calibration.correct(raw_rms),
            self.settings.current_threshold_a,
        );

        if self.slow_due(now_millis) {
            self.refresh_snapshot(now_millis);
        }

        self.push_uplink(now_millis);
    }

    /// Read the sensor, tolerating failures: on error the last valid sample
    /// is reused and repeated failures escalate to a FAULT status. Returns
    /// the RMS current to use and whether it came from a fresh read.
    fn acquire(&mut self) -> (f64, bool) {
        match self.source.sample() {
            Ok(sample) => {
                if self.consecutive_failures > 0 {
                    info!(
                        "Sensor recovered after {} failed reads",
                        self.consecutive_failures
                    );
                }
                self.consecutive_failures = 0;
                self.faulted = false;
                self.last_sample = sample;
                (sample.rms_current_amps, true)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    "Sensor read failed ({} consecutive), reusing last-known-good sample: {}",
                    self.consecutive_failures, e
                );
                if self.consecutive_failures >= self.settings.fault_threshold && !self.faulted {
                    self.faulted = true;
                    error!(
                        "Sensor FAULT after {} consecutive read failures",
                        self.consecutive_failures
                    );
                }
                (self.last_sample.rms_current_amps, false)
            }
        }
    }

    fn slow_due(&self, now_millis: u64) -> bool {
        match self.last_slow_tick_ms {
            None => true,
            Some(prev) => now_millis.saturating_sub(prev) >= self.settings.slow_interval_ms,
        }
    }

    /// The slow tick: simulate, accumulate, build the snapshot, publish it,
    /// then rewrite the register banks. The publish completes fully before
    /// the banks are touched.
    fn refresh_snapshot(&mut self, now_millis: u64) {
        let env = self.simulator.simulate(now_millis);
        let operating = self.phase == LoopPhase::Operating;

        let current_rms_amps = if operating {
            self.latest_corrected_amps
        } else {
            0.0
        };
        let power_kw = if operating {
            ac_power_kw(
                current_rms_amps,
                self.settings.voltage_nominal_v,
                self.settings.power_threshold_w,
            )
        } else {
            0.0
        };
        if operating {
            self.accumulator.integrate(now_millis, power_kw);
        }

        let system_status = if !operating {
            SystemStatus::Offline
        } else if self.faulted {
            SystemStatus::Fault
        } else {
            SystemStatus::Online
        };

        self.snapshot = ScadaSnapshot {
            current_rms_amps,
            voltage_volts: self.settings.voltage_nominal_v,
            ac_power_kw: power_kw,
            total_energy_kwh: self.accumulator.total_kwh(),
            grid_frequency_hz: env.grid_frequency_hz,
            power_factor: env.power_factor,
            ambient_temp_c: env.ambient_temp_c,
            irradiance_w_m2: env.irradiance_w_m2,
            system_status,
            efficiency: env.efficiency,
            timestamp_millis: now_millis,
        };
        self.writer.publish(self.snapshot);

        if let Some(modbus) = &self.modbus {
            modbus.update_from_snapshot(&self.snapshot);
        }
        self.last_slow_tick_ms = Some(now_millis);
    }

    /// Send the latest corrected-current reading to the collector without
    /// blocking the loop. Failures are logged and the payload is dropped.
    fn push_uplink(&mut self, now_millis: u64) {
        let Some(client) = &self.collector else {
            return;
        };
        let power_kw = ac_power_kw(
            self.latest_corrected_amps,
            self.settings.voltage_nominal_v,
            self.settings.power_threshold_w,
        );
        let payload = UplinkPayload::new(
            client.device_id(),
            now_millis,
            self.latest_corrected_amps,
            power_kw,
            &self.snapshot,
        );
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send(&payload).await {
                warn!("Uplink send failed, payload dropped: {}", e);
            }
        });
    }
}
