//! Received-signal synthesis
//!
//! Builds `X = A S + W` for narrowband and broadband scenarios, with
//! independent or coherent sources, and the sample covariance `X X^H / T`.
//! Noise has unit variance per sensor; source power is `10^(SNR/10)`.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use nalgebra::DMatrix;
use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rustfft::FftPlanner;

use crate::config::{Scenario, SignalMode};
use crate::error::{DoaError, Result};
use crate::system_model::{ArrayGeometry, SystemModel};

/// One synthesized observation.
#[derive(Debug, Clone)]
pub struct Observation {
    /// N x T received snapshots.
    pub snapshots: DMatrix<Complex64>,
    /// Geometry realization used for this observation.
    pub geometry: ArrayGeometry,
}

/// Signal synthesizer bound to a system model.
pub struct Synthesizer<'a> {
    model: &'a SystemModel,
}

impl<'a> Synthesizer<'a> {
    pub fn new(model: &'a SystemModel) -> Self {
        Self { model }
    }

    fn snr_linear(&self) -> f64 {
        10.0_f64.powf(self.model.params().snr_db / 10.0)
    }

    /// Synthesizes the snapshots for sources at `angles_deg`.
    pub fn observe(&self, angles_deg: &[f64], rng: &mut impl Rng) -> Result<Observation> {
        let params = self.model.params();
        if angles_deg.len() != params.sources {
            return Err(DoaError::ShapeMismatch {
                context: "source angles",
                expected: params.sources,
                got: angles_deg.len(),
            });
        }

        let geometry = self.model.perturbed_geometry(rng)?;
        let snapshots = match params.scenario {
            Scenario::NarrowBand => self.narrowband(&geometry, angles_deg, rng),
            Scenario::BroadbandOfdm => self.broadband_ofdm(&geometry, angles_deg, rng),
            Scenario::BroadbandSimple => self.broadband_simple(&geometry, angles_deg, rng),
        };

        Ok(Observation {
            snapshots,
            geometry,
        })
    }

    /// Synthesizes snapshots and returns their sample covariance.
    pub fn covariance(&self, angles_deg: &[f64], rng: &mut impl Rng) -> Result<DMatrix<Complex64>> {
        let obs = self.observe(angles_deg, rng)?;
        Ok(sample_covariance(&obs.snapshots))
    }

    fn narrowband(
        &self,
        geometry: &ArrayGeometry,
        angles_deg: &[f64],
        rng: &mut impl Rng,
    ) -> DMatrix<Complex64> {
        let params = self.model.params();
        let (m, t) = (params.sources, params.snapshots);
        let amplitude = self.snr_linear().sqrt();

        let s = match params.mode {
            SignalMode::NonCoherent => {
                DMatrix::from_fn(m, t, |_, _| complex_gaussian(rng) * amplitude)
            }
            SignalMode::Coherent => {
                let waveform: Vec<Complex64> =
                    (0..t).map(|_| complex_gaussian(rng) * amplitude).collect();
                DMatrix::from_fn(m, t, |i, j| waveform[j] * coherent_offset(i, m))
            }
        };

        let a = geometry.manifold_at(angles_deg, 1.0);
        a * s + white_noise(params.sensors, t, 1.0, rng)
    }

    /// OFDM sources: each source occupies subcarriers `0..max_freq`, the array
    /// response is applied per frequency bin and the frame is brought back to
    /// the time domain with an inverse FFT.
    fn broadband_ofdm(
        &self,
        geometry: &ArrayGeometry,
        angles_deg: &[f64],
        rng: &mut impl Rng,
    ) -> DMatrix<Complex64> {
        let params = self.model.params();
        let (n, m) = (params.sensors, params.sources);
        let carriers = params.max_freq;
        let frame = params.broadband_frame_len();
        let frame_f = frame as f64;

        // Bin scaling that yields unit noise variance and SNR source power
        // after the 1/F-normalized inverse transform.
        let carrier_amp = frame_f * (self.snr_linear() / carriers as f64).sqrt();
        let noise_std = frame_f.sqrt();

        let spectrum_s = match params.mode {
            SignalMode::NonCoherent => {
                DMatrix::from_fn(m, carriers, |_, _| complex_gaussian(rng) * carrier_amp)
            }
            SignalMode::Coherent => {
                let shared: Vec<Complex64> = (0..carriers)
                    .map(|_| complex_gaussian(rng) * carrier_amp)
                    .collect();
                DMatrix::from_fn(m, carriers, |i, k| shared[k] * coherent_offset(i, m))
            }
        };

        let mut spectrum_x = white_noise(n, frame, noise_std, rng);
        for bin in 0..carriers {
            let a = geometry.manifold_at(angles_deg, bin as f64 / carriers as f64);
            let contribution = a * spectrum_s.column(bin);
            let mut col = spectrum_x.column_mut(bin);
            col += contribution;
        }

        let mut planner = FftPlanner::<f64>::new();
        let ifft = planner.plan_fft_inverse(frame);
        let mut x = DMatrix::<Complex64>::zeros(n, params.snapshots);
        let mut buffer = vec![Complex64::new(0.0, 0.0); frame];
        for row in 0..n {
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = spectrum_x[(row, k)];
            }
            ifft.process(&mut buffer);
            for t in 0..params.snapshots {
                x[(row, t)] = buffer[t] / frame_f;
            }
        }
        x
    }

    /// Simple broadband sources: each source is one tone at its own frequency
    /// bin with its own narrowband steering vector, summed in the time domain.
    fn broadband_simple(
        &self,
        geometry: &ArrayGeometry,
        angles_deg: &[f64],
        rng: &mut impl Rng,
    ) -> DMatrix<Complex64> {
        let params = self.model.params();
        let (n, m, t) = (params.sensors, params.sources, params.snapshots);
        let frame_f = params.broadband_frame_len() as f64;
        let amplitude = self.snr_linear().sqrt();

        let tones: Vec<(usize, Complex64)> = match params.mode {
            SignalMode::NonCoherent => (0..m)
                .map(|_| {
                    let bin = rng.gen_range(1..params.max_freq);
                    let phase = rng.gen_range(0.0..2.0 * PI);
                    (bin, Complex64::from_polar(amplitude, phase))
                })
                .collect(),
            SignalMode::Coherent => {
                let bin = rng.gen_range(1..params.max_freq);
                let phase = rng.gen_range(0.0..2.0 * PI);
                (0..m)
                    .map(|i| (bin, Complex64::from_polar(amplitude, phase) * coherent_offset(i, m)))
                    .collect()
            }
        };

        let mut x = white_noise(n, t, 1.0, rng);
        for (&angle, &(bin, gain)) in angles_deg.iter().zip(tones.iter()) {
            let a = geometry.steering_vector_at(angle, bin as f64 / params.max_freq as f64);
            for col in 0..t {
                let carrier = Complex64::from_polar(1.0, 2.0 * PI * bin as f64 * col as f64 / frame_f);
                for row in 0..n {
                    x[(row, col)] += a[row] * gain * carrier;
                }
            }
        }
        x
    }
}

/// Sample covariance `X X^H / T`.
pub fn sample_covariance(snapshots: &DMatrix<Complex64>) -> DMatrix<Complex64> {
    let t = snapshots.ncols().max(1) as f64;
    snapshots * snapshots.adjoint() / Complex64::new(t, 0.0)
}

/// Deterministic phase offset of source `index` in coherent mode.
fn coherent_offset(index: usize, sources: usize) -> Complex64 {
    Complex64::from_polar(1.0, PI * index as f64 / sources as f64)
}

/// Unit-power circular complex Gaussian draw.
fn complex_gaussian(rng: &mut impl Rng) -> Complex64 {
    let re: f64 = StandardNormal.sample(rng);
    let im: f64 = StandardNormal.sample(rng);
    Complex64::new(re, im) * FRAC_1_SQRT_2
}

fn white_noise(rows: usize, cols: usize, std: f64, rng: &mut impl Rng) -> DMatrix<Complex64> {
    DMatrix::from_fn(rows, cols, |_, _| complex_gaussian(rng) * std)
}
