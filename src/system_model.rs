//! Array system model
//!
//! Holds the scenario parameters together with the array geometry and
//! computes steering vectors and the array manifold.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

use crate::config::SystemModelParams;
use crate::error::{DoaError, Result};

/// Element positions of a linear array, in wavelengths at the reference frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayGeometry {
    positions: Vec<f64>,
    spacing: f64,
}

impl ArrayGeometry {
    /// Uniform linear array with `sensors` elements starting at the origin.
    pub fn uniform(sensors: usize, spacing: f64) -> Self {
        Self {
            positions: (0..sensors).map(|n| n as f64 * spacing).collect(),
            spacing,
        }
    }

    /// Array with explicit (possibly perturbed) positions and nominal spacing.
    pub fn with_positions(positions: Vec<f64>, spacing: f64) -> Self {
        Self { positions, spacing }
    }

    pub fn sensors(&self) -> usize {
        self.positions.len()
    }

    /// Nominal inter-element spacing [wavelengths].
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// The first `len` elements as a subarray.
    pub fn subarray(&self, len: usize) -> Self {
        let len = len.min(self.positions.len());
        Self {
            positions: self.positions[..len].to_vec(),
            spacing: self.spacing,
        }
    }

    /// Steering vector at the reference frequency.
    pub fn steering_vector(&self, angle_deg: f64) -> DVector<Complex64> {
        self.steering_vector_at(angle_deg, 1.0)
    }

    /// Steering vector for a frequency `freq_scale` times the reference frequency.
    ///
    /// Entry n is `exp(-j 2 pi f d_n sin(theta))`.
    pub fn steering_vector_at(&self, angle_deg: f64, freq_scale: f64) -> DVector<Complex64> {
        let sin_theta = angle_deg.to_radians().sin();
        DVector::from_iterator(
            self.positions.len(),
            self.positions
                .iter()
                .map(|&d| Complex64::from_polar(1.0, -2.0 * PI * freq_scale * d * sin_theta)),
        )
    }

    pub fn manifold_at(&self, angles_deg: &[f64], freq_scale: f64) -> DMatrix<Complex64> {
        let mut a = DMatrix::<Complex64>::zeros(self.positions.len(), angles_deg.len());
        for (m, &angle) in angles_deg.iter().enumerate() {
            a.set_column(m, &self.steering_vector_at(angle, freq_scale));
        }
        a
    }
}

/// Immutable per-run system model shared by the synthesizer and the estimators.
#[derive(Debug, Clone)]
pub struct SystemModel {
    params: SystemModelParams,
    /// Nominal geometry, which is all an estimator is allowed to know.
    nominal: ArrayGeometry,
    /// Geometry including the fixed calibration offsets.
    calibrated: ArrayGeometry,
}

impl SystemModel {
    pub fn new(params: SystemModelParams) -> Result<Self> {
        params.validate()?;

        let nominal = ArrayGeometry::uniform(params.sensors, params.spacing);
        let offsets = calibration_offsets(params.sensors, params.eta, params.calibration_seed);
        let positions = nominal
            .positions()
            .iter()
            .zip(offsets.iter())
            .map(|(p, o)| p + o)
            .collect();
        let calibrated = ArrayGeometry::with_positions(positions, params.spacing);

        Ok(Self {
            params,
            nominal,
            calibrated,
        })
    }

    pub fn params(&self) -> &SystemModelParams {
        &self.params
    }

    pub fn sensors(&self) -> usize {
        self.params.sensors
    }

    pub fn sources(&self) -> usize {
        self.params.sources
    }

    pub fn nominal_geometry(&self) -> &ArrayGeometry {
        &self.nominal
    }

    pub fn calibrated_geometry(&self) -> &ArrayGeometry {
        &self.calibrated
    }

    /// Steering vector of the (miscalibrated) physical array.
    pub fn steering_vector(&self, angle_deg: f64) -> DVector<Complex64> {
        self.calibrated.steering_vector(angle_deg)
    }

    /// N x M steering matrix of the (miscalibrated) physical array.
    pub fn manifold(&self, angles_deg: &[f64]) -> DMatrix<Complex64> {
        self.calibrated.manifold_at(angles_deg, 1.0)
    }

    /// Draws one realization of the array geometry with per-sample position noise.
    pub fn perturbed_geometry(&self, rng: &mut impl Rng) -> Result<ArrayGeometry> {
        if self.params.geo_noise_var <= 0.0 {
            return Ok(self.calibrated.clone());
        }
        let noise = Normal::new(0.0, self.params.geo_noise_var.sqrt())
            .map_err(|_| DoaError::Configuration("invalid geo_noise_var".to_string()))?;
        let positions = self
            .calibrated
            .positions()
            .iter()
            .map(|&p| p + noise.sample(rng))
            .collect();
        Ok(ArrayGeometry::with_positions(positions, self.params.spacing))
    }
}

fn calibration_offsets(sensors: usize, eta: f64, seed: u64) -> Vec<f64> {
    if eta <= 0.0 {
        return vec![0.0; sensors];
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let uniform = Uniform::new_inclusive(-eta, eta);
    (0..sensors).map(|_| uniform.sample(&mut rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(sensors: usize, sources: usize, eta: f64) -> SystemModel {
        SystemModel::new(SystemModelParams {
            sensors,
            sources,
            eta,
            ..Default::default()
        })
        .expect("valid model")
    }

    #[test]
    fn steering_entries_have_unit_modulus() {
        let sm = model(8, 2, 0.05);
        for angle in [-90.0, -33.3, 0.0, 12.5, 89.9] {
            let a = sm.steering_vector(angle);
            assert_eq!(a.len(), 8);
            for z in a.iter() {
                assert!((z.norm() - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn broadside_steering_is_all_ones() {
        let sm = model(6, 1, 0.0);
        let a = sm.steering_vector(0.0);
        for z in a.iter() {
            assert!((z - Complex64::new(1.0, 0.0)).norm() < 1e-12);
        }
    }

    #[test]
    fn manifold_columns_independent_for_distinct_angles() {
        let sm = model(8, 4, 0.0);
        let a = sm.manifold(&[-40.0, -5.0, 20.0, 61.0]);
        assert_eq!(a.shape(), (8, 4));
        assert_eq!(a.rank(1e-9), 4);
    }

    #[test]
    fn calibration_offsets_are_fixed_and_bounded() {
        let a = model(8, 2, 0.1);
        let b = model(8, 2, 0.1);
        assert_eq!(a.calibrated_geometry(), b.calibrated_geometry());
        for (p, q) in a
            .calibrated_geometry()
            .positions()
            .iter()
            .zip(a.nominal_geometry().positions())
        {
            assert!((p - q).abs() <= 0.1 + 1e-12);
        }
    }

    #[test]
    fn geo_noise_changes_positions_per_draw() {
        let sm = SystemModel::new(SystemModelParams {
            geo_noise_var: 0.01,
            ..Default::default()
        })
        .expect("valid model");
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let g1 = sm.perturbed_geometry(&mut rng).expect("draw");
        let g2 = sm.perturbed_geometry(&mut rng).expect("draw");
        assert_ne!(g1.positions(), g2.positions());
    }

    #[test]
    fn rejects_invalid_configuration() {
        let err = SystemModel::new(SystemModelParams {
            sensors: 1,
            sources: 2,
            ..Default::default()
        });
        assert!(matches!(err, Err(DoaError::Configuration(_))));
    }
}
