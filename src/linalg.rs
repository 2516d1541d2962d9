//! Complex linear-algebra helpers shared by the subspace estimators.

use nalgebra::{DMatrix, Schur, SymmetricEigen};
use num_complex::Complex64;

use crate::error::{DoaError, Result};

const EIG_MAX_ITER: usize = 10_000;

/// Eigen-decomposition of a Hermitian covariance, ranked by eigenvalue descending.
#[derive(Debug, Clone)]
pub struct SubspaceSplit {
    /// Eigenvalues, descending.
    pub eigenvalues: Vec<f64>,
    /// Eigenvectors of the `sources` largest eigenvalues (N x M).
    pub signal: DMatrix<Complex64>,
    /// Remaining eigenvectors (N x (N - M)).
    pub noise: DMatrix<Complex64>,
}

pub fn check_square(covariance: &DMatrix<Complex64>) -> Result<usize> {
    let (rows, cols) = covariance.shape();
    if rows != cols {
        return Err(DoaError::ShapeMismatch {
            context: "covariance columns",
            expected: rows,
            got: cols,
        });
    }
    if covariance
        .iter()
        .any(|z| !(z.re.is_finite() && z.im.is_finite()))
    {
        return Err(DoaError::Numerical("covariance contains non-finite entries"));
    }
    Ok(rows)
}

/// Eigenvalues (descending) and matching eigenvector columns.
pub fn hermitian_eigen(covariance: &DMatrix<Complex64>) -> Result<(Vec<f64>, DMatrix<Complex64>)> {
    check_square(covariance)?;
    let eig = SymmetricEigen::try_new(covariance.clone(), f64::EPSILON, EIG_MAX_ITER)
        .ok_or(DoaError::Numerical("hermitian eigen-decomposition did not converge"))?;

    let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let values = order.iter().map(|&i| eig.eigenvalues[i]).collect();
    let vectors = eig.eigenvectors.select_columns(order.iter());
    Ok((values, vectors))
}

/// Splits the covariance eigenvectors into signal and noise subspaces.
///
/// `estimator` names the caller in the error raised when the array has no
/// noise subspace left (N <= M).
pub fn split_subspaces(
    covariance: &DMatrix<Complex64>,
    sources: usize,
    estimator: &'static str,
) -> Result<SubspaceSplit> {
    let n = check_square(covariance)?;
    if sources == 0 {
        return Err(DoaError::Configuration(
            "source count must be greater than zero".to_string(),
        ));
    }
    if n < sources + 1 {
        return Err(DoaError::TooFewSensors {
            estimator,
            required: sources + 1,
            sensors: n,
        });
    }

    let (eigenvalues, vectors) = hermitian_eigen(covariance)?;
    Ok(SubspaceSplit {
        eigenvalues,
        signal: vectors.columns(0, sources).into_owned(),
        noise: vectors.columns(sources, n - sources).into_owned(),
    })
}

/// Eigenvalues of a general complex square matrix from its complex Schur form.
pub fn general_eigenvalues(matrix: DMatrix<Complex64>) -> Result<Vec<Complex64>> {
    let n = matrix.nrows();
    if n == 0 {
        return Ok(Vec::new());
    }
    let schur = Schur::try_new(matrix, f64::EPSILON, EIG_MAX_ITER)
        .ok_or(DoaError::Numerical("schur decomposition did not converge"))?;
    let (_, t) = schur.unpack();

    let mut values = Vec::with_capacity(n);
    let mut i = 0;
    while i < n {
        let sub = if i + 1 < n { t[(i + 1, i)].norm() } else { 0.0 };
        let scale = t[(i, i)].norm() + if i + 1 < n { t[(i + 1, i + 1)].norm() } else { 0.0 };
        if i + 1 < n && sub > f64::EPSILON * scale.max(f64::MIN_POSITIVE) {
            // Unreduced 2x2 block.
            let (a, b, c, d) = (t[(i, i)], t[(i, i + 1)], t[(i + 1, i)], t[(i + 1, i + 1)]);
            let half_trace = (a + d) * 0.5;
            let disc = ((a - d) * 0.5 * ((a - d) * 0.5) + b * c).sqrt();
            values.push(half_trace + disc);
            values.push(half_trace - disc);
            i += 2;
        } else {
            values.push(t[(i, i)]);
            i += 1;
        }
    }
    Ok(values)
}

/// Forward spatial smoothing: average of the `N - L + 1` overlapping L x L
/// diagonal blocks of the covariance.
pub fn spatial_smoothing(covariance: &DMatrix<Complex64>, subarray: usize) -> Result<DMatrix<Complex64>> {
    let n = check_square(covariance)?;
    if subarray == 0 || subarray > n {
        return Err(DoaError::Configuration(format!(
            "smoothing subarray length {subarray} must be in 1..={n}"
        )));
    }
    let count = n - subarray + 1;
    let mut smoothed = DMatrix::<Complex64>::zeros(subarray, subarray);
    for k in 0..count {
        smoothed += covariance.view((k, k), (subarray, subarray));
    }
    Ok(smoothed / Complex64::new(count as f64, 0.0))
}

/// Number of eigenvalues above `rel_tol` times the largest one.
pub fn numerical_rank(eigenvalues_desc: &[f64], rel_tol: f64) -> usize {
    let Some(&top) = eigenvalues_desc.first() else {
        return 0;
    };
    if top <= 0.0 {
        return 0;
    }
    eigenvalues_desc.iter().filter(|&&l| l > top * rel_tol).count()
}
