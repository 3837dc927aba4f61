use crate::core::error::DynamicsError;
use nalgebra::DMatrix;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Below this length the per-thread bookkeeping costs more than the arithmetic.
#[cfg(feature = "parallel")]
const PARALLEL_CUTOFF: usize = 16_384;

pub fn power(vector: &[f64], exponent: i32) -> Vec<f64> {
    vector.iter().map(|v| v.powi(exponent)).collect()
}

pub fn multiply(a: &[f64], b: &[f64]) -> Result<Vec<f64>, DynamicsError> {
    check_same_length(a, b)?;

    #[cfg(feature = "parallel")]
    if a.len() >= PARALLEL_CUTOFF {
        return Ok(a
            .par_iter()
            .zip(b.par_iter())
            .map(|(x, y)| x * y)
            .collect());
    }

    Ok(a.iter().zip(b).map(|(x, y)| x * y).collect())
}

pub fn add(a: &[f64], b: &[f64]) -> Result<Vec<f64>, DynamicsError> {
    check_same_length(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| x + y).collect())
}

pub fn sum(vector: &[f64]) -> f64 {
    vector.iter().sum()
}

/// Mean of the squared elementwise differences between two structures.
pub fn mean_squared_deviation(a: &[f64], b: &[f64]) -> Result<f64, DynamicsError> {
    check_same_length(a, b)?;
    if a.is_empty() {
        return Err(DynamicsError::EmptyInput("mean squared deviation"));
    }
    let total: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Ok(total / a.len() as f64)
}

/// Multiplies a length-N weight vector into an interleaved `x1 y1 z1 ...`
/// coordinate vector, producing the weighted coordinates as a 3×N matrix
/// (row 0 holds the weighted x values, and so on).
pub fn weighted_rows(weights: &[f64], interleaved: &[f64]) -> Result<DMatrix<f64>, DynamicsError> {
    if interleaved.len() != weights.len() * 3 {
        return Err(DynamicsError::DimensionMismatch {
            expected: weights.len() * 3,
            actual: interleaved.len(),
        });
    }

    Ok(DMatrix::from_fn(3, weights.len(), |axis, atom| {
        weights[atom] * interleaved[atom * 3 + axis]
    }))
}

fn check_same_length(a: &[f64], b: &[f64]) -> Result<(), DynamicsError> {
    if a.len() != b.len() {
        return Err(DynamicsError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}
