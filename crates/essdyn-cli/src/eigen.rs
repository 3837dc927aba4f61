use essdyn::core::error::DynamicsError;
use essdyn::core::sources::{Eigenpair, Eigensolver};
use nalgebra::{DMatrix, SymmetricEigen};

/// Dense symmetric eigensolver plugged into the core's eigensolver seam.
///
/// Decomposes the full matrix and keeps the `count` eigenpairs with the
/// largest eigenvalue magnitude; the order of the returned pairs is
/// unspecified, as the seam's contract allows.
pub struct SymmetricEigenSolver;

impl Eigensolver for SymmetricEigenSolver {
    fn top_eigenpairs(
        &self,
        matrix: &DMatrix<f64>,
        count: usize,
    ) -> Result<Vec<Eigenpair>, DynamicsError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(DynamicsError::DimensionMismatch {
                expected: matrix.nrows(),
                actual: matrix.ncols(),
            });
        }

        let decomposition = SymmetricEigen::new(matrix.clone());
        let mut pairs: Vec<Eigenpair> = decomposition
            .eigenvalues
            .iter()
            .enumerate()
            .map(|(index, &value)| Eigenpair {
                value,
                vector: decomposition
                    .eigenvectors
                    .column(index)
                    .iter()
                    .copied()
                    .collect(),
            })
            .collect();

        pairs.sort_by(|a, b| {
            b.value
                .abs()
                .partial_cmp(&a.value.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pairs.truncate(count);
        Ok(pairs)
    }
}
