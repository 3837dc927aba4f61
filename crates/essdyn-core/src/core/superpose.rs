use crate::core::error::DynamicsError;
use crate::core::sources::{Frame, MassVector};
use crate::core::vecops;
use nalgebra::{DMatrix, Vector3};

/// Cached, de-centered view of the reference structure, computed once at
/// construction and reused as the fixed operand of every per-frame fit.
#[derive(Debug)]
struct ReferenceState {
    center_of_mass: Vector3<f64>,
    decentered: Vec<f64>,
    decentered_squared: Vec<f64>,
    /// Mass-weighted de-centered reference as a 3×N matrix, the left operand
    /// of the cross-covariance product.
    weighted: DMatrix<f64>,
}

/// Mass-weighted superposition of trajectory frames onto a fixed reference.
///
/// Each [`fit`](SuperImposer::fit) performs a weighted Kabsch alignment:
/// center-of-mass removal, SVD-based rotation recovery with reflection
/// correction, and an RMSD derived from the singular values. Once every pass
/// over the trajectory is complete, [`release`](SuperImposer::release) frees
/// the cached reference to bound peak memory.
#[derive(Debug)]
pub struct SuperImposer {
    masses: MassVector,
    reference: Option<ReferenceState>,
}

impl SuperImposer {
    pub fn new(reference: &[f64], masses: MassVector) -> Result<Self, DynamicsError> {
        if reference.len() != masses.len() * 3 {
            return Err(DynamicsError::DimensionMismatch {
                expected: masses.len() * 3,
                actual: reference.len(),
            });
        }

        let mut imposer = Self {
            masses,
            reference: None,
        };
        let (decentered, center_of_mass) = imposer.remove_center_of_mass(reference)?;
        let decentered_squared = vecops::power(&decentered, 2);
        let weighted = vecops::weighted_rows(imposer.masses.as_slice(), &decentered)?;
        imposer.reference = Some(ReferenceState {
            center_of_mass,
            decentered,
            decentered_squared,
            weighted,
        });
        Ok(imposer)
    }

    /// Aligns `frame` onto the reference and returns the aligned coordinates
    /// together with the mass-weighted RMSD of the fit.
    pub fn fit(&self, frame: &[f64]) -> Result<(Frame, f64), DynamicsError> {
        let state = self.reference()?;
        if frame.len() != state.decentered.len() {
            return Err(DynamicsError::DimensionMismatch {
                expected: state.decentered.len(),
                actual: frame.len(),
            });
        }

        let (decentered, _) = self.remove_center_of_mass(frame)?;
        let msd_base = self.half_weighted_square_sum(&decentered, state)?;

        let num_atoms = decentered.len() / 3;
        let frame_matrix =
            DMatrix::from_fn(num_atoms, 3, |atom, axis| decentered[atom * 3 + axis]);

        // Cross-covariance of the weighted reference with the frame: 3×3.
        let cross = &state.weighted * &frame_matrix;
        let svd = cross.svd(true, true);
        let (u, mut v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => {
                return Err(DynamicsError::Internal(
                    "singular value decomposition produced no rotation factors".into(),
                ));
            }
        };
        let mut singular_values = svd.singular_values;

        // A negative determinant product means the best orthogonal transform
        // is a reflection; flipping the weakest singular direction keeps the
        // fit a proper rotation and preserves chirality.
        let reflection = u.determinant() * v_t.determinant();
        if reflection < 0.0 {
            singular_values[2] = -singular_values[2];
            v_t.row_mut(2).neg_mut();
        }

        let rotation = &u * &v_t;
        let msd = msd_base - singular_values.sum();
        let rmsd = (2.0 * msd.abs() / self.masses.total()).sqrt();

        let rotated = &rotation * frame_matrix.transpose();
        let mut aligned = vec![0.0; decentered.len()];
        for atom in 0..num_atoms {
            for axis in 0..3 {
                aligned[atom * 3 + axis] = rotated[(axis, atom)] + state.center_of_mass[axis];
            }
        }

        Ok((aligned, rmsd))
    }

    /// Discards the cached reference data. Subsequent calls to
    /// [`fit`](SuperImposer::fit) fail with
    /// [`DynamicsError::UseAfterFree`].
    pub fn release(&mut self) {
        self.reference = None;
    }

    fn reference(&self) -> Result<&ReferenceState, DynamicsError> {
        self.reference.as_ref().ok_or(DynamicsError::UseAfterFree {
            resource: "superimposer reference state",
        })
    }

    /// Removes the mass-weighted center of mass from an interleaved
    /// coordinate vector, returning the de-centered coordinates and the
    /// center that was removed.
    fn remove_center_of_mass(
        &self,
        interleaved: &[f64],
    ) -> Result<(Vec<f64>, Vector3<f64>), DynamicsError> {
        let num_atoms = interleaved.len() / 3;
        let mut by_axis = [
            Vec::with_capacity(num_atoms),
            Vec::with_capacity(num_atoms),
            Vec::with_capacity(num_atoms),
        ];
        for atom in 0..num_atoms {
            for axis in 0..3 {
                by_axis[axis].push(interleaved[atom * 3 + axis]);
            }
        }

        let mut center = Vector3::zeros();
        for axis in 0..3 {
            let weighted = vecops::multiply(self.masses.as_slice(), &by_axis[axis])?;
            center[axis] = vecops::sum(&weighted) / self.masses.total();
        }

        let mut decentered = vec![0.0; interleaved.len()];
        for atom in 0..num_atoms {
            for axis in 0..3 {
                decentered[atom * 3 + axis] = interleaved[atom * 3 + axis] - center[axis];
            }
        }

        Ok((decentered, center))
    }

    /// `0.5 · Σ m·(frame² + ref²)`, the rotation-independent part of the
    /// weighted squared deviation; the singular values of the
    /// cross-covariance are subtracted from this to obtain the fitted MSD.
    fn half_weighted_square_sum(
        &self,
        decentered: &[f64],
        state: &ReferenceState,
    ) -> Result<f64, DynamicsError> {
        let summed = vecops::add(&vecops::power(decentered, 2), &state.decentered_squared)?;

        let num_atoms = decentered.len() / 3;
        let mut per_atom = Vec::with_capacity(num_atoms);
        for atom in 0..num_atoms {
            per_atom.push(summed[atom * 3] + summed[atom * 3 + 1] + summed[atom * 3 + 2]);
        }

        Ok(0.5 * vecops::sum(&vecops::multiply(self.masses.as_slice(), &per_atom)?))
    }
}
