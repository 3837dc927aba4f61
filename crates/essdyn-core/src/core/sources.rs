use crate::core::error::DynamicsError;
use crate::core::vecops;
use nalgebra::DMatrix;

/// One trajectory frame: `3N` coordinates interleaved as `x1 y1 z1 x2 ...`.
pub type Frame = Vec<f64>;

/// Random-access provider of trajectory frames.
///
/// Implementations may be backed by memory-mapped or streamed readers; the
/// core treats every `frame` call as potentially I/O-bound and never assumes
/// the trajectory is memory-resident.
pub trait TrajectorySource {
    fn frame_count(&self) -> usize;

    /// Returns the frame at `index` as interleaved coordinates.
    fn frame(&self, index: usize) -> Result<Frame, DynamicsError>;
}

/// Provider of per-atom masses, typically derived from a topology file.
///
/// Atom order must correspond 1:1 with the coordinate order of the trajectory
/// frames.
pub trait TopologySource {
    fn num_atoms(&self) -> usize;

    fn mass(&self, atom_index: usize) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Eigenpair {
    pub value: f64,
    pub vector: Vec<f64>,
}

/// Opaque "top-K eigenpairs of a symmetric matrix" service.
///
/// Implementations return the `count` eigenpairs with the largest eigenvalue
/// magnitude in any internal order; the workflow re-ranks them largest-first.
pub trait Eigensolver {
    fn top_eigenpairs(
        &self,
        matrix: &DMatrix<f64>,
        count: usize,
    ) -> Result<Vec<Eigenpair>, DynamicsError>;
}

/// Per-atom masses with their cached total. The total is an invariant of the
/// instance and is always positive.
#[derive(Debug, Clone, PartialEq)]
pub struct MassVector {
    masses: Vec<f64>,
    total: f64,
}

impl MassVector {
    pub fn new(masses: Vec<f64>) -> Result<Self, DynamicsError> {
        if masses.is_empty() {
            return Err(DynamicsError::EmptyInput("mass vector"));
        }
        let total = vecops::sum(&masses);
        if total <= 0.0 {
            return Err(DynamicsError::NonPositiveMass { total });
        }
        Ok(Self { masses, total })
    }

    pub fn from_topology(topology: &dyn TopologySource) -> Result<Self, DynamicsError> {
        Self::new(
            (0..topology.num_atoms())
                .map(|atom| topology.mass(atom))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.masses
    }
}
