use crate::core::error::DynamicsError;
use crate::core::mean::RunningMean;
use crate::core::sources::{
    Eigenpair, Eigensolver, Frame, MassVector, TopologySource, TrajectorySource,
};
use crate::core::storage::{FrameStore, SpillStore};
use crate::core::superpose::SuperImposer;
use crate::core::vecops;
use crate::engine::config::AnalysisConfig;
use crate::engine::covariance::CovarianceReducer;
use crate::engine::planner::CapacityPlanner;
use crate::engine::progress::{Progress, ProgressReporter};
use std::cmp::Ordering;
use tracing::{info, instrument};

/// The trajectory frame closest to the refined average structure, after
/// superposition onto it.
#[derive(Debug, Clone)]
pub struct ClosestFrame {
    pub index: usize,
    pub rmsd: f64,
    pub coordinates: Frame,
}

#[derive(Debug, Clone)]
pub struct EssentialDynamicsResult {
    /// Requested eigenpairs, largest eigenvalue magnitude first.
    pub eigenpairs: Vec<Eigenpair>,
    /// Refined average structure every buffered frame was fitted onto.
    pub average_structure: Frame,
    /// The real conformation most representative of the average.
    pub closest_frame: ClosestFrame,
    pub num_frames: usize,
    /// Frame-store block size chosen by the capacity planner.
    pub block_size: usize,
}

/// Runs the complete essential-dynamics analysis.
///
/// The trajectory is traversed twice: a first pass fits every frame onto the
/// caller's reference structure to obtain an average conformation, a second
/// pass re-fits every frame onto that average while buffering the aligned
/// frames out of core. The buffered frames are mean-centered in place and
/// reduced to a positional covariance matrix, which is handed to the injected
/// eigensolver; its eigenpairs come back re-ranked largest-first.
#[instrument(skip_all, name = "essential_dynamics_workflow")]
pub fn run(
    trajectory: &dyn TrajectorySource,
    topology: &dyn TopologySource,
    reference: &[f64],
    solver: &dyn Eigensolver,
    spill: Box<dyn SpillStore>,
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
) -> Result<EssentialDynamicsResult, DynamicsError> {
    let frame_count = trajectory.frame_count();
    if frame_count == 0 {
        return Err(DynamicsError::EmptyInput("trajectory"));
    }
    let masses = MassVector::from_topology(topology)?;

    // Admission control before any frame is touched.
    let planner = CapacityPlanner::new(config);
    let required = CapacityPlanner::estimate_required_bytes(masses.len(), config.num_eigenpairs);
    planner.check(config.memory_budget, required)?;
    let block_size = CapacityPlanner::plan_block_size(config.memory_budget, masses.len())?;
    info!(
        frames = frame_count,
        atoms = masses.len(),
        block_size,
        "starting essential-dynamics analysis"
    );

    // Pass 1: fit everything onto the supplied reference and average.
    reporter.report(Progress::PassStart {
        name: "Average structure",
        total: frame_count as u64,
    });
    let mut imposer = SuperImposer::new(reference, masses.clone())?;
    let mut raw_mean = RunningMean::new();
    for index in 0..frame_count {
        let (aligned, _) = imposer.fit(&trajectory.frame(index)?)?;
        raw_mean.add(&aligned)?;
        reporter.report(Progress::Tick);
    }
    let raw_average = raw_mean.current()?;
    imposer.release();
    reporter.report(Progress::PassFinish);

    // Pass 2: re-fit onto the average, buffer the aligned frames, refine the
    // average, and remember the conformation closest to it.
    reporter.report(Progress::PassStart {
        name: "Refit to average",
        total: frame_count as u64,
    });
    let mut imposer = SuperImposer::new(&raw_average, masses)?;
    let mut store = FrameStore::new(block_size, spill)?;
    let mut refined_mean = RunningMean::new();
    let mut closest: Option<(usize, f64, Frame)> = None;
    for index in 0..frame_count {
        let (aligned, _) = imposer.fit(&trajectory.frame(index)?)?;
        let msd = vecops::mean_squared_deviation(&raw_average, &aligned)?;
        if closest.as_ref().is_none_or(|(_, best, _)| msd < *best) {
            closest = Some((index, msd, aligned.clone()));
        }
        refined_mean.add(&aligned)?;
        store.append(aligned)?;
        reporter.report(Progress::Tick);
    }
    imposer.release();
    let refined_average = refined_mean.current()?;
    store.subtract_broadcast(&refined_average)?;
    reporter.report(Progress::PassFinish);

    let (closest_index, closest_msd, closest_coords) =
        closest.expect("at least one frame was fitted");
    info!(
        index = closest_index,
        rmsd = closest_msd.sqrt(),
        "closest conformation to the average identified"
    );

    let reducer = CovarianceReducer::new(config)?;
    let covariance = reducer.compute(&mut store, reporter)?;
    store.teardown()?;

    reporter.report(Progress::Message("Solving eigenpairs".into()));
    let mut eigenpairs = solver.top_eigenpairs(&covariance, config.num_eigenpairs)?;
    rank_eigenpairs(&mut eigenpairs);
    info!(
        eigenpairs = eigenpairs.len(),
        "essential-dynamics analysis complete"
    );

    Ok(EssentialDynamicsResult {
        eigenpairs,
        average_structure: refined_average,
        closest_frame: ClosestFrame {
            index: closest_index,
            rmsd: closest_msd.sqrt(),
            coordinates: closest_coords,
        },
        num_frames: frame_count,
        block_size,
    })
}

/// The solver returns eigenpairs in an unspecified internal order; rank them
/// by descending eigenvalue magnitude.
fn rank_eigenpairs(eigenpairs: &mut [Eigenpair]) {
    eigenpairs.sort_by(|a, b| {
        a.value
            .abs()
            .partial_cmp(&b.value.abs())
            .unwrap_or(Ordering::Equal)
    });
    eigenpairs.reverse();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemorySpillStore;
    use crate::engine::config::AnalysisConfigBuilder;
    use nalgebra::{DMatrix, Rotation3, SymmetricEigen, Vector3};

    struct InMemoryTrajectory {
        frames: Vec<Frame>,
    }

    impl TrajectorySource for InMemoryTrajectory {
        fn frame_count(&self) -> usize {
            self.frames.len()
        }

        fn frame(&self, index: usize) -> Result<Frame, DynamicsError> {
            self.frames
                .get(index)
                .cloned()
                .ok_or(DynamicsError::IndexOutOfRange {
                    index,
                    len: self.frames.len(),
                })
        }
    }

    struct UnitMassTopology {
        atoms: usize,
    }

    impl TopologySource for UnitMassTopology {
        fn num_atoms(&self) -> usize {
            self.atoms
        }

        fn mass(&self, _atom_index: usize) -> f64 {
            1.0
        }
    }

    /// Full symmetric eigendecomposition, truncated to the requested count.
    /// Deliberately returns pairs in ascending order to exercise the
    /// workflow's re-ranking.
    struct DenseSolver;

    impl Eigensolver for DenseSolver {
        fn top_eigenpairs(
            &self,
            matrix: &DMatrix<f64>,
            count: usize,
        ) -> Result<Vec<Eigenpair>, DynamicsError> {
            let decomposition = SymmetricEigen::new(matrix.clone());
            let mut pairs: Vec<Eigenpair> = decomposition
                .eigenvalues
                .iter()
                .enumerate()
                .map(|(i, &value)| Eigenpair {
                    value,
                    vector: decomposition.eigenvectors.column(i).iter().copied().collect(),
                })
                .collect();
            pairs.sort_by(|a, b| a.value.abs().partial_cmp(&b.value.abs()).unwrap());
            let keep = count.min(pairs.len());
            Ok(pairs.split_off(pairs.len() - keep))
        }
    }

    fn analysis_config(eigenpairs: usize) -> AnalysisConfig {
        AnalysisConfigBuilder::new()
            .num_eigenpairs(eigenpairs)
            .num_threads(2)
            .memory_budget(64 << 20)
            .build()
            .unwrap()
    }

    fn rigid_copies(reference: &[f64], count: usize) -> Vec<Frame> {
        (0..count)
            .map(|i| {
                let angle = i as f64 * 0.35;
                let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), angle);
                let translation = Vector3::new(i as f64, -(i as f64) * 0.5, 2.0);
                reference
                    .chunks_exact(3)
                    .flat_map(|atom| {
                        let p = rotation * Vector3::new(atom[0], atom[1], atom[2]) + translation;
                        [p.x, p.y, p.z]
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn empty_trajectory_is_rejected() {
        let trajectory = InMemoryTrajectory { frames: Vec::new() };
        let topology = UnitMassTopology { atoms: 3 };
        let result = run(
            &trajectory,
            &topology,
            &[0.0; 9],
            &DenseSolver,
            Box::new(MemorySpillStore::new()),
            &analysis_config(2),
            &ProgressReporter::new(),
        );
        assert!(matches!(result, Err(DynamicsError::EmptyInput("trajectory"))));
    }

    #[test]
    fn rigid_trajectory_has_vanishing_eigenvalues() {
        // Pure rigid-body motion must be removed by superposition: every
        // aligned frame coincides with the average and the covariance, and
        // hence every eigenvalue, is numerically zero.
        let reference = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let trajectory = InMemoryTrajectory {
            frames: rigid_copies(&reference, 25),
        };
        let topology = UnitMassTopology { atoms: 3 };

        let result = run(
            &trajectory,
            &topology,
            &reference,
            &DenseSolver,
            Box::new(MemorySpillStore::new()),
            &analysis_config(3),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.num_frames, 25);
        assert_eq!(result.eigenpairs.len(), 3);
        for pair in &result.eigenpairs {
            assert!(pair.value.abs() < 1e-12, "eigenvalue {}", pair.value);
        }
        assert!(result.closest_frame.rmsd < 1e-6);
    }

    #[test]
    fn dominant_mode_of_a_breathing_motion_is_recovered() {
        // Four atoms oscillating along x around a square: one dominant mode
        // along the x coordinates, nothing along y or z.
        let reference: [f64; 12] = [
            1.0, 1.0, 0.0, -1.0, 1.0, 0.0, -1.0, -1.0, 0.0, 1.0, -1.0, 0.0,
        ];
        let frames: Vec<Frame> = (0..40)
            .map(|i| {
                let stretch = 0.25 * (i as f64 * 0.4).sin();
                reference
                    .chunks_exact(3)
                    .flat_map(|atom| [atom[0] + atom[0].signum() * stretch, atom[1], atom[2]])
                    .collect()
            })
            .collect();
        let trajectory = InMemoryTrajectory { frames };
        let topology = UnitMassTopology { atoms: 4 };

        let result = run(
            &trajectory,
            &topology,
            &reference,
            &DenseSolver,
            Box::new(MemorySpillStore::new()),
            &analysis_config(4),
            &ProgressReporter::new(),
        )
        .unwrap();

        // Ranked largest-first.
        for window in result.eigenpairs.windows(2) {
            assert!(window[0].value.abs() >= window[1].value.abs());
        }

        let dominant = &result.eigenpairs[0];
        let rest: f64 = result.eigenpairs[1..].iter().map(|p| p.value.abs()).sum();
        assert!(
            dominant.value > 10.0 * rest.max(1e-30),
            "dominant {} vs rest {rest}",
            dominant.value
        );
        assert_eq!(dominant.vector.len(), 12);
    }

    #[test]
    fn rank_eigenpairs_orders_by_descending_magnitude() {
        let mut pairs = vec![
            Eigenpair {
                value: 0.5,
                vector: vec![1.0],
            },
            Eigenpair {
                value: -3.0,
                vector: vec![2.0],
            },
            Eigenpair {
                value: 2.0,
                vector: vec![3.0],
            },
        ];
        rank_eigenpairs(&mut pairs);
        let values: Vec<f64> = pairs.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![-3.0, 2.0, 0.5]);
    }
}
