use crate::cli::AnalyzeArgs;
use crate::config;
use crate::data::{self, CsvTopology, CsvTrajectory};
use crate::eigen::SymmetricEigenSolver;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use essdyn::core::error::DynamicsError;
use essdyn::core::sources::TrajectorySource;
use essdyn::core::storage::{FileSpillStore, SpillStore};
use essdyn::engine::config::AnalysisConfigBuilder;
use essdyn::engine::progress::ProgressReporter;
use essdyn::workflows::dynamics;
use tracing::info;

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let resolved = config::resolve(&args)?;

    info!(path = %args.trajectory.display(), "loading trajectory");
    let trajectory = CsvTrajectory::load(&args.trajectory)?;
    let topology = CsvTopology::load(&args.masses)?;

    let reference = match &args.reference {
        Some(path) => data::read_reference(path)?,
        None => trajectory.first_frame().to_vec(),
    };
    info!(
        frames = trajectory.frame_count(),
        atoms = trajectory.num_atoms(),
        eigenpairs = resolved.eigenpairs,
        "inputs loaded"
    );

    let mut builder = AnalysisConfigBuilder::new()
        .num_eigenpairs(resolved.eigenpairs)
        .memory_budget(resolved.memory_budget)
        .memory_override(resolved.memory_override);
    if let Some(threads) = resolved.threads {
        builder = builder.num_threads(threads);
    }
    let analysis_config = builder.build()?;

    // A caller-supplied scratch directory is kept; the fallback temporary
    // directory is removed when `_scratch` drops at the end of the run.
    let (spill, _scratch): (Box<dyn SpillStore>, Option<tempfile::TempDir>) =
        match &args.scratch_dir {
            Some(dir) => (Box::new(FileSpillStore::new(dir)?), None),
            None => {
                let scratch = tempfile::tempdir()?;
                (
                    Box::new(FileSpillStore::new(scratch.path().join("essdyn-spill"))?),
                    Some(scratch),
                )
            }
        };

    let handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(handler.get_callback());

    let result = dynamics::run(
        &trajectory,
        &topology,
        &reference,
        &SymmetricEigenSolver,
        spill,
        &analysis_config,
        &reporter,
    )?;

    let values: Vec<f64> = result.eigenpairs.iter().map(|pair| pair.value).collect();
    let vectors: Vec<Vec<f64>> = result
        .eigenpairs
        .iter()
        .map(|pair| pair.vector.clone())
        .collect();
    let dim = trajectory.num_atoms() * 3;
    for vector in &vectors {
        if vector.len() != dim {
            return Err(DynamicsError::DimensionMismatch {
                expected: dim,
                actual: vector.len(),
            }
            .into());
        }
    }

    data::write_eigenvalues(&args.eigenvalues_out, &values)?;
    data::write_eigenvectors(&args.eigenvectors_out, &vectors, dim)?;
    if let Some(path) = &args.closest_out {
        data::write_structure(path, &result.closest_frame.coordinates)?;
    }

    info!(
        eigenvalues = %args.eigenvalues_out.display(),
        eigenvectors = %args.eigenvectors_out.display(),
        "results written"
    );
    println!(
        "Closest conformation to the average: frame {} (RMSD {:.3})",
        result.closest_frame.index, result.closest_frame.rmsd
    );

    Ok(())
}
