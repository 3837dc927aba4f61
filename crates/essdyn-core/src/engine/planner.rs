use crate::core::error::DynamicsError;
use crate::engine::config::AnalysisConfig;
use tracing::{info, warn};

const BYTES_PER_COORD: u64 = size_of::<f64>() as u64;

/// Peak concurrent square-matrix copies: the covariance matrix and its handoff
/// copy, plus construction copies for the eigenvector and eigenvalue buffers.
const MATRIX_COPIES: u64 = 6;

const SAFETY_MARGIN: f64 = 0.10;

/// Fraction of free memory reserved for frame buffering.
const FRAME_BUFFER_FRACTION: f64 = 0.24;

/// Below this block size, spill traffic dominates the covariance pass.
const MIN_BLOCK_FRAMES: usize = 10;

/// Admission control for an analysis run: refuses to start a run whose
/// covariance and eigendecomposition buffers cannot fit in the measured free
/// memory, and derives a safe [`FrameStore`](crate::core::storage::FrameStore)
/// block size from what is left.
#[derive(Debug, Clone, Copy)]
pub struct CapacityPlanner {
    memory_override: bool,
}

impl CapacityPlanner {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            memory_override: config.memory_override,
        }
    }

    /// Estimated peak memory for the covariance matrix and eigenpair buffers,
    /// including a 10% safety margin.
    pub fn estimate_required_bytes(num_atoms: usize, num_eigenpairs: usize) -> u64 {
        let dim = num_atoms as u64 * 3;
        let k = num_eigenpairs as u64;

        let mut required = dim * dim * MATRIX_COPIES * BYTES_PER_COORD;
        required += (k * k + k * dim) * BYTES_PER_COORD;
        required + (required as f64 * SAFETY_MARGIN) as u64
    }

    /// Checks `required_bytes` against the free-memory budget. Over budget is
    /// fatal unless the configuration allows continuing with a warning.
    pub fn check(&self, free_bytes: u64, required_bytes: u64) -> Result<(), DynamicsError> {
        if free_bytes >= required_bytes {
            info!(required_bytes, free_bytes, "memory admission check passed");
            return Ok(());
        }
        if self.memory_override {
            warn!(
                required_bytes,
                free_bytes,
                "estimated memory exceeds the budget; continuing on explicit override"
            );
            return Ok(());
        }
        Err(DynamicsError::InsufficientMemory {
            required_bytes,
            available_bytes: free_bytes,
        })
    }

    /// Derives the frame-store block size from the free-memory budget:
    /// [`FRAME_BUFFER_FRACTION`] of it, divided by the per-frame byte size
    /// and rounded down to an even count. Kept even for compatibility with
    /// the sizing of earlier tools.
    pub fn plan_block_size(free_bytes: u64, num_atoms: usize) -> Result<usize, DynamicsError> {
        if num_atoms == 0 {
            return Err(DynamicsError::EmptyInput("block size planning"));
        }

        let frame_bytes = num_atoms as u64 * 3 * BYTES_PER_COORD;
        let buffer_budget = (free_bytes as f64 * FRAME_BUFFER_FRACTION) as u64;
        let mut frames = (buffer_budget / frame_bytes) as usize;
        if frames % 2 != 0 {
            frames -= 1;
        }

        if frames < MIN_BLOCK_FRAMES {
            return Err(DynamicsError::InsufficientMemory {
                required_bytes: MIN_BLOCK_FRAMES as u64 * frame_bytes,
                available_bytes: buffer_budget,
            });
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::AnalysisConfigBuilder;

    fn config(budget: u64, allow_override: bool) -> AnalysisConfig {
        AnalysisConfigBuilder::new()
            .num_eigenpairs(10)
            .memory_budget(budget)
            .memory_override(allow_override)
            .build()
            .unwrap()
    }

    #[test]
    fn estimate_covers_matrix_copies_and_margin() {
        // 100 atoms -> dim 300; 6 copies of 300x300 doubles plus the eigen
        // buffers, plus 10%.
        let base = 300_u64 * 300 * 6 * 8 + (10 * 10 + 10 * 300) * 8;
        let expected = base + base / 10;
        assert_eq!(CapacityPlanner::estimate_required_bytes(100, 10), expected);
    }

    #[test]
    fn check_rejects_over_budget_without_override() {
        let planner = CapacityPlanner::new(&config(1_000, false));
        assert!(matches!(
            planner.check(1_000, 2_000),
            Err(DynamicsError::InsufficientMemory {
                required_bytes: 2_000,
                available_bytes: 1_000,
            })
        ));
    }

    #[test]
    fn check_with_override_continues_over_budget() {
        let planner = CapacityPlanner::new(&config(1_000, true));
        assert!(planner.check(1_000, 2_000).is_ok());
    }

    #[test]
    fn block_size_uses_a_quarter_of_the_budget_rounded_even() {
        // 10 atoms -> 240 bytes/frame. A 1 MiB budget leaves
        // floor(0.24 * 1048576 / 240) = 1048 frames, already even.
        let block = CapacityPlanner::plan_block_size(1 << 20, 10).unwrap();
        assert_eq!(block, 1048);
        assert_eq!(block % 2, 0);
    }

    #[test]
    fn odd_frame_counts_round_down_to_even() {
        // A 13001-byte budget for 10 atoms divides to 13 frames; the planner
        // rounds down to 12.
        let block = CapacityPlanner::plan_block_size(13_001, 10).unwrap();
        assert_eq!(block, 12);
    }

    #[test]
    fn tiny_budget_fails_with_insufficient_memory() {
        assert!(matches!(
            CapacityPlanner::plan_block_size(1_000, 100),
            Err(DynamicsError::InsufficientMemory { .. })
        ));
    }
}
