use crate::core::error::DynamicsError;
use crate::core::storage::FrameStore;
use crate::core::storage::block::FrameBlock;
use crate::engine::config::AnalysisConfig;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::DMatrix;
use std::num::NonZeroUsize;
use std::ops::Range;
use tracing::{debug, instrument};

/// Parallel block-wise reduction of a mean-centered [`FrameStore`] into a
/// symmetric positional covariance matrix.
///
/// One block is consumed at a time to keep memory bounded. Within a block the
/// 3N coordinate rows of the accumulator are partitioned into contiguous
/// ranges, one per worker; since no accumulator cell belongs to two ranges,
/// the hot loop runs without locks, and joining the workers is the only
/// synchronization point between blocks. The worker pool is built once per
/// reducer and reused across blocks.
pub struct CovarianceReducer {
    num_threads: usize,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl CovarianceReducer {
    pub fn new(config: &AnalysisConfig) -> Result<Self, DynamicsError> {
        let available = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        let num_threads = config.num_threads.clamp(1, available);

        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| DynamicsError::Internal(format!("failed to build worker pool: {e}")))?;

        Ok(Self {
            num_threads,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Reduces the store into a `3N × 3N` covariance matrix, normalized by
    /// the total frame count. The store's blocks are consumed in creation
    /// order and discarded once used; the caller still owns the store and is
    /// responsible for tearing it down.
    #[instrument(skip_all, name = "covariance_reduction")]
    pub fn compute(
        &self,
        store: &mut FrameStore,
        reporter: &ProgressReporter,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        let total_frames = store.num_frames();
        if total_frames == 0 {
            return Err(DynamicsError::EmptyInput("covariance accumulation"));
        }
        let dim = store.frame_len()?;

        store.transpose_all()?;
        reporter.report(Progress::PassStart {
            name: "Covariance reduction",
            total: store.num_blocks() as u64,
        });

        let mut accumulator = vec![0.0_f64; dim * dim];
        let ranges = partition_rows(dim, self.num_threads);

        for index in 0..store.num_blocks() {
            if store.block_len(index) == 0 {
                reporter.report(Progress::Tick);
                continue;
            }
            store.ensure_block_resident(index)?;
            debug!(block = index, "accumulating block");

            {
                let block = store.block(index);
                let mut parts: Vec<&mut [f64]> = Vec::with_capacity(ranges.len());
                let mut rest = accumulator.as_mut_slice();
                for range in &ranges {
                    let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * dim);
                    parts.push(head);
                    rest = tail;
                }

                #[cfg(feature = "parallel")]
                self.pool.scope(|scope| {
                    for (range, part) in ranges.iter().cloned().zip(parts) {
                        scope.spawn(move |_| accumulate_rows(block, range, part, dim));
                    }
                });

                #[cfg(not(feature = "parallel"))]
                for (range, part) in ranges.iter().cloned().zip(parts) {
                    accumulate_rows(block, range, part, dim);
                }
            }

            store.discard_block(index)?;
            reporter.report(Progress::Tick);
        }
        reporter.report(Progress::PassFinish);

        let n = total_frames as f64;
        for cell in &mut accumulator {
            *cell /= n;
        }
        Ok(DMatrix::from_row_slice(dim, dim, &accumulator))
    }
}

/// Splits `dim` coordinate rows into up to `threads` contiguous ranges, with
/// the remainder appended to the last range.
fn partition_rows(dim: usize, threads: usize) -> Vec<Range<usize>> {
    let workers = threads.min(dim).max(1);
    let per_worker = dim / workers;
    let remainder = dim % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for worker in 0..workers {
        let mut end = start + per_worker;
        if worker + 1 == workers {
            end += remainder;
        }
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// Accumulates `Σ_frames row[f]·col[f]` for every row in `rows` against every
/// column, into this worker's private slice of the shared accumulator.
fn accumulate_rows(block: &FrameBlock, rows: Range<usize>, out: &mut [f64], dim: usize) {
    for (local, row_index) in rows.enumerate() {
        let row = block.series(row_index);
        let out_row = &mut out[local * dim..(local + 1) * dim];
        for (col_index, cell) in out_row.iter_mut().enumerate() {
            let col = block.series(col_index);
            *cell += row.iter().zip(col).map(|(a, b)| a * b).sum::<f64>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemorySpillStore;
    use crate::engine::config::{AnalysisConfig, AnalysisConfigBuilder};

    fn config_with_threads(threads: usize) -> AnalysisConfig {
        AnalysisConfigBuilder::new()
            .num_eigenpairs(3)
            .num_threads(threads)
            .memory_budget(1 << 30)
            .build()
            .unwrap()
    }

    fn store_of(frames: &[Vec<f64>], block_size: usize) -> FrameStore {
        let mut store = FrameStore::new(block_size, Box::new(MemorySpillStore::new())).unwrap();
        for frame in frames {
            store.append(frame.clone()).unwrap();
        }
        store
    }

    /// Serial reference: C[i][j] = Σ_f frames[f][i] * frames[f][j] / F.
    fn reference_covariance(frames: &[Vec<f64>]) -> DMatrix<f64> {
        let dim = frames[0].len();
        let mut matrix = DMatrix::zeros(dim, dim);
        for frame in frames {
            for i in 0..dim {
                for j in 0..dim {
                    matrix[(i, j)] += frame[i] * frame[j];
                }
            }
        }
        matrix / frames.len() as f64
    }

    #[test]
    fn empty_store_is_rejected() {
        let reducer = CovarianceReducer::new(&config_with_threads(2)).unwrap();
        let mut store = FrameStore::new(4, Box::new(MemorySpillStore::new())).unwrap();
        assert!(matches!(
            reducer.compute(&mut store, &ProgressReporter::new()),
            Err(DynamicsError::EmptyInput(_))
        ));
    }

    #[test]
    fn identical_centered_frames_have_zero_covariance() {
        let frames: Vec<Vec<f64>> = (0..7).map(|_| vec![1.5, -2.0, 0.75, 3.0, 0.5, -1.0]).collect();
        let mut store = store_of(&frames, 3);
        // Mean-center: identical frames collapse to zero everywhere.
        store.subtract_broadcast(&frames[0]).unwrap();

        let reducer = CovarianceReducer::new(&config_with_threads(2)).unwrap();
        let covariance = reducer.compute(&mut store, &ProgressReporter::new()).unwrap();

        assert!(covariance.iter().all(|&cell| cell == 0.0));
        store.teardown().unwrap();
    }

    #[test]
    fn covariance_is_symmetric() {
        let frames = vec![
            vec![1.0, 2.0, 3.0, -1.0, 0.5, 2.5],
            vec![0.0, 1.0, -2.0, 4.0, 1.5, -0.5],
            vec![2.0, -1.0, 0.0, 1.0, -3.0, 1.0],
            vec![-2.0, 0.5, 1.0, 0.0, 2.0, 0.0],
            vec![0.5, 0.5, 0.5, -0.5, -0.5, -0.5],
        ];
        let mut store = store_of(&frames, 2);
        let reducer = CovarianceReducer::new(&config_with_threads(3)).unwrap();
        let covariance = reducer.compute(&mut store, &ProgressReporter::new()).unwrap();

        for i in 0..6 {
            for j in 0..6 {
                assert_eq!(covariance[(i, j)], covariance[(j, i)], "cell ({i},{j})");
            }
        }
        store.teardown().unwrap();
    }

    #[test]
    fn blocked_parallel_reduction_matches_serial_reference() {
        let frames: Vec<Vec<f64>> = (0..11)
            .map(|f| {
                (0..9)
                    .map(|c| ((f * 9 + c) as f64 * 0.37).sin())
                    .collect()
            })
            .collect();
        let expected = reference_covariance(&frames);

        for threads in [1, 2, 4] {
            let mut store = store_of(&frames, 4);
            let reducer = CovarianceReducer::new(&config_with_threads(threads)).unwrap();
            let covariance = reducer.compute(&mut store, &ProgressReporter::new()).unwrap();

            for i in 0..9 {
                for j in 0..9 {
                    assert!(
                        (covariance[(i, j)] - expected[(i, j)]).abs() < 1e-12,
                        "threads {threads}, cell ({i},{j})"
                    );
                }
            }
            store.teardown().unwrap();
        }
    }

    #[test]
    fn partition_covers_all_rows_with_remainder_on_the_last_range() {
        let ranges = partition_rows(10, 3);
        assert_eq!(ranges, vec![0..3, 3..6, 6..10]);

        let ranges = partition_rows(2, 8);
        assert_eq!(ranges, vec![0..1, 1..2]);

        let ranges = partition_rows(6, 1);
        assert_eq!(ranges, vec![0..6]);
    }
}
