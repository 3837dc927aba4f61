use crate::core::error::DynamicsError;
use crate::core::sources::Frame;

/// Streaming elementwise mean over an unbounded sequence of equal-length
/// frames. The frame length is adopted from the first pose added.
#[derive(Debug, Default)]
pub struct RunningMean {
    sums: Vec<f64>,
    count: u64,
    cached: Vec<f64>,
    count_when_cached: u64,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pose: &[f64]) -> Result<(), DynamicsError> {
        if self.count == 0 {
            self.sums = vec![0.0; pose.len()];
        } else if pose.len() != self.sums.len() {
            return Err(DynamicsError::DimensionMismatch {
                expected: self.sums.len(),
                actual: pose.len(),
            });
        }

        for (total, value) in self.sums.iter_mut().zip(pose) {
            *total += value;
        }
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Current mean structure. The division is cached and only recomputed when
    /// poses have been added since the previous call; callers always receive
    /// their own copy.
    pub fn current(&mut self) -> Result<Frame, DynamicsError> {
        if self.count == 0 {
            return Err(DynamicsError::EmptyInput("running mean"));
        }

        if self.count_when_cached != self.count {
            let n = self.count as f64;
            self.cached = self.sums.iter().map(|total| total / n).collect();
            self.count_when_cached = self.count;
        }

        Ok(self.cached.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_matches_arithmetic_average() {
        let mut mean = RunningMean::new();
        mean.add(&[1.0, 10.0]).unwrap();
        mean.add(&[2.0, 20.0]).unwrap();
        mean.add(&[3.0, 30.0]).unwrap();
        assert_eq!(mean.current().unwrap(), vec![2.0, 20.0]);
    }

    #[test]
    fn mean_is_insertion_order_independent() {
        let poses = [[1.0, -4.0], [2.5, 0.5], [7.25, 3.0]];

        let mut forward = RunningMean::new();
        for pose in &poses {
            forward.add(pose).unwrap();
        }
        let mut backward = RunningMean::new();
        for pose in poses.iter().rev() {
            backward.add(pose).unwrap();
        }

        let a = forward.current().unwrap();
        let b = backward.current().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn add_rejects_length_change() {
        let mut mean = RunningMean::new();
        mean.add(&[1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            mean.add(&[1.0]),
            Err(DynamicsError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn current_without_poses_is_empty_input() {
        let mut mean = RunningMean::new();
        assert!(matches!(
            mean.current(),
            Err(DynamicsError::EmptyInput(_))
        ));
    }

    #[test]
    fn cache_is_refreshed_after_new_poses() {
        let mut mean = RunningMean::new();
        mean.add(&[2.0]).unwrap();
        assert_eq!(mean.current().unwrap(), vec![2.0]);

        mean.add(&[4.0]).unwrap();
        assert_eq!(mean.current().unwrap(), vec![3.0]);
    }

    #[test]
    fn returned_mean_is_the_callers_own_copy() {
        let mut mean = RunningMean::new();
        mean.add(&[5.0]).unwrap();

        let mut first = mean.current().unwrap();
        first[0] = -100.0;
        assert_eq!(mean.current().unwrap(), vec![5.0]);
    }
}
