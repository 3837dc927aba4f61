use std::num::NonZeroUsize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter {parameter}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
}

/// Explicit configuration for one essential-dynamics analysis.
///
/// Every component that needs a limit receives it from here through its
/// constructor; there is no process-wide mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// How many eigenpairs the caller wants back from the eigensolver.
    pub num_eigenpairs: usize,
    /// Worker threads for the covariance reduction. Clamped to the machine's
    /// available parallelism by the reducer.
    pub num_threads: usize,
    /// Measured free memory, in bytes, that the run may use for matrices and
    /// frame buffering.
    pub memory_budget: u64,
    /// Continue past a failed memory admission check with a warning instead
    /// of aborting.
    pub memory_override: bool,
}

#[derive(Default)]
pub struct AnalysisConfigBuilder {
    num_eigenpairs: Option<usize>,
    num_threads: Option<usize>,
    memory_budget: Option<u64>,
    memory_override: Option<bool>,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_eigenpairs(mut self, count: usize) -> Self {
        self.num_eigenpairs = Some(count);
        self
    }
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }
    pub fn memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }
    pub fn memory_override(mut self, allow: bool) -> Self {
        self.memory_override = Some(allow);
        self
    }

    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        let num_eigenpairs = self
            .num_eigenpairs
            .ok_or(ConfigError::MissingParameter("num_eigenpairs"))?;
        if num_eigenpairs == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "num_eigenpairs",
                reason: "at least one eigenpair must be requested".into(),
            });
        }

        let num_threads = self.num_threads.unwrap_or_else(default_thread_count);
        if num_threads == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "num_threads",
                reason: "thread count cannot be zero".into(),
            });
        }

        Ok(AnalysisConfig {
            num_eigenpairs,
            num_threads,
            memory_budget: self
                .memory_budget
                .ok_or(ConfigError::MissingParameter("memory_budget"))?,
            memory_override: self.memory_override.unwrap_or(false),
        })
    }
}

fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_eigenpair_count() {
        let result = AnalysisConfigBuilder::new().memory_budget(1 << 30).build();
        assert_eq!(
            result,
            Err(ConfigError::MissingParameter("num_eigenpairs"))
        );
    }

    #[test]
    fn build_requires_memory_budget() {
        let result = AnalysisConfigBuilder::new().num_eigenpairs(10).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("memory_budget")));
    }

    #[test]
    fn build_rejects_zero_eigenpairs() {
        let result = AnalysisConfigBuilder::new()
            .num_eigenpairs(0)
            .memory_budget(1 << 30)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter {
                parameter: "num_eigenpairs",
                ..
            })
        ));
    }

    #[test]
    fn defaults_fill_threads_and_override() {
        let config = AnalysisConfigBuilder::new()
            .num_eigenpairs(5)
            .memory_budget(1 << 30)
            .build()
            .unwrap();
        assert!(config.num_threads >= 1);
        assert!(!config.memory_override);
    }
}
