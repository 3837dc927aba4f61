use crate::cli::AnalyzeArgs;
use crate::error::{CliError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Optional TOML configuration file for `analyze`. Every field is optional;
/// command-line flags take precedence over file values.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub eigenpairs: Option<usize>,
    pub memory_budget_mib: Option<u64>,
    pub memory_override: Option<bool>,
    pub threads: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Resolved analysis parameters after merging flags over the file config.
#[derive(Debug, PartialEq)]
pub struct ResolvedAnalysis {
    pub eigenpairs: usize,
    pub memory_budget: u64,
    pub memory_override: bool,
    pub threads: Option<usize>,
}

const DEFAULT_EIGENPAIRS: usize = 20;
const DEFAULT_MEMORY_BUDGET_MIB: u64 = 2048;

pub fn resolve(args: &AnalyzeArgs) -> Result<ResolvedAnalysis> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let eigenpairs = args
        .eigenpairs
        .or(file.eigenpairs)
        .unwrap_or(DEFAULT_EIGENPAIRS);
    if eigenpairs == 0 {
        return Err(CliError::Argument(
            "at least one eigenpair must be requested".into(),
        ));
    }

    let memory_budget_mib = args
        .memory_budget_mib
        .or(file.memory_budget_mib)
        .unwrap_or(DEFAULT_MEMORY_BUDGET_MIB);

    Ok(ResolvedAnalysis {
        eigenpairs,
        memory_budget: memory_budget_mib * 1024 * 1024,
        memory_override: args.memory_override || file.memory_override.unwrap_or(false),
        threads: args.threads.or(file.threads),
    })
}
