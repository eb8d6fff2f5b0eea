/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Run configuration
//!
//! A [`RunConfig`] names every file a diagonalization reads or writes and
//! carries the memory budget and solver settings. It is loaded once and
//! passed by reference.

mod errors;

pub use errors::{ConfigError, Result};

use crate::lanczos::LanczosSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything needed to diagonalize one Hamiltonian stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// JSON combination table describing the basis and its couplings
    pub combination_table: PathBuf,
    /// Saved execution order; built from the table when absent
    #[serde(default)]
    pub execution_order: Option<PathBuf>,
    /// Directory with `matrix_*.bin` and `index_*.bin` files
    pub matrix_directory: PathBuf,
    /// Scratch directory for the Krylov vectors and multiply outputs
    pub work_directory: PathBuf,
    /// Byte budget for resident matrix blocks, index lists and vector blocks
    pub maximum_loaded_memory: usize,
    #[serde(default)]
    pub num_threads: Option<usize>,
    #[serde(default)]
    pub lanczos: LanczosSettings,
    #[serde(default)]
    pub eigenvalues_output: Option<PathBuf>,
    #[serde(default)]
    pub eigenvectors_output: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: RunConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Interpret relative paths against `base`
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.combination_table);
        resolve(&mut self.matrix_directory);
        resolve(&mut self.work_directory);
        for path in [
            &mut self.execution_order,
            &mut self.eigenvalues_output,
            &mut self.eigenvectors_output,
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.maximum_loaded_memory == 0 {
            return Err(ConfigError::Invalid(
                "maximum_loaded_memory must be positive".to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(ConfigError::Invalid(
                "num_threads must be positive when given".to_string(),
            ));
        }
        self.lanczos.validate()?;
        Ok(())
    }

    /// Where the Krylov vectors go: the solver setting, under the work directory if relative
    pub fn krylov_directory(&self) -> PathBuf {
        self.work_directory.join(&self.lanczos.krylov_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"{
        "combination_table": "table.json",
        "matrix_directory": "blocks",
        "work_directory": "/scratch/run",
        "maximum_loaded_memory": 1048576,
        "lanczos": {"max_iterations": 40}
    }"#;

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.combination_table, dir.path().join("table.json"));
        assert_eq!(config.matrix_directory, dir.path().join("blocks"));
        assert_eq!(config.work_directory, PathBuf::from("/scratch/run"));
        assert_eq!(config.execution_order, None);
        assert_eq!(config.lanczos.max_iterations, 40);
        assert_eq!(
            config.krylov_directory(),
            PathBuf::from("/scratch/run/krylov")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_budget_is_invalid() {
        let mut config: RunConfig = serde_json::from_str(MINIMAL).unwrap();
        config.maximum_loaded_memory = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = RunConfig::from_file(Path::new("/nonexistent/run.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
