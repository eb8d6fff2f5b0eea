/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Eigensolver settings

use super::errors::{LanczosError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// When the iteration stops before `max_iterations`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceCriterion {
    /// Target Ritz value changes by less than the tolerance between iterations
    #[default]
    ConvergeEigenvalues,
    /// Residual estimate `|beta_n s_n|` of the target Ritz vector is below the tolerance
    ConvergeEigenvectors,
    /// Run all iterations
    NoConvergence,
}

/// How the first Krylov vector is chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StartVector {
    /// Uniform random amplitudes from a fixed seed
    Random { seed: u64 },
    /// All amplitudes equal
    Uniform,
    /// A block vector already on disk
    Directory { path: PathBuf },
}

impl Default for StartVector {
    fn default() -> Self {
        StartVector::Random { seed: 0 }
    }
}

/// Parameters of one diagonalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanczosSettings {
    pub max_iterations: usize,
    /// Index of the eigenvalue that decides convergence, counted from the lowest
    pub target_eigenvalue: usize,
    pub eigenvalue_tolerance: f64,
    pub convergence: ConvergenceCriterion,
    /// Orthogonalize every new vector against all stored Krylov vectors
    pub reorthogonalize: bool,
    /// Number of Ritz vectors to form, lowest first
    pub num_eigenvectors: usize,
    pub start: StartVector,
    /// Directory receiving the Krylov and Ritz vectors
    pub krylov_directory: PathBuf,
}

impl Default for LanczosSettings {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            target_eigenvalue: 0,
            eigenvalue_tolerance: 1e-8,
            convergence: ConvergenceCriterion::default(),
            reorthogonalize: true,
            num_eigenvectors: 1,
            start: StartVector::default(),
            krylov_directory: PathBuf::from("krylov"),
        }
    }
}

impl LanczosSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(LanczosError::InvalidSettings(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.eigenvalue_tolerance.is_finite() && self.eigenvalue_tolerance > 0.0) {
            return Err(LanczosError::InvalidSettings(format!(
                "eigenvalue_tolerance must be positive, got {}",
                self.eigenvalue_tolerance
            )));
        }
        if self.target_eigenvalue >= self.max_iterations {
            return Err(LanczosError::InvalidSettings(format!(
                "target_eigenvalue {} can never be reached in {} iterations",
                self.target_eigenvalue, self.max_iterations
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: LanczosSettings = serde_json::from_str(
            r#"{"max_iterations": 50, "convergence": "converge_eigenvectors",
                "start": {"kind": "uniform"}}"#,
        )
        .unwrap();
        assert_eq!(settings.max_iterations, 50);
        assert_eq!(settings.convergence, ConvergenceCriterion::ConvergeEigenvectors);
        assert_eq!(settings.start, StartVector::Uniform);
        assert!(settings.reorthogonalize);
        settings.validate().unwrap();
    }

    #[test]
    fn test_invalid_tolerance() {
        let settings = LanczosSettings {
            eigenvalue_tolerance: 0.0,
            ..LanczosSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(LanczosError::InvalidSettings(_))
        ));
    }
}
