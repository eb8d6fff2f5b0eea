/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Lanczos iteration with disk-resident Krylov vectors
//!
//! Step `n` computes `w = H v_n`, `alpha_n = <v_n, w>`,
//! `w -= alpha_n v_n + beta_{n-1} v_{n-1}`, optionally removes the components
//! of `w` along every stored Krylov vector (classical Gram-Schmidt, applied
//! twice), and stores `v_{n+1} = w / beta_n` with `beta_n = |w|`. After every
//! step the tridiagonal matrix is diagonalized and the convergence criterion
//! is checked on the target Ritz value.

use super::errors::{LanczosError, Result};
use super::settings::{ConvergenceCriterion, LanczosSettings, StartVector};
use super::tridiagonal::{solve_tridiagonal, TridiagonalEigen};
use crate::operator::LinearOperator;
use crate::storage::write_npy;
use crate::vector::BlockVector;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Relative size of `beta` below which the Krylov space is invariant
const BREAKDOWN_THRESHOLD: f64 = 1e-12;

/// Directory of Krylov vector `n`
pub fn krylov_vector_path(directory: &Path, n: usize) -> PathBuf {
    directory.join(format!("lanczos_{:04}", n))
}

/// Directory of Ritz vector `k`
pub fn eigenvector_path(directory: &Path, k: usize) -> PathBuf {
    directory.join(format!("eigenvector_{:04}", k))
}

/// How the iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LanczosStatus {
    /// The convergence criterion was met
    Converged,
    /// `beta` vanished; the Ritz values are exact eigenvalues
    InvariantSubspace,
    /// The iteration cap was reached first
    MaxIterations,
}

/// Result of a diagonalization
#[derive(Debug)]
pub struct Eigensystem {
    /// All Ritz values, ascending
    pub eigenvalues: Vec<f64>,
    /// Normalized Ritz vectors of the lowest eigenvalues
    pub eigenvectors: Vec<BlockVector>,
    /// Residual estimate `|beta_n s_n|` for each returned Ritz vector
    pub residuals: Vec<f64>,
    pub iterations: usize,
    pub status: LanczosStatus,
    pub alphas: Vec<f64>,
    pub betas: Vec<f64>,
}

#[derive(Serialize)]
struct EigenvalueReport<'a> {
    status: LanczosStatus,
    iterations: usize,
    eigenvalues: &'a [f64],
    residuals: &'a [f64],
}

impl Eigensystem {
    pub fn eigenvalue(&self, index: usize) -> Option<f64> {
        self.eigenvalues.get(index).copied()
    }

    /// Write status, iteration count, Ritz values and residuals as JSON
    pub fn write_eigenvalues_json(&self, path: &Path) -> Result<()> {
        let report = EigenvalueReport {
            status: self.status,
            iterations: self.iterations,
            eigenvalues: &self.eigenvalues,
            residuals: &self.residuals,
        };
        let text = serde_json::to_string_pretty(&report).map_err(|source| {
            LanczosError::Serialize {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(path, text).map_err(|source| LanczosError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the Ritz vectors as one `.npy` array, one row per eigenvector
    pub fn write_eigenvectors_npy(&self, path: &Path) -> Result<()> {
        let cols = self
            .eigenvectors
            .first()
            .map(|vector| vector.dimension())
            .unwrap_or(0);
        let mut data = Vec::with_capacity(self.eigenvectors.len() * cols);
        for vector in &self.eigenvectors {
            data.extend(vector.to_dense()?);
        }
        write_npy(path, self.eigenvectors.len(), cols, &data)?;
        Ok(())
    }
}

/// A configured diagonalization of one operator
pub struct LanczosEnvironment<'a, O: LinearOperator + ?Sized> {
    operator: &'a O,
    settings: LanczosSettings,
}

impl<'a, O: LinearOperator + ?Sized> LanczosEnvironment<'a, O> {
    pub fn new(operator: &'a O, settings: LanczosSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { operator, settings })
    }

    pub fn settings(&self) -> &LanczosSettings {
        &self.settings
    }

    fn start_vector(&self, vector: &BlockVector) -> Result<()> {
        match &self.settings.start {
            StartVector::Random { seed } => vector.fill_random(*seed)?,
            StartVector::Uniform => vector.fill_with(|_, _| 1.0)?,
            StartVector::Directory { path } => {
                let source = BlockVector::open(path, self.operator.basis().clone());
                vector.copy_from(&source)?;
            }
        }
        let norm = vector.norm()?;
        if !(norm.is_finite() && norm > 0.0) {
            return Err(LanczosError::DegenerateStart(norm));
        }
        vector.scale(1.0 / norm)?;
        Ok(())
    }

    /// Remove the components of `w` along every Krylov vector
    fn reorthogonalize(&self, w: &BlockVector, krylov: &[BlockVector]) -> Result<()> {
        let basis: Vec<&BlockVector> = krylov.iter().collect();
        for _ in 0..2 {
            let overlaps = w.dot_many(&basis)?;
            let terms: Vec<(f64, &BlockVector)> = overlaps
                .iter()
                .zip(&basis)
                .map(|(overlap, vector)| (-overlap, *vector))
                .collect();
            w.add_combination(&terms)?;
        }
        Ok(())
    }

    /// Run the iteration and form the requested Ritz vectors
    pub fn diagonalize(&self) -> Result<Eigensystem> {
        let settings = &self.settings;
        let basis = self.operator.basis().clone();
        let directory = settings.krylov_directory.as_path();
        let max_iterations = settings.max_iterations.min(basis.dimension());
        let target = settings.target_eigenvalue;
        let tolerance = settings.eigenvalue_tolerance;

        let first = BlockVector::create(krylov_vector_path(directory, 0), basis.clone())?;
        self.start_vector(&first)?;
        let mut krylov = vec![first];
        let w = BlockVector::create(directory.join("work"), basis.clone())?;

        let mut alphas: Vec<f64> = Vec::new();
        let mut betas: Vec<f64> = Vec::new();
        let mut last_beta = 0.0;
        let mut previous: Option<f64> = None;
        let mut status = LanczosStatus::MaxIterations;
        let mut eigen: Option<TridiagonalEigen> = None;

        for n in 0..max_iterations {
            let v = &krylov[n];
            self.operator.apply(v, &w)?;
            let alpha = v.dot(&w)?;
            let mut terms = vec![(-alpha, v)];
            if n > 0 {
                terms.push((-betas[n - 1], &krylov[n - 1]));
            }
            w.add_combination(&terms)?;
            if settings.reorthogonalize {
                self.reorthogonalize(&w, &krylov)?;
            }
            alphas.push(alpha);
            let beta = w.norm()?;
            last_beta = beta;

            let tri = solve_tridiagonal(&alphas, &betas)?;
            let reached = tri.len() > target;
            let theta = tri.values()[target.min(tri.len() - 1)];
            let residual = (beta * tri.last_component(target.min(tri.len() - 1))).abs();
            info!(
                "lanczos iteration {}: alpha = {:.12e}, beta = {:.6e}, theta[{}] = {:.12}, residual = {:.3e}",
                n + 1,
                alpha,
                beta,
                target,
                theta,
                residual
            );

            let converged = reached
                && match settings.convergence {
                    ConvergenceCriterion::ConvergeEigenvalues => {
                        previous.is_some_and(|last| (theta - last).abs() < tolerance)
                    }
                    ConvergenceCriterion::ConvergeEigenvectors => residual < tolerance,
                    ConvergenceCriterion::NoConvergence => false,
                };
            previous = reached.then_some(theta);
            eigen = Some(tri);

            if converged {
                status = LanczosStatus::Converged;
                break;
            }
            if beta < BREAKDOWN_THRESHOLD * alpha.abs().max(1.0) {
                debug!("invariant subspace found after {} iterations", n + 1);
                status = LanczosStatus::InvariantSubspace;
                break;
            }
            if n + 1 == max_iterations {
                break;
            }

            betas.push(beta);
            let next = BlockVector::create(krylov_vector_path(directory, n + 1), basis.clone())?;
            next.copy_from(&w)?;
            next.scale(1.0 / beta)?;
            krylov.push(next);
        }
        w.remove()?;

        let iterations = alphas.len();
        if status == LanczosStatus::MaxIterations {
            warn!(
                "lanczos did not converge in {} iterations (tolerance {:e})",
                iterations, tolerance
            );
        }

        let Some(eigen) = eigen else {
            return Err(LanczosError::InvalidSettings(
                "no iteration was performed".to_string(),
            ));
        };

        let count = settings.num_eigenvectors.min(eigen.len());
        let mut eigenvectors = Vec::with_capacity(count);
        let mut residuals = Vec::with_capacity(count);
        for k in 0..count {
            let vector = BlockVector::create(eigenvector_path(directory, k), basis.clone())?;
            vector.fill_zero()?;
            let terms: Vec<(f64, &BlockVector)> = krylov
                .iter()
                .enumerate()
                .map(|(j, krylov_vector)| (eigen.component(j, k), krylov_vector))
                .collect();
            vector.add_combination(&terms)?;
            let norm = vector.norm()?;
            if norm > 0.0 {
                vector.scale(1.0 / norm)?;
            }
            residuals.push((last_beta * eigen.last_component(k)).abs());
            eigenvectors.push(vector);
        }

        info!(
            "lanczos finished after {} iterations ({:?}), lowest eigenvalue {:.12}",
            iterations,
            status,
            eigen.values()[0]
        );
        Ok(Eigensystem {
            eigenvalues: eigen.values().to_vec(),
            eigenvectors,
            residuals,
            iterations,
            status,
            alphas,
            betas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::DenseOperator;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn settings(directory: &Path) -> LanczosSettings {
        LanczosSettings {
            max_iterations: 10,
            krylov_directory: directory.to_path_buf(),
            ..LanczosSettings::default()
        }
    }

    #[test]
    fn test_diagonal_matrix_eigenvalues() {
        let dir = tempdir().unwrap();
        let operator = DenseOperator::from_rows(&[
            &[3.0, 0.0, 0.0],
            &[0.0, 1.0, 0.0],
            &[0.0, 0.0, 2.0],
        ])
        .unwrap();
        let eigensystem = LanczosEnvironment::new(&operator, settings(dir.path()))
            .unwrap()
            .diagonalize()
            .unwrap();
        assert_relative_eq!(eigensystem.eigenvalue(0).unwrap(), 1.0, epsilon = 1e-10);
        assert!(eigensystem.iterations <= 3);
        assert_relative_eq!(eigensystem.eigenvectors[0].norm().unwrap(), 1.0, epsilon = 1e-12);
        assert!(krylov_vector_path(dir.path(), 0).exists());
    }

    #[test]
    fn test_iteration_cap_is_reported_not_fatal() {
        let dir = tempdir().unwrap();
        let operator = DenseOperator::from_rows(&[
            &[2.0, -1.0, 0.0, 0.0],
            &[-1.0, 2.0, -1.0, 0.0],
            &[0.0, -1.0, 2.0, -1.0],
            &[0.0, 0.0, -1.0, 2.0],
        ])
        .unwrap();
        let eigensystem = LanczosEnvironment::new(
            &operator,
            LanczosSettings {
                max_iterations: 2,
                convergence: ConvergenceCriterion::NoConvergence,
                ..settings(dir.path())
            },
        )
        .unwrap()
        .diagonalize()
        .unwrap();
        assert_eq!(eigensystem.status, LanczosStatus::MaxIterations);
        assert_eq!(eigensystem.iterations, 2);
        assert_eq!(eigensystem.eigenvalues.len(), 2);
    }

    #[test]
    fn test_zero_start_vector_is_rejected() {
        let dir = tempdir().unwrap();
        let operator = DenseOperator::from_rows(&[&[1.0, 0.0], &[0.0, 2.0]]).unwrap();
        let zero = BlockVector::from_dense(dir.path().join("zero"), operator.basis().clone(), &[0.0, 0.0])
            .unwrap();
        let result = LanczosEnvironment::new(
            &operator,
            LanczosSettings {
                start: StartVector::Directory {
                    path: zero.directory().to_path_buf(),
                },
                ..settings(&dir.path().join("krylov"))
            },
        )
        .unwrap()
        .diagonalize();
        assert!(matches!(result, Err(LanczosError::DegenerateStart(_))));
    }

    #[test]
    fn test_eigenvalue_report_files() {
        let dir = tempdir().unwrap();
        let operator = DenseOperator::from_rows(&[&[2.0, 1.0], &[1.0, 2.0]]).unwrap();
        let eigensystem = LanczosEnvironment::new(
            &operator,
            LanczosSettings {
                num_eigenvectors: 2,
                start: StartVector::Random { seed: 3 },
                ..settings(&dir.path().join("krylov"))
            },
        )
        .unwrap()
        .diagonalize()
        .unwrap();

        let json_path = dir.path().join("eigenvalues.json");
        eigensystem.write_eigenvalues_json(&json_path).unwrap();
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_relative_eq!(report["eigenvalues"][0].as_f64().unwrap(), 1.0, epsilon = 1e-10);

        let npy_path = dir.path().join("eigenvectors.npy");
        eigensystem.write_eigenvectors_npy(&npy_path).unwrap();
        let array = crate::storage::read_npy(&npy_path).unwrap();
        assert_eq!(array.shape, vec![2, 2]);
    }
}
