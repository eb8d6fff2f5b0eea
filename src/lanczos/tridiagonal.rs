/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Projected tridiagonal eigenproblem

use super::errors::{LanczosError, Result};
use faer::{Mat, Side};

/// Eigenpairs of the Lanczos matrix `T_n`, eigenvalues ascending
#[derive(Debug, Clone)]
pub struct TridiagonalEigen {
    values: Vec<f64>,
    vectors: Mat<f64>,
}

impl TridiagonalEigen {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Component `row` of eigenvector `index`
    pub fn component(&self, row: usize, index: usize) -> f64 {
        self.vectors[(row, index)]
    }

    /// Last component of eigenvector `index`, which sets its residual
    pub fn last_component(&self, index: usize) -> f64 {
        self.component(self.len() - 1, index)
    }
}

/// Diagonalize the symmetric tridiagonal matrix with diagonal `alphas` and
/// off-diagonal `betas` (`betas.len() == alphas.len() - 1`)
pub fn solve_tridiagonal(alphas: &[f64], betas: &[f64]) -> Result<TridiagonalEigen> {
    let n = alphas.len();
    if n == 0 || betas.len() + 1 != n {
        return Err(LanczosError::InvalidSettings(format!(
            "tridiagonal matrix with {} diagonal and {} off-diagonal entries",
            n,
            betas.len()
        )));
    }
    let t = Mat::from_fn(n, n, |i, j| {
        if i == j {
            alphas[i]
        } else if i + 1 == j {
            betas[i]
        } else if j + 1 == i {
            betas[j]
        } else {
            0.0
        }
    });
    let evd = t
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| LanczosError::EigenDecomposition(format!("{:?}", e)))?;
    let s = evd.S();
    let u = evd.U();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| s[a].total_cmp(&s[b]));
    Ok(TridiagonalEigen {
        values: order.iter().map(|&i| s[i]).collect(),
        vectors: Mat::from_fn(n, n, |i, j| u[(i, order[j])]),
    })
}
