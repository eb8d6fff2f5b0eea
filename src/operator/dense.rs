/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Dense in-memory operator
//!
//! Used for small problems and as the reference the out-of-core product is
//! checked against.

use super::errors::{OperatorError, Result};
use super::LinearOperator;
use crate::basis::Basis;
use crate::vector::BlockVector;
use faer::{Mat, MatRef};
use std::sync::Arc;

/// Square matrix applied to block vectors by gathering them densely
#[derive(Debug, Clone)]
pub struct DenseOperator {
    matrix: Mat<f64>,
    basis: Arc<Basis>,
}

impl DenseOperator {
    /// Operator on a basis made of a single block
    pub fn new(matrix: Mat<f64>) -> Result<Self> {
        let basis = Arc::new(Basis::single_block(matrix.nrows())?);
        Self::with_basis(matrix, basis)
    }

    /// Operator on an arbitrary partition of `matrix.nrows()` states
    pub fn with_basis(matrix: Mat<f64>, basis: Arc<Basis>) -> Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(OperatorError::DimensionMismatch(format!(
                "matrix is {}x{}, expected square",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        if matrix.nrows() != basis.dimension() {
            return Err(OperatorError::DimensionMismatch(format!(
                "matrix of order {} on basis of dimension {}",
                matrix.nrows(),
                basis.dimension()
            )));
        }
        Ok(Self { matrix, basis })
    }

    /// Build from row slices
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let n = rows.len();
        if rows.iter().any(|row| row.len() != n) {
            return Err(OperatorError::DimensionMismatch(
                "rows must all have as many entries as there are rows".to_string(),
            ));
        }
        Self::new(Mat::from_fn(n, n, |i, j| rows[i][j]))
    }

    pub fn matrix(&self) -> MatRef<'_, f64> {
        self.matrix.as_ref()
    }
}

impl LinearOperator for DenseOperator {
    fn basis(&self) -> &Arc<Basis> {
        &self.basis
    }

    fn apply(&self, input: &BlockVector, output: &BlockVector) -> Result<()> {
        let x = input.to_dense()?;
        let x = Mat::from_fn(x.len(), 1, |i, _| x[i]);
        let y = &self.matrix * &x;
        let values: Vec<f64> = (0..y.nrows()).map(|i| y[(i, 0)]).collect();
        output.write_dense(&values)?;
        Ok(())
    }
}
