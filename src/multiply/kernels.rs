/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Block kernels
//!
//! A vector block of shape `(p, n)` stores the amplitude of proton state `ip`
//! and neutron state `in` at offset `ip * n + in`. Index triples always refer
//! to the stored orientation: `row` is a bra state, `col` a ket state and
//! `magnitude` the position of the matrix element in the matrix block.
//!
//! | kernel | update |
//! |---|---|
//! | neutron pos | `out[ip*nB + r] += s M[k] in[ip*nK + c]` |
//! | proton pos | `out[r*n + i] += s M[k] in[c*n + i]` |
//! | neutron-proton pos | `out[rp*nB + rn] += sp sn M[kn, kp] in[cp*nK + cn]` |
//!
//! The neg kernels swap the roles of `row` and `col`, applying the transpose.

use super::errors::{MultiplyError, Result};
use super::Variant;
use crate::basis::{BasisBlock, CouplingKind};
use crate::storage::{IndexList, IndexTriple, MatrixBlock};

/// Proton and neutron sub-dimensions of a vector block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockShape {
    pub proton_dimension: usize,
    pub neutron_dimension: usize,
}

impl BlockShape {
    pub fn new(proton_dimension: usize, neutron_dimension: usize) -> Self {
        Self {
            proton_dimension,
            neutron_dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.proton_dimension * self.neutron_dimension
    }
}

impl From<&BasisBlock> for BlockShape {
    fn from(block: &BasisBlock) -> Self {
        Self::new(block.proton_dimension, block.neutron_dimension)
    }
}

/// Vector block read by a kernel
#[derive(Debug, Clone, Copy)]
pub struct Operand<'a> {
    pub data: &'a [f64],
    pub shape: BlockShape,
}

/// Vector block a kernel accumulates into
#[derive(Debug)]
pub struct Accumulator<'a> {
    pub data: &'a mut [f64],
    pub shape: BlockShape,
}

/// One of the six block kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    NeutronPos,
    NeutronNeg,
    ProtonPos,
    ProtonNeg,
    NeutronProtonPos,
    NeutronProtonNeg,
}

impl Kernel {
    /// Kernel for a coupling kind applied in the given direction
    pub fn select(kind: CouplingKind, variant: Variant) -> Self {
        match (kind, variant) {
            (CouplingKind::Neutron, Variant::Pos) => Kernel::NeutronPos,
            (CouplingKind::Neutron, Variant::Neg) => Kernel::NeutronNeg,
            (CouplingKind::Proton, Variant::Pos) => Kernel::ProtonPos,
            (CouplingKind::Proton, Variant::Neg) => Kernel::ProtonNeg,
            (CouplingKind::NeutronProton, Variant::Pos) => Kernel::NeutronProtonPos,
            (CouplingKind::NeutronProton, Variant::Neg) => Kernel::NeutronProtonNeg,
        }
    }

    pub fn variant(self) -> Variant {
        match self {
            Kernel::NeutronPos | Kernel::ProtonPos | Kernel::NeutronProtonPos => Variant::Pos,
            Kernel::NeutronNeg | Kernel::ProtonNeg | Kernel::NeutronProtonNeg => Variant::Neg,
        }
    }

    /// Accumulate the block product into `output`
    pub fn run(
        self,
        matrix: &MatrixBlock,
        neutron_list: Option<&IndexList>,
        proton_list: Option<&IndexList>,
        input: Operand<'_>,
        output: Accumulator<'_>,
    ) -> Result<()> {
        let neutrons = || neutron_list.ok_or(MultiplyError::MissingIndexList("neutron"));
        let protons = || proton_list.ok_or(MultiplyError::MissingIndexList("proton"));
        match self {
            Kernel::NeutronPos => neutron_pos(matrix, neutrons()?, input, output),
            Kernel::NeutronNeg => neutron_neg(matrix, neutrons()?, input, output),
            Kernel::ProtonPos => proton_pos(matrix, protons()?, input, output),
            Kernel::ProtonNeg => proton_neg(matrix, protons()?, input, output),
            Kernel::NeutronProtonPos => {
                neutron_proton_pos(matrix, neutrons()?, protons()?, input, output)
            }
            Kernel::NeutronProtonNeg => {
                neutron_proton_neg(matrix, neutrons()?, protons()?, input, output)
            }
        }
    }
}

pub fn neutron_pos(
    matrix: &MatrixBlock,
    list: &IndexList,
    input: Operand<'_>,
    output: Accumulator<'_>,
) -> Result<()> {
    neutron(matrix, list, input, output, Variant::Pos)
}

pub fn neutron_neg(
    matrix: &MatrixBlock,
    list: &IndexList,
    input: Operand<'_>,
    output: Accumulator<'_>,
) -> Result<()> {
    neutron(matrix, list, input, output, Variant::Neg)
}

pub fn proton_pos(
    matrix: &MatrixBlock,
    list: &IndexList,
    input: Operand<'_>,
    output: Accumulator<'_>,
) -> Result<()> {
    proton(matrix, list, input, output, Variant::Pos)
}

pub fn proton_neg(
    matrix: &MatrixBlock,
    list: &IndexList,
    input: Operand<'_>,
    output: Accumulator<'_>,
) -> Result<()> {
    proton(matrix, list, input, output, Variant::Neg)
}

pub fn neutron_proton_pos(
    matrix: &MatrixBlock,
    neutrons: &IndexList,
    protons: &IndexList,
    input: Operand<'_>,
    output: Accumulator<'_>,
) -> Result<()> {
    neutron_proton(matrix, neutrons, protons, input, output, Variant::Pos)
}

pub fn neutron_proton_neg(
    matrix: &MatrixBlock,
    neutrons: &IndexList,
    protons: &IndexList,
    input: Operand<'_>,
    output: Accumulator<'_>,
) -> Result<()> {
    neutron_proton(matrix, neutrons, protons, input, output, Variant::Neg)
}

/// A triple resolved against concrete operand sizes
struct Step {
    from: usize,
    to: usize,
    element: usize,
    sign: f64,
}

/// Check one triple against the input and output sizes and the element count
fn resolve(
    list: &'static str,
    position: usize,
    triple: &IndexTriple,
    variant: Variant,
    input_len: usize,
    output_len: usize,
    elements: usize,
) -> Result<Step> {
    let (from, to) = match variant {
        Variant::Pos => (triple.col as usize, triple.row as usize),
        Variant::Neg => (triple.row as usize, triple.col as usize),
    };
    let out_of_range = |reason: String| MultiplyError::IndexOutOfRange {
        list,
        position,
        reason,
    };
    if from >= input_len {
        return Err(out_of_range(format!(
            "input state {} outside block of {} states",
            from, input_len
        )));
    }
    if to >= output_len {
        return Err(out_of_range(format!(
            "output state {} outside block of {} states",
            to, output_len
        )));
    }
    let element = triple.magnitude as usize;
    if element >= elements {
        return Err(out_of_range(format!(
            "matrix element {} outside {} stored elements",
            element, elements
        )));
    }
    Ok(Step {
        from,
        to,
        element,
        sign: triple.sign.factor(),
    })
}

fn check_lengths(input: &Operand<'_>, output: &Accumulator<'_>) -> Result<()> {
    if input.data.len() != input.shape.dimension() {
        return Err(MultiplyError::ShapeMismatch(format!(
            "input block holds {} amplitudes, shape needs {}",
            input.data.len(),
            input.shape.dimension()
        )));
    }
    if output.data.len() != output.shape.dimension() {
        return Err(MultiplyError::ShapeMismatch(format!(
            "output block holds {} amplitudes, shape needs {}",
            output.data.len(),
            output.shape.dimension()
        )));
    }
    Ok(())
}

fn neutron(
    matrix: &MatrixBlock,
    list: &IndexList,
    input: Operand<'_>,
    output: Accumulator<'_>,
    variant: Variant,
) -> Result<()> {
    check_lengths(&input, &output)?;
    if input.shape.proton_dimension != output.shape.proton_dimension {
        return Err(MultiplyError::ShapeMismatch(format!(
            "neutron coupling between proton dimensions {} and {}",
            input.shape.proton_dimension, output.shape.proton_dimension
        )));
    }
    let n_in = input.shape.neutron_dimension;
    let n_out = output.shape.neutron_dimension;
    let elements = matrix.as_slice();

    for (position, triple) in list.iter().enumerate() {
        let step = resolve("neutron", position, triple, variant, n_in, n_out, elements.len())?;
        let value = step.sign * elements[step.element];
        for ip in 0..input.shape.proton_dimension {
            output.data[ip * n_out + step.to] += value * input.data[ip * n_in + step.from];
        }
    }
    Ok(())
}

fn proton(
    matrix: &MatrixBlock,
    list: &IndexList,
    input: Operand<'_>,
    output: Accumulator<'_>,
    variant: Variant,
) -> Result<()> {
    check_lengths(&input, &output)?;
    if input.shape.neutron_dimension != output.shape.neutron_dimension {
        return Err(MultiplyError::ShapeMismatch(format!(
            "proton coupling between neutron dimensions {} and {}",
            input.shape.neutron_dimension, output.shape.neutron_dimension
        )));
    }
    let n = input.shape.neutron_dimension;
    let elements = matrix.as_slice();

    for (position, triple) in list.iter().enumerate() {
        let step = resolve(
            "proton",
            position,
            triple,
            variant,
            input.shape.proton_dimension,
            output.shape.proton_dimension,
            elements.len(),
        )?;
        let value = step.sign * elements[step.element];
        let source = &input.data[step.from * n..(step.from + 1) * n];
        let target = &mut output.data[step.to * n..(step.to + 1) * n];
        for (y, x) in target.iter_mut().zip(source) {
            *y += value * x;
        }
    }
    Ok(())
}

fn neutron_proton(
    matrix: &MatrixBlock,
    neutrons: &IndexList,
    protons: &IndexList,
    input: Operand<'_>,
    output: Accumulator<'_>,
    variant: Variant,
) -> Result<()> {
    check_lengths(&input, &output)?;
    let n_in = input.shape.neutron_dimension;
    let n_out = output.shape.neutron_dimension;
    let cols = matrix.cols();

    let neutron_steps = neutrons
        .iter()
        .enumerate()
        .map(|(position, triple)| {
            resolve("neutron", position, triple, variant, n_in, n_out, matrix.rows())
        })
        .collect::<Result<Vec<_>>>()?;
    let proton_steps = protons
        .iter()
        .enumerate()
        .map(|(position, triple)| {
            resolve(
                "proton",
                position,
                triple,
                variant,
                input.shape.proton_dimension,
                output.shape.proton_dimension,
                cols,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let elements = matrix.as_slice();
    for neutron in &neutron_steps {
        let row = &elements[neutron.element * cols..(neutron.element + 1) * cols];
        for proton in &proton_steps {
            let value = neutron.sign * proton.sign * row[proton.element];
            output.data[proton.to * n_out + neutron.to] +=
                value * input.data[proton.from * n_in + neutron.from];
        }
    }
    Ok(())
}
