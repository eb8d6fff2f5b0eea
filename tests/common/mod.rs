/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

#![allow(dead_code)]

use mscheme_rs::basis::{Basis, BasisBlock, CombinationTable, Coupling, CouplingKind};
use mscheme_rs::storage::{
    index_list_path, matrix_block_path, IndexList, IndexTriple, MatrixBlock, Sign,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

pub fn block(block_id: usize, proton_dimension: usize, neutron_dimension: usize) -> BasisBlock {
    BasisBlock {
        block_id,
        proton_energy: 0,
        neutron_energy: 0,
        proton_m2: 0,
        neutron_m2: 0,
        num_protons: 2,
        num_neutrons: 2,
        proton_dimension,
        neutron_dimension,
    }
}

/// A table written to disk together with its dense matrix
pub struct Fixture {
    pub table: CombinationTable,
    pub dense: Vec<Vec<f64>>,
}

impl Fixture {
    pub fn dimension(&self) -> usize {
        self.dense.len()
    }

    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        self.dense
            .iter()
            .map(|row| row.iter().zip(x).map(|(a, b)| a * b).sum())
            .collect()
    }
}

/// Three one-state blocks with diagonal entries 1, 2 and 3
pub fn diagonal_fixture(dir: &Path) -> Fixture {
    let basis = Basis::new(vec![block(0, 1, 1), block(1, 1, 1), block(2, 1, 1)]).unwrap();
    let mut couplings = Vec::new();
    for id in 0..3 {
        MatrixBlock::column(id, vec![(id + 1) as f64])
            .write(&matrix_block_path(dir, id))
            .unwrap();
        IndexList::new(vec![IndexTriple::new(0, 0, 0, Sign::Pos)])
            .write_binary(&index_list_path(dir, id))
            .unwrap();
        couplings.push(Coupling {
            kind: CouplingKind::Neutron,
            bra: id,
            ket: id,
            matrix_id: id,
            neutron_list: Some(id),
            proton_list: None,
        });
    }
    let dense = (0..3)
        .map(|i| (0..3).map(|j| if i == j { (i + 1) as f64 } else { 0.0 }).collect())
        .collect();
    Fixture {
        table: CombinationTable::new(basis, couplings).unwrap(),
        dense,
    }
}

fn random_list(rng: &mut StdRng, rows: usize, cols: usize, ops: usize, symmetric: bool) -> Vec<IndexTriple> {
    let mut triples = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if symmetric && col < row {
                continue;
            }
            if rng.random::<f64>() < 0.6 {
                let magnitude = rng.random_range(0..ops) as u32;
                let sign = if rng.random::<bool>() { Sign::Pos } else { Sign::Neg };
                triples.push(IndexTriple::new(row as u32, col as u32, magnitude, sign));
                if symmetric && row != col {
                    triples.push(IndexTriple::new(col as u32, row as u32, magnitude, sign));
                }
            }
        }
    }
    triples
}

fn random_values(rng: &mut StdRng, len: usize) -> Vec<f64> {
    (0..len).map(|_| rng.random::<f64>() * 2.0 - 1.0).collect()
}

/// Random symmetric Hamiltonian over four blocks with every coupling kind
///
/// Blocks 0 and 1 share their proton dimension, blocks 1, 2 and 3 share
/// their neutron dimension.
pub fn random_fixture(dir: &Path, seed: u64) -> Fixture {
    let mut rng = StdRng::seed_from_u64(seed);
    let blocks = vec![block(0, 2, 3), block(1, 2, 2), block(2, 3, 2), block(3, 1, 2)];
    let basis = Basis::new(blocks.clone()).unwrap();
    let offsets: Vec<usize> = (0..blocks.len()).map(|id| basis.offset(id).unwrap()).collect();
    let dimension = basis.dimension();
    let mut dense = vec![vec![0.0; dimension]; dimension];

    let plan = [
        (CouplingKind::Neutron, 0, 0),
        (CouplingKind::Neutron, 0, 1),
        (CouplingKind::Neutron, 1, 1),
        (CouplingKind::Proton, 1, 2),
        (CouplingKind::Proton, 2, 2),
        (CouplingKind::Proton, 2, 3),
        (CouplingKind::NeutronProton, 0, 2),
        (CouplingKind::NeutronProton, 3, 3),
        (CouplingKind::NeutronProton, 1, 3),
    ];

    let mut couplings = Vec::new();
    let mut next_list = 0;
    for (matrix_id, &(kind, bra, ket)) in plan.iter().enumerate() {
        let (b, k) = (&blocks[bra], &blocks[ket]);
        let symmetric = bra == ket;
        let mut add = |row: usize, col: usize, value: f64| {
            dense[offsets[bra] + row][offsets[ket] + col] += value;
            if bra != ket {
                dense[offsets[ket] + col][offsets[bra] + row] += value;
            }
        };

        let mut write_list = |triples: &[IndexTriple]| {
            let id = next_list;
            next_list += 1;
            IndexList::new(triples.to_vec())
                .write_binary(&index_list_path(dir, id))
                .unwrap();
            id
        };

        match kind {
            CouplingKind::Neutron => {
                let ops = 3;
                let matrix = random_values(&mut rng, ops);
                let list = random_list(&mut rng, b.neutron_dimension, k.neutron_dimension, ops, symmetric);
                for ip in 0..b.proton_dimension {
                    for t in &list {
                        add(
                            ip * b.neutron_dimension + t.row as usize,
                            ip * k.neutron_dimension + t.col as usize,
                            t.sign.factor() * matrix[t.magnitude as usize],
                        );
                    }
                }
                MatrixBlock::column(matrix_id, matrix)
                    .write(&matrix_block_path(dir, matrix_id))
                    .unwrap();
                let id = write_list(&list);
                couplings.push(Coupling {
                    kind,
                    bra,
                    ket,
                    matrix_id,
                    neutron_list: Some(id),
                    proton_list: None,
                });
            }
            CouplingKind::Proton => {
                let ops = 2;
                let matrix = random_values(&mut rng, ops);
                let list = random_list(&mut rng, b.proton_dimension, k.proton_dimension, ops, symmetric);
                let n = b.neutron_dimension;
                for i_n in 0..n {
                    for t in &list {
                        add(
                            t.row as usize * n + i_n,
                            t.col as usize * n + i_n,
                            t.sign.factor() * matrix[t.magnitude as usize],
                        );
                    }
                }
                MatrixBlock::column(matrix_id, matrix)
                    .write(&matrix_block_path(dir, matrix_id))
                    .unwrap();
                let id = write_list(&list);
                couplings.push(Coupling {
                    kind,
                    bra,
                    ket,
                    matrix_id,
                    neutron_list: None,
                    proton_list: Some(id),
                });
            }
            CouplingKind::NeutronProton => {
                let (neutron_ops, proton_ops) = (2, 3);
                let matrix = random_values(&mut rng, neutron_ops * proton_ops);
                let neutrons = random_list(&mut rng, b.neutron_dimension, k.neutron_dimension, neutron_ops, symmetric);
                let protons = random_list(&mut rng, b.proton_dimension, k.proton_dimension, proton_ops, symmetric);
                for p in &protons {
                    for n in &neutrons {
                        add(
                            p.row as usize * b.neutron_dimension + n.row as usize,
                            p.col as usize * k.neutron_dimension + n.col as usize,
                            p.sign.factor()
                                * n.sign.factor()
                                * matrix[n.magnitude as usize * proton_ops + p.magnitude as usize],
                        );
                    }
                }
                MatrixBlock::new(matrix_id, neutron_ops, proton_ops, matrix)
                    .unwrap()
                    .write(&matrix_block_path(dir, matrix_id))
                    .unwrap();
                let neutron_list = write_list(&neutrons);
                let proton_list = write_list(&protons);
                couplings.push(Coupling {
                    kind,
                    bra,
                    ket,
                    matrix_id,
                    neutron_list: Some(neutron_list),
                    proton_list: Some(proton_list),
                });
            }
        }
    }

    Fixture {
        table: CombinationTable::new(basis, couplings).unwrap(),
        dense,
    }
}
