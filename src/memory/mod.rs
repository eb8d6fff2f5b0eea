/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Budgeted cache for blocks streamed from disk
//!
//! The [`BlockCache`] trait is the contract between the scheduler and the
//! storage layer: a request returns fully loaded payloads for every key of one
//! instruction, and a release makes them eligible for eviction again.
//! [`MemoryManager`] is the implementation used by the crate. It keeps the
//! total size of resident payloads under `maximum_loaded_memory` and evicts
//! using the precomputed [`UsageIndex`].

mod cache;
mod errors;
mod usage;

pub use cache::{CacheStatistics, MemoryManager};
pub use errors::{MemoryError, Result};
pub use usage::UsageIndex;

use crate::basis::BlockId;
use crate::storage::{IndexList, MatrixBlock, VectorBlock};
use crate::vector::BlockVector;
use std::fmt;
use std::sync::{Arc, Mutex};

/// What kind of object a cache key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKind {
    /// Block of the vector being multiplied, read only
    InputVector,
    /// Block of the product vector, accumulated in place
    OutputVector,
    IndexList,
    MatrixBlock,
}

impl CacheKind {
    /// Matrix blocks and index lists are identical in every pass
    pub fn persists_across_passes(self) -> bool {
        matches!(self, CacheKind::IndexList | CacheKind::MatrixBlock)
    }
}

/// Identifies one cacheable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub id: usize,
}

impl CacheKey {
    pub fn input_vector(block_id: BlockId) -> Self {
        Self {
            kind: CacheKind::InputVector,
            id: block_id,
        }
    }

    pub fn output_vector(block_id: BlockId) -> Self {
        Self {
            kind: CacheKind::OutputVector,
            id: block_id,
        }
    }

    pub fn index_list(list_id: usize) -> Self {
        Self {
            kind: CacheKind::IndexList,
            id: list_id,
        }
    }

    pub fn matrix_block(matrix_id: usize) -> Self {
        Self {
            kind: CacheKind::MatrixBlock,
            id: matrix_id,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CacheKind::InputVector => "input vector block",
            CacheKind::OutputVector => "output vector block",
            CacheKind::IndexList => "index list",
            CacheKind::MatrixBlock => "matrix block",
        };
        write!(f, "{} {}", kind, self.id)
    }
}

/// A loaded object handed out by the cache
///
/// Output blocks sit behind a mutex because several instructions accumulate
/// into the same block. Everything else is shared read only.
#[derive(Debug, Clone)]
pub enum Payload {
    InputVector(Arc<VectorBlock>),
    OutputVector(Arc<Mutex<VectorBlock>>),
    IndexList(Arc<IndexList>),
    MatrixBlock(Arc<MatrixBlock>),
}

/// Contract of a block cache shared by the worker threads of a pass
///
/// `position` is the index of the requesting instruction in the execution
/// order. Keys passed to one `request` are acquired together, and each must be
/// released once by the same caller.
pub trait BlockCache: Send + Sync {
    /// Start a multiplication `output = H * input`
    fn begin_pass(&self, input: &BlockVector, output: &BlockVector) -> Result<()>;

    /// Make sure every output block is on disk and end the pass
    fn finish_pass(&self) -> Result<()>;

    /// Load (if needed) and pin every key, returning payloads in key order
    fn request(&self, keys: &[CacheKey], position: usize) -> Result<Vec<Payload>>;

    /// Unpin a key previously returned by `request`
    fn release(&self, key: CacheKey, position: usize) -> Result<()>;

    /// Write an output block back to the output vector and free its memory
    fn unload_output_vector(&self, block_id: BlockId) -> Result<()>;

    fn release_all(&self, keys: &[CacheKey], position: usize) -> Result<()> {
        keys.iter().try_for_each(|key| self.release(*key, position))
    }

    fn request_input_vector(&self, block_id: BlockId, position: usize) -> Result<Arc<VectorBlock>> {
        let key = CacheKey::input_vector(block_id);
        match self.request(&[key], position)?.pop() {
            Some(Payload::InputVector(block)) => Ok(block),
            _ => Err(MemoryError::UnexpectedPayload(key)),
        }
    }

    fn request_output_vector(
        &self,
        block_id: BlockId,
        position: usize,
    ) -> Result<Arc<Mutex<VectorBlock>>> {
        let key = CacheKey::output_vector(block_id);
        match self.request(&[key], position)?.pop() {
            Some(Payload::OutputVector(block)) => Ok(block),
            _ => Err(MemoryError::UnexpectedPayload(key)),
        }
    }

    fn request_index_list(&self, list_id: usize, position: usize) -> Result<Arc<IndexList>> {
        let key = CacheKey::index_list(list_id);
        match self.request(&[key], position)?.pop() {
            Some(Payload::IndexList(list)) => Ok(list),
            _ => Err(MemoryError::UnexpectedPayload(key)),
        }
    }

    fn request_matrix_block(&self, matrix_id: usize, position: usize) -> Result<Arc<MatrixBlock>> {
        let key = CacheKey::matrix_block(matrix_id);
        match self.request(&[key], position)?.pop() {
            Some(Payload::MatrixBlock(block)) => Ok(block),
            _ => Err(MemoryError::UnexpectedPayload(key)),
        }
    }
}
