/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Memory manager with lookahead eviction
//!
//! All bookkeeping lives in one mutex-protected [`CacheState`]. Disk reads and
//! write-backs happen with the lock released; keys being loaded or written are
//! marked busy so that other threads wait on the condition variable instead
//! of loading them twice. Readers of resident payloads only clone an `Arc` and
//! never contend with each other beyond that.

use super::errors::{MemoryError, Result};
use super::{BlockCache, CacheKey, CacheKind, Payload, UsageIndex};
use crate::basis::{Basis, BlockId};
use crate::storage::{index_list_path, matrix_block_path, IndexList, MatrixBlock, VectorBlock};
use crate::vector::BlockVector;
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Counters describing cache behaviour since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    /// Requested keys that were already resident
    pub hits: u64,
    /// Requested keys that had to be loaded or created
    pub misses: u64,
    /// Entries removed to make room for others
    pub evictions: u64,
    /// Output blocks written to the output vector
    pub write_backs: u64,
    /// Payload bytes brought into memory
    pub bytes_loaded: u64,
    /// Highest resident byte count observed
    pub peak_resident_bytes: usize,
}

struct Entry {
    payload: Payload,
    bytes: usize,
    pins: usize,
}

/// Vectors of the multiplication currently running
#[derive(Clone)]
struct PassVectors {
    input: BlockVector,
    output: BlockVector,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Entry>,
    /// Keys whose payload is being loaded or written back
    busy: HashSet<CacheKey>,
    /// Payload size of every key seen so far
    sizes: HashMap<CacheKey, usize>,
    resident_bytes: usize,
    /// Furthest execution order position requested in this pass
    cursor: usize,
    pass: Option<PassVectors>,
    /// Output blocks that already have a file in the output vector
    flushed: HashSet<BlockId>,
    statistics: CacheStatistics,
}

impl CacheState {
    fn reserve(&mut self, bytes: usize) {
        self.resident_bytes += bytes;
        self.statistics.peak_resident_bytes =
            self.statistics.peak_resident_bytes.max(self.resident_bytes);
    }

    fn free(&mut self, bytes: usize) {
        self.resident_bytes = self.resident_bytes.saturating_sub(bytes);
    }

    fn size_of(&self, key: &CacheKey) -> usize {
        self.entries
            .get(key)
            .map(|entry| entry.bytes)
            .or_else(|| self.sizes.get(key).copied())
            .unwrap_or(0)
    }
}

/// Block cache bounded by `maximum_loaded_memory` bytes
pub struct MemoryManager {
    basis: Arc<Basis>,
    matrix_directory: PathBuf,
    maximum_loaded_memory: usize,
    usage: UsageIndex,
    state: Mutex<CacheState>,
    changed: Condvar,
}

impl MemoryManager {
    /// Create a manager for the blocks stored in `matrix_directory`
    ///
    /// `usage` must come from the execution order the manager will serve.
    pub fn new(
        basis: Arc<Basis>,
        matrix_directory: impl Into<PathBuf>,
        maximum_loaded_memory: usize,
        usage: UsageIndex,
    ) -> Self {
        Self {
            basis,
            matrix_directory: matrix_directory.into(),
            maximum_loaded_memory,
            usage,
            state: Mutex::new(CacheState::default()),
            changed: Condvar::new(),
        }
    }

    pub fn maximum_loaded_memory(&self) -> usize {
        self.maximum_loaded_memory
    }

    pub fn matrix_directory(&self) -> &Path {
        &self.matrix_directory
    }

    pub fn usage(&self) -> &UsageIndex {
        &self.usage
    }

    /// Bytes currently held by resident and in-flight payloads
    pub fn resident_bytes(&self) -> Result<usize> {
        Ok(self.lock()?.resident_bytes)
    }

    pub fn is_resident(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock()?.entries.contains_key(key))
    }

    pub fn statistics(&self) -> Result<CacheStatistics> {
        Ok(self.lock()?.statistics)
    }

    /// Zero all counters; the peak restarts from the current resident size
    pub fn reset_statistics(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.statistics = CacheStatistics {
            peak_resident_bytes: state.resident_bytes,
            ..CacheStatistics::default()
        };
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>> {
        self.state.lock().map_err(|_| MemoryError::Poisoned)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, CacheState>) -> Result<MutexGuard<'a, CacheState>> {
        self.changed.wait(guard).map_err(|_| MemoryError::Poisoned)
    }

    fn vector_len(&self, block_id: BlockId) -> Result<usize> {
        self.basis
            .block(block_id)
            .map(|block| block.dimension())
            .ok_or(MemoryError::UnknownBlock(block_id))
    }

    /// Size of a payload without loading it
    fn payload_size(&self, key: &CacheKey) -> Result<usize> {
        match key.kind {
            CacheKind::InputVector | CacheKind::OutputVector => {
                Ok(VectorBlock::payload_bytes(self.vector_len(key.id)?))
            }
            CacheKind::IndexList => {
                let path = index_list_path(&self.matrix_directory, key.id);
                Ok(IndexList::payload_bytes(IndexList::binary_len(&path)?))
            }
            CacheKind::MatrixBlock => {
                let path = matrix_block_path(&self.matrix_directory, key.id);
                Ok(MatrixBlock::read_header(&path)?.payload_bytes())
            }
        }
    }

    fn load(&self, key: CacheKey, pass: Option<&PassVectors>, flushed: bool) -> Result<Payload> {
        match key.kind {
            CacheKind::InputVector => {
                let pass = pass.ok_or(MemoryError::NoActivePass)?;
                Ok(Payload::InputVector(Arc::new(pass.input.read_block(key.id)?)))
            }
            CacheKind::OutputVector => {
                let pass = pass.ok_or(MemoryError::NoActivePass)?;
                let block = if flushed {
                    pass.output.read_block(key.id)?
                } else {
                    VectorBlock::zeros(key.id, self.vector_len(key.id)?)
                };
                Ok(Payload::OutputVector(Arc::new(Mutex::new(block))))
            }
            CacheKind::IndexList => {
                let path = index_list_path(&self.matrix_directory, key.id);
                Ok(Payload::IndexList(Arc::new(IndexList::read_binary(&path)?)))
            }
            CacheKind::MatrixBlock => {
                let path = matrix_block_path(&self.matrix_directory, key.id);
                Ok(Payload::MatrixBlock(Arc::new(MatrixBlock::read(&path, key.id)?)))
            }
        }
    }

    /// Pick unpinned entries to free at least `deficit` bytes
    ///
    /// Entries with no use ahead go first, then the one used furthest in the
    /// future. Returns `None` when the unpinned entries are not enough.
    fn select_victims(
        &self,
        state: &CacheState,
        requested: &[CacheKey],
        deficit: usize,
    ) -> Option<Vec<CacheKey>> {
        let mut candidates: Vec<(CacheKey, usize, usize)> = state
            .entries
            .iter()
            .filter(|(key, entry)| entry.pins == 0 && !requested.contains(*key))
            .map(|(key, entry)| {
                let next = self.usage.next_use(key, state.cursor).unwrap_or(usize::MAX);
                (*key, entry.bytes, next)
            })
            .collect();
        candidates.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

        let mut freed = 0;
        let mut victims = Vec::new();
        for (key, bytes, _) in candidates {
            if freed >= deficit {
                break;
            }
            freed += bytes;
            victims.push(key);
        }
        (freed >= deficit).then_some(victims)
    }

    /// Evict `victims`, writing dirty output blocks back with the lock released
    fn evict<'a>(
        &'a self,
        mut state: MutexGuard<'a, CacheState>,
        victims: Vec<CacheKey>,
    ) -> Result<MutexGuard<'a, CacheState>> {
        let mut dirty = Vec::new();
        for key in victims {
            let Some(entry) = state.entries.remove(&key) else {
                continue;
            };
            state.statistics.evictions += 1;
            debug!("evicting {} ({} bytes)", key, entry.bytes);
            match entry.payload {
                Payload::OutputVector(block) => {
                    state.busy.insert(key);
                    dirty.push((key, block, entry.bytes));
                }
                _ => state.free(entry.bytes),
            }
        }
        if dirty.is_empty() {
            return Ok(state);
        }

        let pass = state.pass.clone();
        drop(state);
        let outcome = match &pass {
            Some(pass) => dirty
                .iter()
                .try_for_each(|(_, block, _)| write_back(&pass.output, block)),
            None => Err(MemoryError::NoActivePass),
        };

        let mut state = self.lock()?;
        for (key, _, bytes) in &dirty {
            state.busy.remove(key);
            state.free(*bytes);
            state.flushed.insert(key.id);
            state.statistics.write_backs += 1;
        }
        self.changed.notify_all();
        outcome.map(|_| state)
    }
}

fn write_back(output: &BlockVector, block: &Mutex<VectorBlock>) -> Result<()> {
    let block = block.lock().map_err(|_| MemoryError::Poisoned)?;
    output.write_block(&block)?;
    Ok(())
}

impl BlockCache for MemoryManager {
    /// Start a multiplication `output = H * input`
    ///
    /// Vector entries left from an earlier pass are discarded. Matrix blocks
    /// and index lists stay resident.
    fn begin_pass(&self, input: &BlockVector, output: &BlockVector) -> Result<()> {
        let mut state = self.lock()?;
        let vector_keys: Vec<CacheKey> = state
            .entries
            .keys()
            .filter(|key| !key.kind.persists_across_passes())
            .copied()
            .collect();
        let in_use = vector_keys
            .iter()
            .any(|key| state.entries.get(key).is_some_and(|entry| entry.pins > 0))
            || state
                .busy
                .iter()
                .any(|key| !key.kind.persists_across_passes());
        if in_use {
            return Err(MemoryError::PassInProgress);
        }

        for key in vector_keys {
            if let Some(entry) = state.entries.remove(&key) {
                state.free(entry.bytes);
            }
        }
        state.flushed.clear();
        state.cursor = 0;
        state.pass = Some(PassVectors {
            input: input.clone(),
            output: output.clone(),
        });
        Ok(())
    }

    /// Write every output block to disk and end the pass
    ///
    /// Output blocks no instruction accumulated into are written as zeros, so
    /// the output vector is complete afterwards.
    fn finish_pass(&self) -> Result<()> {
        for block_id in 0..self.basis.len() {
            self.unload_output_vector(block_id)?;
        }

        let mut state = self.lock()?;
        let input_keys: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(key, _)| key.kind == CacheKind::InputVector)
            .map(|(key, entry)| (*key, entry.pins))
            .map(|(key, pins)| if pins > 0 { Err(MemoryError::PassInProgress) } else { Ok(key) })
            .collect::<Result<_>>()?;
        for key in input_keys {
            if let Some(entry) = state.entries.remove(&key) {
                state.free(entry.bytes);
            }
        }
        state.pass = None;
        state.cursor = 0;

        let statistics = state.statistics;
        debug!(
            "pass finished: {} hits, {} misses, {} evictions, {} write-backs, {} bytes loaded, peak {} of {} bytes",
            statistics.hits,
            statistics.misses,
            statistics.evictions,
            statistics.write_backs,
            statistics.bytes_loaded,
            statistics.peak_resident_bytes,
            self.maximum_loaded_memory
        );
        Ok(())
    }

    fn request(&self, keys: &[CacheKey], position: usize) -> Result<Vec<Payload>> {
        let mut unique: Vec<CacheKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if !unique.contains(key) {
                unique.push(*key);
            }
        }

        let mut state = self.lock()?;
        state.cursor = state.cursor.max(position);
        let (missing, flushed, pass) = loop {
            if unique.iter().any(|key| state.busy.contains(key)) {
                state = self.wait(state)?;
                continue;
            }

            let missing: Vec<CacheKey> = unique
                .iter()
                .filter(|key| !state.entries.contains_key(*key))
                .copied()
                .collect();
            if state.pass.is_none() && missing.iter().any(|key| !key.kind.persists_across_passes()) {
                return Err(MemoryError::NoActivePass);
            }

            let unknown: Vec<CacheKey> = missing
                .iter()
                .filter(|key| !state.sizes.contains_key(*key))
                .copied()
                .collect();
            if !unknown.is_empty() {
                drop(state);
                let measured = unknown
                    .iter()
                    .map(|key| Ok((*key, self.payload_size(key)?)))
                    .collect::<Result<Vec<_>>>()?;
                state = self.lock()?;
                state.sizes.extend(measured);
                continue;
            }

            let instruction_bytes: usize = unique.iter().map(|key| state.size_of(key)).sum();
            if instruction_bytes > self.maximum_loaded_memory {
                return Err(MemoryError::BudgetExceeded {
                    needed: instruction_bytes,
                    budget: self.maximum_loaded_memory,
                });
            }

            let needed: usize = missing.iter().map(|key| state.size_of(key)).sum();
            let available = self.maximum_loaded_memory.saturating_sub(state.resident_bytes);
            if needed > available {
                state = match self.select_victims(&state, &unique, needed - available) {
                    Some(victims) => self.evict(state, victims)?,
                    None => self.wait(state)?,
                };
                continue;
            }

            state.reserve(needed);
            for key in &missing {
                state.busy.insert(*key);
            }
            for key in &unique {
                if let Some(entry) = state.entries.get_mut(key) {
                    entry.pins += 1;
                }
            }
            state.statistics.hits += (unique.len() - missing.len()) as u64;
            state.statistics.misses += missing.len() as u64;
            let flushed: Vec<bool> = missing
                .iter()
                .map(|key| key.kind == CacheKind::OutputVector && state.flushed.contains(&key.id))
                .collect();
            break (missing, flushed, state.pass.clone());
        };
        drop(state);

        let loaded: Vec<Result<Payload>> = missing
            .iter()
            .zip(&flushed)
            .map(|(key, flushed)| self.load(*key, pass.as_ref(), *flushed))
            .collect();

        let mut state = self.lock()?;
        let mut failure = None;
        for (key, outcome) in missing.iter().zip(loaded) {
            state.busy.remove(key);
            let bytes = state.sizes.get(key).copied().unwrap_or(0);
            match outcome {
                Ok(payload) => {
                    trace!("loaded {} ({} bytes)", key, bytes);
                    state.statistics.bytes_loaded += bytes as u64;
                    state.entries.insert(
                        *key,
                        Entry {
                            payload,
                            bytes,
                            pins: 1,
                        },
                    );
                }
                Err(error) => {
                    state.free(bytes);
                    failure.get_or_insert(error);
                }
            }
        }
        if let Some(error) = failure {
            for key in &unique {
                if let Some(entry) = state.entries.get_mut(key) {
                    entry.pins = entry.pins.saturating_sub(1);
                }
            }
            self.changed.notify_all();
            return Err(error);
        }

        let payloads = keys
            .iter()
            .map(|key| {
                state
                    .entries
                    .get(key)
                    .map(|entry| entry.payload.clone())
                    .ok_or(MemoryError::NotResident(*key))
            })
            .collect();
        self.changed.notify_all();
        payloads
    }

    fn release(&self, key: CacheKey, position: usize) -> Result<()> {
        let mut state = self.lock()?;
        let entry = state
            .entries
            .get_mut(&key)
            .ok_or(MemoryError::NotResident(key))?;
        if entry.pins == 0 {
            return Err(MemoryError::NotPinned(key));
        }
        entry.pins -= 1;

        let finished = entry.pins == 0
            && key.kind == CacheKind::InputVector
            && self.usage.next_use(&key, position + 1).is_none();
        if finished {
            if let Some(entry) = state.entries.remove(&key) {
                state.free(entry.bytes);
                trace!("dropped {} after its last use", key);
            }
        }
        self.changed.notify_all();
        Ok(())
    }

    fn unload_output_vector(&self, block_id: BlockId) -> Result<()> {
        let key = CacheKey::output_vector(block_id);
        let mut state = self.lock()?;
        loop {
            let pinned = state.entries.get(&key).is_some_and(|entry| entry.pins > 0);
            if pinned || state.busy.contains(&key) {
                state = self.wait(state)?;
                continue;
            }
            if !state.entries.contains_key(&key) && !state.flushed.contains(&block_id) {
                // Nothing accumulated into this block yet: materialize its zeros
                // through the budget like any other output block.
                let position = state.cursor;
                drop(state);
                self.request(&[key], position)?;
                self.release(key, position)?;
                state = self.lock()?;
                continue;
            }
            break;
        }

        let Some(entry) = state.entries.remove(&key) else {
            return Ok(());
        };
        let pass = state.pass.clone().ok_or(MemoryError::NoActivePass)?;
        state.busy.insert(key);
        drop(state);

        let outcome = match &entry.payload {
            Payload::OutputVector(block) => write_back(&pass.output, block),
            _ => Err(MemoryError::UnexpectedPayload(key)),
        };

        let mut state = self.lock()?;
        state.busy.remove(&key);
        state.free(entry.bytes);
        state.flushed.insert(block_id);
        state.statistics.write_backs += 1;
        trace!("unloaded {}", key);
        self.changed.notify_all();
        outcome
    }
}
