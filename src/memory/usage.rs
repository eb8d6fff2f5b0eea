/*
MIT License with FEFF10 Attribution

Copyright (c) 2025 Ameyanagi

Based on or developed using Distribution: FEFF10.0
Copyright (c) 2020 FEFF Project, University of Washington and SLAC National Accelerator Laboratory.
All rights reserved.
*/

//! Lookahead index over a fully known execution order
//!
//! Because the execution order is fixed before the first multiplication, the
//! position of every future use of every block is known. The memory manager
//! uses this to evict the entry whose next use lies furthest ahead.

use super::CacheKey;
use std::collections::HashMap;

/// Positions at which each cache key is used within one pass
#[derive(Debug, Clone, Default)]
pub struct UsageIndex {
    uses: HashMap<CacheKey, Vec<usize>>,
    order_len: usize,
}

impl UsageIndex {
    /// Build the index from `(position, keys used at that position)` pairs
    pub fn from_uses<I, K>(order_len: usize, uses: I) -> Self
    where
        I: IntoIterator<Item = (usize, K)>,
        K: IntoIterator<Item = CacheKey>,
    {
        let mut index = Self {
            uses: HashMap::new(),
            order_len,
        };
        for (position, keys) in uses {
            for key in keys {
                index.uses.entry(key).or_default().push(position);
            }
        }
        for positions in index.uses.values_mut() {
            positions.sort_unstable();
            positions.dedup();
        }
        index
    }

    /// Number of instructions in one pass
    pub fn order_len(&self) -> usize {
        self.order_len
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.uses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uses.is_empty()
    }

    pub fn first_use(&self, key: &CacheKey) -> Option<usize> {
        self.uses.get(key).and_then(|positions| positions.first().copied())
    }

    /// Position of the last instruction of a pass that uses `key`
    pub fn last_use(&self, key: &CacheKey) -> Option<usize> {
        self.uses.get(key).and_then(|positions| positions.last().copied())
    }

    /// First use at or after `cursor`
    ///
    /// Matrix blocks and index lists are reused by the next pass, so once the
    /// current pass no longer needs them their next use is their first use in
    /// the following pass. Vector blocks belong to a single pass.
    pub fn next_use(&self, key: &CacheKey, cursor: usize) -> Option<usize> {
        let positions = self.uses.get(key)?;
        let at = positions.partition_point(|&position| position < cursor);
        match positions.get(at) {
            Some(&position) => Some(position),
            None if key.kind.persists_across_passes() => {
                positions.first().map(|first| first + self.order_len)
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> UsageIndex {
        UsageIndex::from_uses(
            10,
            vec![
                (0, vec![CacheKey::matrix_block(1), CacheKey::input_vector(0)]),
                (4, vec![CacheKey::matrix_block(1)]),
                (6, vec![CacheKey::input_vector(0), CacheKey::index_list(2)]),
            ],
        )
    }

    #[test]
    fn test_first_and_last_use() {
        let index = index();
        assert_eq!(index.first_use(&CacheKey::matrix_block(1)), Some(0));
        assert_eq!(index.last_use(&CacheKey::matrix_block(1)), Some(4));
        assert_eq!(index.last_use(&CacheKey::input_vector(0)), Some(6));
        assert_eq!(index.last_use(&CacheKey::output_vector(0)), None);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_next_use_wraps_only_for_persistent_kinds() {
        let index = index();
        assert_eq!(index.next_use(&CacheKey::matrix_block(1), 1), Some(4));
        assert_eq!(index.next_use(&CacheKey::matrix_block(1), 5), Some(10));
        assert_eq!(index.next_use(&CacheKey::input_vector(0), 7), None);
        assert_eq!(index.next_use(&CacheKey::index_list(2), 6), Some(6));
    }
}
