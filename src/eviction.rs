// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Eviction strategies: placing stash blocks back into path buckets.
//!
//! Every strategy reads the path's buckets at the top, places blocks
//! subject to the ancestry invariant (a block assigned to leaf `l` may
//! only occupy a bucket on `l`'s path), and commits every bucket back
//! in one pass at the end, re-encrypting each placed block.

use rand::{CryptoRng, RngCore};

use crate::{
    bucket::Block,
    config::EvictionStrategy,
    encryptor::Encryptor,
    path_oram::PathOram,
    position_map::PositionMap,
    storage::BucketStore,
    OramError,
};

impl<S, P, E, R> PathOram<S, P, E, R>
where
    S: BucketStore,
    P: PositionMap,
    E: Encryptor,
    R: RngCore + CryptoRng,
{
    /// Dispatches to the configured eviction strategy.
    pub(crate) fn evict_with_strategy(&mut self, path: &[usize]) -> Result<(), OramError> {
        match self.cfg.eviction_strategy {
            EvictionStrategy::LevelByLevel => self.evict_level_by_level(path),
            EvictionStrategy::GreedyByDepth => self.evict_greedy_by_depth(path),
            EvictionStrategy::DeterministicTwoPath => {
                self.evict_greedy_by_depth(path)?;
                // A second, uniformly random path: drain it into the
                // stash and evict along it as well.
                let aux_leaf = self.random_leaf()?;
                let aux_path = self.geometry.path(aux_leaf);
                self.read_path_into_stash(&aux_path)?;
                self.evict_greedy_by_depth(&aux_path)
            }
        }
    }

    /// The baseline strategy: visit buckets leaf to root; for each
    /// empty slot in index order, place the first stash block (in the
    /// stash's current order) whose leaf admits this bucket.
    pub(crate) fn evict_level_by_level(&mut self, path: &[usize]) -> Result<(), OramError> {
        let mut buckets = self.read_path_buckets(path)?;
        for (level, &bucket_idx) in path.iter().enumerate() {
            for slot in 0..self.cfg.bucket_size {
                if !buckets[level][slot].is_empty() {
                    continue;
                }
                let candidate = self
                    .stash
                    .iter()
                    .position(|b| self.geometry.is_ancestor(bucket_idx, b.leaf));
                if let Some(index) = candidate {
                    let block = self.stash.remove(index);
                    buckets[level][slot] = self.seal_block(&block)?;
                }
            }
        }
        self.commit_path_buckets(path, buckets)
    }

    /// Places each stash block at its deepest admissible level first,
    /// maximizing depth utilization. Removal is swap-with-last; the
    /// stash carries no observable order.
    pub(crate) fn evict_greedy_by_depth(&mut self, path: &[usize]) -> Result<(), OramError> {
        let mut buckets = self.read_path_buckets(path)?;
        let mut index = 0;
        while index < self.stash.len() {
            let leaf = self.stash.get(index).leaf;
            let mut placed = false;
            'levels: for (level, &bucket_idx) in path.iter().enumerate() {
                if !self.geometry.is_ancestor(bucket_idx, leaf) {
                    continue;
                }
                for slot in 0..self.cfg.bucket_size {
                    if buckets[level][slot].is_empty() {
                        let block = self.stash.swap_remove(index);
                        buckets[level][slot] = self.seal_block(&block)?;
                        placed = true;
                        break 'levels;
                    }
                }
            }
            if !placed {
                index += 1;
            }
        }
        self.commit_path_buckets(path, buckets)
    }

    pub(crate) fn read_path_buckets(&mut self, path: &[usize]) -> Result<Vec<Vec<Block>>, OramError> {
        path.iter()
            .map(|&bucket_idx| self.store.read_bucket(bucket_idx))
            .collect()
    }

    pub(crate) fn commit_path_buckets(
        &mut self,
        path: &[usize],
        buckets: Vec<Vec<Block>>,
    ) -> Result<(), OramError> {
        for (&bucket_idx, bucket) in path.iter().zip(buckets) {
            self.store.write_bucket(bucket_idx, bucket)?;
        }
        Ok(())
    }
}
