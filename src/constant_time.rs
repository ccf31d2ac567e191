// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Constant-time stash search and eviction.
//!
//! In constant-time mode the stash scan and the eviction pass execute
//! with control flow and memory-access patterns independent of block
//! ids, stash contents, and ancestry results: every entry, level, and
//! slot is visited every time, and all selection happens through
//! `subtle` masks rather than branches.

use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

use crate::{
    bucket::Block,
    encryptor::Encryptor,
    path_oram::PathOram,
    position_map::PositionMap,
    storage::BucketStore,
    tree::TreeGeometry,
    BlockId, LeafId, OramError,
};

impl TreeGeometry {
    /// Constant-time ancestry: walks all `height` levels of the parent
    /// chain, OR-accumulating an equality at each, with no early exit
    /// on a hit.
    pub(crate) fn is_ancestor_ct(&self, bucket_idx: usize, leaf: LeafId) -> Choice {
        let target = bucket_idx as i64;
        let mut node = self.leaf_bucket(leaf) as i64;
        let mut found = Choice::from(0);
        for _ in 0..self.height() {
            found |= node.ct_eq(&target);
            // Truncating division pins the walk at the root.
            node = (node - 1) / 2;
        }
        found
    }
}

impl<S, P, E, R> PathOram<S, P, E, R>
where
    S: BucketStore,
    P: PositionMap,
    E: Encryptor,
    R: RngCore + CryptoRng,
{
    /// Scans the entire stash for `id`, accumulating the match index
    /// and a masked copy of the payload. The found/not-found outcome
    /// is derived only from the final mask.
    pub(crate) fn find_in_stash_ct(&self, id: BlockId) -> (Option<usize>, Vec<u8>) {
        let mut found_index: i64 = -1;
        let mut snapshot = vec![0u8; self.cfg.block_size];
        for (index, block) in self.stash.iter().enumerate() {
            let matches = block.id.ct_eq(&id);
            found_index.conditional_assign(&(index as i64), matches);
            for (dst, src) in snapshot.iter_mut().zip(&block.data) {
                dst.conditional_assign(src, matches);
            }
        }
        (usize::try_from(found_index).ok(), snapshot)
    }

    /// Constant-time eviction: for every stash block, every path level
    /// and every slot is visited; placement happens through a masked
    /// overwrite under `can_place && slot_empty && !already_placed`.
    /// This is the only strategy used in constant-time mode.
    pub(crate) fn evict_path_ct(&mut self, path: &[usize]) -> Result<(), OramError> {
        // Read the path for trace parity with the other strategies.
        // Every slot on it was emptied by the preceding path read, so
        // the working set is rebuilt as plaintext-width empty slots
        // that masked copies can target.
        self.read_path_buckets(path)?;
        let mut buckets: Vec<Vec<Block>> = path
            .iter()
            .map(|_| {
                (0..self.cfg.bucket_size)
                    .map(|_| Block::empty(self.cfg.block_size))
                    .collect()
            })
            .collect();

        let mut residual = Vec::new();
        for block in self.stash.take_blocks() {
            let mut placed = Choice::from(0);
            for (level, &bucket_idx) in path.iter().enumerate() {
                let can_place = self.geometry.is_ancestor_ct(bucket_idx, block.leaf);
                for slot in buckets[level].iter_mut() {
                    let slot_empty = slot.id.ct_eq(&crate::EMPTY_BLOCK_ID);
                    let select = can_place & slot_empty & !placed;
                    slot.id.conditional_assign(&block.id, select);
                    slot.leaf.conditional_assign(&block.leaf, select);
                    for (dst, src) in slot.data.iter_mut().zip(&block.data) {
                        dst.conditional_assign(src, select);
                    }
                    placed |= select;
                }
            }
            if !bool::from(placed) {
                residual.push(block);
            }
        }
        self.stash.set_blocks(residual);

        // Commit: seal every slot, occupied or not, so per-slot work
        // is uniform across the path.
        for (&bucket_idx, bucket) in path.iter().zip(&buckets) {
            let mut sealed = Vec::with_capacity(bucket.len());
            for slot in bucket {
                sealed.push(self.seal_block(slot)?);
            }
            self.store.write_bucket(bucket_idx, sealed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::Config;

    #[test]
    fn ct_ancestry_matches_plain_ancestry() {
        for (num_blocks, bucket_size) in [(7, 1), (64, 4), (100, 5)] {
            let g = TreeGeometry::new(num_blocks, bucket_size);
            for leaf in 0..g.num_leaves() as LeafId {
                for bucket in 0..g.num_buckets() {
                    assert_eq!(
                        bool::from(g.is_ancestor_ct(bucket, leaf)),
                        g.is_ancestor(bucket, leaf),
                        "bucket {bucket}, leaf {leaf}"
                    );
                }
            }
        }
    }

    #[test]
    fn ct_find_matches_plain_find() {
        let mut oram = test_oram(Config {
            num_blocks: 32,
            block_size: 8,
            constant_time: true,
            ..Config::default()
        });
        for id in 0..8 {
            oram.write(id, &payload(id, 8)).unwrap();
        }
        // Force some stash residency, then compare both search paths.
        for id in 0..8 {
            oram.read(id).unwrap();
            let (ct_found, _) = oram.find_in_stash_ct(id);
            assert_eq!(ct_found, oram.stash.find(id));
        }
        let (missing, snapshot) = oram.find_in_stash_ct(31);
        assert_eq!(missing, None);
        assert_eq!(snapshot, vec![0u8; 8]);
    }

    #[test]
    fn ct_workload_round_trips() {
        let mut oram = test_oram(Config {
            num_blocks: 64,
            block_size: 16,
            bucket_size: 4,
            constant_time: true,
            ..Config::default()
        });
        for id in 0..64 {
            oram.write(id, &payload(id, 16)).unwrap();
        }
        for id in 0..64 {
            assert_eq!(oram.read(id).unwrap(), payload(id, 16));
        }
        check_invariants(&mut oram);
    }

    #[test]
    fn ct_mode_keeps_unplaceable_blocks_in_the_stash() {
        let mut oram = test_oram(Config {
            num_blocks: 32,
            block_size: 8,
            bucket_size: 1,
            stash_limit: 64,
            constant_time: true,
            ..Config::default()
        });
        random_workload(&mut oram, 200);
        check_invariants(&mut oram);
    }
}
