// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The bucket store contract and an in-memory implementation.

use crate::{bucket::Block, OramError};

/// Block-level access to the ORAM bucket tree. Implementations may
/// keep data in memory, on disk, or behind a remote service.
///
/// Returned buckets must be independent copies that the engine is free
/// to mutate; writes must durably reflect the full provided sequence.
pub trait BucketStore {
    /// Returns all blocks in the bucket at `idx`.
    fn read_bucket(&mut self, idx: usize) -> Result<Vec<Block>, OramError>;

    /// Replaces the bucket at `idx` with `bucket`, which must hold
    /// exactly [`BucketStore::bucket_size`] blocks.
    fn write_bucket(&mut self, idx: usize, bucket: Vec<Block>) -> Result<(), OramError>;

    /// The total number of buckets in storage.
    fn num_buckets(&self) -> usize;

    /// Block slots per bucket.
    fn bucket_size(&self) -> usize;

    /// The stored (external) block payload length in bytes. Exceeds
    /// the plaintext block size by the encryptor's overhead when one
    /// is configured.
    fn block_size(&self) -> usize;
}

/// A [`BucketStore`] backed by in-memory vectors.
///
/// Read and write counters are exposed for benchmarking and for tests
/// that assert on the externally observable access pattern.
#[derive(Debug)]
pub struct InMemoryStore {
    buckets: Vec<Vec<Block>>,
    bucket_size: usize,
    block_size: usize,
    reads: u64,
    writes: u64,
}

impl InMemoryStore {
    /// Creates a store of `num_buckets` buckets, each holding
    /// `bucket_size` empty blocks of `block_size` bytes.
    pub fn new(num_buckets: usize, bucket_size: usize, block_size: usize) -> Self {
        let buckets = (0..num_buckets)
            .map(|_| (0..bucket_size).map(|_| Block::empty(block_size)).collect())
            .collect();
        Self {
            buckets,
            bucket_size,
            block_size,
            reads: 0,
            writes: 0,
        }
    }

    /// Bucket reads served since construction.
    pub fn read_count(&self) -> u64 {
        self.reads
    }

    /// Bucket writes served since construction.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    fn check_index(&self, idx: usize) -> Result<(), OramError> {
        if idx >= self.buckets.len() {
            return Err(OramError::Storage(
                format!(
                    "bucket index {idx} out of bounds for {} buckets",
                    self.buckets.len()
                )
                .into(),
            ));
        }
        Ok(())
    }
}

impl BucketStore for InMemoryStore {
    fn read_bucket(&mut self, idx: usize) -> Result<Vec<Block>, OramError> {
        self.check_index(idx)?;
        self.reads += 1;
        Ok(self.buckets[idx].clone())
    }

    fn write_bucket(&mut self, idx: usize, bucket: Vec<Block>) -> Result<(), OramError> {
        self.check_index(idx)?;
        if bucket.len() != self.bucket_size {
            return Err(OramError::Storage(
                format!(
                    "bucket arity {} does not match configured size {}",
                    bucket.len(),
                    self.bucket_size
                )
                .into(),
            ));
        }
        self.writes += 1;
        self.buckets[idx] = bucket;
        Ok(())
    }

    fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    fn block_size(&self) -> usize {
        self.block_size
    }
}
