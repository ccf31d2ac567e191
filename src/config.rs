// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Engine configuration and parameter validation.

use crate::OramError;

/// The parameter "Z" from the Path ORAM literature that sets the number
/// of blocks per bucket; typical values are 3, 4, or 5. Here we adopt
/// the conservative setting of 5.
pub const DEFAULT_BUCKET_SIZE: usize = 5;

/// The default upper bound on stash residency, beyond which an access
/// fails with a stash overflow.
pub const DEFAULT_STASH_LIMIT: usize = 100;

/// Selects how blocks are evicted from the stash back into the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvictionStrategy {
    /// Visit the path leaf to root, filling each bucket's empty slots
    /// with the first compatible stash block. The baseline strategy.
    #[default]
    LevelByLevel,
    /// Place each stash block at its deepest admissible level first.
    /// Maximizes depth utilization, reducing stash residency.
    GreedyByDepth,
    /// A greedy pass over the accessed path followed by a greedy pass
    /// over a second, uniformly random path. Reduces stash variance at
    /// the cost of two path read-modify-writes per access.
    DeterministicTwoPath,
}

/// Path ORAM configuration.
///
/// `num_blocks` and `block_size` are required; the remaining fields
/// have usable defaults. A zero `bucket_size` or `stash_limit` is
/// replaced by its default during [`Config::validate`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Logical address space size: valid ids are `0..num_blocks`.
    pub num_blocks: usize,
    /// Plaintext block length in bytes.
    pub block_size: usize,
    /// Slots per bucket (the Path ORAM "Z" parameter).
    pub bucket_size: usize,
    /// Fatal upper bound on stash length, checked after each access.
    pub stash_limit: usize,
    /// Eviction strategy; ignored when `constant_time` is set.
    pub eviction_strategy: EvictionStrategy,
    /// Use constant-time stash search and eviction, eliminating
    /// data-dependent control flow for TEE deployments.
    pub constant_time: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_blocks: 0,
            block_size: 0,
            bucket_size: DEFAULT_BUCKET_SIZE,
            stash_limit: DEFAULT_STASH_LIMIT,
            eviction_strategy: EvictionStrategy::default(),
            constant_time: false,
        }
    }
}

impl Config {
    /// Checks the configuration and applies defaults, returning the
    /// normalized copy used by the engine.
    pub fn validate(mut self) -> Result<Self, OramError> {
        if self.num_blocks == 0 {
            return Err(OramError::InvalidConfig("num_blocks must be positive"));
        }
        if self.block_size == 0 {
            return Err(OramError::InvalidConfig("block_size must be positive"));
        }
        if self.bucket_size == 0 {
            self.bucket_size = DEFAULT_BUCKET_SIZE;
        }
        if self.stash_limit == 0 {
            self.stash_limit = DEFAULT_STASH_LIMIT;
        }
        Ok(self)
    }
}
