// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! An implementation of Path ORAM over an untrusted block store.
//!
//! # Overview
//!
//! This crate implements the Path ORAM protocol of Stefanov et al.
//! The client issues logical reads and writes against a fixed-capacity
//! array of fixed-size blocks; an observer of the backing store sees
//! only a sequence of leaf-to-root path accesses whose targets are
//! statistically independent of the logical access sequence.
//!
//! The backing store, the position map, and the block encryptor are all
//! pluggable: any implementations of [`BucketStore`], [`PositionMap`],
//! and [`Encryptor`] compose with the engine unchanged. In-memory
//! implementations of all three are provided, along with an
//! authenticated [`AesGcmEncryptor`] that binds each block's identity
//! and leaf assignment into the ciphertext.
//!
//! # Example
//!
//! ```
//! use path_oram::{Config, PathOram};
//! # use path_oram::OramError;
//!
//! let cfg = Config {
//!     num_blocks: 64,
//!     block_size: 32,
//!     ..Config::default()
//! };
//! let mut oram = PathOram::in_memory(cfg)?;
//!
//! // The first write returns the previous contents: all zeros.
//! let previous = oram.write(7, &[0xAB; 32])?;
//! assert_eq!(previous, vec![0u8; 32]);
//! assert_eq!(oram.read(7)?, vec![0xAB; 32]);
//! # Ok::<(), OramError>(())
//! ```
//!
//! # Security
//!
//! Obliviousness holds as long as the stash does not overflow; the
//! stash bound is configurable via [`Config::stash_limit`] and its
//! exceedance is a terminal [`OramError::StashOverflow`]. For trusted
//! execution environments, [`Config::constant_time`] additionally
//! removes data-dependent control flow from the stash scan and the
//! eviction pass.

#![warn(clippy::cargo, clippy::doc_markdown, missing_docs, rustdoc::all)]

use thiserror::Error;

pub(crate) mod bucket;
pub mod config;
pub(crate) mod constant_time;
pub mod encryptor;
pub(crate) mod eviction;
pub mod path_oram;
pub mod position_map;
pub(crate) mod stash;
pub mod storage;
#[cfg(test)]
mod test_utils;
pub(crate) mod tree;

pub use crate::bucket::Block;
pub use crate::config::{Config, EvictionStrategy};
pub use crate::encryptor::{AesGcmEncryptor, Encryptor, IdentityEncryptor};
pub use crate::path_oram::{InMemoryOram, PathOram};
pub use crate::position_map::{InMemoryPositionMap, PositionMap};
pub use crate::storage::{BucketStore, InMemoryStore};

/// The numeric type used for logical block identifiers.
pub type BlockId = i64;
/// The numeric type used for leaf indices in `[0, num_leaves)`.
pub type LeafId = i64;

/// Marks a bucket slot as empty. Every slot of every bucket is always
/// materialized; empty slots carry this id.
pub const EMPTY_BLOCK_ID: BlockId = -1;

/// Errors produced during ORAM protocol execution.
///
/// Only [`OramError::StashOverflow`], [`OramError::DecryptionFailed`],
/// and [`OramError::Rng`] may leave the engine in an inconsistent
/// state; all other errors abort the access and preserve pre-call
/// state.
#[derive(Error, Debug)]
pub enum OramError {
    /// The configuration is unusable; returned from construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A block id outside `[0, num_blocks)` was requested.
    #[error("block id {0} outside the valid range")]
    InvalidBlockId(BlockId),
    /// A write payload whose length differs from the configured block size.
    #[error("data length {got} does not match block size {expected}")]
    InvalidDataSize {
        /// The configured block size.
        expected: usize,
        /// The supplied payload length.
        got: usize,
    },
    /// The stash exceeded its configured bound at the end of an access.
    #[error("stash holds {len} blocks, exceeding the limit of {limit}")]
    StashOverflow {
        /// Blocks resident in the stash.
        len: usize,
        /// The configured stash limit.
        limit: usize,
    },
    /// The encryptor failed to seal a block.
    #[error("block encryption failed")]
    EncryptionFailed,
    /// The encryptor rejected a stored block: corruption or tampering.
    #[error("block decryption failed")]
    DecryptionFailed,
    /// An error surfaced by the bucket store.
    #[error("bucket store error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The system random source failed; the engine must be discarded.
    #[error("random source failure")]
    Rng(#[from] rand::Error),
}
