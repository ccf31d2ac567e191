// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The Path ORAM engine and its six-step access protocol.

use rand::{rngs::OsRng, CryptoRng, RngCore};

use crate::{
    bucket::Block,
    config::Config,
    encryptor::{Encryptor, IdentityEncryptor},
    position_map::{InMemoryPositionMap, PositionMap},
    stash::Stash,
    storage::{BucketStore, InMemoryStore},
    tree::TreeGeometry,
    BlockId, LeafId, OramError, EMPTY_BLOCK_ID,
};

/// The Path ORAM engine.
///
/// A single-threaded, non-reentrant object: the caller serializes
/// accesses, and the injected collaborators are used only from the
/// engine's thread. Every logical access touches exactly one
/// leaf-to-root path (two under
/// [`crate::EvictionStrategy::DeterministicTwoPath`]), chosen
/// independently of the logical id being accessed.
#[derive(Debug)]
pub struct PathOram<S, P, E, R> {
    pub(crate) cfg: Config,
    pub(crate) geometry: TreeGeometry,
    pub(crate) store: S,
    pub(crate) pos_map: P,
    pub(crate) encryptor: E,
    pub(crate) stash: Stash,
    pub(crate) rng: R,
}

/// The fully in-memory engine produced by [`PathOram::in_memory`].
pub type InMemoryOram = PathOram<InMemoryStore, InMemoryPositionMap, IdentityEncryptor, OsRng>;

impl PathOram<InMemoryStore, InMemoryPositionMap, IdentityEncryptor, OsRng> {
    /// Creates an engine wired to an in-memory store, an in-memory
    /// position map, and no encryption. The simplest way to get a
    /// working ORAM for tests or in-process use.
    pub fn in_memory(cfg: Config) -> Result<InMemoryOram, OramError> {
        let cfg = cfg.validate()?;
        let geometry = TreeGeometry::new(cfg.num_blocks, cfg.bucket_size);
        let store = InMemoryStore::new(geometry.num_buckets(), cfg.bucket_size, cfg.block_size);
        PathOram::new(cfg, store, InMemoryPositionMap::new(), IdentityEncryptor, OsRng)
    }
}

impl<S, P, E, R> PathOram<S, P, E, R>
where
    S: BucketStore,
    P: PositionMap,
    E: Encryptor,
    R: RngCore + CryptoRng,
{
    /// Creates an engine with explicit collaborators. The store is
    /// expected to hold `2^height - 1` buckets of `bucket_size` slots
    /// whose payload length is `block_size + encryptor.overhead()`.
    pub fn new(cfg: Config, store: S, pos_map: P, encryptor: E, rng: R) -> Result<Self, OramError> {
        let cfg = cfg.validate()?;
        let geometry = TreeGeometry::new(cfg.num_blocks, cfg.bucket_size);
        log::info!(
            "PathOram::new(num_blocks = {}, block_size = {}, height = {})",
            cfg.num_blocks,
            cfg.block_size,
            geometry.height()
        );
        Ok(Self {
            cfg,
            geometry,
            store,
            pos_map,
            encryptor,
            stash: Stash::new(),
            rng,
        })
    }

    /// The number of blocks this ORAM can store.
    pub fn capacity(&self) -> usize {
        self.cfg.num_blocks
    }

    /// The configured plaintext block length.
    pub fn block_size(&self) -> usize {
        self.cfg.block_size
    }

    /// The height of the bucket tree.
    pub fn height(&self) -> usize {
        self.geometry.height()
    }

    /// The number of leaf buckets.
    pub fn num_leaves(&self) -> usize {
        self.geometry.num_leaves()
    }

    /// The number of blocks currently resident in the stash.
    pub fn stash_size(&self) -> usize {
        self.stash.len()
    }

    /// The number of block ids the position map has seen.
    pub fn size(&self) -> usize {
        self.pos_map.len()
    }

    /// Reads the block with the given id. An id never accessed before
    /// reads as `block_size` zero bytes (and is allocated a position).
    pub fn read(&mut self, id: BlockId) -> Result<Vec<u8>, OramError> {
        log::debug!("ORAM read: {id}");
        self.access(id, None)
    }

    /// Writes `data` to the block with the given id, returning the
    /// previously stored payload.
    pub fn write(&mut self, id: BlockId, data: &[u8]) -> Result<Vec<u8>, OramError> {
        log::debug!("ORAM write: {id}");
        self.access(id, Some(data))
    }

    /// Performs one oblivious access. A `None` payload is a read; a
    /// `Some` payload is a write. Either way the returned buffer is
    /// the block's value at the moment the access began.
    pub fn access(&mut self, id: BlockId, new_data: Option<&[u8]>) -> Result<Vec<u8>, OramError> {
        if id < 0 || id >= self.cfg.num_blocks as BlockId {
            return Err(OramError::InvalidBlockId(id));
        }
        if let Some(data) = new_data {
            if data.len() != self.cfg.block_size {
                return Err(OramError::InvalidDataSize {
                    expected: self.cfg.block_size,
                    got: data.len(),
                });
            }
        }

        // Step 1: look up the block's current leaf and remap it.
        let old_leaf = match self.pos_map.get(id) {
            Some(leaf) => leaf,
            None => self.random_leaf()?,
        };
        let new_leaf = self.random_leaf()?;
        self.pos_map.set(id, new_leaf);

        // Step 2: drain the old path into the stash.
        let path = self.geometry.path(old_leaf);
        self.read_path_into_stash(&path)?;

        // Step 3: locate the target block.
        let (found, previous) = if self.cfg.constant_time {
            self.find_in_stash_ct(id)
        } else {
            match self.stash.find(id) {
                Some(index) => (Some(index), self.stash.get(index).data.clone()),
                None => (None, vec![0; self.cfg.block_size]),
            }
        };

        // Step 4: serve. The write, if any, takes effect after the
        // snapshot in `previous` was taken.
        match found {
            Some(index) => {
                let entry = self.stash.get_mut(index);
                entry.leaf = new_leaf;
                if let Some(data) = new_data {
                    entry.data.copy_from_slice(data);
                }
            }
            None => {
                let mut data = vec![0; self.cfg.block_size];
                if let Some(new_data) = new_data {
                    data.copy_from_slice(new_data);
                }
                self.stash.push(Block {
                    id,
                    leaf: new_leaf,
                    data,
                });
            }
        }

        // Step 5: evict along the path that was just read.
        if self.cfg.constant_time {
            self.evict_path_ct(&path)?;
        } else {
            self.evict_with_strategy(&path)?;
        }

        // Step 6: overflow check.
        if self.stash.len() > self.cfg.stash_limit {
            log::warn!(
                "stash overflow: {} blocks against a limit of {}",
                self.stash.len(),
                self.cfg.stash_limit
            );
            return Err(OramError::StashOverflow {
                len: self.stash.len(),
                limit: self.cfg.stash_limit,
            });
        }

        Ok(previous)
    }

    /// A uniform leaf in `[0, num_leaves)` from the engine's CSPRNG.
    /// The leaf count is a power of two, so masking a fresh 64-bit
    /// draw is exactly uniform. An entropy failure is surfaced rather
    /// than falling back to a weaker source.
    pub(crate) fn random_leaf(&mut self) -> Result<LeafId, OramError> {
        let mut buf = [0u8; 8];
        self.rng.try_fill_bytes(&mut buf)?;
        let mask = self.geometry.num_leaves() as u64 - 1;
        Ok((u64::from_le_bytes(buf) & mask) as LeafId)
    }

    /// Reads each bucket on `path`, decrypts every non-empty slot into
    /// the stash, and writes the bucket back with those slots emptied,
    /// so the store observes a uniform read-then-write per bucket.
    pub(crate) fn read_path_into_stash(&mut self, path: &[usize]) -> Result<(), OramError> {
        for &bucket_idx in path {
            let mut bucket = self.store.read_bucket(bucket_idx)?;
            for slot in &mut bucket {
                if slot.id != EMPTY_BLOCK_ID {
                    let plaintext = self.encryptor.decrypt(slot.id, slot.leaf, &slot.data)?;
                    self.stash.push(Block {
                        id: slot.id,
                        leaf: slot.leaf,
                        data: plaintext,
                    });
                    slot.id = EMPTY_BLOCK_ID;
                }
            }
            self.store.write_bucket(bucket_idx, bucket)?;
        }
        Ok(())
    }

    /// Seals a plaintext block for the bucket store.
    pub(crate) fn seal_block(&self, block: &Block) -> Result<Block, OramError> {
        let sealed = self.encryptor.encrypt(block.id, block.leaf, &block.data)?;
        Ok(Block {
            id: block.id,
            leaf: block.leaf,
            data: sealed,
        })
    }
}
