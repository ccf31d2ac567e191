// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Shared helpers for engine tests: deterministic engines, workload
//! drivers, and structural invariant checks.

use std::collections::HashMap;

use rand::{rngs::StdRng, CryptoRng, Rng, RngCore, SeedableRng};

use crate::{
    encryptor::{AesGcmEncryptor, Encryptor, IdentityEncryptor},
    path_oram::PathOram,
    position_map::{InMemoryPositionMap, PositionMap},
    storage::{BucketStore, InMemoryStore},
    tree::TreeGeometry,
    BlockId, Config,
};

pub(crate) type TestOram = PathOram<InMemoryStore, InMemoryPositionMap, IdentityEncryptor, StdRng>;

pub(crate) type EncryptedTestOram =
    PathOram<InMemoryStore, InMemoryPositionMap, AesGcmEncryptor, StdRng>;

/// A deterministic, unencrypted in-memory engine.
pub(crate) fn test_oram(cfg: Config) -> TestOram {
    let cfg = cfg.validate().unwrap();
    let geometry = TreeGeometry::new(cfg.num_blocks, cfg.bucket_size);
    let store = InMemoryStore::new(geometry.num_buckets(), cfg.bucket_size, cfg.block_size);
    PathOram::new(
        cfg,
        store,
        InMemoryPositionMap::new(),
        IdentityEncryptor,
        StdRng::seed_from_u64(0),
    )
    .unwrap()
}

/// A deterministic engine whose store holds AES-GCM ciphertext.
pub(crate) fn encrypted_test_oram(cfg: Config) -> EncryptedTestOram {
    let cfg = cfg.validate().unwrap();
    let encryptor = AesGcmEncryptor::new(&[7u8; 32]);
    let geometry = TreeGeometry::new(cfg.num_blocks, cfg.bucket_size);
    let store = InMemoryStore::new(
        geometry.num_buckets(),
        cfg.bucket_size,
        cfg.block_size + encryptor.overhead(),
    );
    PathOram::new(
        cfg,
        store,
        InMemoryPositionMap::new(),
        encryptor,
        StdRng::seed_from_u64(0),
    )
    .unwrap()
}

/// A distinct, recognizable payload for block `id`.
pub(crate) fn payload(id: BlockId, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (id as u8).wrapping_mul(31).wrapping_add(i as u8))
        .collect()
}

/// Drives `ops` random reads and writes against a shadow map,
/// asserting both returned values and previous-value semantics.
pub(crate) fn random_workload<S, P, E, R>(oram: &mut PathOram<S, P, E, R>, ops: usize)
where
    S: BucketStore,
    P: PositionMap,
    E: Encryptor,
    R: RngCore + CryptoRng,
{
    let mut mirror: HashMap<BlockId, Vec<u8>> = HashMap::new();
    let mut rng = StdRng::seed_from_u64(99);
    let capacity = oram.capacity() as BlockId;
    let block_size = oram.block_size();

    for _ in 0..ops {
        let id = rng.gen_range(0..capacity);
        let expected = mirror
            .get(&id)
            .cloned()
            .unwrap_or_else(|| vec![0; block_size]);
        if rng.gen_bool(0.5) {
            let mut data = vec![0u8; block_size];
            rng.fill_bytes(&mut data);
            let previous = oram.write(id, &data).unwrap();
            assert_eq!(previous, expected);
            mirror.insert(id, data);
        } else {
            assert_eq!(oram.read(id).unwrap(), expected);
        }
    }
}

/// Checks the structural invariants over an unencrypted engine: bucket
/// arity, placement (every tree-resident block sits on its leaf's
/// path), id uniqueness across tree and stash, and position-map
/// consistency.
pub(crate) fn check_invariants<S, P, R>(oram: &mut PathOram<S, P, IdentityEncryptor, R>)
where
    S: BucketStore,
    P: PositionMap,
    R: RngCore + CryptoRng,
{
    let mut seen: HashMap<BlockId, i64> = HashMap::new();

    for idx in 0..oram.store.num_buckets() {
        let bucket = oram.store.read_bucket(idx).unwrap();
        assert_eq!(bucket.len(), oram.cfg.bucket_size, "bucket {idx} arity");
        for slot in bucket {
            if slot.is_empty() {
                continue;
            }
            assert!(
                oram.geometry.is_ancestor(idx, slot.leaf),
                "block {} with leaf {} misplaced in bucket {idx}",
                slot.id,
                slot.leaf
            );
            assert!(
                seen.insert(slot.id, slot.leaf).is_none(),
                "block {} appears twice in the tree",
                slot.id
            );
        }
    }

    for block in oram.stash.iter() {
        assert!(
            seen.insert(block.id, block.leaf).is_none(),
            "block {} appears in both tree and stash",
            block.id
        );
    }

    assert_eq!(seen.len(), oram.pos_map.len(), "allocation count mismatch");
    for (id, leaf) in &seen {
        assert_eq!(
            oram.pos_map.get(*id),
            Some(*leaf),
            "position map out of sync for block {id}"
        );
    }
}
