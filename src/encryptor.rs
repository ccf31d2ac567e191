// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Per-block authenticated encryption.
//!
//! The engine encrypts block payloads on their way into the bucket
//! store and decrypts them on the way back into the stash. Binding the
//! `(id, leaf)` pair into the authentication prevents an adversarial
//! store from replaying a block under a different identity or path.

use aes_gcm::{
    aead::{Aead, Payload},
    Aes256Gcm, Key, KeyInit, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::{BlockId, LeafId, OramError};

/// AES-256 key length in bytes.
pub const KEY_SIZE: usize = 32;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Seals and opens block payloads for the bucket store.
pub trait Encryptor {
    /// Encrypts `plaintext` for the block identified by `(id, leaf)`.
    /// Must use a fresh nonce per call and authenticate the pair.
    fn encrypt(&self, id: BlockId, leaf: LeafId, plaintext: &[u8]) -> Result<Vec<u8>, OramError>;

    /// Decrypts `ciphertext` for the block identified by `(id, leaf)`.
    /// Fails on tag mismatch, truncated input, or a mismatched pair.
    fn decrypt(&self, id: BlockId, leaf: LeafId, ciphertext: &[u8]) -> Result<Vec<u8>, OramError>;

    /// Extra bytes a sealed payload carries over its plaintext.
    fn overhead(&self) -> usize;
}

/// A pass-through [`Encryptor`] with zero overhead. For testing and
/// deployments where encryption happens below the bucket store.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityEncryptor;

impl Encryptor for IdentityEncryptor {
    fn encrypt(&self, _id: BlockId, _leaf: LeafId, plaintext: &[u8]) -> Result<Vec<u8>, OramError> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(
        &self,
        _id: BlockId,
        _leaf: LeafId,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, OramError> {
        Ok(ciphertext.to_vec())
    }

    fn overhead(&self) -> usize {
        0
    }
}

/// AES-256-GCM with a fresh random 96-bit nonce per call.
///
/// Sealed payload layout: `nonce || ciphertext || tag`. The `(id,
/// leaf)` pair is bound as additional authenticated data, 8 bytes
/// little-endian each.
pub struct AesGcmEncryptor {
    cipher: Aes256Gcm,
}

impl AesGcmEncryptor {
    /// Creates an encryptor from a 32-byte key.
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }
}

fn aad(id: BlockId, leaf: LeafId) -> [u8; 16] {
    let mut aad = [0u8; 16];
    aad[..8].copy_from_slice(&(id as u64).to_le_bytes());
    aad[8..].copy_from_slice(&(leaf as u64).to_le_bytes());
    aad
}

impl Encryptor for AesGcmEncryptor {
    fn encrypt(&self, id: BlockId, leaf: LeafId, plaintext: &[u8]) -> Result<Vec<u8>, OramError> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|_| OramError::EncryptionFailed)?;
        let aad = aad(id, leaf);
        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| OramError::EncryptionFailed)?;
        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, id: BlockId, leaf: LeafId, ciphertext: &[u8]) -> Result<Vec<u8>, OramError> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(OramError::DecryptionFailed);
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);
        let aad = aad(id, leaf);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: &aad,
                },
            )
            .map_err(|_| OramError::DecryptionFailed)
    }

    fn overhead(&self) -> usize {
        NONCE_SIZE + TAG_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor() -> AesGcmEncryptor {
        AesGcmEncryptor::new(&[0x42; KEY_SIZE])
    }

    #[test]
    fn identity_is_pass_through() {
        let enc = IdentityEncryptor;
        let data = b"some block payload".to_vec();
        let sealed = enc.encrypt(1, 2, &data).unwrap();
        assert_eq!(sealed, data);
        assert_eq!(enc.decrypt(1, 2, &sealed).unwrap(), data);
        assert_eq!(enc.overhead(), 0);
    }

    #[test]
    fn seal_open_round_trip() {
        let enc = encryptor();
        let plaintext = vec![0x5A; 32];
        let sealed = enc.encrypt(1, 2, &plaintext).unwrap();
        assert_eq!(sealed.len(), plaintext.len() + enc.overhead());
        assert_eq!(enc.decrypt(1, 2, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn wrong_id_or_leaf_fails_authentication() {
        let enc = encryptor();
        let sealed = enc.encrypt(1, 2, &[0u8; 16]).unwrap();
        assert!(matches!(
            enc.decrypt(999, 2, &sealed).unwrap_err(),
            OramError::DecryptionFailed
        ));
        assert!(matches!(
            enc.decrypt(1, 3, &sealed).unwrap_err(),
            OramError::DecryptionFailed
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let enc = encryptor();
        let mut sealed = enc.encrypt(1, 2, &[0u8; 16]).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            enc.decrypt(1, 2, &sealed).unwrap_err(),
            OramError::DecryptionFailed
        ));
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let enc = encryptor();
        assert!(matches!(
            enc.decrypt(1, 2, &[0u8; NONCE_SIZE + TAG_SIZE - 1]).unwrap_err(),
            OramError::DecryptionFailed
        ));
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let enc = encryptor();
        let a = enc.encrypt(1, 2, &[0u8; 16]).unwrap();
        let b = enc.encrypt(1, 2, &[0u8; 16]).unwrap();
        assert_ne!(a, b);
    }
}
