// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The AEAD cipher behind a sealed blob.
//!
//! Every cipher declares its IV length, tag length and tag placement; the
//! envelope stores the tag before the ciphertext and authenticates the
//! serialized outer header as associated data. Encryption is in place with
//! a detached tag so no second plaintext buffer ever exists.

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Nonce, Tag,
};
use serde::{Deserialize, Serialize};
use thiserror::Error as DeriveError;

use crate::kdf::DerivedKey;
use crate::provider::{EntropySource, ProviderError};

/// IV length of ChaCha20-Poly1305 in bytes.
pub const CHACHA20_POLY1305_IV_LEN: usize = 12;

/// Tag length of ChaCha20-Poly1305 in bytes.
pub const CHACHA20_POLY1305_TAG_LEN: usize = 16;

/// Numeric identifier of a cipher as recorded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherId(pub u16);

impl CipherId {
    /// ChaCha20-Poly1305 with a 96-bit IV and a 128-bit tag.
    pub const CHACHA20_POLY1305: Self = Self(1);

    /// IV length in bytes, `None` for unrecognized ids.
    pub fn iv_len(self) -> Option<usize> {
        if self == Self::CHACHA20_POLY1305 {
            Some(CHACHA20_POLY1305_IV_LEN)
        } else {
            None
        }
    }

    /// Tag length in bytes, `None` for unrecognized ids.
    pub fn tag_len(self) -> Option<usize> {
        if self == Self::CHACHA20_POLY1305 {
            Some(CHACHA20_POLY1305_TAG_LEN)
        } else {
            None
        }
    }
}

#[derive(Debug, DeriveError, PartialEq, Eq)]
pub enum CipherError {
    #[error("unrecognized cipher")]
    UnsupportedAlgorithm,

    #[error("initialization vector missing or of wrong length")]
    BadIv,

    #[error("failed to generate an initialization vector: {0}")]
    Iv(#[from] ProviderError),

    #[error("content authentication failed")]
    AuthFail,
}

/// Cipher selection carried in the outer header: the algorithm id and, on a
/// sealed blob, the IV used for its ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    pub id: CipherId,
    #[serde(with = "serde_bytes")]
    pub iv: Option<Vec<u8>>,
}

impl CipherParams {
    pub(crate) fn new(id: CipherId) -> Self {
        Self { id, iv: None }
    }

    /// Discards any prior IV and draws a fresh one of the cipher's length
    /// from `rng`. Called once per seal.
    pub fn reseed_iv(&mut self, rng: &mut dyn EntropySource) -> Result<(), CipherError> {
        let len = self.id.iv_len().ok_or(CipherError::UnsupportedAlgorithm)?;
        let mut iv = vec![0u8; len];
        rng.fill(&mut iv)?;
        self.iv = Some(iv);
        Ok(())
    }

    /// Encrypts `buf` in place and returns the detached tag.
    pub fn encrypt(
        &self,
        key: &DerivedKey,
        aad: &[u8],
        buf: &mut [u8],
    ) -> Result<Vec<u8>, CipherError> {
        if self.id != CipherId::CHACHA20_POLY1305 {
            return Err(CipherError::UnsupportedAlgorithm);
        }
        let iv = self.checked_iv()?;

        let chacha = ChaCha20Poly1305::new(key.as_bytes().into());
        let tag = chacha
            .encrypt_in_place_detached(Nonce::from_slice(iv), aad, buf)
            .map_err(|_| CipherError::AuthFail)?;
        Ok(tag.to_vec())
    }

    /// Decrypts `buf` in place, verifying `tag` over the ciphertext and
    /// `aad`. A mismatch of either leaves no way to tell a wrong key from
    /// tampered content.
    pub fn decrypt(
        &self,
        key: &DerivedKey,
        aad: &[u8],
        buf: &mut [u8],
        tag: &[u8],
    ) -> Result<(), CipherError> {
        if self.id != CipherId::CHACHA20_POLY1305 {
            return Err(CipherError::UnsupportedAlgorithm);
        }
        let iv = self.checked_iv()?;
        if tag.len() != CHACHA20_POLY1305_TAG_LEN {
            return Err(CipherError::AuthFail);
        }

        let chacha = ChaCha20Poly1305::new(key.as_bytes().into());
        chacha
            .decrypt_in_place_detached(Nonce::from_slice(iv), aad, buf, Tag::from_slice(tag))
            .map_err(|_| CipherError::AuthFail)
    }

    fn checked_iv(&self) -> Result<&[u8], CipherError> {
        match (&self.iv, self.id.iv_len()) {
            (Some(iv), Some(len)) if iv.len() == len => Ok(iv),
            _ => Err(CipherError::BadIv),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::KdfParams;
    use crate::test_utils::SeededEntropy;

    fn key() -> DerivedKey {
        let mut params = KdfParams::argon2id_for_tests();
        params.seed(&mut SeededEntropy::new(3)).unwrap();
        params.derive(b"pw").unwrap()
    }

    fn params() -> CipherParams {
        let mut p = CipherParams::new(CipherId::CHACHA20_POLY1305);
        p.reseed_iv(&mut SeededEntropy::new(5)).unwrap();
        p
    }

    #[test]
    fn test_reseed_iv_length() {
        let p = params();
        assert_eq!(p.iv.as_ref().unwrap().len(), CHACHA20_POLY1305_IV_LEN);
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let p = params();
        let key = key();
        let mut buf = b"plaintext bytes".to_vec();

        let tag = p.encrypt(&key, b"aad", &mut buf).unwrap();
        assert_eq!(tag.len(), CHACHA20_POLY1305_TAG_LEN);
        assert_ne!(buf, b"plaintext bytes");

        p.decrypt(&key, b"aad", &mut buf, &tag).unwrap();
        assert_eq!(buf, b"plaintext bytes");
    }

    #[test]
    fn test_decrypt_rejects_tampered_ciphertext() {
        let p = params();
        let key = key();
        let mut buf = b"plaintext bytes".to_vec();
        let tag = p.encrypt(&key, b"aad", &mut buf).unwrap();

        buf[0] ^= 0x01;
        assert_eq!(p.decrypt(&key, b"aad", &mut buf, &tag), Err(CipherError::AuthFail));
    }

    #[test]
    fn test_decrypt_rejects_wrong_aad() {
        let p = params();
        let key = key();
        let mut buf = b"plaintext bytes".to_vec();
        let tag = p.encrypt(&key, b"aad", &mut buf).unwrap();

        assert_eq!(p.decrypt(&key, b"bad", &mut buf, &tag), Err(CipherError::AuthFail));
    }

    #[test]
    fn test_decrypt_rejects_tampered_tag() {
        let p = params();
        let key = key();
        let mut buf = b"plaintext bytes".to_vec();
        let mut tag = p.encrypt(&key, b"aad", &mut buf).unwrap();

        tag[15] ^= 0x80;
        assert_eq!(p.decrypt(&key, b"aad", &mut buf, &tag), Err(CipherError::AuthFail));
    }

    #[test]
    fn test_missing_iv_is_rejected() {
        let p = CipherParams::new(CipherId::CHACHA20_POLY1305);
        let key = key();
        let mut buf = Vec::new();
        assert_eq!(p.encrypt(&key, b"", &mut buf), Err(CipherError::BadIv));
    }

    #[test]
    fn test_unknown_cipher_is_rejected() {
        let mut p = CipherParams::new(CipherId(0x7777));
        assert_eq!(
            p.reseed_iv(&mut SeededEntropy::new(5)),
            Err(CipherError::UnsupportedAlgorithm)
        );
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let p = params();
        let key = key();
        let mut buf = Vec::new();
        let tag = p.encrypt(&key, b"header", &mut buf).unwrap();
        p.decrypt(&key, b"header", &mut buf, &tag).unwrap();
        assert!(buf.is_empty());
    }
}
