// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The authenticated, unencrypted metadata block of a sealed blob.
//!
//! The outer header names the format version and every algorithm needed to
//! open the payload: the cipher and its IV, the compression scheme and the
//! key-derivation function with its parameters. It is serialized as a
//! self-describing CBOR map and authenticated as associated data, never
//! encrypted.
//!
//! Algorithm identifiers are small integers. An unrecognized id decodes
//! successfully and is rejected as unsupported, which keeps old readers able
//! to distinguish "new algorithm" from "damaged header" and keeps old blobs
//! openable when new algorithms are added.

use serde::{Deserialize, Serialize};
use thiserror::Error as DeriveError;

use crate::cipher::{CipherId, CipherParams};
use crate::kdf::{KdfId, KdfParams, SALT_LEN};

/// Major version of the blob format written by this crate.
pub const FORMAT_VERSION_MAJOR: u16 = 1;

/// Minor version of the blob format written by this crate.
pub const FORMAT_VERSION_MINOR: u16 = 0;

/// Numeric identifier of a compression scheme as recorded on the wire.
///
/// Compression is reserved in the format and not implemented; the only
/// recognized id is [`CompressionId::NONE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionId(pub u16);

impl CompressionId {
    /// No compression.
    pub const NONE: Self = Self(0);
}

#[derive(Debug, DeriveError, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("malformed header: {0}")]
    Malformed(String),

    #[error("unsupported format version: expected major at most {expected}, found {found}")]
    UnsupportedVersion { expected: u16, found: u16 },

    #[error("unrecognized algorithm identifier")]
    UnsupportedAlgorithm,
}

/// Versioning and algorithm metadata for one sealed blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OuterHeader {
    pub version_major: u16,
    pub version_minor: u16,
    pub cipher: CipherParams,
    pub compression: CompressionId,
    pub kdf: KdfParams,
}

impl OuterHeader {
    /// A current-version header with the crate's default algorithm
    /// selection: ChaCha20-Poly1305, no compression, Argon2id with
    /// interactive parameters.
    pub fn latest() -> Self {
        Self {
            version_major: FORMAT_VERSION_MAJOR,
            version_minor: FORMAT_VERSION_MINOR,
            cipher: CipherParams::new(CipherId::CHACHA20_POLY1305),
            compression: CompressionId::NONE,
            kdf: KdfParams::argon2id_interactive(),
        }
    }

    /// A current-version header for the given algorithm selection.
    ///
    /// Fails with [`HeaderError::UnsupportedAlgorithm`] when any id is not
    /// implemented by this crate.
    pub fn new(
        cipher: CipherId,
        compression: CompressionId,
        kdf: KdfId,
    ) -> Result<Self, HeaderError> {
        if cipher != CipherId::CHACHA20_POLY1305
            || compression != CompressionId::NONE
            || kdf != KdfId::ARGON2ID
        {
            return Err(HeaderError::UnsupportedAlgorithm);
        }
        Ok(Self {
            version_major: FORMAT_VERSION_MAJOR,
            version_minor: FORMAT_VERSION_MINOR,
            cipher: CipherParams::new(cipher),
            compression,
            kdf: KdfParams::argon2id_interactive(),
        })
    }

    /// Serializes the header to its exact wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, HeaderError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|e| HeaderError::Malformed(e.to_string()))?;
        Ok(bytes)
    }

    /// Parses a header from its wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        ciborium::de::from_reader(bytes).map_err(|e| HeaderError::Malformed(e.to_string()))
    }

    /// Checks that this crate can act on every recorded parameter: a known
    /// version and known algorithm ids, an IV of the cipher's length and a
    /// usable salt.
    pub fn validate(&self) -> Result<(), HeaderError> {
        if self.version_major > FORMAT_VERSION_MAJOR {
            return Err(HeaderError::UnsupportedVersion {
                expected: FORMAT_VERSION_MAJOR,
                found: self.version_major,
            });
        }
        if self.compression != CompressionId::NONE || self.kdf.id != KdfId::ARGON2ID {
            return Err(HeaderError::UnsupportedAlgorithm);
        }
        let iv_len = self
            .cipher
            .id
            .iv_len()
            .ok_or(HeaderError::UnsupportedAlgorithm)?;
        match &self.cipher.iv {
            Some(iv) if iv.len() == iv_len => {}
            _ => {
                return Err(HeaderError::Malformed(
                    "initialization vector missing or of wrong length".into(),
                ))
            }
        }
        if self.kdf.salt.len() < SALT_LEN {
            return Err(HeaderError::Malformed("salt too short".into()));
        }
        Ok(())
    }
}
