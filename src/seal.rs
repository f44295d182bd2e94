// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The envelope codec turning a store into a sealed blob and back.
//!
//! # Blob layout
//!
//! ```text
//! Offset   Size   Field
//! ------   ----   -----
//! 0        6      magic ("SECRET")
//! 6        4      header length hlen (u32 LE)
//! 10       hlen   serialized outer header, authenticated as AAD
//! 10+hlen  16     AEAD tag (ChaCha20-Poly1305)
//! 26+hlen  rest   ciphertext
//! ```
//!
//! The blob carries no total length and no terminator; the surrounding
//! container (usually a file) delimits it.
//!
//! On open the associated data handed to the cipher is the header byte
//! range of the input blob, never a re-serialized header. Re-encoding could
//! produce different bytes than the sealer wrote and would break
//! authentication.

use std::io::Write;

use thiserror::Error as DeriveError;
use zeroize::Zeroizing;

use crate::cipher::CipherError;
use crate::data::Data;
use crate::header::{HeaderError, OuterHeader};
use crate::kdf::KdfError;
use crate::provider::{EntropySource, ProviderError};

/// Magic bytes at the start of every sealed blob ("SECRET").
pub const MAGIC: [u8; 6] = [0x53, 0x45, 0x43, 0x52, 0x45, 0x54];

/// Offset of the serialized header: magic plus the u32 length prefix.
const HEADER_OFFSET: usize = MAGIC.len() + 4;

#[derive(Debug, DeriveError)]
pub enum SealError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("generating random bytes failed: {0}")]
    Random(#[from] ProviderError),

    #[error("key derivation failed: {0}")]
    Kdf(#[from] KdfError),

    #[error("encryption failed: {0}")]
    Cipher(#[from] CipherError),

    #[error("serializing store content failed: {0}")]
    Serialization(String),
}

#[derive(Debug, DeriveError, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// The input does not start with the blob magic.
    #[error("not a sealed store")]
    BadMagic,

    /// The input ends before the header, tag or ciphertext it announces.
    #[error("sealed store is truncated")]
    Truncated,

    /// The header bytes do not decode to a usable header.
    #[error("malformed header: {0}")]
    BadHeader(String),

    /// The blob was written by a newer, incompatible version of the format.
    #[error("unsupported format version: expected major at most {expected}, found {found}")]
    UnsupportedVersion { expected: u16, found: u16 },

    /// The header names an algorithm this crate does not implement.
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,

    /// Authentication or payload decoding failed. A wrong password and
    /// tampered content are deliberately indistinguishable.
    #[error("cannot open the sealed store")]
    CorruptedContent,
}

impl From<HeaderError> for OpenError {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::Malformed(inner) => OpenError::BadHeader(inner),
            HeaderError::UnsupportedVersion { expected, found } => {
                OpenError::UnsupportedVersion { expected, found }
            }
            HeaderError::UnsupportedAlgorithm => OpenError::UnsupportedAlgorithm,
        }
    }
}

/// Seals `data` under `password` and streams the blob to `out`.
///
/// The header is reseeded first: a fresh KDF salt and a fresh IV are drawn
/// from `rng` on every seal, and both end up recorded in `header` so the
/// open path can reproduce the key. The derived key and the serialized
/// plaintext are wiped on every exit path. On failure the bytes already
/// handed to `out` are garbage for the caller; no partial success is
/// reported.
pub(crate) fn seal<W: Write>(
    header: &mut OuterHeader,
    data: &Data,
    password: &[u8],
    rng: &mut dyn EntropySource,
    out: &mut W,
) -> Result<(), SealError> {
    header.kdf.seed(rng)?;
    let key = header.kdf.derive(password)?;
    header.cipher.reseed_iv(rng)?;

    let header_bytes = header
        .to_bytes()
        .map_err(|e| SealError::Serialization(e.to_string()))?;
    let hlen = u32::try_from(header_bytes.len())
        .map_err(|_| SealError::Serialization("header exceeds u32 length".into()))?;

    let mut payload = Zeroizing::new(Vec::new());
    ciborium::ser::into_writer(data, &mut *payload)
        .map_err(|e| SealError::Serialization(e.to_string()))?;

    // In-place encryption: after this the buffer holds ciphertext only.
    let tag = header.cipher.encrypt(&key, &header_bytes, &mut payload)?;

    out.write_all(&MAGIC)?;
    out.write_all(&hlen.to_le_bytes())?;
    out.write_all(&header_bytes)?;
    out.write_all(&tag)?;
    out.write_all(&payload)?;

    log::debug!(
        "sealed store: {} header bytes, {} ciphertext bytes",
        header_bytes.len(),
        payload.len()
    );
    Ok(())
}

/// Opens a sealed blob, returning the parsed header and payload.
///
/// Nothing persistent is allocated before authentication succeeds; the
/// derived key and the decrypted plaintext are wiped on every exit path.
pub(crate) fn open(blob: &[u8], password: &[u8]) -> Result<(OuterHeader, Data), OpenError> {
    if blob.len() < HEADER_OFFSET || blob[..MAGIC.len()] != MAGIC {
        return Err(OpenError::BadMagic);
    }

    let hlen = u32::from_le_bytes([blob[6], blob[7], blob[8], blob[9]]) as usize;
    let tag_start = HEADER_OFFSET
        .checked_add(hlen)
        .ok_or(OpenError::Truncated)?;
    if tag_start > blob.len() {
        return Err(OpenError::Truncated);
    }

    let header_bytes = &blob[HEADER_OFFSET..tag_start];
    let header = OuterHeader::from_bytes(header_bytes)?;
    header.validate()?;

    let tag_len = header
        .cipher
        .id
        .tag_len()
        .ok_or(OpenError::UnsupportedAlgorithm)?;
    let ct_start = tag_start.checked_add(tag_len).ok_or(OpenError::Truncated)?;
    if ct_start > blob.len() {
        return Err(OpenError::Truncated);
    }
    let tag = &blob[tag_start..ct_start];

    let key = header
        .kdf
        .derive(password)
        .map_err(|e| OpenError::BadHeader(e.to_string()))?;

    let mut plaintext = Zeroizing::new(blob[ct_start..].to_vec());
    header
        .cipher
        .decrypt(&key, header_bytes, &mut plaintext, tag)
        .map_err(|_| OpenError::CorruptedContent)?;

    let data: Data =
        ciborium::de::from_reader(&plaintext[..]).map_err(|_| OpenError::CorruptedContent)?;

    log::debug!("opened store: {} entries", data.entries.len());
    Ok((header, data))
}
