// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Password key schedule.
//!
//! A sealed blob records the key-derivation algorithm and its parameters in
//! the outer header so the open path can reproduce the key from the password
//! alone. The salt is reseeded from the injected entropy source exactly once
//! per seal.

use std::fmt::{self, Debug, Formatter};

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error as DeriveError;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::provider::{EntropySource, ProviderError};

/// Length of every derived key in bytes.
pub const DERIVED_KEY_LEN: usize = 32;

/// Length of a freshly seeded salt in bytes.
pub const SALT_LEN: usize = 16;

/// Numeric identifier of a key-derivation algorithm as recorded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfId(pub u16);

impl KdfId {
    /// Argon2id, version 0x13.
    pub const ARGON2ID: Self = Self(1);
}

#[derive(Debug, DeriveError)]
pub enum KdfError {
    #[error("unrecognized key derivation algorithm")]
    UnsupportedAlgorithm,

    #[error("key derivation failed: {0}")]
    Argon2(argon2::Error),
}

impl From<argon2::Error> for KdfError {
    fn from(e: argon2::Error) -> Self {
        Self::Argon2(e)
    }
}

/// Key-derivation parameters carried in the outer header.
///
/// The parameter names follow Argon2id; a future algorithm id may reuse the
/// same slots (e.g. scrypt cost, block size and parallelism) without
/// changing the wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub id: KdfId,
    #[serde(with = "serde_bytes")]
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Argon2id parameters sized for interactive authentication.
    pub fn argon2id_interactive() -> Self {
        Self {
            id: KdfId::ARGON2ID,
            salt: Vec::new(),
            iterations: 2,
            memory_kib: 19 * 1024,
            parallelism: 1,
        }
    }

    /// Reduced-cost parameters for tests. Unsuitable for real secrets.
    pub fn argon2id_for_tests() -> Self {
        Self {
            id: KdfId::ARGON2ID,
            salt: Vec::new(),
            iterations: 1,
            memory_kib: 8 * 1024,
            parallelism: 1,
        }
    }

    /// Replaces the salt with fresh random bytes. Called once per seal.
    pub fn seed(&mut self, rng: &mut dyn EntropySource) -> Result<(), ProviderError> {
        let mut salt = vec![0u8; SALT_LEN];
        rng.fill(&mut salt)?;
        self.salt = salt;
        Ok(())
    }

    /// Derives a 32-byte key from `password` and the stored parameters.
    ///
    /// The result wipes itself when dropped; intermediate buffers are wiped
    /// on the error path as well.
    pub fn derive(&self, password: &[u8]) -> Result<DerivedKey, KdfError> {
        if self.id != KdfId::ARGON2ID {
            return Err(KdfError::UnsupportedAlgorithm);
        }

        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(DERIVED_KEY_LEN),
        )?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut out = [0u8; DERIVED_KEY_LEN];
        if let Err(e) = argon2.hash_password_into(password, &self.salt, &mut out) {
            out.zeroize();
            return Err(e.into());
        }
        Ok(DerivedKey(out))
    }
}

/// A password-derived encryption key. Wiped on drop, redacted in debug
/// output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; DERIVED_KEY_LEN]);

impl DerivedKey {
    pub(crate) fn as_bytes(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.0
    }
}

impl Debug for DerivedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey").field("key", &"<redacted>").finish()
    }
}
