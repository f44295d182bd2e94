// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Injectable sources for randomness and time.
//!
//! A [`crate::Tresor`] never reaches for ambient entropy or the ambient
//! clock. Both are supplied as single-method trait objects so that hosts
//! without an OS (or tests that need reproducible seals) can substitute
//! their own.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error as DeriveError;

/// Failure of an injected provider, typically exhaustion or absence of the
/// platform entropy source.
#[derive(Debug, DeriveError, Clone, PartialEq, Eq)]
#[error("provider failure: {0}")]
pub struct ProviderError(pub String);

/// A source of cryptographically secure random bytes.
pub trait EntropySource {
    /// Fills `buf` entirely with fresh random bytes.
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), ProviderError>;
}

/// A wall clock with millisecond resolution.
pub trait Clock {
    /// Milliseconds since the Unix epoch, signed.
    fn now_ms(&mut self) -> i64;
}

/// Entropy from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), ProviderError> {
        getrandom::getrandom(buf).map_err(|e| ProviderError(e.to_string()))
    }
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&mut self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => since.as_millis() as i64,
            // A clock set before 1970 yields a negative timestamp.
            Err(e) => -(e.duration().as_millis() as i64),
        }
    }
}
