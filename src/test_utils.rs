// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Deterministic provider implementations for tests.
//!
//! Sealing draws every random byte and every timestamp through the injected
//! providers, so a seeded entropy source and a fixed clock make blobs fully
//! reproducible. Not suitable outside of tests.

use crate::provider::{Clock, EntropySource, ProviderError};

/// A deterministic entropy source driven by an xorshift64* generator.
#[derive(Debug, Clone)]
pub struct SeededEntropy {
    state: u64,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        // xorshift state must not be zero
        let state = seed ^ 0x9e37_79b9_7f4a_7c15;
        Self {
            state: if state == 0 { 1 } else { state },
        }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }
}

impl EntropySource for SeededEntropy {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), ProviderError> {
        for chunk in buf.chunks_mut(8) {
            let word = self.next().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
        Ok(())
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&mut self) -> i64 {
        self.0
    }
}

/// A clock advancing one millisecond per reading, so successive operations
/// get strictly increasing timestamps.
#[derive(Debug, Clone, Copy)]
pub struct TickingClock {
    now: i64,
}

impl TickingClock {
    pub fn starting_at(now: i64) -> Self {
        Self { now }
    }
}

impl Clock for TickingClock {
    fn now_ms(&mut self) -> i64 {
        self.now += 1;
        self.now
    }
}
