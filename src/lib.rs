// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Tresor is an embeddable secret store.
//!
//! A [`Tresor`] holds a collection of entries, each a list of key/value
//! fields addressed by a stable byte identifier. The whole store seals into
//! a single self-describing blob: the algorithm metadata travels in an
//! authenticated plaintext header, the payload is encrypted with
//! ChaCha20-Poly1305 under a key derived from a password with Argon2id, and
//! the header bytes are bound to the ciphertext as associated data. Opening
//! the blob with the password restores the store exactly.
//!
//! Randomness and time are injected (see [`provider`]), which keeps the
//! library usable on hosts without an OS and makes sealing reproducible
//! under test. Key material, field values and serialized payloads are wiped
//! from memory when released, on error paths included.
//!
//! ```
//! use tresor::Tresor;
//!
//! let mut store = Tresor::new("tresor", "accounts");
//! let entry = store.create_entry(b"mail");
//! store.add_entry(entry).unwrap();
//! store.add_field(b"mail", "UserName", b"alice@example.org").unwrap();
//!
//! let mut blob = Vec::new();
//! store.seal(&mut blob, b"correct horse").unwrap();
//!
//! let mut restored = Tresor::open(&blob, b"correct horse").unwrap();
//! assert_eq!(restored.get_field(b"mail", "UserName").unwrap(), b"alice@example.org");
//! ```
//!
//! ## WARNING
//!
//! This library has not yet been audited for security, so use at your own
//! peril.

pub mod cipher;
pub mod data;
pub mod entry;
pub mod header;
pub mod kdf;
pub mod provider;
pub mod seal;
pub mod store;
pub mod test_utils;

pub use cipher::{CipherId, CipherParams};
pub use data::Data;
pub use entry::{Entry, Field, StoreError};
pub use header::{CompressionId, HeaderError, OuterHeader};
pub use kdf::{KdfId, KdfParams};
pub use provider::{Clock, EntropySource, OsEntropy, ProviderError, SystemClock};
pub use seal::{OpenError, SealError, MAGIC};
pub use store::{EntryExists, Tresor};
