// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The store facade.
//!
//! A [`Tresor`] composes the outer header with the secret payload and owns
//! the injected entropy source and clock. All entry and field operations go
//! through it; sealing and opening delegate to the envelope codec.

use std::fmt::{self, Debug, Formatter};
use std::io::Write;

use thiserror::Error as DeriveError;

use crate::cipher::CipherId;
use crate::data::Data;
use crate::entry::{Entry, StoreError};
use crate::header::{CompressionId, HeaderError, OuterHeader};
use crate::kdf::KdfId;
use crate::provider::{Clock, EntropySource, OsEntropy, SystemClock};
use crate::seal::{self, OpenError, SealError};

/// Rejected insertion: the store already holds an entry with the same id.
/// The entry is handed back untouched so the caller can retry.
#[derive(Debug, DeriveError)]
#[error("an entry with the same id is already present")]
pub struct EntryExists(pub Entry);

/// An encrypted secret store.
///
/// Entries are created detached, filled with fields and then inserted;
/// [`Tresor::seal`] persists the whole store as one authenticated-encrypted
/// blob and [`Tresor::open`] restores it from such a blob.
///
/// A store is not safe for concurrent mutation. Dropping it wipes every
/// entry id, field key and field value it owns.
pub struct Tresor {
    header: OuterHeader,
    data: Data,
    rng: Box<dyn EntropySource>,
    clock: Box<dyn Clock>,
}

impl Tresor {
    /// Creates an empty store with the default algorithms (ChaCha20-Poly1305,
    /// no compression, Argon2id with interactive parameters), OS entropy and
    /// the system clock.
    ///
    /// `generator` identifies the producing application or library and is
    /// persisted alongside the store `name`.
    pub fn new(generator: &str, name: &str) -> Self {
        Self::with_providers(generator, name, Box::new(OsEntropy), Box::new(SystemClock))
    }

    /// Creates an empty store with injected entropy and clock. Sealing with
    /// a deterministic entropy source and a fixed clock yields reproducible
    /// blobs.
    pub fn with_providers(
        generator: &str,
        name: &str,
        rng: Box<dyn EntropySource>,
        mut clock: Box<dyn Clock>,
    ) -> Self {
        let header = OuterHeader::latest();
        let now = clock.now_ms();
        Self {
            header,
            data: Data::new(generator, name, now),
            rng,
            clock,
        }
    }

    /// Creates an empty store with an explicit algorithm selection.
    ///
    /// Fails with [`HeaderError::UnsupportedAlgorithm`] when any id is not
    /// implemented by this crate.
    pub fn with_algorithms(
        generator: &str,
        name: &str,
        cipher: CipherId,
        compression: CompressionId,
        kdf: KdfId,
        rng: Box<dyn EntropySource>,
        mut clock: Box<dyn Clock>,
    ) -> Result<Self, HeaderError> {
        let header = OuterHeader::new(cipher, compression, kdf)?;
        let now = clock.now_ms();
        Ok(Self {
            header,
            data: Data::new(generator, name, now),
            rng,
            clock,
        })
    }

    /// Restores a store from a sealed blob, using OS entropy and the system
    /// clock for the restored instance.
    pub fn open(blob: &[u8], password: &[u8]) -> Result<Self, OpenError> {
        Self::open_with_providers(blob, password, Box::new(OsEntropy), Box::new(SystemClock))
    }

    /// Restores a store from a sealed blob with injected providers.
    pub fn open_with_providers(
        blob: &[u8],
        password: &[u8],
        rng: Box<dyn EntropySource>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, OpenError> {
        let (header, data) = seal::open(blob, password)?;
        Ok(Self {
            header,
            data,
            rng,
            clock,
        })
    }

    /// Seals the store under `password` and streams the blob to `out`.
    ///
    /// Every seal draws a fresh KDF salt and a fresh IV from the injected
    /// entropy source. On failure nothing of the secret material leaks and
    /// the bytes already written are garbage for the caller.
    pub fn seal<W: Write>(&mut self, out: &mut W, password: &[u8]) -> Result<(), SealError> {
        seal::seal(&mut self.header, &self.data, password, self.rng.as_mut(), out)
    }

    /// The store name.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The generator string recorded at creation.
    pub fn generator(&self) -> &str {
        &self.data.generator
    }

    /// Creation timestamp of the store in milliseconds.
    pub fn created_at(&self) -> i64 {
        self.data.created_at
    }

    /// Timestamp of the last entry insertion or removal, in milliseconds.
    pub fn modified_at(&self) -> i64 {
        self.data.modified_at
    }

    /// The current header, as it will be written on the next seal.
    pub fn header(&self) -> &OuterHeader {
        &self.header
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[Entry] {
        &self.data.entries
    }

    /// Constructs a detached entry stamped with the current clock. The entry
    /// belongs to the caller until [`Tresor::add_entry`] transfers it into
    /// the store.
    pub fn create_entry(&mut self, id: &[u8]) -> Entry {
        let now = self.clock.now_ms();
        Entry::new(id.to_vec(), now)
    }

    /// Inserts a detached entry.
    ///
    /// Fails with [`EntryExists`] when an entry with an identical id is
    /// already present; the store is left unchanged and the rejected entry
    /// is returned inside the error.
    pub fn add_entry(&mut self, entry: Entry) -> Result<(), EntryExists> {
        if self.data.position(entry.id()).is_some() {
            return Err(EntryExists(entry));
        }
        log::trace!("adding entry ({} bytes of id)", entry.id().len());
        self.data.entries.push(entry);
        self.data.modified_at = self.clock.now_ms();
        Ok(())
    }

    /// A mutable handle to the entry with the given id. Does not update any
    /// timestamp.
    pub fn get_entry(&mut self, id: &[u8]) -> Option<&mut Entry> {
        self.data.entry_mut(id)
    }

    /// Removes and destroys the entry with the given id, wiping all of its
    /// bytes.
    pub fn remove_entry(&mut self, id: &[u8]) -> Result<(), StoreError> {
        let i = self.data.position(id).ok_or(StoreError::NotFound)?;
        // Entry wipes its id, keys and values on drop.
        drop(self.data.entries.remove(i));
        self.data.modified_at = self.clock.now_ms();
        Ok(())
    }

    /// All entries whose fields satisfy every `(key, value)` filter, in
    /// insertion order. An empty filter list returns all entries.
    pub fn get_entries(&self, filters: &[(&str, &[u8])]) -> Vec<&Entry> {
        self.data
            .entries
            .iter()
            .filter(|e| e.matches(filters))
            .collect()
    }

    /// Appends a field to the entry with the given id, stamping the entry
    /// with the current clock.
    pub fn add_field(&mut self, id: &[u8], key: &str, value: &[u8]) -> Result<(), StoreError> {
        let now = self.clock.now_ms();
        let entry = self.data.entry_mut(id).ok_or(StoreError::NotFound)?;
        entry.add_field(key, value, now)
    }

    /// Looks up a field value on the entry with the given id, recording the
    /// access time.
    pub fn get_field(&mut self, id: &[u8], key: &str) -> Result<&[u8], StoreError> {
        let now = self.clock.now_ms();
        let entry = self.data.entry_mut(id).ok_or(StoreError::NotFound)?;
        entry.get_field(key, now).ok_or(StoreError::NotFound)
    }

    /// Replaces a field value on the entry with the given id, wiping the
    /// prior value.
    pub fn update_field(&mut self, id: &[u8], key: &str, value: &[u8]) -> Result<(), StoreError> {
        let now = self.clock.now_ms();
        let entry = self.data.entry_mut(id).ok_or(StoreError::NotFound)?;
        entry.update_field(key, value, now)
    }

    /// Removes a field from the entry with the given id, wiping its value.
    pub fn remove_field(&mut self, id: &[u8], key: &str) -> Result<(), StoreError> {
        let entry = self.data.entry_mut(id).ok_or(StoreError::NotFound)?;
        entry.remove_field(key)
    }
}

impl Debug for Tresor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tresor")
            .field("name", &self.data.name)
            .field("entries", &self.data.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{SeededEntropy, TickingClock};

    fn store() -> Tresor {
        Tresor::with_providers(
            "tresor-tests",
            "DB1",
            Box::new(SeededEntropy::new(1)),
            Box::new(TickingClock::starting_at(1_000)),
        )
    }

    #[test]
    fn test_new_store_is_empty_and_named() {
        let s = store();
        assert_eq!(s.name(), "DB1");
        assert_eq!(s.generator(), "tresor-tests");
        assert!(s.entries().is_empty());
        assert_eq!(s.modified_at(), s.created_at());
    }

    #[test]
    fn test_create_entry_is_detached() {
        let mut s = store();
        let entry = s.create_entry(b"id1");
        assert_eq!(entry.created_at(), entry.modified_at());
        assert_eq!(entry.created_at(), entry.accessed_at());
        assert!(s.entries().is_empty());
        drop(entry);
        assert!(s.get_entries(&[]).is_empty());
    }

    #[test]
    fn test_add_entry_transfers_ownership() {
        let mut s = store();
        let entry = s.create_entry(b"id1");
        s.add_entry(entry).unwrap();
        assert_eq!(s.entries().len(), 1);
        assert!(s.modified_at() > s.created_at());
    }

    #[test]
    fn test_add_entry_rejects_duplicate_id_and_returns_it() {
        let mut s = store();
        let entry = s.create_entry(b"id1");
        s.add_entry(entry).unwrap();
        let modified = s.modified_at();

        let mut dup = s.create_entry(b"id1");
        dup.add_field("k", b"v", 0).unwrap();
        let EntryExists(rejected) = s.add_entry(dup).unwrap_err();
        assert_eq!(rejected.id(), b"id1");
        assert_eq!(rejected.field("k"), Some(b"v".as_slice()));

        // the failed insertion must not mutate the store
        assert_eq!(s.entries().len(), 1);
        assert_eq!(s.modified_at(), modified);
    }

    #[test]
    fn test_get_entry() {
        let mut s = store();
        let entry = s.create_entry(b"id1");
        s.add_entry(entry).unwrap();
        assert!(s.get_entry(b"id1").is_some());
        assert!(s.get_entry(b"id2").is_none());
    }

    #[test]
    fn test_remove_entry() {
        let mut s = store();
        let entry = s.create_entry(b"id1");
        s.add_entry(entry).unwrap();
        s.remove_entry(b"id1").unwrap();
        assert!(s.entries().is_empty());
        assert_eq!(s.remove_entry(b"id1"), Err(StoreError::NotFound));
    }

    #[test]
    fn test_get_entries_filters_conjunctively_in_insertion_order() {
        let mut s = store();
        for (id, kind) in [
            (b"a".as_slice(), b"Passkey".as_slice()),
            (b"b".as_slice(), b"Password".as_slice()),
            (b"c".as_slice(), b"Passkey".as_slice()),
        ] {
            let entry = s.create_entry(id);
            s.add_entry(entry).unwrap();
            s.add_field(id, "Type", kind).unwrap();
        }

        let all = s.get_entries(&[]);
        assert_eq!(all.len(), 3);

        let passkeys = s.get_entries(&[("Type", b"Passkey")]);
        let ids: Vec<&[u8]> = passkeys.iter().map(|e| e.id()).collect();
        assert_eq!(ids, [b"a".as_slice(), b"c"]);

        assert!(s.get_entries(&[("Type", b"Passkey"), ("Missing", b"x")]).is_empty());
    }

    #[test]
    fn test_facade_field_ops_use_the_store_clock() {
        let mut s = store();
        let entry = s.create_entry(b"id1");
        s.add_entry(entry).unwrap();

        s.add_field(b"id1", "UserName", b"alice").unwrap();
        let modified = s.get_entry(b"id1").unwrap().modified_at();
        assert!(modified > 1_000);

        assert_eq!(s.get_field(b"id1", "UserName").unwrap(), b"alice");
        let accessed = s.get_entry(b"id1").unwrap().accessed_at();
        assert!(accessed > modified);

        s.update_field(b"id1", "UserName", b"bob").unwrap();
        assert_eq!(s.get_field(b"id1", "UserName").unwrap(), b"bob");

        s.remove_field(b"id1", "UserName").unwrap();
        assert_eq!(s.get_field(b"id1", "UserName"), Err(StoreError::NotFound));
        assert_eq!(s.add_field(b"id2", "k", b"v"), Err(StoreError::NotFound));
    }

    #[test]
    fn test_timestamp_invariants_hold_after_mutation() {
        let mut s = store();
        let entry = s.create_entry(b"id1");
        s.add_entry(entry).unwrap();
        s.add_field(b"id1", "a", b"1").unwrap();
        s.get_field(b"id1", "a").unwrap();
        s.update_field(b"id1", "a", b"2").unwrap();

        let entry = s.get_entry(b"id1").unwrap();
        assert!(entry.modified_at() >= entry.created_at());
        assert!(entry.accessed_at() >= entry.created_at());
    }

    #[test]
    fn test_seal_open_roundtrip_preserves_everything() {
        let mut s = store();
        for id in [b"first".as_slice(), b"second"] {
            let entry = s.create_entry(id);
            s.add_entry(entry).unwrap();
        }
        s.add_field(b"first", "UserName", b"SugarYourCoffee").unwrap();
        s.add_field(b"first", "URL", b"https://sugaryourcoffee.de").unwrap();
        s.add_field(b"second", "blob", &[0x00, 0xff, 0x07]).unwrap();

        let mut blob = Vec::new();
        s.seal(&mut blob, b"password").unwrap();

        let mut restored = Tresor::open_with_providers(
            &blob,
            b"password",
            Box::new(SeededEntropy::new(2)),
            Box::new(TickingClock::starting_at(9_000)),
        )
        .unwrap();

        assert_eq!(restored.name(), "DB1");
        assert_eq!(restored.generator(), "tresor-tests");
        assert_eq!(restored.entries(), s.entries());
        assert_eq!(restored.entries()[0].id(), b"first");
        assert_eq!(restored.entries()[1].id(), b"second");
        assert_eq!(
            restored.get_field(b"first", "URL").unwrap(),
            b"https://sugaryourcoffee.de"
        );
        assert_eq!(restored.get_field(b"second", "blob").unwrap(), &[0x00, 0xff, 0x07]);
    }

    #[test]
    fn test_open_with_wrong_password_fails() {
        let mut s = store();
        let mut blob = Vec::new();
        s.seal(&mut blob, b"password").unwrap();
        assert!(Tresor::open(&blob, b"Password").is_err());
    }

    #[test]
    fn test_with_algorithms_rejects_unknown_ids() {
        let result = Tresor::with_algorithms(
            "g",
            "n",
            CipherId(77),
            CompressionId::NONE,
            KdfId::ARGON2ID,
            Box::new(SeededEntropy::new(1)),
            Box::new(TickingClock::starting_at(0)),
        );
        assert!(matches!(result, Err(HeaderError::UnsupportedAlgorithm)));
    }
}
