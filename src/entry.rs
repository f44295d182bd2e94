// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Entries and their fields.
//!
//! An [`Entry`] is a uniquely identified record holding an ordered list of
//! key/value [`Field`]s. The entry exclusively owns every byte of its id,
//! keys and values; all of them are wiped when the entry is dropped or a
//! value is replaced or removed.

use std::fmt::{self, Debug, Formatter};
use std::mem;

use serde::{Deserialize, Serialize};
use thiserror::Error as DeriveError;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Failure of an entry or field operation on the store.
#[derive(Debug, DeriveError, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// An entry or field with the same identifier already exists.
    #[error("identifier already present")]
    Duplicate,

    /// No entry or field with the given identifier exists.
    #[error("identifier not present")]
    NotFound,
}

/// A single key/value pair inside an [`Entry`].
///
/// The key is text and compared byte-exactly, without case folding or
/// normalization. The value may carry arbitrary bytes and is stored as a
/// byte string on the wire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Field {
    pub(crate) key: String,
    #[serde(with = "serde_bytes")]
    pub(crate) value: Vec<u8>,
}

impl Field {
    /// The field key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The field value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

impl Debug for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("key", &self.key)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// A record of fields addressed by a stable byte identifier.
///
/// Entries are constructed by [`crate::Tresor::create_entry`] and mutated
/// only through the operations below. Timestamps are signed milliseconds
/// since the Unix epoch; `modified_at` and `accessed_at` never precede
/// `created_at`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Entry {
    #[serde(with = "serde_bytes")]
    pub(crate) id: Vec<u8>,
    pub(crate) created_at: i64,
    pub(crate) modified_at: i64,
    pub(crate) accessed_at: i64,
    pub(crate) fields: Vec<Field>,
}

impl Entry {
    pub(crate) fn new(id: Vec<u8>, now: i64) -> Self {
        Self {
            id,
            created_at: now,
            modified_at: now,
            accessed_at: now,
            fields: Vec::new(),
        }
    }

    /// The entry identifier.
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// Creation timestamp in milliseconds.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Timestamp of the last field addition or update, in milliseconds.
    pub fn modified_at(&self) -> i64 {
        self.modified_at
    }

    /// Timestamp of the last field lookup through [`Entry::get_field`], in
    /// milliseconds. Reads through [`Entry::field`] or iteration are not
    /// observed.
    pub fn accessed_at(&self) -> i64 {
        self.accessed_at
    }

    /// The fields in insertion order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Appends a new field, copying the value into entry-owned storage.
    ///
    /// Fails with [`StoreError::Duplicate`] if `key` is already present, in
    /// which case the entry is left untouched.
    pub fn add_field(&mut self, key: &str, value: &[u8], now: i64) -> Result<(), StoreError> {
        if self.position(key).is_some() {
            return Err(StoreError::Duplicate);
        }
        self.fields.push(Field {
            key: key.to_owned(),
            value: value.to_vec(),
        });
        self.modified_at = now;
        Ok(())
    }

    /// Looks up a field value and records the access time.
    ///
    /// `accessed_at` only moves forward, so a caller with a stale clock
    /// cannot rewind it.
    pub fn get_field(&mut self, key: &str, now: i64) -> Option<&[u8]> {
        let i = self.position(key)?;
        self.accessed_at = self.accessed_at.max(now);
        Some(&self.fields[i].value)
    }

    /// A read-only view of a field value. Does not touch `accessed_at`.
    pub fn field(&self, key: &str) -> Option<&[u8]> {
        self.fields.iter().find(|f| f.key == key).map(|f| f.value.as_slice())
    }

    /// Replaces the value of an existing field.
    ///
    /// Fails with [`StoreError::NotFound`] when the key is absent. The prior
    /// value bytes are zeroed before their memory is released.
    pub fn update_field(&mut self, key: &str, value: &[u8], now: i64) -> Result<(), StoreError> {
        let i = self.position(key).ok_or(StoreError::NotFound)?;
        let mut prior = mem::replace(&mut self.fields[i].value, value.to_vec());
        prior.zeroize();
        self.modified_at = now;
        Ok(())
    }

    /// Removes a field by key, zeroing its value.
    pub fn remove_field(&mut self, key: &str) -> Result<(), StoreError> {
        let i = self.position(key).ok_or(StoreError::NotFound)?;
        // Field wipes its key and value on drop.
        drop(self.fields.remove(i));
        Ok(())
    }

    /// `true` if for every `(key, value)` filter the entry contains a field
    /// with that exact key and exact value.
    pub fn matches(&self, filters: &[(&str, &[u8])]) -> bool {
        filters.iter().all(|(key, value)| self.field(key) == Some(*value))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.key == key)
    }
}

impl Debug for Entry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("modified_at", &self.modified_at)
            .field("accessed_at", &self.accessed_at)
            .field("fields", &self.fields)
            .finish()
    }
}
