// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The secret payload written into the encrypted part of a sealed blob.

use std::fmt::{self, Debug, Formatter};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::entry::Entry;

/// Everything a store persists under encryption: identification of the
/// producing library, the store name, timestamps and the ordered list of
/// entries. Entry ids are pairwise distinct; [`crate::Tresor`] enforces the
/// invariant on insertion.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Data {
    pub(crate) generator: String,
    pub(crate) name: String,
    pub(crate) created_at: i64,
    pub(crate) modified_at: i64,
    pub(crate) entries: Vec<Entry>,
}

impl Data {
    pub(crate) fn new(generator: &str, name: &str, now: i64) -> Self {
        Self {
            generator: generator.to_owned(),
            name: name.to_owned(),
            created_at: now,
            modified_at: now,
            entries: Vec::new(),
        }
    }

    pub(crate) fn position(&self, id: &[u8]) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    pub(crate) fn entry_mut(&mut self, id: &[u8]) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }
}

impl Debug for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("generator", &self.generator)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("modified_at", &self.modified_at)
            .field("entries", &self.entries.len())
            .finish()
    }
}
