//! Address registration and interning for the encoder.
//!
//! Three tables are built per `save`, all mapping a key to the stream offset
//! where that key's encoding begins:
//!
//! - the **value table** keys on structural content ([`ValueKey`]), so two
//!   distinct node instances with equal content resolve to one address;
//! - the **name table** keys on property-name byte content;
//! - the **identity table** keys on [`NodeId`], so equal-content raw-byte
//!   blobs (and collections) keep distinct addresses.
//!
//! Resolving a key that was never registered is an encoder-ordering bug,
//! reported as [`ObjectoidError::Internal`] rather than a caller-facing
//! condition.

use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasherDefault, Hash};

use twox_hash::XxHash64;

use crate::error::{ObjectoidError, Result};
use crate::tree::{NtString, Value};

/// Structural key of a deduplicated value-typed node.
///
/// Variant order encodes the canonical table order: descending tag
/// precedence (text sorts before NT strings), then ascending content.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum ValueKey {
    /// UTF-16-range text content.
    Text(String),
    /// NT byte-string content.
    NtString(NtString),
}

impl ValueKey {
    /// The structural key of a value, for the two deduplicated variants.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Text(text) => Some(Self::Text(text.clone())),
            Value::NtString(nt) => Some(Self::NtString(nt.clone())),
            _ => None,
        }
    }
}

/// One interning table: keys of any one kind to the addresses where their
/// encodings begin.
pub(crate) struct AddressTable<K> {
    map: HashMap<K, u32, BuildHasherDefault<XxHash64>>,
    label: &'static str,
}

impl<K: Eq + Hash + fmt::Debug> AddressTable<K> {
    /// Creates an empty table; `label` names it in internal error messages.
    pub fn new(label: &'static str) -> Self {
        Self {
            map: HashMap::default(),
            label,
        }
    }

    /// Records `address` as the start of `key`'s encoding.
    ///
    /// Returns true iff this is the first registration for an equal key; a
    /// duplicate registration is a no-op. Only valid while the current
    /// stream position is the start of the key's encoding.
    pub fn register(&mut self, key: K, address: u32) -> bool {
        match self.map.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(address);
                true
            }
        }
    }

    /// Resolves the address registered for an equal key.
    pub fn resolve(&self, key: &K) -> Result<u32> {
        self.map.get(key).copied().ok_or_else(|| {
            ObjectoidError::Internal(format!(
                "unregistered reference in {} table: {key:?}",
                self.label
            ))
        })
    }

    /// Number of distinct registered keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }
}
