use std::collections::btree_map::{self, BTreeMap};

use serde::{Serialize, Serializer};

use crate::error::UnresolvedReason;
use crate::reference::ReferenceDescriptor;

/// A reference that could not be substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedEntry {
    #[serde(flatten)]
    pub descriptor: ReferenceDescriptor,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: UnresolvedReason,
}

fn serialize_reason<S: Serializer>(reason: &UnresolvedReason, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(reason)
}

/// Unresolved references of one resolution, keyed by the original `$ref` string.
///
/// Serializes as `{ "<ref>": { "root": ..., "location": ..., "reason": ... } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UnresolvedRegistry {
    entries: BTreeMap<String, UnresolvedEntry>,
}

impl UnresolvedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. The first failure recorded for a string is kept.
    pub(crate) fn insert(
        &mut self,
        reference: &str,
        descriptor: ReferenceDescriptor,
        reason: UnresolvedReason,
    ) -> bool {
        match self.entries.entry(reference.to_string()) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(vacant) => {
                vacant.insert(UnresolvedEntry { descriptor, reason });
                true
            }
        }
    }

    /// The `{root, location}` pair of an unresolved reference.
    pub fn get(&self, reference: &str) -> Option<&ReferenceDescriptor> {
        self.entries.get(reference).map(|entry| &entry.descriptor)
    }

    pub fn entry(&self, reference: &str) -> Option<&UnresolvedEntry> {
        self.entries.get(reference)
    }

    pub fn reason(&self, reference: &str) -> Option<&UnresolvedReason> {
        self.entries.get(reference).map(|entry| &entry.reason)
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.entries.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in reference-string order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, UnresolvedEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a UnresolvedRegistry {
    type Item = (&'a String, &'a UnresolvedEntry);
    type IntoIter = btree_map::Iter<'a, String, UnresolvedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for UnresolvedRegistry {
    type Item = (String, UnresolvedEntry);
    type IntoIter = btree_map::IntoIter<String, UnresolvedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
