//! Index Module
//!
//! Maps canonical keys (many) to entry ids (one), keeping the reverse
//! mapping needed for bulk cleanup.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use crate::cache::{CanonicalKey, EntryId, EntryStore};
use crate::error::{CacheError, Result};

// == Index ==
/// Canonical key -> entry id mapping.
///
/// `bind` and `unbind` are the only operations that change an entry's
/// reference count, so the count always equals the number of keys here
/// that point at the entry.
#[derive(Debug, Default)]
pub struct Index {
    forward: HashMap<CanonicalKey, EntryId>,
    reverse: HashMap<EntryId, BTreeSet<CanonicalKey>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    // == Lookup ==
    pub fn lookup(&self, key: &CanonicalKey) -> Option<EntryId> {
        self.forward.get(key).copied()
    }

    // == Bind ==
    /// Points `key` at `id`.
    ///
    /// If the key was bound to a different entry, that entry loses one
    /// reference in the same step and its id is returned so the caller can
    /// clean it up once unreferenced. Binding to a missing entry is refused.
    pub fn bind<V: Hash + Eq>(
        &mut self,
        key: CanonicalKey,
        id: EntryId,
        entries: &mut EntryStore<V>,
    ) -> Result<Option<EntryId>> {
        if !entries.contains(id) {
            return Err(CacheError::InvariantViolation(format!(
                "cannot bind '{}' to missing entry {}",
                key, id
            )));
        }

        let previous = match self.forward.get(&key).copied() {
            Some(current) if current == id => return Ok(None),
            Some(current) => {
                self.detach(&key, current, entries);
                Some(current)
            }
            None => None,
        };

        entries.add_reference(id);
        self.reverse.entry(id).or_default().insert(key.clone());
        self.forward.insert(key, id);

        Ok(previous)
    }

    // == Unbind ==
    /// Removes the mapping and releases the target entry's reference.
    pub fn unbind<V: Hash + Eq>(
        &mut self,
        key: &CanonicalKey,
        entries: &mut EntryStore<V>,
    ) -> Option<EntryId> {
        let id = self.forward.remove(key)?;
        self.detach(key, id, entries);
        Some(id)
    }

    fn detach<V: Hash + Eq>(&mut self, key: &CanonicalKey, id: EntryId, entries: &mut EntryStore<V>) {
        if let Some(keys) = self.reverse.get_mut(&id) {
            keys.remove(key);
            if keys.is_empty() {
                self.reverse.remove(&id);
            }
        }
        entries.release_reference(id);
    }

    // == Keys For ==
    /// Every key currently pointing at `id`, in ascending order.
    pub fn keys_for(&self, id: EntryId) -> Vec<CanonicalKey> {
        self.reverse
            .get(&id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn alias_count(&self, id: EntryId) -> usize {
        self.reverse.get(&id).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// All mappings, sorted by key.
    pub fn sorted(&self) -> Vec<(CanonicalKey, EntryId)> {
        let mut pairs: Vec<_> = self.forward.iter().map(|(k, id)| (k.clone(), *id)).collect();
        pairs.sort();
        pairs
    }
}
