//! # Sequence Map
//!
//! A map whose keys each carry a sequence number, with a sliding lower
//! bound. Keys below the bound are rejected on insert and evicted when the
//! bound moves up. Eviction walks a sequence-ordered index, so shifting the
//! window costs time proportional to what is evicted, never a full scan.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

#[derive(Debug)]
pub struct SequenceMap<K, V> {
    lowest_allowed: u64,
    entries: HashMap<K, V>,
    by_sequence: BTreeMap<u64, Vec<K>>,
}

impl<K: Eq + Hash + Clone, V> SequenceMap<K, V> {
    pub fn new(lowest_allowed: u64) -> Self {
        Self {
            lowest_allowed,
            entries: HashMap::new(),
            by_sequence: BTreeMap::new(),
        }
    }

    pub fn lowest_allowed_sequence(&self) -> u64 {
        self.lowest_allowed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Value for `key`, inserting `default()` first if absent.
    ///
    /// Returns `None` without inserting when `sequence` is below the
    /// current lower bound.
    pub fn get_or_insert_with<F>(&mut self, key: K, sequence: u64, default: F) -> Option<&mut V>
    where
        F: FnOnce() -> V,
    {
        if sequence < self.lowest_allowed {
            return None;
        }
        if !self.entries.contains_key(&key) {
            self.by_sequence.entry(sequence).or_default().push(key.clone());
        }
        Some(self.entries.entry(key).or_insert_with(default))
    }

    /// Move the lower bound to `lowest_allowed` and evict every key whose
    /// sequence is below it. Returns the number of evicted keys.
    ///
    /// Moving the bound down evicts nothing.
    pub fn shift_window(&mut self, lowest_allowed: u64) -> usize {
        self.lowest_allowed = lowest_allowed;
        let mut evicted = 0;
        while let Some(bucket) = self.by_sequence.first_entry() {
            if *bucket.key() >= lowest_allowed {
                break;
            }
            for key in bucket.remove() {
                if self.entries.remove(&key).is_some() {
                    evicted += 1;
                }
            }
        }
        evicted
    }

    /// Drop every entry. The lower bound is unchanged.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_sequence.clear();
    }
}
