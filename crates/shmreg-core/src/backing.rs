//! Secondary index from backing key to the regions aliasing it

use crate::backend::BackingId;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct BackingEntry {
    identity: BackingId,
    refs: usize,
}

/// Tracks which OS object each backing key resolved to and how many live
/// host regions alias it. Every alias of a key must resolve to the same object.
#[derive(Debug, Default)]
pub(crate) struct BackingIndex {
    entries: HashMap<String, BackingEntry>,
}

impl BackingIndex {
    /// Identity already bound to `key`, if any region aliases it
    pub fn identity(&self, key: &str) -> Option<BackingId> {
        self.entries.get(key).map(|e| e.identity)
    }

    /// Whether `identity` may be used for a new alias of `key`
    pub fn admits(&self, key: &str, identity: BackingId) -> bool {
        self.identity(key).map_or(true, |bound| bound == identity)
    }

    pub fn acquire(&mut self, key: &str, identity: BackingId) {
        self.entries
            .entry(key.to_string())
            .and_modify(|e| e.refs += 1)
            .or_insert(BackingEntry { identity, refs: 1 });
    }

    pub fn release(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.refs -= 1;
            if entry.refs == 0 {
                self.entries.remove(key);
            }
        }
    }

    /// Number of live regions aliasing `key`
    pub fn refs(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, |e| e.refs)
    }
}
