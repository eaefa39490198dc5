//! Identity caches.
//!
//! Each cache maps a stable source-side key (a scope, an absolute file path,
//! a mangled type name, a mangled namespace prefix) to the node created for
//! it. Entries are weak: the builder may retire a node at any time, so every
//! read re-validates the handle with [`MetadataBuilder::is_live`] and treats a
//! dead entry as a miss. A miss recomputes and re-caches, so at most one live
//! node exists per key.

use std::borrow::Borrow;
use std::hash::Hash;
use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::metadata::{MetadataBuilder, NodeId};
use crate::source::ScopeId;

/// Hit/miss counters for one cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
    /// Entries found dead on lookup and evicted.
    pub stale: u32,
}

/// Map from key to a validity-checked node handle.
#[derive(Debug)]
pub struct WeakCache<K> {
    entries: FxHashMap<K, NodeId>,
    stats: CacheStats,
}

impl<K> Default for WeakCache<K> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            stats: CacheStats::default(),
        }
    }
}

impl<K: Eq + Hash> WeakCache<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live node for `key`. Dead entries are evicted.
    pub fn get<Q, B>(&mut self, key: &Q, builder: &B) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        B: MetadataBuilder + ?Sized,
    {
        let Some(&node) = self.entries.get(key) else {
            self.stats.misses += 1;
            return None;
        };
        if builder.is_live(node) {
            self.stats.hits += 1;
            Some(node)
        } else {
            tracing::debug!(?node, "evicting stale cache entry");
            self.entries.remove(key);
            self.stats.stale += 1;
            self.stats.misses += 1;
            None
        }
    }

    /// Record `node` for `key`, replacing any previous entry.
    pub fn insert(&mut self, key: K, node: NodeId) {
        self.entries.insert(key, node);
    }

    /// Drop the entry for `key`, if any.
    pub fn remove<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.remove(key);
    }

    /// Return the live node for `key`, or build one with `factory` and cache
    /// it. A failing factory leaves the cache without an entry for `key`.
    pub fn lookup_or_create<B, E>(
        &mut self,
        key: K,
        builder: &mut B,
        factory: impl FnOnce(&mut B) -> Result<NodeId, E>,
    ) -> Result<NodeId, E>
    where
        B: MetadataBuilder + ?Sized,
    {
        if let Some(node) = self.get(&key, &*builder) {
            return Ok(node);
        }
        let node = factory(builder)?;
        self.entries.insert(key, node);
        Ok(node)
    }

    /// Whether an entry exists for `key`, live or not.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Types the session synthesizes itself. Keyed apart from provider mangled
/// names, which may be any string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyntheticType {
    /// The opaque `<unknown>` stand-in for unrepresentable types.
    Placeholder,
    /// Pointer to the opaque runtime type-metadata record.
    TypeMetadata,
}

/// The caches of one debug info session.
#[derive(Debug, Default)]
pub struct IdentityCaches {
    /// Lexical scope to block or subprogram node.
    pub scopes: WeakCache<ScopeId>,
    /// Absolute file path to file node.
    pub files: WeakCache<PathBuf>,
    /// Mangled type name to type node.
    pub types: WeakCache<String>,
    /// Session-synthesized types.
    pub synthetic: WeakCache<SyntheticType>,
    /// Mangled namespace prefix to namespace node.
    pub namespaces: WeakCache<String>,
    /// Linkage name to subprogram.
    pub functions: WeakCache<String>,
}

#[cfg(test)]
mod tests;
