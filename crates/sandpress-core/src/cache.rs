//! In-memory grouped read-through object cache
//!
//! Mirrors the shape of a CMS object cache: values live under a
//! `(group, key)` pair, reads can fall through to a loader, and `flush`
//! drops everything at once.

use crate::capability::ObjectCache;
use crate::errors::Result;
use std::collections::HashMap;

/// Grouped read-through cache
#[derive(Debug, Clone)]
pub struct MemoryCache<V> {
    entries: HashMap<(String, String), V>,
    hits: u64,
    misses: u64,
    flushes: u64,
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            flushes: 0,
        }
    }
}

impl<V: Clone> MemoryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value, if present
    pub fn get(&mut self, group: &str, key: &str) -> Option<V> {
        match self.entries.get(&(group.to_string(), key.to_string())) {
            Some(value) => {
                self.hits += 1;
                Some(value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn set(&mut self, group: &str, key: &str, value: V) {
        self.entries
            .insert((group.to_string(), key.to_string()), value);
    }

    /// Remove one entry; returns whether it existed
    pub fn delete(&mut self, group: &str, key: &str) -> bool {
        self.entries
            .remove(&(group.to_string(), key.to_string()))
            .is_some()
    }

    /// Return the cached value or run `load`, caching its result
    ///
    /// Loader errors are returned as-is and nothing is cached.
    pub fn get_or_load<F>(&mut self, group: &str, key: &str, load: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.get(group, key) {
            return Ok(value);
        }
        let value = load()?;
        self.set(group, key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Number of times `flush` has been called
    pub fn flushes(&self) -> u64 {
        self.flushes
    }
}

impl<V> ObjectCache for MemoryCache<V> {
    fn flush(&mut self) {
        self.entries.clear();
        self.flushes += 1;
    }
}
