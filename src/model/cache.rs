//! Rewritten-expression cache
//!
//! Keyed by the raw expression, the context selector and index, and the
//! number of nodes the selector matched when the entry was made. A repeat
//! added or removed under the selector changes that count, so stale
//! entries are simply never looked up again.

use crate::xpath::CompiledExpr;
use lru::LruCache;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub expression: String,
    pub selector: Option<String>,
    pub index: usize,
    pub cardinality: usize,
}

/// A rewritten expression, as text and compiled
#[derive(Debug, Clone, PartialEq)]
pub struct CachedExpression {
    pub text: String,
    pub compiled: CompiledExpr,
}

pub struct ExpressionCache {
    entries: LruCache<CacheKey, Rc<CachedExpression>>,
    hits: u64,
    misses: u64,
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionCache {
    pub fn new() -> Self {
        ExpressionCache {
            entries: LruCache::unbounded(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Rc<CachedExpression>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(Rc::clone(entry))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, entry: Rc<CachedExpression>) {
        self.entries.put(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
