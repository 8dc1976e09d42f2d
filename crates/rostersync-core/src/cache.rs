//! Read-through cache for term lookups
//!
//! Section messages look up their term far more often than terms change, so
//! the processor keeps found terms here between messages. The cache is never
//! refreshed behind the caller's back: whoever writes a term calls
//! [`TermCache::invalidate_key`] (or [`TermCache::invalidate`]).
//!
//! Not thread-safe; keep one cache per worker.

use indexmap::IndexMap;
use tracing::trace;

use crate::record::{FieldValue, Record, RecordKind};
use crate::store::{NaturalKey, RecordStore, StoreError};

#[derive(Debug, Default)]
pub struct TermCache {
    entries: IndexMap<(String, String), Record>,
    hits: usize,
    misses: usize,
}

impl TermCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Term with the given source id, from the cache or else the store
    ///
    /// Only found terms are cached; a miss is looked up again next time.
    pub fn get(
        &mut self,
        store: &dyn RecordStore,
        sdid: &str,
        source: &str,
    ) -> Result<Option<Record>, StoreError> {
        let cache_key = (sdid.to_string(), source.to_string());
        if let Some(term) = self.entries.get(&cache_key) {
            self.hits += 1;
            return Ok(Some(term.clone()));
        }

        self.misses += 1;
        let key = NaturalKey::new()
            .with("sdid", FieldValue::from(sdid))
            .with("sdidsource", FieldValue::from(source));
        let found = store.find_by_natural_key(RecordKind::Term, &key)?;
        if let Some(term) = &found {
            trace!("Caching term {}/{}", source, sdid);
            self.entries.insert(cache_key, term.clone());
        }
        Ok(found)
    }

    /// Drop every cached term
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    /// Drop one cached term
    pub fn invalidate_key(&mut self, sdid: &str, source: &str) {
        self.entries
            .shift_remove(&(sdid.to_string(), source.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}
