//! Bounded memoization of compiled expressions.

use crate::ast::TypedExpr;
use crate::bind::bind_boolean;
use crate::error::FilterError;
use crate::parser::parse;
use crate::schema::Schema;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Process-local LRU of compiled boolean expressions, keyed on
/// `(schema name, schema version, expression text)`. Read-mostly; compile
/// misses populate under the same lock.
pub struct FilterCache {
    entries: Mutex<LruCache<CacheKey, Arc<TypedExpr>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    schema: &'static str,
    version: u32,
    expression: String,
}

impl FilterCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Parse + bind `expression` as a boolean filter, memoized.
    pub fn compile(
        &self,
        schema: &'static Schema,
        expression: &str,
    ) -> Result<Arc<TypedExpr>, FilterError> {
        let key = CacheKey {
            schema: schema.name,
            version: schema.version,
            expression: expression.to_string(),
        };

        {
            let mut entries = self.entries.lock().unwrap();
            if let Some(compiled) = entries.get(&key) {
                return Ok(Arc::clone(compiled));
            }
        }

        let compiled = Arc::new(bind_boolean(&parse(expression)?, schema)?);
        let mut entries = self.entries.lock().unwrap();
        entries.put(key, Arc::clone(&compiled));
        Ok(compiled)
    }
}

impl Default for FilterCache {
    fn default() -> Self {
        // Plenty for the distinct filters a deployment sees in practice.
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn caches_compiled_expressions() {
        let cache = FilterCache::new(8);
        let a = cache.compile(schema::audit(), "verb == 'get'").unwrap();
        let b = cache.compile(schema::audit(), "verb == 'get'").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn schema_is_part_of_the_key() {
        let cache = FilterCache::new(8);
        assert!(cache.compile(schema::audit(), "verb == 'get'").is_ok());
        // Same text against the event schema has no `verb` identifier.
        assert!(matches!(
            cache.compile(schema::event(), "verb == 'get'"),
            Err(FilterError::UnknownField { .. })
        ));
    }

    #[test]
    fn evicts_beyond_capacity() {
        let cache = FilterCache::new(2);
        let first = cache.compile(schema::audit(), "verb == 'a'").unwrap();
        cache.compile(schema::audit(), "verb == 'b'").unwrap();
        cache.compile(schema::audit(), "verb == 'c'").unwrap();
        // 'a' was evicted; recompilation yields a fresh allocation.
        let again = cache.compile(schema::audit(), "verb == 'a'").unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
    }
}
