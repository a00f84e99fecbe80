//! Compiled-expression caching.
//!
//! A compiled expression is the one reusable artifact in the kernel: pure
//! in its two context arguments and built once per distinct expression
//! text. This cache lets an embedder share compilations across many
//! respondent-evaluation calls. Thread-safe using `Mutex` for LRU
//! operations; entries never expire because compiled expressions cannot go
//! stale.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::compiler::CompiledExpression;
use crate::error::CompileError;

/// Thread-safe LRU cache of compiled expressions keyed by normalized text.
///
/// # Example
///
/// ```rust
/// use survey_expr_executor::ExpressionCache;
///
/// let cache = ExpressionCache::new(1_000);
///
/// let first = cache.get_or_compile("max(response.Age())").unwrap();
/// // Reformatted copies of one expression share one compilation.
/// let second = cache.get_or_compile("  max(response.Age())\n").unwrap();
/// assert_eq!(cache.len(), 1);
/// assert_eq!(first.ast(), second.ast());
/// ```
pub struct ExpressionCache {
    inner: Mutex<LruCache<String, Arc<CompiledExpression>>>,
}

impl ExpressionCache {
    /// Creates a cache holding at most `max_entries` compiled expressions.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached compilation for `text`, compiling and caching it
    /// on first use. Compilation failures are returned, never cached.
    pub fn get_or_compile(&self, text: &str) -> Result<Arc<CompiledExpression>, CompileError> {
        let key = normalize_expression_key(text);

        if let Ok(mut cache) = self.inner.lock() {
            if let Some(hit) = cache.get(&key) {
                return Ok(Arc::clone(hit));
            }
        }

        let compiled = Arc::new(CompiledExpression::compile(text)?);

        if let Ok(mut cache) = self.inner.lock() {
            cache.put(key, Arc::clone(&compiled));
        }

        Ok(compiled)
    }

    /// Checks if a compilation is cached (without affecting LRU order).
    pub fn contains(&self, text: &str) -> bool {
        let key = normalize_expression_key(text);
        match self.inner.lock() {
            Ok(cache) => cache.contains(&key),
            _ => false,
        }
    }

    /// Number of cached compilations.
    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(cache) => cache.len(),
            _ => 0,
        }
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all cached compilations.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.clear();
        }
    }
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// Normalizes expression text for consistent cache keys: runs of
/// whitespace collapse to a single space and the ends are trimmed, so
/// reformatted copies of one expression map to the same key.
pub fn normalize_expression_key(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_space = true; // Start true to trim leading spaces
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    if result.ends_with(' ') {
        result.pop();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_compiles_once_per_normalized_text() {
        let cache = ExpressionCache::new(10);

        let a = cache.get_or_compile("max(response.Age())").unwrap();
        let b = cache.get_or_compile("  max(response.Age())  ").unwrap();
        let c = cache.get_or_compile("max(response.Age())\n").unwrap();

        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[test]
    fn test_cache_miss_compiles() {
        let cache = ExpressionCache::new(10);
        assert!(!cache.contains("1 + 1"));
        cache.get_or_compile("1 + 1").unwrap();
        assert!(cache.contains("1 + 1"));
        assert!(cache.contains("1  +  1"));
    }

    #[test]
    fn test_compile_errors_are_not_cached() {
        let cache = ExpressionCache::new(10);
        assert!(cache.get_or_compile("import os").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ExpressionCache::new(2);
        cache.get_or_compile("1").unwrap();
        cache.get_or_compile("2").unwrap();
        // Touch "1" so "2" is the eviction candidate.
        cache.get_or_compile("1").unwrap();
        cache.get_or_compile("3").unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("1"));
        assert!(!cache.contains("2"));
        assert!(cache.contains("3"));
    }

    #[test]
    fn test_clear() {
        let cache = ExpressionCache::new(10);
        cache.get_or_compile("1").unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_normalize_expression_key() {
        assert_eq!(normalize_expression_key("  max( x )  "), "max( x )");
        assert_eq!(normalize_expression_key("a  \t\n  b"), "a b");
        assert_eq!(normalize_expression_key(""), "");
        assert_eq!(normalize_expression_key("   "), "");
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let cache = Arc::new(ExpressionCache::new(100));
        let mut handles = vec![];

        for i in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0..20 {
                    let text = format!("{} + {}", i, j);
                    let compiled = cache.get_or_compile(&text).unwrap();
                    assert_eq!(compiled.text(), text);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("thread panicked");
        }
    }
}
