use std::collections::HashMap;
use std::sync::Mutex;

use telemetry::InstrumentationScope;

/// Handles issued by a provider, keyed by instrumentation scope.
///
/// Scope equality only looks at name, version and schema URL, so two scopes
/// differing in attributes share a handle.
#[derive(Debug)]
pub(crate) struct ScopeCache<H> {
    handles: Mutex<HashMap<InstrumentationScope, H>>,
}

impl<H: Clone> ScopeCache<H> {
    pub(crate) fn new() -> Self {
        ScopeCache {
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the handle cached for `scope`, creating it with `create` on
    /// first use. A poisoned cache still hands out a fresh, uncached handle.
    pub(crate) fn get_or_insert_with<F>(&self, scope: InstrumentationScope, create: F) -> H
    where
        F: FnOnce(&InstrumentationScope) -> H,
    {
        match self.handles.lock() {
            Ok(mut handles) => handles
                .entry(scope)
                .or_insert_with_key(|scope| create(scope))
                .clone(),
            Err(_) => create(&scope),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn same_scope_returns_same_handle() {
        let cache = ScopeCache::new();
        let a = cache.get_or_insert_with(InstrumentationScope::builder("lib").build(), |s| {
            Arc::new(s.clone())
        });
        let b = cache.get_or_insert_with(
            InstrumentationScope::builder("lib").with_version("").build(),
            |s| Arc::new(s.clone()),
        );
        assert!(Arc::ptr_eq(&a, &b));

        let c = cache.get_or_insert_with(
            InstrumentationScope::builder("lib").with_version("2").build(),
            |s| Arc::new(s.clone()),
        );
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }
}
