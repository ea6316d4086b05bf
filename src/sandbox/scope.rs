//! Binding scopes: the objects sandboxed code sees as its global namespace.
//!
//! A [`Scope`] is a cheap cloneable handle over shared name/value bindings.
//! Clones alias the same underlying table, which is what allows nested
//! executions (and host functions) to refer to the context a run is already
//! executing against. The [`HostScope`] newtype marks the embedder's own true
//! global scope; the executor never tags or wraps it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a scope, shared by all handles cloned from it.
///
/// The context registry keys its per-context state records by this id instead
/// of stashing fields on the scope itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        ScopeId(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric form, mainly for diagnostics.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

struct ScopeInner<V> {
    id: ScopeId,
    bindings: RwLock<HashMap<String, V>>,
}

/// A variable-binding scope usable as the global namespace of an execution.
///
/// Handles are reference-counted; `clone` produces another handle to the same
/// bindings, never a copy of them.
pub struct Scope<V> {
    inner: Arc<ScopeInner<V>>,
}

impl<V> Clone for Scope<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Scope<V> {
    /// Create a new empty scope with a fresh identity.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: ScopeId::next(),
                bindings: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The scope's stable identity.
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    /// Bind `name` to `value`, replacing any previous binding.
    pub fn set(&self, name: impl Into<String>, value: V) {
        self.inner.bindings.write().unwrap().insert(name.into(), value);
    }

    /// Remove a binding, returning its value if present.
    pub fn remove(&self, name: &str) -> Option<V> {
        self.inner.bindings.write().unwrap().remove(name)
    }

    /// Check whether a binding exists.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.bindings.read().unwrap().contains_key(name)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.inner.bindings.read().unwrap().len()
    }

    /// Check if the scope has no bindings.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all current bindings, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.inner.bindings.read().unwrap().keys().cloned().collect()
    }
}

impl<V: Clone> Scope<V> {
    /// Look up a binding.
    pub fn get(&self, name: &str) -> Option<V> {
        self.inner.bindings.read().unwrap().get(name).cloned()
    }
}

impl<V> Default for Scope<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Scope<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("bindings", &self.len())
            .finish()
    }
}

impl<V, S: Into<String>> FromIterator<(S, V)> for Scope<V> {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let scope = Scope::new();
        {
            let mut bindings = scope.inner.bindings.write().unwrap();
            for (name, value) in iter {
                bindings.insert(name.into(), value);
            }
        }
        scope
    }
}

/// The embedder's true global scope.
///
/// Passed to the sandbox explicitly rather than reached through an ambient
/// singleton. While a context's isolation boundary is installed, unresolved
/// lookups inside that context fall through to these bindings; the host scope
/// itself is never marked as a context and never gets a fallback of its own.
pub struct HostScope<V> {
    scope: Scope<V>,
}

impl<V> Clone for HostScope<V> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope.clone(),
        }
    }
}

impl<V> HostScope<V> {
    /// Create an empty host scope.
    pub fn new() -> Self {
        Self { scope: Scope::new() }
    }

    /// Bind a host global.
    pub fn set(&self, name: impl Into<String>, value: V) {
        self.scope.set(name, value);
    }

    /// Remove a host global, returning its value if present.
    pub fn remove(&self, name: &str) -> Option<V> {
        self.scope.remove(name)
    }

    /// Check whether a host global exists.
    pub fn contains(&self, name: &str) -> bool {
        self.scope.contains(name)
    }

    /// Number of host globals.
    pub fn len(&self) -> usize {
        self.scope.len()
    }

    /// Check if the host scope has no bindings.
    pub fn is_empty(&self) -> bool {
        self.scope.is_empty()
    }

    pub(crate) fn scope(&self) -> &Scope<V> {
        &self.scope
    }
}

impl<V: Clone> HostScope<V> {
    /// Look up a host global.
    pub fn get(&self, name: &str) -> Option<V> {
        self.scope.get(name)
    }
}

impl<V> Default for HostScope<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for HostScope<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostScope")
            .field("id", &self.scope.id())
            .field("bindings", &self.scope.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let scope: Scope<i64> = Scope::new();
        assert!(scope.is_empty());

        scope.set("x", 5);
        assert_eq!(scope.get("x"), Some(5));
        assert!(scope.contains("x"));
        assert_eq!(scope.len(), 1);

        scope.set("x", 6);
        assert_eq!(scope.get("x"), Some(6));
        assert_eq!(scope.len(), 1);

        assert_eq!(scope.remove("x"), Some(6));
        assert!(scope.get("x").is_none());
    }

    #[test]
    fn test_clones_share_bindings() {
        let scope: Scope<i64> = Scope::new();
        let alias = scope.clone();

        scope.set("shared", 1);
        assert_eq!(alias.get("shared"), Some(1));
        assert_eq!(alias.id(), scope.id());
    }

    #[test]
    fn test_distinct_scopes_have_distinct_ids() {
        let a: Scope<i64> = Scope::new();
        let b: Scope<i64> = Scope::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_from_iterator() {
        let scope: Scope<i64> = [("x", 5), ("y", 7)].into_iter().collect();
        assert_eq!(scope.get("x"), Some(5));
        assert_eq!(scope.get("y"), Some(7));
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn test_host_scope_bindings() {
        let host: HostScope<i64> = HostScope::new();
        host.set("answer", 42);
        assert_eq!(host.get("answer"), Some(42));
        assert_eq!(host.len(), 1);
    }
}
