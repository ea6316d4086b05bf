//! Context lifecycle: marking scopes as contexts and tracking the isolation
//! boundary across nested executions.
//!
//! State lives in an explicit per-context record keyed by [`ScopeId`], not in
//! hidden fields on the caller's scope. The boundary is installed exactly when
//! the active-run count goes 0 -> 1 and removed exactly on 1 -> 0; nested runs
//! only move the counter. Executions against one context must be strictly
//! stack-ordered (LIFO) on a single thread; concurrent or interleaved runs
//! against the same context are unsupported.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, SandboxError};
use crate::sandbox::scope::ScopeId;

#[derive(Debug, Default, Clone, Copy)]
struct ContextState {
    /// Set once by `mark`, never cleared.
    is_context: bool,
    /// Number of executions currently in flight against this context.
    active_runs: u32,
    /// Whether unresolved lookups currently fall through to host globals.
    boundary_installed: bool,
}

/// Registry of per-context state records.
///
/// Owns the one nontrivial mechanism of the crate: deciding when a context's
/// fallback link to the host scope is installed and removed.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    states: RwLock<HashMap<ScopeId, ContextState>>,
}

impl ContextRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a scope as a valid execution context. Idempotent.
    pub fn mark(&self, id: ScopeId) {
        let mut states = self.states.write().unwrap();
        states.entry(id).or_default().is_context = true;
    }

    /// Whether the scope has been marked as a context.
    pub fn is_context(&self, id: ScopeId) -> bool {
        let states = self.states.read().unwrap();
        states.get(&id).map(|s| s.is_context).unwrap_or(false)
    }

    /// Begin an execution against a context.
    ///
    /// The outermost run installs the isolation boundary; nested runs only
    /// increment the counter and observe the boundary already installed. The
    /// returned guard reverses the transition when dropped, on every exit
    /// path. Fails with `InvalidArgument` if the scope was never marked.
    pub fn begin_run(&self, id: ScopeId) -> Result<RunGuard<'_>> {
        let mut states = self.states.write().unwrap();
        let state = states
            .get_mut(&id)
            .filter(|s| s.is_context)
            .ok_or_else(|| {
                SandboxError::InvalidArgument(
                    "scope is not marked as a context; call create_context or mark_context first"
                        .to_string(),
                )
            })?;

        state.active_runs += 1;
        if state.active_runs == 1 {
            state.boundary_installed = true;
            #[cfg(feature = "tracing")]
            tracing::debug!(context = id.as_u64(), "isolation boundary installed");
        } else {
            debug_assert!(state.boundary_installed);
        }

        Ok(RunGuard { registry: self, id })
    }

    fn end_run(&self, id: ScopeId) {
        let mut states = self.states.write().unwrap();
        if let Some(state) = states.get_mut(&id) {
            state.active_runs = state.active_runs.saturating_sub(1);
            if state.active_runs == 0 {
                state.boundary_installed = false;
                #[cfg(feature = "tracing")]
                tracing::debug!(context = id.as_u64(), "isolation boundary removed");
            }
        }
    }

    /// Number of executions currently in flight against the context.
    pub fn active_runs(&self, id: ScopeId) -> u32 {
        let states = self.states.read().unwrap();
        states.get(&id).map(|s| s.active_runs).unwrap_or(0)
    }

    /// Whether the context's fallback link to host globals is installed.
    pub fn boundary_installed(&self, id: ScopeId) -> bool {
        let states = self.states.read().unwrap();
        states.get(&id).map(|s| s.boundary_installed).unwrap_or(false)
    }
}

/// Guard for one in-flight execution.
///
/// Dropping it decrements the context's run counter and, when the counter
/// reaches zero, removes the isolation boundary, so cleanup happens whether
/// the engine returned a value, an error, or panicked.
#[must_use = "dropping the guard ends the run; hold it across the engine call"]
pub struct RunGuard<'a> {
    registry: &'a ContextRegistry,
    id: ScopeId,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.registry.end_run(self.id);
    }
}
