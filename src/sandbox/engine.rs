//! The collaborator contract between the sandbox and an execution engine.
//!
//! The sandbox does none of the parsing, compiling, or interpreting itself;
//! all of that lives behind [`ScriptEngine`]. Any substitute engine must match
//! this contract exactly: compilation fails on invalid source, execution fails
//! on runtime faults, timeouts, and interrupts, and name resolution follows
//! the two-tier [`ResolutionFrame`] (primary bindings first, then the optional
//! fallback).

use std::time::Duration;

use crate::error::Result;
use crate::sandbox::scope::Scope;

/// Per-execution inputs resolved by the sandbox and forwarded to the engine.
///
/// The display name labels diagnostics and stack traces for this run. The
/// time limit and interrupt policy are advisory: the engine is solely
/// responsible for enforcing them, the sandbox performs no polling of its own.
#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    /// Effective display name for diagnostics, if any.
    pub display_name: Option<&'a str>,
    /// Abort the run once this much wall-clock time has elapsed.
    pub time_limit: Option<Duration>,
    /// Whether an external interrupt signal aborts the run.
    pub break_on_interrupt: bool,
}

impl ExecRequest<'_> {
    /// The display name, or the placeholder used for unnamed units.
    pub fn unit_label(&self) -> &str {
        self.display_name.unwrap_or("<anonymous>")
    }
}

/// Two-tier name resolution for one execution.
///
/// `primary` holds the bindings the run treats as its global object. While a
/// context's isolation boundary is installed, `fallback` carries the host
/// scope so unresolved lookups fall through to real host globals; with no
/// fallback the run is fully isolated. Writes always go to `primary`.
#[derive(Debug)]
pub struct ResolutionFrame<V> {
    /// The bindings acting as the run's global object.
    pub primary: Scope<V>,
    /// Fallback for unresolved lookups, when the boundary is installed.
    pub fallback: Option<Scope<V>>,
}

impl<V> ResolutionFrame<V> {
    /// A frame with no fallback: lookups see `primary` only.
    pub fn isolated(primary: Scope<V>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// A frame whose unresolved lookups fall through to `fallback`.
    pub fn with_fallback(primary: Scope<V>, fallback: Scope<V>) -> Self {
        Self {
            primary,
            fallback: Some(fallback),
        }
    }

    /// Bind `name` in the primary scope. Writes never reach the fallback.
    pub fn assign(&self, name: impl Into<String>, value: V) {
        self.primary.set(name, value);
    }
}

impl<V: Clone> ResolutionFrame<V> {
    /// Resolve a name: primary bindings first, then the fallback.
    pub fn lookup(&self, name: &str) -> Option<V> {
        self.primary
            .get(name)
            .or_else(|| self.fallback.as_ref().and_then(|scope| scope.get(name)))
    }
}

/// An external compile-and-execute engine.
///
/// Implementations own the hard parts: parsing, compiling, and safely running
/// untrusted code. The sandbox only manages contexts around them.
pub trait ScriptEngine {
    /// Compiled representation of source text, reusable across executions.
    /// Opaque to the sandbox.
    type Compiled;

    /// Value produced by an execution. Cloneable so it can be copied out of
    /// binding scopes during resolution.
    type Value: Clone;

    /// Compile source text. Fails with [`SandboxError::Compile`] when the
    /// source is not syntactically valid.
    ///
    /// [`SandboxError::Compile`]: crate::error::SandboxError::Compile
    fn compile(&self, source: &str) -> Result<Self::Compiled>;

    /// Execute a compiled form against the given resolution frame.
    ///
    /// Fails with [`SandboxError::Execution`] on a runtime fault,
    /// [`SandboxError::Timeout`] when the request's time limit is exceeded,
    /// and [`SandboxError::Interrupted`] when an external interrupt fires
    /// while `break_on_interrupt` is set.
    ///
    /// [`SandboxError::Execution`]: crate::error::SandboxError::Execution
    /// [`SandboxError::Timeout`]: crate::error::SandboxError::Timeout
    /// [`SandboxError::Interrupted`]: crate::error::SandboxError::Interrupted
    fn execute(
        &self,
        compiled: &Self::Compiled,
        frame: ResolutionFrame<Self::Value>,
        request: &ExecRequest<'_>,
    ) -> Result<Self::Value>;

    /// Version stamp mixed into cache-artifact invalidation keys. Bump when
    /// compiled forms change incompatibly.
    fn cache_version(&self) -> u32 {
        0
    }
}
