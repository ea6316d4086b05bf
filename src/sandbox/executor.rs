//! Compiling source text and executing the result against contexts.

use crate::error::Result;
use crate::sandbox::artifact;
use crate::sandbox::config::{ExecOptions, SandboxConfig};
use crate::sandbox::context::ContextRegistry;
use crate::sandbox::engine::{ExecRequest, ResolutionFrame, ScriptEngine};
use crate::sandbox::scope::{HostScope, Scope};

/// A compiled, reusable executable unit.
///
/// Produced once per source text by [`Sandbox::compile`], executed any number
/// of times. The stored display name labels diagnostics unless a call-level
/// override is given.
pub struct CompiledUnit<E: ScriptEngine> {
    form: E::Compiled,
    display_name: Option<String>,
    source_hash: [u8; 32],
    engine_cache_version: u32,
}

impl<E: ScriptEngine> CompiledUnit<E> {
    /// The display name stored at compile time, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Produce the unit's cache artifact.
    ///
    /// The artifact is a deterministic identification record (see
    /// [`crate::sandbox::artifact`]); it cannot be turned back into a
    /// `CompiledUnit`.
    pub fn cache_artifact(&self) -> Vec<u8> {
        artifact::encode(self.engine_cache_version, &self.source_hash)
    }

    /// Execute this unit against a marked context. See
    /// [`Sandbox::execute_in_context`].
    pub fn run_in_context(
        &self,
        sandbox: &Sandbox<E>,
        scope: &Scope<E::Value>,
        options: &ExecOptions,
    ) -> Result<E::Value> {
        sandbox.execute_in_context(self, scope, options)
    }

    /// Mark `scope` as a context, then execute this unit against it. See
    /// [`Sandbox::execute_in_new_context`].
    pub fn run_in_new_context(
        &self,
        sandbox: &Sandbox<E>,
        scope: &Scope<E::Value>,
        options: &ExecOptions,
    ) -> Result<E::Value> {
        sandbox.execute_in_new_context(self, scope, options)
    }

    /// Execute this unit directly against the host scope. See
    /// [`Sandbox::execute_in_host_context`].
    pub fn run_in_host_context(&self, sandbox: &Sandbox<E>, options: &ExecOptions) -> Result<E::Value> {
        sandbox.execute_in_host_context(self, options)
    }
}

impl<E: ScriptEngine> std::fmt::Debug for CompiledUnit<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("display_name", &self.display_name)
            .field("engine_cache_version", &self.engine_cache_version)
            .finish()
    }
}

/// A sandboxed execution environment over an engine.
///
/// Owns the engine, the embedder's host scope, the context registry, and the
/// configured defaults. All methods take `&self`; handles returned from it
/// (scopes, compiled units) stay valid for the sandbox's lifetime.
pub struct Sandbox<E: ScriptEngine> {
    engine: E,
    host: HostScope<E::Value>,
    contexts: ContextRegistry,
    config: SandboxConfig,
}

impl<E: ScriptEngine> Sandbox<E> {
    /// Create a sandbox with a fresh, empty host scope.
    pub fn new(engine: E, config: SandboxConfig) -> Self {
        Self::with_host(engine, HostScope::new(), config)
    }

    /// Create a sandbox around an explicit host scope handle.
    pub fn with_host(engine: E, host: HostScope<E::Value>, config: SandboxConfig) -> Self {
        Self {
            engine,
            host,
            contexts: ContextRegistry::new(),
            config,
        }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The embedder's host scope.
    pub fn host(&self) -> &HostScope<E::Value> {
        &self.host
    }

    /// The configured defaults.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Compile source text into a reusable unit.
    ///
    /// `display_name` is stored on the unit and labels diagnostics of later
    /// executions unless overridden per call.
    pub fn compile(&self, source: &str, display_name: Option<&str>) -> Result<CompiledUnit<E>> {
        let form = self.engine.compile(source)?;
        Ok(CompiledUnit {
            form,
            display_name: display_name.map(str::to_owned),
            source_hash: artifact::source_hash(source),
            engine_cache_version: self.engine.cache_version(),
        })
    }

    /// Create an empty scope already marked as an execution context.
    pub fn create_context(&self) -> Scope<E::Value> {
        let scope = Scope::new();
        self.contexts.mark(scope.id());
        scope
    }

    /// Mark an existing scope as a valid execution context. Idempotent.
    pub fn mark_context(&self, scope: &Scope<E::Value>) {
        self.contexts.mark(scope.id());
    }

    /// Whether the scope has been marked as a context.
    pub fn is_context(&self, scope: &Scope<E::Value>) -> bool {
        self.contexts.is_context(scope.id())
    }

    /// Number of executions currently in flight against the context.
    /// Zero whenever no run is active. Mainly for diagnostics and tests.
    pub fn active_runs(&self, scope: &Scope<E::Value>) -> u32 {
        self.contexts.active_runs(scope.id())
    }

    /// Whether the context's fallback link to host globals is currently
    /// installed. Mainly for diagnostics and tests.
    pub fn boundary_installed(&self, scope: &Scope<E::Value>) -> bool {
        self.contexts.boundary_installed(scope.id())
    }

    /// Execute a compiled unit against a marked context.
    ///
    /// The outermost execution installs the context's isolation boundary so
    /// unresolved lookups fall through to host globals; nested executions
    /// against the same context reuse it. The boundary is removed again when
    /// the outermost execution finishes, on success and failure alike.
    /// Fails with `InvalidArgument` if the scope was never marked.
    pub fn execute_in_context(
        &self,
        unit: &CompiledUnit<E>,
        scope: &Scope<E::Value>,
        options: &ExecOptions,
    ) -> Result<E::Value> {
        let _guard = self.contexts.begin_run(scope.id())?;
        let request = self.request(unit, options);
        #[cfg(feature = "tracing")]
        tracing::trace!(
            unit = request.unit_label(),
            context = scope.id().as_u64(),
            "executing in context"
        );
        let frame = ResolutionFrame::with_fallback(scope.clone(), self.host.scope().clone());
        self.engine.execute(&unit.form, frame, &request)
    }

    /// Mark `scope` as a context, then execute against it.
    pub fn execute_in_new_context(
        &self,
        unit: &CompiledUnit<E>,
        scope: &Scope<E::Value>,
        options: &ExecOptions,
    ) -> Result<E::Value> {
        self.mark_context(scope);
        self.execute_in_context(unit, scope, options)
    }

    /// Execute directly against the embedder's host scope.
    ///
    /// No isolation boundary is involved and no run counting happens: the
    /// host global is never wrapped.
    pub fn execute_in_host_context(
        &self,
        unit: &CompiledUnit<E>,
        options: &ExecOptions,
    ) -> Result<E::Value> {
        let request = self.request(unit, options);
        #[cfg(feature = "tracing")]
        tracing::trace!(unit = request.unit_label(), "executing in host context");
        let frame = ResolutionFrame::isolated(self.host.scope().clone());
        self.engine.execute(&unit.form, frame, &request)
    }

    /// Resolve effective per-call inputs: call-level options first, then the
    /// unit's stored display name, then the configured defaults.
    fn request<'a>(&'a self, unit: &'a CompiledUnit<E>, options: &'a ExecOptions) -> ExecRequest<'a> {
        ExecRequest {
            display_name: options
                .display_name
                .as_deref()
                .or(unit.display_name.as_deref()),
            time_limit: options.time_limit.or(self.config.default_time_limit),
            break_on_interrupt: options
                .break_on_interrupt
                .unwrap_or(self.config.break_on_interrupt),
        }
    }
}

/// Compile `source` and run it against a marked context.
pub fn eval_in_context<E: ScriptEngine>(
    sandbox: &Sandbox<E>,
    source: &str,
    scope: &Scope<E::Value>,
    options: &ExecOptions,
) -> Result<E::Value> {
    let unit = sandbox.compile(source, options.display_name.as_deref())?;
    sandbox.execute_in_context(&unit, scope, options)
}

/// Compile `source`, mark `scope` as a context, and run against it.
pub fn eval_in_new_context<E: ScriptEngine>(
    sandbox: &Sandbox<E>,
    source: &str,
    scope: &Scope<E::Value>,
    options: &ExecOptions,
) -> Result<E::Value> {
    let unit = sandbox.compile(source, options.display_name.as_deref())?;
    sandbox.execute_in_new_context(&unit, scope, options)
}

/// Compile `source` and run it directly against the host scope.
pub fn eval_in_host_context<E: ScriptEngine>(
    sandbox: &Sandbox<E>,
    source: &str,
    options: &ExecOptions,
) -> Result<E::Value> {
    let unit = sandbox.compile(source, options.display_name.as_deref())?;
    sandbox.execute_in_host_context(&unit, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CalcEngine;

    fn sandbox() -> Sandbox<CalcEngine> {
        Sandbox::new(CalcEngine::new(), SandboxConfig::default())
    }

    #[test]
    fn test_compile_and_run_in_host_context() {
        let sandbox = sandbox();
        let unit = sandbox.compile("1+1", None).unwrap();
        assert_eq!(unit.run_in_host_context(&sandbox, &ExecOptions::new()).unwrap(), 2);
    }

    #[test]
    fn test_compile_error_propagates_diagnostic() {
        let sandbox = sandbox();
        let err = sandbox.compile("1 +", None).err().expect("must not compile");
        assert!(err.is_compile());
    }

    #[test]
    fn test_unit_is_reusable_across_executions() {
        let sandbox = sandbox();
        let unit = sandbox.compile("x * 2", None).unwrap();

        let first = sandbox.create_context();
        first.set("x", 3);
        let second = sandbox.create_context();
        second.set("x", 10);

        assert_eq!(sandbox.execute_in_context(&unit, &first, &ExecOptions::new()).unwrap(), 6);
        assert_eq!(sandbox.execute_in_context(&unit, &second, &ExecOptions::new()).unwrap(), 20);
    }

    #[test]
    fn test_execute_rejects_unmarked_scope() {
        let sandbox = sandbox();
        let unit = sandbox.compile("1", None).unwrap();
        let scope = Scope::new();

        let err = sandbox
            .execute_in_context(&unit, &scope, &ExecOptions::new())
            .err()
            .expect("unmarked scope must be rejected");
        assert!(err.is_invalid_argument());

        // execute_in_new_context marks first, so the same scope then works.
        assert_eq!(
            sandbox.execute_in_new_context(&unit, &scope, &ExecOptions::new()).unwrap(),
            1
        );
    }

    #[test]
    fn test_mark_and_is_context() {
        let sandbox = sandbox();
        let created = sandbox.create_context();
        assert!(sandbox.is_context(&created));

        let plain = Scope::new();
        assert!(!sandbox.is_context(&plain));
        sandbox.mark_context(&plain);
        assert!(sandbox.is_context(&plain));
    }

    #[test]
    fn test_host_context_skips_run_counting() {
        let sandbox = sandbox();
        let unit = sandbox.compile("h = 5; h", None).unwrap();
        assert_eq!(sandbox.execute_in_host_context(&unit, &ExecOptions::new()).unwrap(), 5);
        assert_eq!(sandbox.host().get("h"), Some(5));
    }

    #[test]
    fn test_eval_conveniences() {
        let sandbox = sandbox();
        let scope = Scope::new();
        scope.set("a", 4);

        assert_eq!(
            eval_in_new_context(&sandbox, "a + 1", &scope, &ExecOptions::new()).unwrap(),
            5
        );
        assert_eq!(
            eval_in_context(&sandbox, "a + 2", &scope, &ExecOptions::new()).unwrap(),
            6
        );
        assert_eq!(eval_in_host_context(&sandbox, "2 * 21", &ExecOptions::new()).unwrap(), 42);
    }

    #[test]
    fn test_cache_artifact_identifies_unit() {
        let sandbox = sandbox();
        let a = sandbox.compile("1+1", None).unwrap();
        let b = sandbox.compile("1+1", Some("b.calc")).unwrap();
        let c = sandbox.compile("1+2", None).unwrap();

        // Same source, same key; the display name plays no part.
        assert_eq!(a.cache_artifact(), b.cache_artifact());
        assert_ne!(a.cache_artifact(), c.cache_artifact());
    }
}
