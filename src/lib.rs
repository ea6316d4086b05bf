//! # Script Sandbox
//!
//! Compile-once, run-many execution of scripts against isolated contexts.
//!
//! This crate wraps an external compile-and-execute engine (anything
//! implementing [`ScriptEngine`]) and manages everything around it:
//!
//! - **Compiled units**: source text is compiled once into a reusable
//!   [`CompiledUnit`] with an optional display name for diagnostics
//! - **Contexts**: any [`Scope`] can be marked as an execution context and
//!   used as the global object of a run
//! - **Isolation boundary**: while code runs in a context, unresolved name
//!   lookups fall through to the embedder's [`HostScope`]; between runs the
//!   context is fully isolated
//! - **Re-entrancy**: nested executions against the same context are counted
//!   so only the outermost run installs and removes the boundary
//! - **Option plumbing**: per-call display name, time limit, and
//!   interrupt policy, with sandbox-wide defaults
//!
//! ## Example
//!
//! ```rust,ignore
//! use script_sandbox::prelude::*;
//! use script_sandbox::testing::CalcEngine;
//!
//! fn main() -> Result<()> {
//!     let sandbox = Sandbox::new(CalcEngine::new(), SandboxConfig::default());
//!     let unit = sandbox.compile("x * 2", Some("double.calc"))?;
//!
//!     let ctx = sandbox.create_context();
//!     ctx.set("x", 21);
//!
//!     let value = sandbox.execute_in_context(&unit, &ctx, &ExecOptions::new())?;
//!     assert_eq!(value, 42);
//!     Ok(())
//! }
//! ```
//!
//! ## Isolation Model
//!
//! The engine resolves names through a two-tier [`ResolutionFrame`]: the
//! context's own bindings first, then (while the boundary is installed) the
//! host scope. Writes always land in the context, so sandboxed code can read
//! host globals but never mutate them. The boundary is installed when a
//! context's first execution begins and removed when its last execution
//! finishes (on success, error, or panic), while nested runs only move a
//! counter. Execution is synchronous and single-threaded; time limits and
//! interrupts are forwarded to the engine, which is solely responsible for
//! enforcing them.

pub mod error;
pub mod prelude;
pub mod sandbox;
pub mod testing;

// Re-export main types at crate root for convenience
pub use error::{Result, SandboxError};
pub use sandbox::config::{ExecOptions, SandboxConfig, SandboxConfigBuilder};
pub use sandbox::context::{ContextRegistry, RunGuard};
pub use sandbox::engine::{ExecRequest, ResolutionFrame, ScriptEngine};
pub use sandbox::executor::{
    eval_in_context, eval_in_host_context, eval_in_new_context, CompiledUnit, Sandbox,
};
pub use sandbox::scope::{HostScope, Scope, ScopeId};
