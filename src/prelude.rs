//! Prelude module for convenient imports.

pub use crate::error::{Result, SandboxError};
pub use crate::sandbox::{
    config::{ExecOptions, SandboxConfig},
    executor::{CompiledUnit, Sandbox},
    scope::{HostScope, Scope},
};
