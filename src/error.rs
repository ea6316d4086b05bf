//! Error types for the script sandbox.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while compiling or executing sandboxed code.
///
/// Engine failures are surfaced to the caller unmodified; this layer adds no
/// recovery, retry, or suppression of its own.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The source text failed to compile. Carries the engine's diagnostic.
    #[error("compile error: {0}")]
    Compile(String),

    /// The executed code raised a runtime fault. `unit` is the effective
    /// display name of the compiled unit the fault occurred in.
    #[error("execution failed in {unit}: {message}")]
    Execution {
        /// Display name of the unit that faulted.
        unit: String,
        /// The engine's fault description.
        message: String,
    },

    /// The execution exceeded the configured time limit.
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    /// The execution was aborted by an external interrupt signal while the
    /// break-on-interrupt option was set.
    #[error("execution interrupted")]
    Interrupted,

    /// A context operation received an unusable argument, e.g. a scope that
    /// was never marked as a context.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A host function invoked by guest code failed.
    #[error("host function error: {0}")]
    Host(#[source] anyhow::Error),
}

impl SandboxError {
    /// Check if this error represents a compile failure.
    pub fn is_compile(&self) -> bool {
        matches!(self, SandboxError::Compile(_))
    }

    /// Check if this error represents a runtime fault in executed code.
    pub fn is_execution(&self) -> bool {
        matches!(self, SandboxError::Execution { .. })
    }

    /// Check if this error represents a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SandboxError::Timeout(_))
    }

    /// Check if this error represents an external interrupt.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, SandboxError::Interrupted)
    }

    /// Check if this error represents an invalid argument.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, SandboxError::InvalidArgument(_))
    }
}

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_helpers() {
        let timeout = SandboxError::Timeout(Duration::from_secs(5));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_compile());
        assert!(!timeout.is_execution());

        let compile = SandboxError::Compile("unexpected token".to_string());
        assert!(compile.is_compile());
        assert!(!compile.is_timeout());

        let execution = SandboxError::Execution {
            unit: "test.calc".to_string(),
            message: "division by zero".to_string(),
        };
        assert!(execution.is_execution());
        assert!(!execution.is_interrupted());

        assert!(SandboxError::Interrupted.is_interrupted());
        assert!(SandboxError::InvalidArgument("nope".to_string()).is_invalid_argument());
    }

    #[test]
    fn test_execution_display_carries_unit_label() {
        let err = SandboxError::Execution {
            unit: "report.calc".to_string(),
            message: "undefined variable `x`".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("report.calc"));
        assert!(rendered.contains("undefined variable"));
    }
}
