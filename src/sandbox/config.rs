//! Sandbox configuration and per-execution options.

use std::time::Duration;

/// Sandbox-wide defaults applied when a per-call option is unset.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Time limit applied to executions that don't specify one.
    /// `None` means unlimited.
    pub default_time_limit: Option<Duration>,
    /// Whether executions abort on an external interrupt signal by default.
    pub break_on_interrupt: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            default_time_limit: None,
            break_on_interrupt: false,
        }
    }
}

impl SandboxConfig {
    /// Create a new builder for SandboxConfig.
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }
}

/// Builder for creating SandboxConfig instances.
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigBuilder {
    default_time_limit: Option<Duration>,
    break_on_interrupt: Option<bool>,
}

impl SandboxConfigBuilder {
    /// Set the default execution time limit.
    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.default_time_limit = Some(limit);
        self
    }

    /// Set whether executions abort on an external interrupt by default.
    pub fn break_on_interrupt(mut self, enabled: bool) -> Self {
        self.break_on_interrupt = Some(enabled);
        self
    }

    /// Build the SandboxConfig.
    pub fn build(self) -> SandboxConfig {
        let default = SandboxConfig::default();
        SandboxConfig {
            default_time_limit: self.default_time_limit.or(default.default_time_limit),
            break_on_interrupt: self
                .break_on_interrupt
                .unwrap_or(default.break_on_interrupt),
        }
    }
}

/// Options recognized by a single execution call.
///
/// Unset fields fall back to the compiled unit's stored display name and the
/// sandbox's configured defaults. A per-call display name wins for that call
/// only and never persists to subsequent calls.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Display name override for this call's diagnostics.
    pub display_name: Option<String>,
    /// Time limit for this call.
    pub time_limit: Option<Duration>,
    /// Interrupt policy for this call.
    pub break_on_interrupt: Option<bool>,
}

impl ExecOptions {
    /// Options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the display name for this call.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Abort this call once the limit elapses.
    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Whether this call aborts on an external interrupt signal.
    pub fn break_on_interrupt(mut self, enabled: bool) -> Self {
        self.break_on_interrupt = Some(enabled);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.default_time_limit, None);
        assert!(!config.break_on_interrupt);
    }

    #[test]
    fn test_builder() {
        let config = SandboxConfig::builder()
            .time_limit(Duration::from_secs(5))
            .break_on_interrupt(true)
            .build();

        assert_eq!(config.default_time_limit, Some(Duration::from_secs(5)));
        assert!(config.break_on_interrupt);
    }

    #[test]
    fn test_exec_options_chain() {
        let options = ExecOptions::new()
            .display_name("report.calc")
            .time_limit(Duration::from_millis(100))
            .break_on_interrupt(false);

        assert_eq!(options.display_name.as_deref(), Some("report.calc"));
        assert_eq!(options.time_limit, Some(Duration::from_millis(100)));
        assert_eq!(options.break_on_interrupt, Some(false));
    }
}
