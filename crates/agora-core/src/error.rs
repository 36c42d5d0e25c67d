//! Error types for engine configuration and lifecycle hooks.

use thiserror::Error;

/// Errors raised while loading or validating a simulation configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The configuration parsed but describes an unrunnable simulation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yml::Error),
}

/// A fault inside a lifecycle hook.
///
/// Hook faults are contained by the manager and recorded as failed
/// hook results; they never abort a tick.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook could not complete its work.
    #[error("{0}")]
    Failed(String),

    /// The hook produced data it could not serialize.
    #[error("hook serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HookError {
    /// Shorthand for a free-form hook failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
