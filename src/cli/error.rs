//! CLI error types and conversions

use crate::collector::CollectError;
use crate::config::ConfigError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),

    /// Collection run failed
    #[error("collection failed: {0}")]
    CollectError(#[from] CollectError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigurationError(_) => 2,
            CliError::CollectError(CollectError::Cancelled) => 130,
            CliError::CollectError(CollectError::Config(_)) => 2,
            _ => 1,
        }
    }
}
