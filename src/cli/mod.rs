//! CLI command implementations

pub mod collect;
pub mod error;

pub use collect::{Cli, CollectArgs, Commands, OutputFormat};
pub use error::CliError;
