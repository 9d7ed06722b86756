//! Command execution.
//!
//! Each subcommand loads the export configuration, applies command line
//! overrides and drives the [`crate::bundler::Bundler`].

mod check;
mod export;
mod helpers;
mod targets;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;

use check::execute_check;
use export::execute_export;
use targets::execute_targets;

/// Execute the main command based on parsed arguments
///
/// Returns the process exit code: 0 on success, 2 when only some targets
/// were built, 1 on failure.
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);

    let result = match &args.command {
        Command::Export { .. } => execute_export(&args, &config).await,
        Command::Targets { .. } => execute_targets(&args, &config).await,
        Command::Check => execute_check(&args, &config).await,
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            config.error_println(&format!(
                "Command '{}' failed: {}",
                args.command.name(),
                e
            ));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                config.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    config.println(&format!("  • {}", suggestion));
                }
            }

            Ok(1)
        }
    }
}
