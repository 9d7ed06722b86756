//! Shared helpers for subcommands.

use crate::bundler::settings::ArchitectureSettings;
use crate::bundler::{Bundler, CommandRunner, ExportSettings, ProcessRunner, Transport};
use crate::cli::{Args, Command};
use crate::error::{CliError, Result};
use std::sync::Arc;

/// Loads the configuration file and applies command line overrides.
pub(super) fn load_settings(args: &Args) -> Result<ExportSettings> {
    if !args.config.is_file() {
        return Err(CliError::ConfigNotFound {
            path: args.config.clone(),
        }
        .into());
    }
    let mut settings = ExportSettings::load(&args.config)?;
    apply_overrides(&mut settings, &args.command);
    Ok(settings)
}

/// Applies `--arch`, `--debug` and `--output`.
pub(super) fn apply_overrides(settings: &mut ExportSettings, command: &Command) {
    let archs = command.architectures();
    if !archs.is_empty() {
        settings.architectures = ArchitectureSettings::only(archs);
    }
    if let Command::Export { debug, output, .. } = command {
        if *debug {
            settings.export.debug = true;
        }
        if let Some(output) = output {
            settings.export.path = output.clone();
        }
    }
}

/// Bundler talking to the real build engine.
pub(super) fn bundler(settings: ExportSettings) -> (Bundler, Arc<dyn CommandRunner>) {
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    let transport = Transport::from_settings(&settings.sdk, runner.clone());
    (Bundler::new(settings, transport), runner)
}
