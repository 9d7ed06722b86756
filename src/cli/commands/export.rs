//! `export`: the full pipeline.

use super::helpers::{bundler, load_settings};
use crate::bundler::ExportStatus;
use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;
use crate::project::GodotEditorExporter;

/// Lines of captured command output shown per failed target.
const FAILURE_OUTPUT_LINES: usize = 20;

pub(super) async fn execute_export(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let settings = load_settings(args)?;
    let (bundler, runner) = bundler(settings);
    let exporter = GodotEditorExporter::from_settings(bundler.settings(), runner)?;

    let outcome = bundler.export(&exporter, config.output()).await?;

    for artifact in &outcome.artifacts {
        config.success_println(&format!("{}: {}", artifact.target, artifact.path.display()));
        config.indent(&format!("{} bytes, sha256 {}", artifact.size, artifact.checksum));
    }
    for failure in &outcome.failures {
        let message = failure.error.to_string();
        let summary = message.lines().next().unwrap_or_default();
        config.error_println(&format!("{}: {}", failure.target, summary));
        if let Some(output) = failure.error.command_output() {
            let lines: Vec<&str> = output.lines().collect();
            let start = lines.len().saturating_sub(FAILURE_OUTPUT_LINES);
            for line in &lines[start..] {
                config.indent(line);
            }
        }
    }

    match outcome.status() {
        ExportStatus::Success => {
            config.success_println(&format!(
                "All {} target(s) exported",
                outcome.artifacts.len()
            ));
            Ok(0)
        }
        ExportStatus::Partial { succeeded, total } => {
            config.warning_println(&format!(
                "Partial success: {} of {} target(s) exported",
                succeeded, total
            ));
            Ok(2)
        }
    }
}
