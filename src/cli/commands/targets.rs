//! `targets`: pre-flight validation and target discovery.

use super::helpers::{bundler, load_settings};
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;

pub(super) async fn execute_targets(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let settings = load_settings(args)?;
    let (bundler, _) = bundler(settings);
    let targets = bundler.targets(config.output()).await?;

    if matches!(args.command, Command::Targets { json: true, .. }) {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(0);
    }

    for target in &targets {
        config.success_println(&target.to_string());
        config.indent(&format!("template: {}", target.template.display()));
    }
    Ok(0)
}
