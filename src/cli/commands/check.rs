//! `check`: pre-flight validation only.

use super::helpers::{bundler, load_settings};
use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;

pub(super) async fn execute_check(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let settings = load_settings(args)?;
    let (bundler, _) = bundler(settings);
    let report = bundler.check()?;

    for check in &report.checks {
        config.success_println(&format!("{}: {}", check.name, check.message));
    }
    config.success_println(&format!(
        "Configuration of {} is ready for export",
        report.package_name
    ));
    Ok(0)
}
