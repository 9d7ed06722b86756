//! Export orchestration.
//!
//! This module provides the [`Bundler`] orchestrator that runs one export:
//!
//! 1. Pre-flight validation of the [`ExportSettings`]
//! 2. Target discovery through the build engine
//! 3. One [`Assembler`] run per resolved target, each in its own progress sub-range
//! 4. Checksums and sizes of the produced packages, returned as [`BundledArtifact`]s
//!
//! A failing target is recorded and the next one is attempted; only errors
//! that make every target impossible (see [`Error::is_run_fatal`]) end the run.
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_aurora::bundler::{Bundler, ExportSettings, LogProgress, ProcessRunner, Transport};
//! use kodegen_bundler_aurora::project::GodotEditorExporter;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> kodegen_bundler_aurora::bundler::Result<()> {
//! let settings = ExportSettings::load(Path::new("aurora-export.toml"))?;
//! let runner = Arc::new(ProcessRunner);
//! let transport = Transport::from_settings(&settings.sdk, runner.clone());
//! let exporter = GodotEditorExporter::from_settings(&settings, runner)?;
//!
//! let outcome = Bundler::new(settings, transport)
//!     .export(&exporter, &LogProgress)
//!     .await?;
//! for artifact in &outcome.artifacts {
//!     println!("{} ({} bytes, sha256 {})", artifact.path.display(), artifact.size, artifact.checksum);
//! }
//! # Ok(())
//! # }
//! ```

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::platform::aurora::{Assembler, PackageDescriptor, step_count};
use crate::bundler::preflight::{self, PreflightReport};
use crate::bundler::progress::{ProgressSink, StepProgress};
use crate::bundler::sdk;
use crate::bundler::settings::ExportSettings;
use crate::bundler::targets::{self, BuildTarget};
use crate::bundler::transport::Transport;
use crate::bundler::BundledArtifact;
use crate::project::{AssetPackExporter, ProjectSettings};
use std::path::Path;

const TARGETS_FROM: f64 = 20.0;
const TARGETS_SPAN: f64 = 70.0;

/// A target that could not be built.
#[derive(Debug)]
pub struct TargetFailure {
    /// The target
    pub target: BuildTarget,
    /// Why it failed
    pub error: Error,
}

/// Overall result of an export that ran to the end.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportStatus {
    /// Every resolved target produced a package.
    Success,
    /// Some targets failed.
    Partial {
        /// Targets that produced a package
        succeeded: usize,
        /// Resolved targets
        total: usize,
    },
}

/// Packages and failures of one export run.
#[derive(Debug, Default)]
pub struct ExportOutcome {
    /// Produced packages, in build order
    pub artifacts: Vec<BundledArtifact>,
    /// Failed targets, in build order
    pub failures: Vec<TargetFailure>,
}

impl ExportOutcome {
    /// Resolved targets.
    pub fn total(&self) -> usize {
        self.artifacts.len() + self.failures.len()
    }

    /// Success or partial success.
    pub fn status(&self) -> ExportStatus {
        if self.failures.is_empty() {
            ExportStatus::Success
        } else {
            ExportStatus::Partial {
                succeeded: self.artifacts.len(),
                total: self.total(),
            }
        }
    }
}

/// Export orchestrator.
///
/// Holds the run's configuration and build engine transport. Both are fixed
/// for the lifetime of the value.
#[derive(Debug)]
pub struct Bundler {
    settings: ExportSettings,
    transport: Transport,
}

impl Bundler {
    /// Creates an orchestrator for `settings`, reaching the build engine through `transport`.
    pub fn new(settings: ExportSettings, transport: Transport) -> Self {
        Self { settings, transport }
    }

    /// Returns a reference to the export settings.
    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Runs pre-flight validation only.
    pub fn check(&self) -> Result<PreflightReport> {
        preflight::run(&self.settings)
    }

    /// Runs pre-flight validation and target discovery.
    pub async fn targets(&self, progress: &dyn ProgressSink) -> Result<Vec<BuildTarget>> {
        self.check()?;
        self.discover(progress).await
    }

    async fn discover(&self, progress: &dyn ProgressSink) -> Result<Vec<BuildTarget>> {
        let targets = targets::discover_targets(&self.transport, &self.settings, |line| {
            progress.command_output(line)
        })
        .await?;
        for target in &targets {
            log::info!("Build target {} ({})", target, target.template.display());
        }
        Ok(targets)
    }

    /// Runs the whole export.
    ///
    /// Returns `Err` only for failures that stop every target; per-target
    /// failures are collected in [`ExportOutcome::failures`].
    pub async fn export(
        &self,
        exporter: &dyn AssetPackExporter,
        progress: &dyn ProgressSink,
    ) -> Result<ExportOutcome> {
        progress.step(1, "start export");

        progress.step(5, "check export templates");
        let report = self.check()?;
        progress.step(10, "export templates found");

        let mut project = ProjectSettings::load(&self.settings.project.path)?;

        progress.step(20, "check build targets");
        let targets = self.discover(progress).await?;
        let mapping = sdk::probe_shared_mapping(&self.transport, &report.shared_roots).await;

        let assembler = Assembler::new(
            &self.settings,
            &self.transport,
            &mapping,
            exporter,
            &report.export_path,
        );
        let steps = step_count(&self.settings);
        let span = TARGETS_SPAN / targets.len() as f64;
        let mut outcome = ExportOutcome::default();

        for (index, target) in targets.into_iter().enumerate() {
            let from = TARGETS_FROM + span * index as f64;
            let mut step_progress = StepProgress::new(progress, from, span, steps);
            let package = PackageDescriptor::new(target, &self.settings, &project);
            log::info!("Building {} for {}", package.artifact_file_name(), package.target);

            let result = match assembler.assemble(&mut project, &package, &mut step_progress).await {
                Ok(path) => describe_artifact(&path)
                    .await
                    .map(|(size, checksum)| (path, size, checksum)),
                Err(e) => Err(e),
            };

            match result {
                Ok((path, size, checksum)) => {
                    outcome.artifacts.push(BundledArtifact {
                        target: package.target,
                        path,
                        size,
                        checksum,
                    });
                }
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => {
                    log::error!("Target {} failed: {}", package.target, e);
                    outcome.failures.push(TargetFailure {
                        target: package.target,
                        error: e,
                    });
                }
            }
        }

        match outcome.status() {
            ExportStatus::Success => progress.step(100, "all targets build success"),
            ExportStatus::Partial { succeeded, total } => progress.step(
                100,
                &format!("Not all targets built: {} of {} succeeded", succeeded, total),
            ),
        }
        Ok(outcome)
    }
}

/// Size and SHA-256 of a produced package.
async fn describe_artifact(path: &Path) -> Result<(u64, String)> {
    let size = tokio::fs::metadata(path)
        .await
        .fs_context("reading package metadata", path)?
        .len();
    let checksum = calculate_sha256(path).await?;
    Ok((size, checksum))
}

/// SHA-256 of a file as lowercase hex.
async fn calculate_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening package", path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading package", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
