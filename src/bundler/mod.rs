//! Aurora OS RPM bundler for Godot projects.
//!
//! Drives the Aurora SDK build engine (through `sfdk` or ssh) to turn a Godot
//! export template plus the project's data pack into one signed RPM per
//! requested CPU architecture.
//!
//! # Configuration
//!
//! Exports are configured in `aurora-export.toml`:
//!
//! ```toml
//! [sdk]
//! path = "/home/user/AuroraOS"
//!
//! [templates]
//! aarch64 = "/home/user/templates/linux_aurora.aarch64"
//!
//! [architectures]
//! aarch64 = true
//!
//! [package]
//! organization = "ru.example"
//! name = "game"
//! ```
//!
//! # Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Pre-flight validation | [`preflight`] |
//! | SDK discovery | [`sdk`] |
//! | Target discovery | [`targets`] |
//! | Per-target assembly | [`platform::aurora`] |
//! | Orchestration | [`Bundler`] |
//!
//! # Integration
//!
//! ```no_run
//! use kodegen_bundler_aurora::bundler::{Arch, Bundler, ExportSettings, NullProgress, ProcessRunner, Transport};
//! use std::sync::Arc;
//!
//! # async fn example() -> kodegen_bundler_aurora::bundler::Result<()> {
//! let settings = ExportSettings::builder()
//!     .sdk_path("/home/user/AuroraOS")
//!     .target(Arch::Aarch64, "/home/user/templates/linux_aurora.aarch64")
//!     .package("ru.example", "game", "1.0.0", 1)
//!     .build();
//! let transport = Transport::from_settings(&settings.sdk, Arc::new(ProcessRunner));
//!
//! let targets = Bundler::new(settings, transport).targets(&NullProgress).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod builder;
pub mod error;
pub mod paths;
pub mod platform;
pub mod preflight;
pub mod progress;
pub mod sdk;
pub mod settings;
pub mod targets;
pub mod transport;
pub(crate) mod utils;

// Public re-exports
pub use builder::{Bundler, ExportOutcome, ExportStatus, TargetFailure};
pub use error::{Context, Error, ErrorExt, PreflightError, Result};
pub use paths::SharedPathMapping;
pub use progress::{LogProgress, NullProgress, ProgressSink, StepProgress};
pub use settings::{
    Arch, ExportSettings, IconSize, Permission, SettingsBuilder, TransportKind,
    DEFAULT_CONFIG_FILE,
};
pub use targets::BuildTarget;
pub use transport::{CommandOutput, CommandRunner, OutputEvent, OutputStream, ProcessRunner, Transport};

/// A produced package.
///
/// # Examples
///
/// ```no_run
/// # use kodegen_bundler_aurora::bundler::ExportOutcome;
/// # fn report(outcome: &ExportOutcome) {
/// for artifact in &outcome.artifacts {
///     println!("{}: {} ({} bytes)", artifact.target, artifact.path.display(), artifact.size);
///     println!("SHA256: {}", artifact.checksum);
/// }
/// # }
/// ```
#[derive(Debug, Clone, serde::Serialize)]
pub struct BundledArtifact {
    /// Target the package was built for.
    pub target: BuildTarget,

    /// Location of the package in the export directory.
    pub path: std::path::PathBuf,

    /// Size of the package in bytes.
    pub size: u64,

    /// SHA-256 checksum of the package.
    pub checksum: String,
}
