//! # kodegen_bundler_aurora
//!
//! Exports Godot projects as Aurora OS RPM packages.
//!
//! The exporter discovers the build targets installed in the Aurora SDK build
//! engine, picks the newest target per requested architecture, and for each
//! one stages the export template, the project's data pack, icons and
//! extension libraries, runs `rpmbuild` inside the target, then signs and
//! validates the package.
//!
//! ## Features
//!
//! - **Two transports**: the SDK's `sfdk` tool or plain ssh into the build engine
//! - **Target resolution**: newest `AuroraOS-x.y.z.w` target per architecture
//! - **Isolation**: a failing target never stops the others
//! - **Untouched project**: setting overrides and extension manifests only reach a shadow copy
//!
//! ## Usage
//!
//! ```bash
//! kodegen_bundler_aurora check                 # Validate aurora-export.toml
//! kodegen_bundler_aurora targets --json        # List the targets that would be built
//! kodegen_bundler_aurora export --arch aarch64 # Build packages
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod bundler;
pub mod cli;
pub mod error;
pub mod project;

// Re-export main types for public API
pub use bundler::{BundledArtifact, Bundler, ExportOutcome, ExportSettings};
pub use cli::Args;
pub use error::{CliError, ExportError, Result};
