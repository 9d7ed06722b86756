//! Command line argument parsing and validation.

use crate::bundler::{Arch, DEFAULT_CONFIG_FILE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Export Godot projects as Aurora OS RPM packages
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_aurora",
    version,
    about = "Export Godot projects as Aurora OS RPM packages",
    long_about = "Build Aurora OS RPM packages from a Godot project through the Aurora SDK build engine.

Usage:
  kodegen_bundler_aurora check
  kodegen_bundler_aurora targets --json
  kodegen_bundler_aurora export --arch aarch64 --debug"
)]
pub struct Args {
    /// Export configuration file
    #[arg(
        long,
        short,
        global = true,
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_FILE,
        env = "AURORA_EXPORT_CONFIG"
    )]
    pub config: PathBuf,

    /// Show build engine output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build one package per resolved target
    Export {
        /// Export a debug pack
        #[arg(long)]
        debug: bool,

        /// Architectures to build (repeatable); replaces the configured set
        #[arg(long = "arch", value_name = "ARCH", value_parser = parse_arch)]
        arch: Vec<Arch>,

        /// Export path of the package, relative to the project root
        #[arg(long, short, value_name = "PATH")]
        output: Option<String>,
    },

    /// Validate the configuration and list the targets that would be built
    Targets {
        /// Print targets as JSON
        #[arg(long)]
        json: bool,

        /// Architectures to resolve (repeatable); replaces the configured set
        #[arg(long = "arch", value_name = "ARCH", value_parser = parse_arch)]
        arch: Vec<Arch>,
    },

    /// Validate the configuration without contacting the build engine
    Check,
}

impl Command {
    /// Subcommand name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Export { .. } => "export",
            Command::Targets { .. } => "targets",
            Command::Check => "check",
        }
    }

    /// Architectures requested on the command line
    pub fn architectures(&self) -> &[Arch] {
        match self {
            Command::Export { arch, .. } | Command::Targets { arch, .. } => arch,
            Command::Check => &[],
        }
    }
}

fn parse_arch(value: &str) -> Result<Arch, String> {
    match Arch::from_token(value) {
        Arch::Unknown => Err(format!(
            "unknown architecture '{}', expected one of: armv7hl, aarch64, x86_64",
            value
        )),
        arch => Ok(arch),
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.config.as_os_str().is_empty() {
            return Err("Configuration path is empty".to_string());
        }
        if let Command::Export {
            output: Some(output),
            ..
        } = &self.command
            && output.trim().is_empty()
        {
            return Err("--output must not be empty".to_string());
        }
        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new() -> Self {
        Self {
            output: super::OutputManager::new(false, false),
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        let quiet = matches!(args.command, Command::Targets { json: true, .. });
        Self {
            output: super::OutputManager::new(args.verbose, quiet),
        }
    }
}

impl RuntimeConfig {
    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}
