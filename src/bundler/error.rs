//! Error types for bundler operations.
//!
//! Provides contextual error chaining, filesystem-specific errors, and the
//! classification the exporter needs to tell a failed target apart from a
//! failed export run.
//!
//! # Example
//!
//! ```no_run
//! # use std::path::Path;
//! use kodegen_bundler_aurora::bundler::{ErrorExt, Result};
//!
//! fn create_specs_dir(path: &Path) -> Result<()> {
//!     std::fs::create_dir_all(path).fs_context("creating SPECS directory", path)?;
//!     Ok(())
//! }
//! ```

use std::{
    fmt::Display,
    io,
    path::{self, PathBuf},
};
use thiserror::Error as DeriveError;

/// Errors returned by the bundler.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "creating staging directory")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// Child process could not be launched.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command that failed to start
        command: String,
        /// The underlying error
        error: io::Error,
    },

    /// Child process ran but exited unsuccessfully.
    ///
    /// Carries the combined stdout/stderr so the failure can be diagnosed
    /// without re-running the export.
    #[error("command `{command}` exited with code {exit_code}\n{output}")]
    ExecutionFailed {
        /// Command line that was executed
        command: String,
        /// Process exit code (-1 when terminated by a signal)
        exit_code: i32,
        /// Combined stdout and stderr
        output: String,
    },

    /// A relative export path walked above the project root.
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// Offending path
        path: String,
        /// Why it could not be resolved
        reason: String,
    },

    /// Export path is not below the SDK's SharedHome or SharedSrc.
    #[error(
        "export path {path} is outside of the SDK shared directories\nSharedHome: {shared_home}\nSharedSrc: {shared_src}"
    )]
    PathOutsideSharedRoots {
        /// Host export path
        path: PathBuf,
        /// Host SharedHome prefix
        shared_home: PathBuf,
        /// Host SharedSrc prefix
        shared_src: PathBuf,
    },

    /// The build engine reported no usable build target.
    #[error("no build targets found for the selected architectures")]
    NoTargetsFound,

    /// The target listing command itself failed.
    #[error("listing build targets failed: {0}")]
    TargetListing(Box<Self>),

    /// Configured template binary does not exist.
    #[error("template binary not found: {0}")]
    TemplateNotFound(PathBuf),

    /// Template binary was built for another architecture.
    #[error("template {path} is built for {detected}, expected {expected}")]
    TemplateArchitectureMismatch {
        /// Template binary
        path: PathBuf,
        /// Architecture of the build target
        expected: String,
        /// Architecture found in the ELF header
        detected: String,
    },

    /// Asset pack export failed.
    #[error("asset pack export failed: {0}")]
    PackExport(String),

    /// Configuration is unusable; raised before any target is attempted.
    #[error("{0}")]
    Preflight(#[from] PreflightError),

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Error walking a directory tree.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// Regular expression error.
    #[error("{0}")]
    RegexError(#[from] regex::Error),

    /// Configuration file could not be parsed.
    #[error("{0}")]
    Toml(#[from] toml::de::Error),

    /// Binary parsing error (ELF analysis).
    #[error("binary parse error: {0}")]
    BinaryParseError(#[from] goblin::error::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Returns true when this error must abort the whole export rather than
    /// only the target being built.
    pub fn is_run_fatal(&self) -> bool {
        match self {
            Error::Preflight(_)
            | Error::PathOutsideSharedRoots { .. }
            | Error::NoTargetsFound
            | Error::TargetListing(_) => true,
            Error::Context(_, inner) => inner.is_run_fatal(),
            _ => false,
        }
    }

    /// Captured output of the failed external command, if any.
    pub fn command_output(&self) -> Option<&str> {
        match self {
            Error::ExecutionFailed { output, .. } => Some(output),
            Error::Context(_, inner) | Error::TargetListing(inner) => inner.command_output(),
            _ => None,
        }
    }
}

/// Configuration problems detected before the pipeline starts.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum PreflightError {
    /// SDK directory does not exist.
    #[error("Aurora SDK not found at {0}")]
    MissingSdk(PathBuf),

    /// `sdk-release` is missing or unparsable.
    #[error("cannot read SDK release file {path}: {reason}")]
    SdkReleaseUnreadable {
        /// Path of the release file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// SDK is older than the minimum supported release.
    #[error("minimum Aurora SDK version is {minimum}, current is {found}")]
    SdkVersionTooOld {
        /// Minimum supported version
        minimum: String,
        /// Version found in `sdk-release`
        found: String,
    },

    /// `sfdk` or the ssh client is missing.
    #[error("transport tool not found: {0}")]
    ToolNotFound(PathBuf),

    /// SSH identity key for the build engine is missing.
    #[error("cannot find the build engine SSH key: {0}")]
    SshKeyMissing(PathBuf),

    /// SharedHome/SharedSrc could not be read from the SDK configuration.
    #[error("cannot read shared directories from {path}: {reason}")]
    SharedPathsUnavailable {
        /// Path of `buildengines.xml`
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// No architecture enabled.
    #[error("select one or more export architectures")]
    NoArchitectures,

    /// Enabled architecture without a usable template.
    #[error("missing export template for {arch}: {reason}")]
    TemplateMissing {
        /// Architecture token
        arch: String,
        /// What is wrong with the template setting
        reason: String,
    },

    /// Package name contains characters outside `[a-z0-9_.-]`.
    #[error("package name '{0}' should be lowercase, only 'a-z', '0-9', '_', '-' and '.' are allowed")]
    InvalidPackageName(String),

    /// Organization not set.
    #[error("organization name should be a reverse domain name, like: org.godot")]
    MissingOrganization,

    /// Application name not set.
    #[error("application name is empty")]
    MissingAppName,

    /// Icon file missing for a required size.
    #[error("icon for {size} not found: {path}")]
    IconMissing {
        /// Icon size label, e.g. "86x86"
        size: String,
        /// Configured path
        path: PathBuf,
    },

    /// Signing enabled but key or certificate missing.
    #[error("signing enabled, but {0}")]
    SigningKeyMissing(String),
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for adding context to errors.
///
/// Similar to `anyhow::Context` but integrated with the bundler's Error type.
/// Works with both `Result<T, E>` and `Option<T>`.
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g., "reading file", "creating directory", "copying binary".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::GenericError`] and returns immediately.
///
/// ```ignore
/// bail!("operation failed");
/// bail!("invalid value: {}", value);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_errors_are_run_fatal() {
        let err = Error::from(PreflightError::NoArchitectures);
        assert!(err.is_run_fatal());
        assert!(Error::NoTargetsFound.is_run_fatal());
    }

    #[test]
    fn test_execution_failure_is_per_target() {
        let err = Error::ExecutionFailed {
            command: "sfdk engine exec sb2".into(),
            exit_code: 1,
            output: "rpmbuild: error".into(),
        };
        assert!(!err.is_run_fatal());
        assert_eq!(err.command_output(), Some("rpmbuild: error"));
    }

    #[test]
    fn test_context_preserves_classification() {
        let result: Result<()> = Err(Error::NoTargetsFound);
        let err = result.context("discovering targets").unwrap_err();
        assert!(err.is_run_fatal());
        assert!(err.to_string().starts_with("discovering targets: "));
    }
}
