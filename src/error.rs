//! Error types for the exporter binary.
//!
//! Wraps bundler and CLI failures and attaches actionable recovery suggestions.

use crate::bundler::{Error as BundlerError, PreflightError};
use thiserror::Error;

/// Result type alias for exporter operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Main error type at the binary boundary
#[derive(Error, Debug)]
pub enum ExportError {
    /// Bundler errors
    #[error("{0}")]
    Bundler(#[from] BundlerError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was tried
        path: std::path::PathBuf,
    },

    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl ExportError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ExportError::Cli(CliError::ConfigNotFound { path }) => vec![
                format!("Create {} in the project directory", path.display()),
                "Point to another file with --config <path>".to_string(),
            ],
            ExportError::Bundler(error) => bundler_suggestions(error),
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if this error comes from the configuration rather than the environment
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ExportError::Cli(_) | ExportError::Bundler(BundlerError::Preflight(_) | BundlerError::Toml(_))
        )
    }
}

fn bundler_suggestions(error: &BundlerError) -> Vec<String> {
    match error {
        BundlerError::Context(_, inner) | BundlerError::TargetListing(inner) => {
            bundler_suggestions(inner)
        }
        BundlerError::Preflight(PreflightError::MissingSdk(_)) => vec![
            "Install the Aurora SDK".to_string(),
            "Set [sdk] path in aurora-export.toml to the SDK directory".to_string(),
        ],
        BundlerError::Preflight(PreflightError::SdkVersionTooOld { .. }) => {
            vec!["Update the Aurora SDK with its maintenance tool".to_string()]
        }
        BundlerError::Preflight(PreflightError::ToolNotFound(_)) => vec![
            "Check that the SDK installation contains bin/sfdk".to_string(),
            "Use tool = \"ssh\" in [sdk] to reach the build engine over ssh".to_string(),
        ],
        BundlerError::Preflight(PreflightError::SshKeyMissing(_)) => vec![
            "Start the build engine once from the SDK so it generates its keys".to_string(),
            "Switch to tool = \"sfdk\" in [sdk]".to_string(),
        ],
        BundlerError::Preflight(PreflightError::SharedPathsUnavailable { .. }) => vec![
            "Open the SDK IDE once so it writes libsfdk/buildengines.xml".to_string(),
            "Set [sdk] config_dir to the SDK configuration directory".to_string(),
        ],
        BundlerError::Preflight(PreflightError::NoArchitectures) => {
            vec!["Enable an architecture in [architectures] or pass --arch".to_string()]
        }
        BundlerError::Preflight(PreflightError::InvalidPackageName(_)) => {
            vec!["Use only lowercase letters, digits, '_', '-' and '.' in [package] organization and name".to_string()]
        }
        BundlerError::PathOutsideSharedRoots { .. } => vec![
            "Move the project below the SDK's SharedHome or SharedSrc directory".to_string(),
            "Set [export] path to a location inside a shared directory".to_string(),
        ],
        BundlerError::NoTargetsFound => vec![
            "Install build targets for the selected architectures with the SDK maintenance tool".to_string(),
            "Check that a template is configured for every selected architecture".to_string(),
        ],
        BundlerError::ExecutionFailed { .. } => {
            vec!["Check that the build engine is running: sfdk engine status".to_string()]
        }
        _ => vec!["Check the error message above for specific details".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestions_see_through_context() {
        let error = ExportError::from(BundlerError::Context(
            "discovering targets".into(),
            Box::new(BundlerError::NoTargetsFound),
        ));
        assert!(error.recovery_suggestions()[0].contains("build targets"));
    }

    #[test]
    fn test_configuration_errors() {
        let error = ExportError::from(BundlerError::Preflight(PreflightError::NoArchitectures));
        assert!(error.is_configuration_error());
        assert!(!ExportError::from(BundlerError::NoTargetsFound).is_configuration_error());
    }
}
