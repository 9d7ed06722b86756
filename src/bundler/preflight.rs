//! Pre-flight validation.
//!
//! Everything that can be checked without touching the build engine is checked
//! here, before target discovery, in a fixed order. The first failing check
//! aborts the export; nothing is written to disk.

use crate::bundler::error::{PreflightError, Result};
use crate::bundler::paths::{SharedPathMapping, absolute_path};
use crate::bundler::sdk::{self, SdkRelease, SharedRoots};
use crate::bundler::settings::{Arch, ExportSettings, IconSize, TransportKind};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Instant;

const PACKAGE_NAME_PATTERN: &str = r"^[a-z0-9_.\-]+$";

/// A passed check.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightCheck {
    /// Short name, e.g. "SDK release"
    pub name: String,
    /// What was found
    pub message: String,
    /// Time spent on the check
    pub duration_ms: u64,
}

/// Facts established by a successful pre-flight run.
#[derive(Debug, Clone)]
pub struct PreflightReport {
    /// Parsed `sdk-release`
    pub release: SdkRelease,
    /// Host shared directories
    pub shared_roots: SharedRoots,
    /// Enabled architectures
    pub architectures: Vec<Arch>,
    /// RPM package name
    pub package_name: String,
    /// Absolute export path
    pub export_path: PathBuf,
    /// Checks in the order they ran
    pub checks: Vec<PreflightCheck>,
}

struct Checks {
    done: Vec<PreflightCheck>,
    started: Instant,
}

impl Checks {
    fn new() -> Self {
        Self {
            done: Vec::new(),
            started: Instant::now(),
        }
    }

    fn pass(&mut self, name: &str, message: impl Into<String>) {
        let message = message.into();
        log::debug!("pre-flight: {}: {}", name, message);
        self.done.push(PreflightCheck {
            name: name.to_string(),
            message,
            duration_ms: self.started.elapsed().as_millis() as u64,
        });
        self.started = Instant::now();
    }
}

static PACKAGE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PACKAGE_NAME_PATTERN).expect("package name regex is valid"));

/// Whether `name` only uses `[a-z0-9_.-]`.
pub fn is_valid_package_name(name: &str) -> bool {
    PACKAGE_NAME_RE.is_match(name)
}

/// Runs every check in order and stops at the first failure.
pub fn run(settings: &ExportSettings) -> Result<PreflightReport> {
    let mut checks = Checks::new();

    let architectures = settings.architectures.enabled();
    if architectures.is_empty() {
        return Err(PreflightError::NoArchitectures.into());
    }
    checks.pass(
        "architectures",
        architectures.iter().map(Arch::to_string).collect::<Vec<_>>().join(", "),
    );

    for arch in &architectures {
        let template = settings
            .templates
            .get(*arch)
            .map(|p| settings.resolve_resource(p))
            .ok_or_else(|| PreflightError::TemplateMissing {
                arch: arch.to_string(),
                reason: "no template binary configured".into(),
            })?;
        if !template.is_file() {
            return Err(PreflightError::TemplateMissing {
                arch: arch.to_string(),
                reason: format!("{} does not exist", template.display()),
            }
            .into());
        }
        checks.pass(&format!("{} template", arch), template.display().to_string());
    }

    let sdk_path = &settings.sdk.path;
    if !sdk_path.is_dir() {
        return Err(PreflightError::MissingSdk(sdk_path.clone()).into());
    }
    checks.pass("SDK", sdk_path.display().to_string());

    let release = SdkRelease::read(sdk_path)?;
    checks.pass("SDK release", release.raw_version.clone());

    let tool = match settings.sdk.tool {
        TransportKind::Sfdk => settings.sdk.sfdk_path(),
        TransportKind::Ssh => settings.sdk.ssh_tool_path.clone(),
    };
    if !tool.is_file() {
        return Err(PreflightError::ToolNotFound(tool).into());
    }
    checks.pass("build engine tool", tool.display().to_string());

    if settings.sdk.tool == TransportKind::Ssh {
        let key = settings.sdk.ssh_identity_key();
        if !key.is_file() {
            return Err(PreflightError::SshKeyMissing(key).into());
        }
        checks.pass("ssh key", key.display().to_string());
    }

    let shared_roots = SharedRoots::read(&sdk::resolve_config_root(&settings.sdk, &release))?;
    checks.pass(
        "shared directories",
        format!(
            "SharedHome {}, SharedSrc {}",
            shared_roots.home.display(),
            shared_roots.src.display()
        ),
    );

    for size in IconSize::ALL {
        let configured = settings.icons.get(size).map(|p| settings.resolve_resource(p));
        match configured {
            Some(path) if path.is_file() => {}
            other => {
                return Err(PreflightError::IconMissing {
                    size: size.label(),
                    path: other.unwrap_or_default(),
                }
                .into());
            }
        }
    }
    checks.pass("icons", "all sizes present");

    let package_name = settings.package.package_name();
    if !is_valid_package_name(&package_name) {
        return Err(PreflightError::InvalidPackageName(package_name).into());
    }
    if settings.package.organization.trim().is_empty() {
        return Err(PreflightError::MissingOrganization.into());
    }
    if settings.package.name.trim().is_empty() {
        return Err(PreflightError::MissingAppName.into());
    }
    checks.pass("package name", package_name.clone());

    let export_path = absolute_path(&settings.export.path, &settings.project.path)?;
    SharedPathMapping::identity(&shared_roots.home, &shared_roots.src).to_build_env_path(&export_path)?;
    checks.pass("export path", export_path.display().to_string());

    if settings.signing.enabled {
        check_signing_file("key", settings.signing.key.as_ref(), settings)?;
        check_signing_file("certificate", settings.signing.cert.as_ref(), settings)?;
        checks.pass("signing", "key and certificate present");
    }

    Ok(PreflightReport {
        release,
        shared_roots,
        architectures,
        package_name,
        export_path,
        checks: checks.done,
    })
}

fn check_signing_file(what: &str, path: Option<&PathBuf>, settings: &ExportSettings) -> Result<()> {
    let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
        return Err(PreflightError::SigningKeyMissing(format!("no signing {} configured", what)).into());
    };
    let path = settings.resolve_resource(path);
    if !path.is_file() {
        return Err(PreflightError::SigningKeyMissing(format!(
            "signing {} {} does not exist",
            what,
            path.display()
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::error::Error;
    use std::path::Path;

    #[test]
    fn test_package_name_charset() {
        assert!(is_valid_package_name("ru.example.game_2-beta"));
        assert!(!is_valid_package_name("ru.example.Game"));
        assert!(!is_valid_package_name("ru.example.game!"));
        assert!(!is_valid_package_name("ru example"));
        assert!(!is_valid_package_name(""));
    }

    #[test]
    fn test_no_architectures_checked_first() {
        let settings = ExportSettings::default();
        let err = run(&settings).unwrap_err();
        assert!(matches!(err, Error::Preflight(PreflightError::NoArchitectures)));
        assert!(err.is_run_fatal());
    }

    #[test]
    fn test_missing_template_before_sdk() {
        let settings = ExportSettings::builder()
            .target(Arch::Aarch64, "/nonexistent/template")
            .sdk_path("/nonexistent/sdk")
            .build();
        let err = run(&settings).unwrap_err();
        assert!(matches!(
            err,
            Error::Preflight(PreflightError::TemplateMissing { .. })
        ));
    }

    #[test]
    fn test_missing_sdk() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template");
        std::fs::write(&template, b"bin").unwrap();
        let settings = ExportSettings::builder()
            .target(Arch::Aarch64, &template)
            .sdk_path(dir.path().join("sdk"))
            .build();
        let err = run(&settings).unwrap_err();
        assert!(matches!(err, Error::Preflight(PreflightError::MissingSdk(_))));
    }

    fn sdk_fixture(root: &Path) -> ExportSettings {
        let sdk = root.join("sdk");
        std::fs::create_dir_all(sdk.join("bin")).unwrap();
        std::fs::write(sdk.join("sdk-release"), "SDK_RELEASE=5.1.0\nSDK_CONFIG_DIR=AuroraOS-SDK\n").unwrap();
        std::fs::write(sdk.join("bin/sfdk"), b"").unwrap();
        let config = root.join("config");
        std::fs::create_dir_all(config.join("libsfdk")).unwrap();
        std::fs::write(
            config.join("libsfdk/buildengines.xml"),
            format!(
                r#"<value type="QString" key="SharedHome">{}</value>"#,
                root.display()
            ),
        )
        .unwrap();
        let template = root.join("template");
        std::fs::write(&template, b"bin").unwrap();
        let icon = root.join("icon.png");
        std::fs::write(&icon, b"png").unwrap();

        ExportSettings::builder()
            .sdk_path(&sdk)
            .sdk_config_dir(&config)
            .target(Arch::Aarch64, &template)
            .icon(&icon)
            .package("ru.example", "game", "1.0", 1)
            .project_path(root.join("game"))
            .without_signing()
            .build()
    }

    #[test]
    fn test_complete_configuration_passes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = sdk_fixture(dir.path());
        let report = run(&settings).unwrap();
        assert_eq!(report.package_name, "ru.example.game");
        assert_eq!(report.architectures, vec![Arch::Aarch64]);
        assert_eq!(
            report.export_path,
            dir.path().join("game/export/package.rpm")
        );
        assert_eq!(report.checks.first().unwrap().name, "architectures");
    }

    #[test]
    fn test_res_template_found_in_project() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = sdk_fixture(dir.path());
        std::fs::create_dir_all(dir.path().join("game/templates")).unwrap();
        std::fs::write(dir.path().join("game/templates/aarch64"), b"bin").unwrap();
        settings.templates.set(Arch::Aarch64, "res://templates/aarch64");
        let report = run(&settings).unwrap();
        assert_eq!(report.checks[1].message, dir.path().join("game/templates/aarch64").display().to_string());
    }

    #[test]
    fn test_uppercase_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = sdk_fixture(dir.path());
        settings.package.name = "Game".into();
        let err = run(&settings).unwrap_err();
        assert!(matches!(
            err,
            Error::Preflight(PreflightError::InvalidPackageName(_))
        ));
    }

    #[test]
    fn test_export_outside_shared_roots() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = sdk_fixture(dir.path());
        settings.export.path = "/definitely/not/shared/game.rpm".into();
        let err = run(&settings).unwrap_err();
        assert!(matches!(err, Error::PathOutsideSharedRoots { .. }));
        assert!(err.is_run_fatal());
    }

    #[test]
    fn test_signing_key_required() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = sdk_fixture(dir.path());
        settings.signing.enabled = true;
        let err = run(&settings).unwrap_err();
        assert!(matches!(
            err,
            Error::Preflight(PreflightError::SigningKeyMissing(_))
        ));
    }
}
