//! Build target discovery and version resolution.
//!
//! `sb2-config -l` prints every scratchbox2 target installed in the build
//! engine, for example:
//!
//! ```text
//! AuroraOS-5.0.0.60-base-aarch64.default
//! AuroraOS-5.0.0.60-base-armv7hl.default
//! AuroraOS-4.0.2.249-base-armv7hl.default
//! ```
//!
//! Only the newest target per requested architecture is built.

use crate::bundler::error::{Error, Result};
use crate::bundler::settings::{Arch, ExportSettings};
use crate::bundler::transport::{OutputEvent, Transport};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

const TARGET_PATTERN: &str =
    r"(AuroraOS)-(\d+)\.(\d+)\.(\d+)\.(\d+)(-base|-MB2)?-(armv7hl|x86_64|aarch64)";

/// One scratchbox2 target of the build engine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BuildTarget {
    /// Platform name, `AuroraOS`
    pub platform: String,
    /// major.minor.patch.build
    pub version: [u32; 4],
    /// Variant qualifier including its dash, e.g. `-base`
    pub variant: Option<String>,
    /// Target architecture
    pub arch: Arch,
    /// Export template binary for this architecture
    pub template: PathBuf,
}

impl BuildTarget {
    /// Target name without the `.default` suffix, e.g. `AuroraOS-5.0.0.60-base-aarch64`.
    pub fn name(&self) -> String {
        let [major, minor, patch, build] = self.version;
        format!(
            "{}-{}.{}.{}.{}{}-{}",
            self.platform,
            major,
            minor,
            patch,
            build,
            self.variant.as_deref().unwrap_or(""),
            self.arch
        )
    }

    /// Name passed to `sb2 -t`.
    pub fn sb2_target(&self) -> String {
        format!("{}.default", self.name())
    }

    /// Dotted version string.
    pub fn version_string(&self) -> String {
        let [major, minor, patch, build] = self.version;
        format!("{major}.{minor}.{patch}.{build}")
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A target line as printed by the build engine, before filtering.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedTarget {
    /// Platform name
    pub platform: String,
    /// 4-part version
    pub version: [u32; 4],
    /// Variant qualifier
    pub variant: Option<String>,
    /// Architecture
    pub arch: Arch,
}

/// Parses target listing lines and keeps the newest target per architecture.
#[derive(Debug)]
pub struct TargetResolver<'a> {
    pattern: Regex,
    settings: &'a ExportSettings,
    best: Vec<BuildTarget>,
}

impl<'a> TargetResolver<'a> {
    /// Resolver for the architectures and templates configured in `settings`.
    pub fn new(settings: &'a ExportSettings) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(TARGET_PATTERN)?,
            settings,
            best: Vec::new(),
        })
    }

    /// Parses one listing line. Lines that are not targets yield `None`.
    pub fn parse_line(&self, line: &str) -> Option<ParsedTarget> {
        let caps = self.pattern.captures(line)?;
        let mut version = [0u32; 4];
        for (slot, index) in version.iter_mut().zip(2..=5) {
            *slot = caps.get(index)?.as_str().parse().ok()?;
        }
        Some(ParsedTarget {
            platform: caps.get(1)?.as_str().to_string(),
            version,
            variant: caps.get(6).map(|m| m.as_str().to_string()),
            arch: Arch::from_token(caps.get(7)?.as_str()),
        })
    }

    /// Feeds one listing line.
    pub fn offer(&mut self, line: &str) {
        let Some(parsed) = self.parse_line(line) else {
            return;
        };

        if !self.settings.architectures.is_enabled(parsed.arch) {
            log::debug!("Skipping {} target: architecture not requested", parsed.arch);
            return;
        }
        let Some(template) = self.settings.templates.get(parsed.arch) else {
            log::debug!("Skipping {} target: no export template", parsed.arch);
            return;
        };

        let candidate = BuildTarget {
            platform: parsed.platform,
            version: parsed.version,
            variant: parsed.variant,
            arch: parsed.arch,
            template: self.settings.resolve_resource(template),
        };

        match self.best.iter_mut().find(|t| t.arch == candidate.arch) {
            Some(current) if candidate.version > current.version => {
                log::debug!("Target {} supersedes {}", candidate, current);
                *current = candidate;
            }
            Some(_) => {}
            None => self.best.push(candidate),
        }
    }

    /// Resolved targets in architecture order. Empty is [`Error::NoTargetsFound`].
    pub fn finish(mut self) -> Result<Vec<BuildTarget>> {
        if self.best.is_empty() {
            return Err(Error::NoTargetsFound);
        }
        self.best.sort_by_key(|t| t.arch);
        Ok(self.best)
    }
}

/// Resolves targets from already captured listing output.
pub fn resolve_targets<'l>(
    lines: impl IntoIterator<Item = &'l str>,
    settings: &ExportSettings,
) -> Result<Vec<BuildTarget>> {
    let mut resolver = TargetResolver::new(settings)?;
    for line in lines {
        resolver.offer(line);
    }
    resolver.finish()
}

/// Lists the build engine's targets and resolves the ones to build.
///
/// `on_line` sees every output line as soon as it arrives.
pub async fn discover_targets<F>(
    transport: &Transport,
    settings: &ExportSettings,
    mut on_line: F,
) -> Result<Vec<BuildTarget>>
where
    F: FnMut(&str),
{
    let mut resolver = TargetResolver::new(settings)?;
    let args = vec!["sb2-config".to_string(), "-l".to_string()];
    let mut stream = transport
        .execute_streaming(&args)
        .await
        .map_err(|e| Error::TargetListing(Box::new(e)))?;

    let mut output = String::new();
    let mut exit_code = None;
    while let Some(event) = stream.next().await {
        match event {
            OutputEvent::Line(line) => {
                log::debug!("sb2-config: {}", line);
                on_line(&line);
                resolver.offer(&line);
                output.push_str(&line);
                output.push('\n');
            }
            OutputEvent::Exited(code) => exit_code = Some(code),
        }
    }

    match exit_code {
        Some(0) => resolver.finish(),
        code => Err(Error::TargetListing(Box::new(Error::ExecutionFailed {
            command: format!("{} sb2-config -l", transport.tool().display()),
            exit_code: code.unwrap_or(-1),
            output,
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(archs: &[Arch]) -> ExportSettings {
        let mut builder = ExportSettings::builder();
        for arch in archs {
            builder = builder.target(*arch, format!("/templates/{arch}"));
        }
        builder.build()
    }

    #[test]
    fn test_parse_line() {
        let settings = settings(&[]);
        let resolver = TargetResolver::new(&settings).unwrap();
        let parsed = resolver
            .parse_line("AuroraOS-5.0.0.60-base-aarch64.default")
            .unwrap();
        assert_eq!(parsed.version, [5, 0, 0, 60]);
        assert_eq!(parsed.variant.as_deref(), Some("-base"));
        assert_eq!(parsed.arch, Arch::Aarch64);
        assert!(resolver.parse_line("Connecting to engine...").is_none());
        assert!(resolver.parse_line("AuroraOS-5.0.0.60-base-mips").is_none());
    }

    #[test]
    fn test_highest_version_wins() {
        let settings = settings(&[Arch::Armv7hl]);
        let targets = resolve_targets(
            [
                "AuroraOS-4.0.2.249-base-armv7hl.default",
                "AuroraOS-5.0.0.60-base-armv7hl.default",
                "AuroraOS-4.9.9.999-armv7hl.default",
            ],
            &settings,
        )
        .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].version, [5, 0, 0, 60]);
        assert_eq!(targets[0].sb2_target(), "AuroraOS-5.0.0.60-base-armv7hl.default");
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let settings = settings(&[Arch::Aarch64]);
        let line = "AuroraOS-5.0.0.60-base-aarch64.default";
        let targets = resolve_targets([line, line, line], &settings).unwrap();
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn test_equal_versions_keep_first_variant() {
        let settings = settings(&[Arch::Aarch64]);
        let targets = resolve_targets(
            [
                "AuroraOS-5.0.0.60-base-aarch64",
                "AuroraOS-5.0.0.60-MB2-aarch64",
            ],
            &settings,
        )
        .unwrap();
        assert_eq!(targets[0].variant.as_deref(), Some("-base"));
    }

    #[test]
    fn test_unrequested_and_templateless_targets_dropped() {
        let mut settings = settings(&[Arch::Aarch64]);
        settings.architectures.x86_64 = true;
        let targets = resolve_targets(
            [
                "AuroraOS-5.0.0.60-base-armv7hl",
                "AuroraOS-5.0.0.60-base-x86_64",
                "AuroraOS-5.0.0.60-base-aarch64",
            ],
            &settings,
        )
        .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].arch, Arch::Aarch64);
        assert_eq!(targets[0].template, PathBuf::from("/templates/aarch64"));
    }

    #[test]
    fn test_res_template_resolves_against_project() {
        let settings = ExportSettings::builder()
            .project_path("/work/game")
            .target(Arch::Armv7hl, "res://templates/linux_aurora.armv7hl")
            .build();
        let targets = resolve_targets(["AuroraOS-5.0.0.60-base-armv7hl"], &settings).unwrap();
        assert_eq!(
            targets[0].template,
            PathBuf::from("/work/game/templates/linux_aurora.armv7hl")
        );
    }

    #[test]
    fn test_no_targets_is_fatal() {
        let settings = settings(&[Arch::Aarch64]);
        let err = resolve_targets(["nothing here"], &settings).unwrap_err();
        assert!(matches!(err, Error::NoTargetsFound));
        assert!(err.is_run_fatal());
    }

    #[test]
    fn test_one_target_per_architecture_for_any_order() {
        let settings = settings(&[Arch::Armv7hl, Arch::Aarch64]);
        let lines = [
            "AuroraOS-1.2.0.3-base-armv7hl",
            "AuroraOS-2.0.0.0-base-aarch64",
            "AuroraOS-1.3.0.0-base-armv7hl",
            "AuroraOS-1.2.0.3-base-armv7hl",
            "AuroraOS-1.10.0.0-base-aarch64",
        ];
        for rotation in 0..lines.len() {
            let mut rotated = lines.to_vec();
            rotated.rotate_left(rotation);
            let targets = resolve_targets(rotated, &settings).unwrap();
            let versions: Vec<_> = targets.iter().map(|t| (t.arch, t.version)).collect();
            assert_eq!(
                versions,
                vec![(Arch::Armv7hl, [1, 3, 0, 0]), (Arch::Aarch64, [2, 0, 0, 0])]
            );
        }
    }
}
