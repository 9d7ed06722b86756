//! Per-target package assembly.
//!
//! [`Assembler::assemble`] drives one [`BuildTarget`] from its template binary
//! to a relocated (and optionally signed and validated) RPM. Steps run strictly
//! in order; the first failing step aborts the target and its error is handed
//! back to the orchestrator, which decides whether the whole export stops.
//!
//! | # | step                       | failure            |
//! |---|----------------------------|--------------------|
//! | 1 | validate template          | target             |
//! | 2 | resolve shared path        | export             |
//! | 3 | create staging layout      | target             |
//! | 4 | stage binary               | target             |
//! | 5 | export asset pack          | target             |
//! | 6 | generate spec and desktop  | target             |
//! | 7 | stage icons                | target             |
//! | 8 | stage extension libraries  | logged             |
//! | 9 | remote rpmbuild            | target             |
//! |10 | relocate artifact          | target             |
//! |11 | sign (optional)            | target             |
//! |12 | validate (optional)        | target / skipped   |
//! |13 | remove staging root        | logged             |

use crate::bundler::error::{Context, Error, Result};
use crate::bundler::paths::{BuildEnvPath, SharedPathMapping};
use crate::bundler::platform::aurora::freedesktop::{self, SandboxSection};
use crate::bundler::platform::aurora::layout::{self, StagingLayout};
use crate::bundler::platform::aurora::sign::{self, SigningRequest};
use crate::bundler::platform::aurora::spec::{self, SpecValues};
use crate::bundler::platform::aurora::template;
use crate::bundler::progress::StepProgress;
use crate::bundler::settings::{ExportSettings, IconSize};
use crate::bundler::targets::BuildTarget;
use crate::bundler::transport::Transport;
use crate::bundler::utils::fs;
use crate::project::{
    self, AssetPackExporter, PackRequest, ProjectSettings, extensions, CUSTOM_USER_DIR_NAME,
    USE_CUSTOM_USER_DIR,
};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Steps every target goes through.
pub const BASE_STEPS: u32 = 11;

const PROJECT_NAME: &str = "application/config/name";
const PROJECT_VERSION: &str = "application/config/version";
const PROJECT_DESCRIPTION: &str = "application/config/description";
const DEFAULT_VERSION: &str = "1.0.0";

/// Step budget of one target, including the enabled optional steps.
///
/// Validation counts even when the transport cannot run it; the step is then
/// reported as skipped.
pub fn step_count(settings: &ExportSettings) -> u32 {
    BASE_STEPS + u32::from(settings.signing.enabled) + u32::from(settings.validator.enabled)
}

/// Metadata of the package built for one target.
#[derive(Clone, Debug)]
pub struct PackageDescriptor {
    /// Target being built
    pub target: BuildTarget,
    /// RPM package name, `<organization>.<name>`
    pub name: String,
    /// Label shown in the launcher
    pub launcher_name: String,
    /// Package version
    pub version: String,
    /// Release number
    pub release: String,
    /// Package description
    pub description: String,
}

impl PackageDescriptor {
    /// Descriptor for `target`, filling unset package fields from `project.godot`.
    pub fn new(target: BuildTarget, settings: &ExportSettings, project: &ProjectSettings) -> Self {
        let package = &settings.package;
        let name = package.package_name();
        let launcher_name = non_empty(package.launcher_name.clone())
            .or_else(|| non_empty(project.get_string(PROJECT_NAME)))
            .unwrap_or_else(|| package.name.clone());
        let version = non_empty(package.version.clone())
            .or_else(|| non_empty(project.get_string(PROJECT_VERSION)))
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());
        let description = non_empty(package.description.clone())
            .or_else(|| non_empty(project.get_string(PROJECT_DESCRIPTION)))
            .unwrap_or_else(|| launcher_name.clone());

        Self {
            target,
            name,
            launcher_name,
            version,
            release: package.release.to_string(),
            description,
        }
    }

    /// File name rpmbuild gives the package.
    pub fn artifact_file_name(&self) -> String {
        layout::artifact_file_name(&self.name, &self.version, &self.release, self.target.arch)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Builds packages for single targets.
pub struct Assembler<'a> {
    settings: &'a ExportSettings,
    transport: &'a Transport,
    mapping: &'a SharedPathMapping,
    exporter: &'a dyn AssetPackExporter,
    export_path: &'a Path,
}

impl<'a> Assembler<'a> {
    /// Assembler writing next to the absolute `export_path`.
    pub fn new(
        settings: &'a ExportSettings,
        transport: &'a Transport,
        mapping: &'a SharedPathMapping,
        exporter: &'a dyn AssetPackExporter,
        export_path: &'a Path,
    ) -> Self {
        Self {
            settings,
            transport,
            mapping,
            exporter,
            export_path,
        }
    }

    /// Runs every step for `package` and returns the path of the finished package.
    ///
    /// The staging root is removed whether the target succeeds or not.
    pub async fn assemble(
        &self,
        project: &mut ProjectSettings,
        package: &PackageDescriptor,
        progress: &mut StepProgress<'_>,
    ) -> Result<PathBuf> {
        let target = &package.target;

        progress.step(&format!("check {} export template", target.arch));
        template::validate_template(&target.template, target.arch)?;

        progress.step("resolve shared path");
        let layout = StagingLayout::new(self.export_path, &package.name);
        let topdir = self.mapping.to_build_env_path(layout.root())?;
        log::debug!(
            "Staging root {} is {} in the build engine",
            layout.root().display(),
            topdir.build_env_path()
        );

        progress.step("create build root");
        let result = match layout.create().await {
            Ok(()) => self.build(&layout, &topdir, project, package, progress).await,
            Err(e) => Err(e),
        };

        if result.is_ok() {
            progress.step("remove temp directory");
        }
        if let Err(e) = fs::remove_dir_all(layout.root()).await {
            log::warn!("Cannot remove staging root {}: {}", layout.root().display(), e);
        }
        result
    }

    async fn build(
        &self,
        layout: &StagingLayout,
        topdir: &BuildEnvPath,
        project: &mut ProjectSettings,
        package: &PackageDescriptor,
        progress: &mut StepProgress<'_>,
    ) -> Result<PathBuf> {
        let target = &package.target;

        progress.step(&format!("copy {} template binary", target.arch));
        fs::copy_file(&target.template, &layout.binary_path())
            .await
            .context("staging template binary")?;

        progress.step(&format!("create {}.pck", package.name));
        self.export_pack(layout, project, package).await?;

        progress.step(&format!("generate {}.spec and {}.desktop", package.name, package.name));
        self.write_descriptors(layout, topdir, package).await?;

        progress.step("copy icons");
        self.stage_icons(layout).await?;

        progress.step("copy extension libraries");
        self.stage_libraries(layout, project).await;

        progress.step(&format!("build {} package in {}", target.arch, target));
        self.remote_build(layout, topdir, package).await?;

        progress.step("move package to export directory");
        let artifact = self.relocate(layout, package).await?;

        if self.settings.signing.enabled {
            progress.step(&format!("sign {}", package.artifact_file_name()));
            self.sign(target, &artifact).await?;
        }

        if self.settings.validator.enabled {
            if self.transport.supports_validation() {
                progress.step(&format!("validate {}", package.artifact_file_name()));
            } else {
                progress.step("validation skipped: not available through ssh");
            }
            let artifact_path = crate::bundler::paths::to_slash(&artifact);
            sign::validate_package(self.transport, target, &artifact_path).await?;
        }

        Ok(artifact)
    }

    async fn export_pack(
        &self,
        layout: &StagingLayout,
        project: &mut ProjectSettings,
        package: &PackageDescriptor,
    ) -> Result<()> {
        let debug = self.settings.export.debug;
        let manifest_overrides = extensions::manifest_overrides(project.root(), &package.name, debug)?;
        let user_dir = project::custom_user_dir_name(&package.name, &self.settings.package.organization);
        let scratch_dir = layout.pack_scratch_dir();
        let skip_dirs = layout.pack_exclusions(&project.root().absolutize()?);
        let output = layout.pack_path();

        let result = {
            let scoped = project.override_scope(&[
                (USE_CUSTOM_USER_DIR, "true".to_string()),
                (CUSTOM_USER_DIR_NAME, project::quote(&user_dir)),
            ]);
            let request = PackRequest {
                settings: &*scoped,
                debug,
                output: &output,
                scratch_dir: &scratch_dir,
                manifest_overrides: &manifest_overrides,
                skip_dirs: &skip_dirs,
            };
            self.exporter.export_pack(&request).await
        };

        if let Err(e) = fs::remove_dir_all(&scratch_dir).await {
            log::warn!("Cannot remove pack scratch directory: {}", e);
        }
        result
    }

    async fn write_descriptors(
        &self,
        layout: &StagingLayout,
        topdir: &BuildEnvPath,
        package: &PackageDescriptor,
    ) -> Result<()> {
        let date = spec::changelog_date();
        let spec_text = spec::render_spec(&SpecValues {
            name: &package.name,
            launcher_name: &package.launcher_name,
            version: &package.version,
            release: &package.release,
            arch: package.target.arch,
            description: &package.description,
            shared_path: &topdir.build_env_root,
            export_path: &topdir.relative_suffix,
            date: &date,
        });
        fs::write_file(&layout.spec_path(), &spec_text).await?;

        let sandbox = self.settings.sandbox.enabled.then(|| SandboxSection {
            organization: &self.settings.package.organization,
            permissions: freedesktop::permissions_for(self.settings),
        });
        let desktop = freedesktop::render_desktop(&package.name, &package.launcher_name, sandbox.as_ref());
        fs::write_file(&layout.desktop_path(), &desktop).await
    }

    async fn stage_icons(&self, layout: &StagingLayout) -> Result<()> {
        for size in IconSize::ALL {
            let configured = self
                .settings
                .icons
                .get(size)
                .with_context(|| format!("icon {} is not configured", size.label()))?;
            let icon = self.settings.resolve_resource(configured);

            match image::image_dimensions(&icon) {
                Ok((w, h)) if w != size.pixels() || h != size.pixels() => {
                    log::warn!("Icon {} is {}x{}, expected {}", icon.display(), w, h, size.label());
                }
                Ok(_) => {}
                Err(e) => log::warn!("Cannot read icon {}: {}", icon.display(), e),
            }

            fs::copy_file(&icon, &layout.icon_path(size))
                .await
                .with_context(|| format!("staging {} icon", size.label()))?;
        }
        Ok(())
    }

    async fn stage_libraries(&self, layout: &StagingLayout, project: &ProjectSettings) {
        extensions::log_diagnostics(project.root());
        let objects = match self
            .exporter
            .collect_shared_objects(project, self.settings.export.debug)
            .await
        {
            Ok(objects) => objects,
            Err(e) => {
                log::warn!("Cannot collect extension libraries: {}", e);
                return;
            }
        };

        for object in objects {
            let Some(file_name) = object.path.file_name() else {
                continue;
            };
            let dest = layout.lib_dir().join(file_name);
            match fs::copy_file(&object.path, &dest).await {
                Ok(()) => log::debug!("Staged {}", object.path.display()),
                Err(e) => log::warn!("Skipping extension library {}: {}", object.path.display(), e),
            }
        }
    }

    async fn remote_build(
        &self,
        layout: &StagingLayout,
        topdir: &BuildEnvPath,
        package: &PackageDescriptor,
    ) -> Result<()> {
        let target = &package.target;
        let script = build_script(&topdir.build_env_path(), &package.name);
        fs::write_file(&layout.build_script_path(), &script).await?;

        self.transport
            .execute(&install_helper_args(target))
            .await
            .with_context(|| format!("installing patchelf into {}", target))?;

        let output = self
            .transport
            .execute(&build_args(target, &script))
            .await
            .with_context(|| format!("building package for {}", target))?;
        for line in output.lines() {
            log::debug!("{}", line);
        }
        Ok(())
    }

    async fn relocate(&self, layout: &StagingLayout, package: &PackageDescriptor) -> Result<PathBuf> {
        let file_name = package.artifact_file_name();
        let produced = layout.rpms_dir(package.target.arch).join(&file_name);
        let dest = layout.output_dir().join(&file_name);

        fs::move_file(&produced, &dest).await.with_context(|| {
            format!(
                "cannot move build result {} to {}",
                produced.display(),
                dest.display()
            )
        })?;
        log::info!("Package written to {}", dest.display());
        Ok(dest)
    }

    async fn sign(&self, target: &BuildTarget, artifact: &Path) -> Result<()> {
        let signing = &self.settings.signing;
        let (Some(key), Some(cert)) = (&signing.key, &signing.cert) else {
            return Err(Error::GenericError(
                "signing is enabled but key or certificate is not configured".into(),
            ));
        };
        let key = self.mapping.translate_or_keep(&self.settings.resolve_resource(key));
        let cert = self.mapping.translate_or_keep(&self.settings.resolve_resource(cert));
        let artifact = self.mapping.translate_or_keep(artifact);

        sign::sign_package(
            self.transport,
            target,
            &SigningRequest {
                key: &key,
                cert: &cert,
                password: signing.password.as_deref(),
                artifact: &artifact,
            },
        )
        .await
    }
}

/// rpmbuild invocation for the staging root `topdir` (a build engine path).
pub fn build_script(topdir: &str, name: &str) -> String {
    format!(
        "rpmbuild --define '_topdir {topdir}' -ba --without debug --without debuginfo \"{topdir}/SPECS/{name}.spec\""
    )
}

/// `sb2 -t <target> -m sdk-install -R zypper in -y patchelf`
pub fn install_helper_args(target: &BuildTarget) -> Vec<String> {
    [
        "sb2",
        "-t",
        &target.sb2_target(),
        "-m",
        "sdk-install",
        "-R",
        "zypper",
        "in",
        "-y",
        "patchelf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// `sb2 -t <target> bash -c <script>`
pub fn build_args(target: &BuildTarget, script: &str) -> Vec<String> {
    vec![
        "sb2".into(),
        "-t".into(),
        target.sb2_target(),
        "bash".into(),
        "-c".into(),
        script.into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::settings::Arch;

    fn target() -> BuildTarget {
        BuildTarget {
            platform: "AuroraOS".into(),
            version: [5, 0, 0, 60],
            variant: None,
            arch: Arch::Armv7hl,
            template: PathBuf::from("/t"),
        }
    }

    #[test]
    fn test_step_count() {
        let settings = ExportSettings::builder().without_signing().build();
        assert_eq!(step_count(&settings), 11);
        let settings = ExportSettings::builder()
            .signing("/k", "/c")
            .validator(true)
            .build();
        assert_eq!(step_count(&settings), 13);
    }

    #[test]
    fn test_build_script() {
        assert_eq!(
            build_script("/home/mersdk/share/game/export/game.rpm_buildroot", "ru.example.game"),
            "rpmbuild --define '_topdir /home/mersdk/share/game/export/game.rpm_buildroot' -ba \
             --without debug --without debuginfo \
             \"/home/mersdk/share/game/export/game.rpm_buildroot/SPECS/ru.example.game.spec\""
        );
    }

    #[test]
    fn test_helper_install_args() {
        assert_eq!(
            install_helper_args(&target()).join(" "),
            "sb2 -t AuroraOS-5.0.0.60-armv7hl.default -m sdk-install -R zypper in -y patchelf"
        );
    }

    #[test]
    fn test_descriptor_falls_back_to_project() {
        let project = ProjectSettings::parse(
            Path::new("/p"),
            "[application]\n\nconfig/name=\"Space Rocks\"\nconfig/version=\"2.1\"\n",
        );
        let settings = ExportSettings::builder()
            .package("ru.example", "game", "", 4)
            .build();
        let package = PackageDescriptor::new(target(), &settings, &project);
        assert_eq!(package.name, "ru.example.game");
        assert_eq!(package.launcher_name, "Space Rocks");
        assert_eq!(package.version, "2.1");
        assert_eq!(package.description, "Space Rocks");
        assert_eq!(package.artifact_file_name(), "ru.example.game-2.1-4.armv7hl.rpm");
    }
}
