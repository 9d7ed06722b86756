//! Asset pack export.
//!
//! The `.pck` data pack is produced by the Godot editor itself. The exporter
//! runs it against a shadow copy of the project that carries the rewritten
//! extension manifests and the in-memory setting overrides, so the real
//! project tree is never touched.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::settings::ExportSettings;
use crate::bundler::transport::{CommandRunner, render_command};
use crate::project::extensions::{self, ManifestOverride};
use crate::project::ProjectSettings;
use async_trait::async_trait;
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// A native library the exported project loads at runtime.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SharedObject {
    /// Host path of the library
    pub path: PathBuf,
}

/// One pack export.
#[derive(Debug)]
pub struct PackRequest<'a> {
    /// Project settings including any active overrides
    pub settings: &'a ProjectSettings,
    /// Debug flavour
    pub debug: bool,
    /// Where the `.pck` must be written
    pub output: &'a Path,
    /// Scratch directory the exporter may use freely
    pub scratch_dir: &'a Path,
    /// Extension manifests to substitute
    pub manifest_overrides: &'a [ManifestOverride],
    /// Project paths left out of the export (staging root, earlier packages)
    pub skip_dirs: &'a [PathBuf],
}

/// Produces the data pack of a project.
#[async_trait]
pub trait AssetPackExporter: Send + Sync {
    /// Writes the pack described by `request`.
    async fn export_pack(&self, request: &PackRequest<'_>) -> Result<()>;

    /// Lists the native libraries the pack would reference, without writing a pack.
    async fn collect_shared_objects(
        &self,
        settings: &ProjectSettings,
        debug: bool,
    ) -> Result<Vec<SharedObject>> {
        extensions::collect_shared_objects(settings.root(), debug)
    }
}

/// Exports packs by running the Godot editor headless.
#[derive(Debug, Clone)]
pub struct GodotEditorExporter {
    godot: PathBuf,
    preset: String,
    runner: Arc<dyn CommandRunner>,
}

impl GodotEditorExporter {
    /// Exporter using the given editor binary and export preset.
    pub fn new(godot: impl Into<PathBuf>, preset: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            godot: godot.into(),
            preset: preset.into(),
            runner,
        }
    }

    /// Exporter for the configured editor, or the first `godot` on `PATH`.
    pub fn from_settings(settings: &ExportSettings, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let godot = match &settings.project.godot {
            Some(path) => path.clone(),
            None => which::which("godot")
                .or_else(|_| which::which("godot4"))
                .map_err(|e| {
                    Error::PackExport(format!(
                        "Godot editor not found on PATH ({e}); set [project] godot in the configuration"
                    ))
                })?,
        };
        Ok(Self::new(godot, settings.project.preset.clone(), runner))
    }

    /// Editor binary.
    pub fn godot(&self) -> &Path {
        &self.godot
    }

    /// Copies the project into `shadow`, skipping VCS data and `skip`.
    fn build_shadow(&self, root: &Path, shadow: &Path, skip: &[&Path]) -> Result<()> {
        let root = root.absolutize()?;
        if shadow.exists() {
            std::fs::remove_dir_all(shadow).fs_context("removing stale shadow project", shadow)?;
        }
        std::fs::create_dir_all(shadow).fs_context("creating shadow project", shadow)?;

        let walker = WalkDir::new(&*root).follow_links(false).into_iter().filter_entry(|e| {
            e.file_name() != ".git" && !skip.iter().any(|s| e.path().starts_with(s))
        });
        for entry in walker {
            let entry = entry?;
            let rel = entry.path().strip_prefix(&*root)?;
            if rel.as_os_str().is_empty() {
                continue;
            }
            let dest = shadow.join(rel);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest).fs_context("creating shadow directory", &dest)?;
            } else if entry.file_type().is_file() {
                std::fs::copy(entry.path(), &dest).fs_context("copying project file", entry.path())?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AssetPackExporter for GodotEditorExporter {
    async fn export_pack(&self, request: &PackRequest<'_>) -> Result<()> {
        let root = request.settings.root();
        let shadow = request.scratch_dir.join("project");
        let mut skip: Vec<&Path> = vec![request.scratch_dir, request.output];
        skip.extend(request.skip_dirs.iter().map(PathBuf::as_path));
        self.build_shadow(root, &shadow, &skip)?;

        for manifest in request.manifest_overrides {
            let dest = shadow.join(&manifest.relative_path);
            std::fs::write(&dest, &manifest.contents).fs_context("writing extension manifest", &dest)?;
        }

        let overrides = request.settings.overrides_since_load();
        if !overrides.is_empty() {
            let path = shadow.join("override.cfg");
            let mut text = std::fs::read_to_string(&path).unwrap_or_default();
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&overrides);
            std::fs::write(&path, text).fs_context("writing override.cfg", &path)?;
        }

        let args = vec![
            "--headless".to_string(),
            "--path".to_string(),
            shadow.to_string_lossy().into_owned(),
            "--export-pack".to_string(),
            self.preset.clone(),
            request.output.to_string_lossy().into_owned(),
        ];
        log::debug!("Executing: {}", render_command(&self.godot, &args));
        let result = self.runner.run(&self.godot, &args).await?;
        if !result.success() {
            return Err(Error::PackExport(format!(
                "{} exited with code {}\n{}",
                self.godot.display(),
                result.exit_code,
                result.output
            )));
        }
        if !request.output.is_file() {
            return Err(Error::PackExport(format!(
                "editor finished but {} was not written",
                request.output.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::platform::aurora::StagingLayout;
    use crate::bundler::transport::CommandOutput;
    use std::sync::Mutex;

    /// Pretends to be the editor: checks the shadow project and writes the pack.
    #[derive(Debug, Default)]
    struct FakeEditor {
        seen_override: Mutex<Option<String>>,
        seen_manifest: Mutex<Option<String>>,
    }

    #[async_trait]
    impl CommandRunner for FakeEditor {
        async fn run(&self, _program: &Path, args: &[String]) -> Result<CommandOutput> {
            let shadow = PathBuf::from(&args[2]);
            *self.seen_override.lock().unwrap() =
                std::fs::read_to_string(shadow.join("override.cfg")).ok();
            *self.seen_manifest.lock().unwrap() =
                std::fs::read_to_string(shadow.join("ext.gdextension")).ok();
            std::fs::write(&args[5], b"GDPC").unwrap();
            Ok(CommandOutput::default())
        }
    }

    #[tokio::test]
    async fn test_export_uses_shadow_project() {
        let project_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let root = project_dir.path();
        std::fs::write(root.join("project.godot"), "[application]\nconfig/name=\"Game\"\n").unwrap();
        std::fs::write(root.join("ext.gdextension"), "original").unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref").unwrap();
        std::fs::create_dir_all(root.join("export/game.rpm_buildroot")).unwrap();
        std::fs::write(root.join("export/ru.example.game-1.0.0-1.armv7hl.rpm"), b"rpm").unwrap();
        let layout = StagingLayout::new(&root.join("export/game.rpm"), "ru.example.game");
        let skip_dirs = layout.pack_exclusions(root);

        let mut settings = ProjectSettings::load(root).unwrap();
        let editor = Arc::new(FakeEditor::default());
        let exporter = GodotEditorExporter::new("godot", "AuroraOS", editor.clone());
        let output = scratch.path().join("game.pck");
        let manifests = vec![ManifestOverride {
            relative_path: PathBuf::from("ext.gdextension"),
            contents: "rewritten".into(),
        }];

        {
            let scoped = settings.override_scope(&[("application/config/use_custom_user_dir", "true".into())]);
            let request = PackRequest {
                settings: &*scoped,
                debug: false,
                output: &output,
                scratch_dir: scratch.path(),
                manifest_overrides: &manifests,
                skip_dirs: &skip_dirs,
            };
            exporter.export_pack(&request).await.unwrap();
        }

        assert!(output.is_file());
        assert_eq!(editor.seen_manifest.lock().unwrap().as_deref(), Some("rewritten"));
        assert!(editor
            .seen_override
            .lock()
            .unwrap()
            .as_deref()
            .unwrap()
            .contains("config/use_custom_user_dir=true"));
        assert!(!scratch.path().join("project/.git").exists());
        assert!(!scratch.path().join("project/export").exists());
        assert!(!scratch
            .path()
            .join("project/export/ru.example.game-1.0.0-1.armv7hl.rpm")
            .exists());
        assert_eq!(std::fs::read_to_string(root.join("ext.gdextension")).unwrap(), "original");
        assert!(!root.join("override.cfg").exists());
    }

    #[tokio::test]
    async fn test_earlier_packages_in_project_root_stay_out_of_shadow() {
        let project_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let root = project_dir.path();
        std::fs::write(root.join("project.godot"), "[application]\n").unwrap();
        std::fs::write(root.join("ru.example.game-1.0.0-1.aarch64.rpm"), b"rpm").unwrap();
        std::fs::write(root.join("level.tres"), b"data").unwrap();

        let settings = ProjectSettings::load(root).unwrap();
        let layout = StagingLayout::new(&root.join("game.rpm"), "ru.example.game");
        let skip_dirs = layout.pack_exclusions(root);
        let exporter = GodotEditorExporter::new("godot", "AuroraOS", Arc::new(FakeEditor::default()));
        let output = scratch.path().join("game.pck");
        let request = PackRequest {
            settings: &settings,
            debug: false,
            output: &output,
            scratch_dir: scratch.path(),
            manifest_overrides: &[],
            skip_dirs: &skip_dirs,
        };
        exporter.export_pack(&request).await.unwrap();

        let shadow = scratch.path().join("project");
        assert!(shadow.join("level.tres").is_file());
        assert!(shadow.join("project.godot").is_file());
        assert!(!shadow.join("ru.example.game-1.0.0-1.aarch64.rpm").exists());
    }
}
