//! Staging tree of one target build.
//!
//! ```text
//! <export path>_buildroot/
//!   SPECS/<name>.spec
//!   buildscript.sh
//!   BUILD/usr/bin/<name>
//!   BUILD/usr/share/<name>/<name>.pck
//!   BUILD/usr/share/<name>/lib/
//!   BUILD/usr/share/applications/<name>.desktop
//!   BUILD/usr/share/icons/hicolor/<size>/apps/<name>.png
//!   RPMS/<arch>/            (written by rpmbuild)
//! ```

use crate::bundler::error::{ErrorExt, Result};
use crate::bundler::paths::with_suffix;
use crate::bundler::settings::{Arch, IconSize};
use std::path::{Path, PathBuf};

/// Install prefix of packaged files.
pub const DATA_DIR: &str = "/usr/share";

/// Install location of the executable.
pub const BIN_DIR: &str = "/usr/bin";

/// File name of the package rpmbuild writes for `name`.
pub fn artifact_file_name(name: &str, version: &str, release: &str, arch: Arch) -> String {
    format!("{}-{}-{}.{}.rpm", name, version, release, arch)
}

/// Paths of one staging tree.
#[derive(Clone, Debug)]
pub struct StagingLayout {
    root: PathBuf,
    name: String,
}

impl StagingLayout {
    /// Layout next to the absolute export path, for package `name`.
    pub fn new(export_path: &Path, name: &str) -> Self {
        Self {
            root: with_suffix(export_path, "_buildroot"),
            name: name.to_string(),
        }
    }

    /// Staging root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory receiving the finished package.
    pub fn output_dir(&self) -> PathBuf {
        self.root.parent().map(Path::to_path_buf).unwrap_or_default()
    }

    fn build_dir(&self) -> PathBuf {
        self.root.join("BUILD")
    }

    /// `SPECS/`
    pub fn specs_dir(&self) -> PathBuf {
        self.root.join("SPECS")
    }

    /// Package data directory, `BUILD/usr/share/<name>`.
    pub fn data_dir(&self) -> PathBuf {
        self.build_dir().join("usr/share").join(&self.name)
    }

    /// Extension library directory.
    pub fn lib_dir(&self) -> PathBuf {
        self.data_dir().join("lib")
    }

    /// `BUILD/usr/bin`
    pub fn bin_dir(&self) -> PathBuf {
        self.build_dir().join("usr/bin")
    }

    /// `BUILD/usr/share/applications`
    pub fn applications_dir(&self) -> PathBuf {
        self.build_dir().join("usr/share/applications")
    }

    /// Icon directory for one size.
    pub fn icon_dir(&self, size: IconSize) -> PathBuf {
        self.build_dir()
            .join("usr/share/icons/hicolor")
            .join(size.label())
            .join("apps")
    }

    /// Staged executable.
    pub fn binary_path(&self) -> PathBuf {
        self.bin_dir().join(&self.name)
    }

    /// Staged data pack.
    pub fn pack_path(&self) -> PathBuf {
        self.data_dir().join(format!("{}.pck", self.name))
    }

    /// Launcher descriptor.
    pub fn desktop_path(&self) -> PathBuf {
        self.applications_dir().join(format!("{}.desktop", self.name))
    }

    /// Staged icon for one size.
    pub fn icon_path(&self, size: IconSize) -> PathBuf {
        self.icon_dir(size).join(format!("{}.png", self.name))
    }

    /// Package spec.
    pub fn spec_path(&self) -> PathBuf {
        self.specs_dir().join(format!("{}.spec", self.name))
    }

    /// Recorded rpmbuild invocation.
    pub fn build_script_path(&self) -> PathBuf {
        self.root.join("buildscript.sh")
    }

    /// Scratch space for the pack exporter.
    pub fn pack_scratch_dir(&self) -> PathBuf {
        self.root.join("pack")
    }

    /// Where rpmbuild leaves packages for `arch`.
    pub fn rpms_dir(&self, arch: Arch) -> PathBuf {
        self.root.join("RPMS").join(arch.token())
    }

    /// Every directory of the tree.
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs = vec![
            self.specs_dir(),
            self.lib_dir(),
            self.bin_dir(),
            self.applications_dir(),
        ];
        dirs.extend(IconSize::ALL.iter().map(|size| self.icon_dir(*size)));
        dirs
    }

    /// Paths below `project_root` that the pack export must leave out.
    ///
    /// Always the staging root. The whole output directory when it is a
    /// subdirectory of the project, otherwise only the `<name>-*.rpm`
    /// packages already in it. `project_root` must be absolute.
    pub fn pack_exclusions(&self, project_root: &Path) -> Vec<PathBuf> {
        let mut skip = vec![self.root.clone()];
        let output = self.output_dir();
        if output != project_root && output.starts_with(project_root) {
            skip.push(output);
            return skip;
        }

        let prefix = format!("{}-", self.name);
        if let Ok(entries) = std::fs::read_dir(&output) {
            skip.extend(entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".rpm"))
            }));
        }
        skip
    }

    /// Creates the tree. Existing directories are fine.
    pub async fn create(&self) -> Result<()> {
        for dir in self.directories() {
            tokio::fs::create_dir_all(&dir)
                .await
                .fs_context("creating staging directory", &dir)?;
        }
        Ok(())
    }

    /// Removes the tree.
    pub async fn remove(&self) -> Result<()> {
        if self.root.exists() {
            tokio::fs::remove_dir_all(&self.root)
                .await
                .fs_context("removing staging directory", &self.root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = StagingLayout::new(Path::new("/home/u/game/export/game.rpm"), "ru.example.game");
        assert_eq!(layout.root(), Path::new("/home/u/game/export/game.rpm_buildroot"));
        assert_eq!(layout.output_dir(), PathBuf::from("/home/u/game/export"));
        assert_eq!(
            layout.pack_path(),
            PathBuf::from("/home/u/game/export/game.rpm_buildroot/BUILD/usr/share/ru.example.game/ru.example.game.pck")
        );
        assert_eq!(
            layout.icon_path(IconSize::S108),
            PathBuf::from("/home/u/game/export/game.rpm_buildroot/BUILD/usr/share/icons/hicolor/108x108/apps/ru.example.game.png")
        );
        assert_eq!(
            layout.rpms_dir(Arch::Aarch64),
            PathBuf::from("/home/u/game/export/game.rpm_buildroot/RPMS/aarch64")
        );
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(
            artifact_file_name("ru.example.game", "1.2.0", "3", Arch::Armv7hl),
            "ru.example.game-1.2.0-3.armv7hl.rpm"
        );
    }

    #[test]
    fn test_exclusions_cover_output_subdirectory() {
        let layout = StagingLayout::new(Path::new("/home/u/game/export/game.rpm"), "ru.example.game");
        assert_eq!(
            layout.pack_exclusions(Path::new("/home/u/game")),
            vec![
                PathBuf::from("/home/u/game/export/game.rpm_buildroot"),
                PathBuf::from("/home/u/game/export"),
            ]
        );
    }

    #[test]
    fn test_exclusions_in_project_root_list_previous_packages() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("ru.example.game-1.0.0-1.armv7hl.rpm"), b"rpm").unwrap();
        std::fs::write(root.join("other-1.0-1.noarch.rpm"), b"rpm").unwrap();
        std::fs::write(root.join("project.godot"), b"").unwrap();

        let layout = StagingLayout::new(&root.join("game.rpm"), "ru.example.game");
        let skip = layout.pack_exclusions(root);

        assert_eq!(skip.len(), 2);
        assert_eq!(skip[0], root.join("game.rpm_buildroot"));
        assert_eq!(skip[1], root.join("ru.example.game-1.0.0-1.armv7hl.rpm"));
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StagingLayout::new(&dir.path().join("game.rpm"), "game");
        layout.create().await.unwrap();
        layout.create().await.unwrap();
        for d in layout.directories() {
            assert!(d.is_dir(), "{} missing", d.display());
        }
        layout.remove().await.unwrap();
        assert!(!layout.root().exists());
    }
}
