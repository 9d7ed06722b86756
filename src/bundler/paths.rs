//! Host path resolution and host → build engine path translation.
//!
//! The build engine only sees the SDK's two shared directories (SharedHome and
//! SharedSrc). Every staged input must therefore live below one of them, and
//! every path handed to a command running inside the engine must be rewritten
//! into the engine's view of that directory.

use crate::bundler::error::{Error, Result};
use path_absolutize::Absolutize;
use std::path::{Component, Path, PathBuf};

/// Default mount point of SharedHome inside a VM-based build engine.
pub const VM_SHARED_HOME: &str = "/home/mersdk/share";

/// Default mount point of SharedSrc inside a VM-based build engine.
pub const VM_SHARED_SRC: &str = "/home/src1";

/// Resolves an export path against the project root.
///
/// - `./x` resolves to `<root>/x`
/// - each `..` walks one directory up, wherever it appears
/// - absolute paths are returned normalized
/// - anything else is taken as relative to the root
///
/// Walking above the filesystem root is [`Error::InvalidPath`].
pub fn absolute_path(path: &str, project_root: &Path) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let mut resolved = if candidate.is_absolute() {
        PathBuf::new()
    } else {
        project_root.absolutize()?.into_owned()
    };

    for component in candidate.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                resolved.push(component)
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(Error::InvalidPath {
                        path: path.to_string(),
                        reason: format!("walks above the filesystem root from {}", project_root.display()),
                    });
                }
            }
        }
    }

    Ok(resolved)
}

/// Which shared directory a path was found under.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SharedRoot {
    /// SharedHome
    Home,
    /// SharedSrc
    Src,
}

/// Host and build engine locations of the two SDK shared directories.
///
/// Discovered once per export run (see [`crate::bundler::sdk`]).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SharedPathMapping {
    /// SharedHome on the host
    pub host_shared_home: PathBuf,
    /// SharedSrc on the host
    pub host_shared_src: PathBuf,
    /// SharedHome as seen from inside the build engine
    pub build_env_shared_home: String,
    /// SharedSrc as seen from inside the build engine
    pub build_env_shared_src: String,
}

/// A host path expressed relative to one shared directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildEnvPath {
    /// Which shared directory matched
    pub shared_root: SharedRoot,
    /// Matched host prefix
    pub host_root: PathBuf,
    /// Build engine location of the matched prefix
    pub build_env_root: String,
    /// Remainder below the prefix, `/`-separated with a leading `/` (empty for the root itself)
    pub relative_suffix: String,
}

impl BuildEnvPath {
    /// Full path inside the build engine.
    pub fn build_env_path(&self) -> String {
        format!("{}{}", self.build_env_root, self.relative_suffix)
    }

    /// Reconstructs the host path from the matched host prefix.
    pub fn host_path(&self) -> PathBuf {
        let mut path = self.host_root.clone();
        for part in self.relative_suffix.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }
}

impl SharedPathMapping {
    /// Mapping for build engines that mount the shared directories under the same paths as the host.
    pub fn identity(shared_home: impl Into<PathBuf>, shared_src: impl Into<PathBuf>) -> Self {
        let host_shared_home = shared_home.into();
        let host_shared_src = shared_src.into();
        Self {
            build_env_shared_home: to_slash(&host_shared_home),
            build_env_shared_src: to_slash(&host_shared_src),
            host_shared_home,
            host_shared_src,
        }
    }

    /// Strips whichever shared prefix contains `host_path`.
    ///
    /// SharedHome is tried first. Fails with [`Error::PathOutsideSharedRoots`]
    /// when neither prefix matches.
    pub fn to_build_env_path(&self, host_path: &Path) -> Result<BuildEnvPath> {
        let candidates = [
            (SharedRoot::Home, &self.host_shared_home, &self.build_env_shared_home),
            (SharedRoot::Src, &self.host_shared_src, &self.build_env_shared_src),
        ];

        for (shared_root, host_root, build_env_root) in candidates {
            if host_root.as_os_str().is_empty() {
                continue;
            }
            if let Ok(rest) = host_path.strip_prefix(host_root) {
                return Ok(BuildEnvPath {
                    shared_root,
                    host_root: host_root.clone(),
                    build_env_root: build_env_root.trim_end_matches('/').to_string(),
                    relative_suffix: relative_suffix(rest),
                });
            }
        }

        Err(Error::PathOutsideSharedRoots {
            path: host_path.to_path_buf(),
            shared_home: self.host_shared_home.clone(),
            shared_src: self.host_shared_src.clone(),
        })
    }

    /// Build engine path for `host_path` when it lies under a shared directory,
    /// otherwise the host path unchanged.
    pub fn translate_or_keep(&self, host_path: &Path) -> String {
        match self.to_build_env_path(host_path) {
            Ok(mapped) => mapped.build_env_path(),
            Err(_) => to_slash(host_path),
        }
    }
}

fn relative_suffix(rest: &Path) -> String {
    rest.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(format!("/{}", part.to_string_lossy())),
            _ => None,
        })
        .collect()
}

/// Renders a host path with `/` separators.
pub fn to_slash(path: &Path) -> String {
    let text = path.to_string_lossy();
    if cfg!(windows) {
        text.replace('\\', "/")
    } else {
        text.into_owned()
    }
}

/// Appends a suffix to the final component, e.g. `game.rpm` → `game.rpm_buildroot`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut text = path.as_os_str().to_os_string();
    text.push(suffix);
    PathBuf::from(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> SharedPathMapping {
        SharedPathMapping {
            host_shared_home: PathBuf::from("/home/user"),
            host_shared_src: PathBuf::from("/srv/src"),
            build_env_shared_home: VM_SHARED_HOME.into(),
            build_env_shared_src: VM_SHARED_SRC.into(),
        }
    }

    #[test]
    fn test_dot_slash_resolves_inside_root() {
        let path = absolute_path("./export/game.rpm", Path::new("/home/user/game")).unwrap();
        assert_eq!(path, PathBuf::from("/home/user/game/export/game.rpm"));
    }

    #[test]
    fn test_parent_walks_once_per_occurrence() {
        let path = absolute_path("../../out/game.rpm", Path::new("/home/user/work/game")).unwrap();
        assert_eq!(path, PathBuf::from("/home/user/out/game.rpm"));
    }

    #[test]
    fn test_plain_relative_is_project_relative() {
        let path = absolute_path("export/game.rpm", Path::new("/home/user/game")).unwrap();
        assert_eq!(path, PathBuf::from("/home/user/game/export/game.rpm"));
    }

    #[test]
    fn test_walk_above_root_fails() {
        let err = absolute_path("../../../x.rpm", Path::new("/a/b")).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn test_walk_above_root_after_dot_slash_fails() {
        let err = absolute_path("./../../../../x.rpm", Path::new("/a/b")).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn test_walk_above_root_mid_path_fails() {
        let err = absolute_path("a/../../..", Path::new("/b")).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
        let err = absolute_path("/a/../../x.rpm", Path::new("/b")).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn test_inner_parent_segments_walk_up() {
        let path = absolute_path("./export/../out/game.rpm", Path::new("/home/user/game")).unwrap();
        assert_eq!(path, PathBuf::from("/home/user/game/out/game.rpm"));
        let path = absolute_path("./../out/game.rpm", Path::new("/home/user/game")).unwrap();
        assert_eq!(path, PathBuf::from("/home/user/out/game.rpm"));
    }

    #[test]
    fn test_maps_shared_home() {
        let mapped = mapping()
            .to_build_env_path(Path::new("/home/user/game/export/game.rpm_buildroot"))
            .unwrap();
        assert_eq!(mapped.shared_root, SharedRoot::Home);
        assert_eq!(mapped.relative_suffix, "/game/export/game.rpm_buildroot");
        assert_eq!(
            mapped.build_env_path(),
            "/home/mersdk/share/game/export/game.rpm_buildroot"
        );
    }

    #[test]
    fn test_maps_shared_src() {
        let mapped = mapping().to_build_env_path(Path::new("/srv/src/game")).unwrap();
        assert_eq!(mapped.shared_root, SharedRoot::Src);
        assert_eq!(mapped.build_env_path(), "/home/src1/game");
    }

    #[test]
    fn test_mapping_round_trip() {
        let host = Path::new("/home/user/a/b/c.rpm");
        let mapped = mapping().to_build_env_path(host).unwrap();
        assert_eq!(mapped.host_path(), host);
    }

    #[test]
    fn test_prefix_matches_whole_components_only() {
        let err = mapping()
            .to_build_env_path(Path::new("/home/username/game"))
            .unwrap_err();
        assert!(err.is_run_fatal());
    }

    #[test]
    fn test_translate_or_keep() {
        let m = mapping();
        assert_eq!(
            m.translate_or_keep(Path::new("/home/user/keys/key.pem")),
            "/home/mersdk/share/keys/key.pem"
        );
        assert_eq!(m.translate_or_keep(Path::new("/opt/key.pem")), "/opt/key.pem");
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix(Path::new("/a/game.rpm"), "_buildroot"),
            PathBuf::from("/a/game.rpm_buildroot")
        );
    }
}
