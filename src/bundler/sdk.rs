//! Aurora SDK installation discovery.
//!
//! Reads `sdk-release` for the SDK version and configuration directory name,
//! then `libsfdk/buildengines.xml` for the host locations of the shared
//! directories, and finally asks the build engine where those directories
//! are mounted.

use crate::bundler::error::PreflightError;
use crate::bundler::settings::SdkSettings;
use crate::bundler::paths::{SharedPathMapping, VM_SHARED_HOME, VM_SHARED_SRC, to_slash};
use crate::bundler::transport::Transport;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Oldest SDK release the exporter works with.
pub const MINIMUM_SDK_VERSION: [u32; 3] = [3, 0, 7];

/// Parsed `sdk-release` file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SdkRelease {
    /// `SDK_RELEASE` as major.minor.patch
    pub version: [u32; 3],
    /// Raw `SDK_RELEASE` value
    pub raw_version: String,
    /// `SDK_CONFIG_DIR`, the SDK's directory below the user config dir
    pub config_dir: String,
}

impl SdkRelease {
    /// Reads `<sdk>/sdk-release` and enforces [`MINIMUM_SDK_VERSION`].
    pub fn read(sdk_path: &Path) -> std::result::Result<Self, PreflightError> {
        let path = sdk_path.join("sdk-release");
        let text = std::fs::read_to_string(&path).map_err(|e| PreflightError::SdkReleaseUnreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let release = Self::parse(&text).map_err(|reason| PreflightError::SdkReleaseUnreadable {
            path,
            reason,
        })?;

        if release.version < MINIMUM_SDK_VERSION {
            let [major, minor, patch] = MINIMUM_SDK_VERSION;
            return Err(PreflightError::SdkVersionTooOld {
                minimum: format!("{major}.{minor}.{patch}"),
                found: release.raw_version,
            });
        }
        Ok(release)
    }

    /// Parses `KEY=VALUE` lines.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let pattern = Regex::new(r"(\d+)\.(\d+)\.(\d+)").map_err(|e| e.to_string())?;
        let mut version = None;
        let mut raw_version = String::new();
        let mut config_dir = String::new();

        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "SDK_RELEASE" => {
                    raw_version = value.to_string();
                    let caps = pattern
                        .captures(value)
                        .ok_or_else(|| format!("cannot parse SDK_RELEASE '{value}'"))?;
                    let mut parts = [0u32; 3];
                    for (slot, index) in parts.iter_mut().zip(1..=3) {
                        *slot = caps[index]
                            .parse()
                            .map_err(|_| format!("cannot parse SDK_RELEASE '{value}'"))?;
                    }
                    version = Some(parts);
                }
                "SDK_CONFIG_DIR" => config_dir = value.to_string(),
                _ => {}
            }
        }

        let version = version.ok_or_else(|| "SDK_RELEASE not found".to_string())?;
        Ok(Self {
            version,
            raw_version,
            config_dir,
        })
    }
}

/// Directory holding the SDK's per-user configuration (`libsfdk/...`).
pub fn config_root(sdk_path: &Path, release: &SdkRelease) -> PathBuf {
    let base = if cfg!(windows) {
        sdk_path.join("settings")
    } else if cfg!(target_os = "macos") {
        dirs::home_dir().unwrap_or_default().join(".config")
    } else {
        dirs::config_dir().unwrap_or_default()
    };
    base.join(&release.config_dir)
}

/// Configuration directory for `sdk`; an explicit `config_dir` wins.
pub fn resolve_config_root(sdk: &SdkSettings, release: &SdkRelease) -> PathBuf {
    sdk.config_dir
        .clone()
        .unwrap_or_else(|| config_root(&sdk.path, release))
}

/// Host locations of the build engine's shared directories.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SharedRoots {
    /// SharedHome
    pub home: PathBuf,
    /// SharedSrc
    pub src: PathBuf,
}

impl SharedRoots {
    /// Reads SharedHome and SharedSrc from `<config root>/libsfdk/buildengines.xml`.
    pub fn read(config_root: &Path) -> std::result::Result<Self, PreflightError> {
        let path = config_root.join("libsfdk").join("buildengines.xml");
        let text = std::fs::read_to_string(&path).map_err(|e| PreflightError::SharedPathsUnavailable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let roots = Self::parse(&text).map_err(|reason| PreflightError::SharedPathsUnavailable {
            path: path.clone(),
            reason,
        })?;
        if roots.home.as_os_str().is_empty() && roots.src.as_os_str().is_empty() {
            return Err(PreflightError::SharedPathsUnavailable {
                path,
                reason: "neither SharedHome nor SharedSrc is set".into(),
            });
        }
        Ok(roots)
    }

    /// Extracts the `SharedHome`/`SharedSrc` values of a `buildengines.xml` document.
    pub fn parse(xml: &str) -> std::result::Result<Self, String> {
        let pattern = Regex::new(r#"<value\s+[^>]*key="(SharedHome|SharedSrc)"[^>]*>([^<]*)</value>"#)
            .map_err(|e| e.to_string())?;
        let mut roots = SharedRoots::default();
        for caps in pattern.captures_iter(xml) {
            let value = PathBuf::from(decode_entities(caps[2].trim()));
            match &caps[1] {
                "SharedHome" => roots.home = value,
                _ => roots.src = value,
            }
        }
        Ok(roots)
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Shell snippet printing `returncode_true` when `dir` exists.
pub fn directory_probe(dir: &str) -> String {
    format!(
        "if [ -d \"{dir}\" ]; then echo returncode_true; exit 0; else echo returncode_false; exit 1; fi"
    )
}

/// Asks the build engine whether `host_dir` is visible under the same path.
pub async fn engine_sees_path(transport: &Transport, host_dir: &Path) -> bool {
    let args = vec!["bash".into(), "-c".into(), directory_probe(&to_slash(host_dir))];
    match transport.run(&args).await {
        Ok(result) => result.success() || result.output.trim() == "returncode_true",
        Err(e) => {
            log::debug!("Shared path probe failed: {}", e);
            false
        }
    }
}

/// Builds the host ↔ engine mapping of the shared directories.
///
/// Container-based engines mount them at their host paths; VM-based engines
/// use fixed mount points.
pub async fn probe_shared_mapping(transport: &Transport, roots: &SharedRoots) -> SharedPathMapping {
    async fn engine_root(transport: &Transport, host: &Path, vm_default: &str) -> String {
        if host.as_os_str().is_empty() {
            return vm_default.to_string();
        }
        if engine_sees_path(transport, host).await {
            log::info!(
                "Build engine mounts {} at the same path as the host",
                host.display()
            );
            to_slash(host)
        } else {
            vm_default.to_string()
        }
    }

    SharedPathMapping {
        build_env_shared_home: engine_root(transport, &roots.home, VM_SHARED_HOME).await,
        build_env_shared_src: engine_root(transport, &roots.src, VM_SHARED_SRC).await,
        host_shared_home: roots.home.clone(),
        host_shared_src: roots.src.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::error::Result;
    use crate::bundler::transport::{CommandOutput, CommandRunner};
    use async_trait::async_trait;
    use std::sync::Arc;

    #[test]
    fn test_parse_sdk_release() {
        let release = SdkRelease::parse(
            "SDK_RELEASE=5.1.0.112\nSDK_CONFIG_DIR=AuroraOS-SDK\nSDK_VENDOR=Open Mobile Platform\n",
        )
        .unwrap();
        assert_eq!(release.version, [5, 1, 0]);
        assert_eq!(release.config_dir, "AuroraOS-SDK");
    }

    #[test]
    fn test_old_sdk_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sdk-release"), "SDK_RELEASE=3.0.6\n").unwrap();
        let err = SdkRelease::read(dir.path()).unwrap_err();
        assert!(matches!(err, PreflightError::SdkVersionTooOld { .. }));

        std::fs::write(dir.path().join("sdk-release"), "SDK_RELEASE=3.0.7\n").unwrap();
        assert!(SdkRelease::read(dir.path()).is_ok());
    }

    #[test]
    fn test_unparsable_release() {
        let err = SdkRelease::parse("SDK_RELEASE=latest\n").unwrap_err();
        assert!(err.contains("latest"));
    }

    #[test]
    fn test_parse_buildengines_xml() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<qtcreator>
 <data>
  <variable>BuildEngines</variable>
  <valuemap type="QVariantMap">
   <value type="QString" key="SharedHome">/home/user</value>
   <value type="QString" key="SharedSrc">/home/user/R&amp;D</value>
   <value type="QString" key="SharedConfig">/home/user/.config</value>
  </valuemap>
 </data>
</qtcreator>"#;
        let roots = SharedRoots::parse(xml).unwrap();
        assert_eq!(roots.home, PathBuf::from("/home/user"));
        assert_eq!(roots.src, PathBuf::from("/home/user/R&D"));
    }

    #[derive(Debug)]
    struct Probe {
        visible: &'static str,
    }

    #[async_trait]
    impl CommandRunner for Probe {
        async fn run(&self, _program: &Path, args: &[String]) -> Result<CommandOutput> {
            let script = args.last().cloned().unwrap_or_default();
            if script.contains(self.visible) {
                Ok(CommandOutput { exit_code: 0, output: "returncode_true\n".into() })
            } else {
                Ok(CommandOutput { exit_code: 1, output: "returncode_false\n".into() })
            }
        }
    }

    #[tokio::test]
    async fn test_probe_mixes_same_path_and_vm_defaults() {
        let transport = Transport::local_tool("sfdk", Arc::new(Probe { visible: "/home/user\"" }));
        let roots = SharedRoots {
            home: PathBuf::from("/home/user"),
            src: PathBuf::from("/srv/src"),
        };
        let mapping = probe_shared_mapping(&transport, &roots).await;
        assert_eq!(mapping.build_env_shared_home, "/home/user");
        assert_eq!(mapping.build_env_shared_src, VM_SHARED_SRC);
    }
}
