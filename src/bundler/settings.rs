//! Configuration structures for Aurora OS exports.
//!
//! An [`ExportSettings`] value is loaded once per export run from
//! `aurora-export.toml`, adjusted by command line overrides, and then passed by
//! reference to every component. Nothing reads configuration from ambient
//! globals.
//!
//! # Configuration
//!
//! ```toml
//! [sdk]
//! path = "/home/user/AuroraOS"
//! tool = "sfdk"            # or "ssh"
//!
//! [templates]
//! aarch64 = "/opt/godot/templates/godot.auroraos.template_release.arm64"
//!
//! [architectures]
//! aarch64 = true
//!
//! [package]
//! organization = "ru.example"
//! name = "mygame"
//! release = 1
//!
//! [icons]
//! "86x86" = "res://icons/86.png"
//! "108x108" = "res://icons/108.png"
//! "128x128" = "res://icons/128.png"
//! "172x172" = "res://icons/172.png"
//!
//! [signing]
//! key = "/home/user/keys/regular_key.pem"
//! cert = "/home/user/keys/regular_cert.pem"
//!
//! permissions = ["Internet", "Audio"]
//!
//! [export]
//! path = "./export/mygame.rpm"
//! ```

use crate::bundler::error::{ErrorExt, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default configuration file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "aurora-export.toml";

/// CPU architecture of an Aurora OS build target.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arch {
    /// 32-bit ARM with hard-float
    #[serde(rename = "armv7hl")]
    Armv7hl,
    /// 64-bit ARM
    #[serde(rename = "aarch64")]
    Aarch64,
    /// x86_64 (emulator targets)
    #[serde(rename = "x86_64")]
    X86_64,
    /// Token not recognised
    #[serde(rename = "unknown")]
    Unknown,
}

impl Arch {
    /// Architectures that can be exported, in build order.
    pub const SUPPORTED: [Arch; 3] = [Arch::Armv7hl, Arch::Aarch64, Arch::X86_64];

    /// Token used by the SDK, rpmbuild and artifact names.
    pub fn token(&self) -> &'static str {
        match self {
            Arch::Armv7hl => "armv7hl",
            Arch::Aarch64 => "aarch64",
            Arch::X86_64 => "x86_64",
            Arch::Unknown => "noarch",
        }
    }

    /// Parses an SDK architecture token.
    pub fn from_token(token: &str) -> Arch {
        match token {
            "armv7hl" => Arch::Armv7hl,
            "aarch64" => Arch::Aarch64,
            "x86_64" => Arch::X86_64,
            _ => Arch::Unknown,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// How commands reach the SDK build engine.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// The SDK's own `sfdk` tool (`sfdk engine exec ...`).
    #[default]
    #[serde(alias = "tool")]
    Sfdk,
    /// Plain ssh into the build engine.
    Ssh,
}

/// Aurora SDK location and connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkSettings {
    /// SDK installation directory (contains `sdk-release` and `bin/sfdk`).
    pub path: PathBuf,
    /// Transport used to reach the build engine.
    pub tool: TransportKind,
    /// ssh client binary, used when `tool = "ssh"`.
    pub ssh_tool_path: PathBuf,
    /// Build engine ssh port.
    pub ssh_port: u16,
    /// Build engine user.
    pub ssh_user: String,
    /// Build engine host.
    pub ssh_host: String,
    /// SDK configuration directory (holding `libsfdk/buildengines.xml`).
    /// Defaults to `<user config dir>/<SDK_CONFIG_DIR>`.
    pub config_dir: Option<PathBuf>,
}

impl Default for SdkSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            tool: TransportKind::Sfdk,
            ssh_tool_path: PathBuf::from("/usr/bin/ssh"),
            ssh_port: 2222,
            ssh_user: "mersdk".into(),
            ssh_host: "localhost".into(),
            config_dir: None,
        }
    }
}

impl SdkSettings {
    /// Path of the `sfdk` binary inside the SDK.
    pub fn sfdk_path(&self) -> PathBuf {
        if cfg!(windows) {
            self.path.join("bin").join("sfdk.exe")
        } else {
            self.path.join("bin").join("sfdk")
        }
    }

    /// Private key the SDK generates for ssh access to the build engine.
    pub fn ssh_identity_key(&self) -> PathBuf {
        self.path.join("vmshare/ssh/private_keys/engine/mersdk")
    }
}

/// Export template binaries per architecture.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// armv7hl template
    pub armv7hl: Option<PathBuf>,
    /// aarch64 template
    pub aarch64: Option<PathBuf>,
    /// x86_64 template
    pub x86_64: Option<PathBuf>,
}

impl TemplateSettings {
    /// Configured template for `arch`, ignoring empty entries.
    pub fn get(&self, arch: Arch) -> Option<&Path> {
        let path = match arch {
            Arch::Armv7hl => self.armv7hl.as_deref(),
            Arch::Aarch64 => self.aarch64.as_deref(),
            Arch::X86_64 => self.x86_64.as_deref(),
            Arch::Unknown => None,
        };
        path.filter(|p| !p.as_os_str().is_empty())
    }

    /// Sets the template for `arch`.
    pub fn set(&mut self, arch: Arch, path: impl Into<PathBuf>) {
        let path = Some(path.into());
        match arch {
            Arch::Armv7hl => self.armv7hl = path,
            Arch::Aarch64 => self.aarch64 = path,
            Arch::X86_64 => self.x86_64 = path,
            Arch::Unknown => {}
        }
    }
}

/// Architectures requested for this export.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureSettings {
    /// Build armv7hl
    pub armv7hl: bool,
    /// Build aarch64
    pub aarch64: bool,
    /// Build x86_64
    pub x86_64: bool,
}

impl ArchitectureSettings {
    /// Whether `arch` was requested.
    pub fn is_enabled(&self, arch: Arch) -> bool {
        match arch {
            Arch::Armv7hl => self.armv7hl,
            Arch::Aarch64 => self.aarch64,
            Arch::X86_64 => self.x86_64,
            Arch::Unknown => false,
        }
    }

    /// Enabled architectures in build order.
    pub fn enabled(&self) -> Vec<Arch> {
        Arch::SUPPORTED
            .into_iter()
            .filter(|arch| self.is_enabled(*arch))
            .collect()
    }

    /// Replaces the enabled set.
    pub fn only(archs: &[Arch]) -> Self {
        Self {
            armv7hl: archs.contains(&Arch::Armv7hl),
            aarch64: archs.contains(&Arch::Aarch64),
            x86_64: archs.contains(&Arch::X86_64),
        }
    }
}

/// RPM package metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSettings {
    /// Reverse-domain organization, e.g. `ru.example`.
    pub organization: String,
    /// Application name; the package name is `<organization>.<name>`.
    pub name: String,
    /// Launcher label. Falls back to the project's `application/config/name`.
    pub launcher_name: Option<String>,
    /// Package version. Falls back to the project's `application/config/version`.
    pub version: Option<String>,
    /// RPM release number.
    pub release: u32,
    /// Package description. Falls back to `application/config/description`.
    pub description: Option<String>,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            organization: String::new(),
            name: String::new(),
            launcher_name: None,
            version: None,
            release: 1,
            description: None,
        }
    }
}

impl PackageSettings {
    /// RPM package name, `<organization>.<name>` with the `$genname` marker removed.
    pub fn package_name(&self) -> String {
        format!("{}.{}", self.organization, self.name).replace("$genname", "")
    }
}

/// Icon sizes required by Aurora OS launchers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IconSize {
    /// 86x86
    S86,
    /// 108x108
    S108,
    /// 128x128
    S128,
    /// 172x172
    S172,
}

impl IconSize {
    /// All sizes, smallest first.
    pub const ALL: [IconSize; 4] = [IconSize::S86, IconSize::S108, IconSize::S128, IconSize::S172];

    /// Edge length in pixels.
    pub fn pixels(&self) -> u32 {
        match self {
            IconSize::S86 => 86,
            IconSize::S108 => 108,
            IconSize::S128 => 128,
            IconSize::S172 => 172,
        }
    }

    /// Directory label, e.g. `86x86`.
    pub fn label(&self) -> String {
        format!("{0}x{0}", self.pixels())
    }
}

/// Launcher icons, one per [`IconSize`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IconSettings {
    /// 86x86 icon
    #[serde(rename = "86x86")]
    pub icon_86: Option<PathBuf>,
    /// 108x108 icon
    #[serde(rename = "108x108")]
    pub icon_108: Option<PathBuf>,
    /// 128x128 icon
    #[serde(rename = "128x128")]
    pub icon_128: Option<PathBuf>,
    /// 172x172 icon
    #[serde(rename = "172x172")]
    pub icon_172: Option<PathBuf>,
}

impl IconSettings {
    /// Configured icon for `size`.
    pub fn get(&self, size: IconSize) -> Option<&Path> {
        match size {
            IconSize::S86 => self.icon_86.as_deref(),
            IconSize::S108 => self.icon_108.as_deref(),
            IconSize::S128 => self.icon_128.as_deref(),
            IconSize::S172 => self.icon_172.as_deref(),
        }
    }

    /// Uses the same file for every size.
    pub fn all(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            icon_86: Some(path.clone()),
            icon_108: Some(path.clone()),
            icon_128: Some(path.clone()),
            icon_172: Some(path),
        }
    }
}

/// RPM signing with `rpmsign-external`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningSettings {
    /// Sign the produced package.
    pub enabled: bool,
    /// Private key.
    pub key: Option<PathBuf>,
    /// Certificate.
    pub cert: Option<PathBuf>,
    /// Key passphrase.
    pub password: Option<String>,
}

impl Default for SigningSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            key: None,
            cert: None,
            password: None,
        }
    }
}

/// Sandbox (sailjail) permissions an application can request.
///
/// Declaration order is the order in which enabled permissions are written to
/// the launcher descriptor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Permission {
    Audio,
    Bluetooth,
    Camera,
    Internet,
    Location,
    MediaIndexing,
    Microphone,
    #[serde(rename = "NFC")]
    Nfc,
    RemovableMedia,
    UserDirs,
    WebView,
    Documents,
    Downloads,
    Music,
    Pictures,
    PublicDir,
    Videos,
    Compatibility,
}

impl Permission {
    /// Optional permissions in declaration order.
    pub const DECLARED: [Permission; 18] = [
        Permission::Audio,
        Permission::Bluetooth,
        Permission::Camera,
        Permission::Internet,
        Permission::Location,
        Permission::MediaIndexing,
        Permission::Microphone,
        Permission::Nfc,
        Permission::RemovableMedia,
        Permission::UserDirs,
        Permission::WebView,
        Permission::Documents,
        Permission::Downloads,
        Permission::Music,
        Permission::Pictures,
        Permission::PublicDir,
        Permission::Videos,
        Permission::Compatibility,
    ];

    /// Permissions written for every application regardless of configuration.
    pub const MANDATORY: [Permission; 0] = [];

    /// Name as written in the launcher descriptor.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Audio => "Audio",
            Permission::Bluetooth => "Bluetooth",
            Permission::Camera => "Camera",
            Permission::Internet => "Internet",
            Permission::Location => "Location",
            Permission::MediaIndexing => "MediaIndexing",
            Permission::Microphone => "Microphone",
            Permission::Nfc => "NFC",
            Permission::RemovableMedia => "RemovableMedia",
            Permission::UserDirs => "UserDirs",
            Permission::WebView => "WebView",
            Permission::Documents => "Documents",
            Permission::Downloads => "Downloads",
            Permission::Music => "Music",
            Permission::Pictures => "Pictures",
            Permission::PublicDir => "PublicDir",
            Permission::Videos => "Videos",
            Permission::Compatibility => "Compatibility",
        }
    }
}

/// Optional `rpm_validator` run after signing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    /// Run `sfdk check` on the produced package.
    pub enabled: bool,
}

/// Sailjail section of the launcher descriptor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Append the `[X-Application]` permissions section.
    pub enabled: bool,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Godot project being exported.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project root (directory containing `project.godot`).
    pub path: PathBuf,
    /// Godot editor binary used to export the pack. Looked up on `PATH` when unset.
    pub godot: Option<PathBuf>,
    /// Export preset name passed to `--export-pack`.
    pub preset: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            godot: None,
            preset: "AuroraOS".into(),
        }
    }
}

/// Output location and build flavour.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Export path, relative to the project root unless absolute.
    pub path: String,
    /// Export a debug pack.
    pub debug: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            path: "./export/package.rpm".into(),
            debug: false,
        }
    }
}

/// Complete, read-only configuration of one export run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// SDK location and transport
    pub sdk: SdkSettings,
    /// Template binaries
    pub templates: TemplateSettings,
    /// Requested architectures
    pub architectures: ArchitectureSettings,
    /// Package metadata
    pub package: PackageSettings,
    /// Launcher icons
    pub icons: IconSettings,
    /// Package signing
    pub signing: SigningSettings,
    /// Enabled optional sandbox permissions
    pub permissions: Vec<Permission>,
    /// Package validation
    pub validator: ValidatorSettings,
    /// Launcher sandboxing
    pub sandbox: SandboxSettings,
    /// Godot project
    pub project: ProjectConfig,
    /// Output
    pub export: OutputSettings,
}

impl ExportSettings {
    /// Loads settings from a TOML file.
    ///
    /// A relative project path is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).fs_context("reading export configuration", path)?;
        let mut settings: ExportSettings = toml::from_str(&text)?;
        if settings.project.path.is_relative()
            && let Some(dir) = path.parent()
        {
            settings.project.path = dir.join(&settings.project.path);
        }
        log::debug!("Loaded export configuration from {}", path.display());
        Ok(settings)
    }

    /// Starts a [`SettingsBuilder`].
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Resolves `res://` paths against the project root; other paths are returned unchanged.
    pub fn resolve_resource(&self, path: &Path) -> PathBuf {
        match path.to_str().and_then(|p| p.strip_prefix("res://")) {
            Some(rest) => self.project.path.join(rest),
            None => path.to_path_buf(),
        }
    }

    /// Whether the enabled permission set contains `permission`.
    pub fn permission_enabled(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Builder for [`ExportSettings`], mostly used by tests and embedders.
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    settings: ExportSettings,
}

impl SettingsBuilder {
    /// SDK directory.
    pub fn sdk_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.sdk.path = path.into();
        self
    }

    /// Transport kind.
    pub fn transport(mut self, tool: TransportKind) -> Self {
        self.settings.sdk.tool = tool;
        self
    }

    /// SDK configuration directory.
    pub fn sdk_config_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.sdk.config_dir = Some(path.into());
        self
    }

    /// Enables `arch` with the given template binary.
    pub fn target(mut self, arch: Arch, template: impl Into<PathBuf>) -> Self {
        self.settings.templates.set(arch, template);
        let mut enabled = self.settings.architectures.enabled();
        enabled.push(arch);
        self.settings.architectures = ArchitectureSettings::only(&enabled);
        self
    }

    /// Package identity.
    pub fn package(mut self, organization: &str, name: &str, version: &str, release: u32) -> Self {
        self.settings.package.organization = organization.into();
        self.settings.package.name = name.into();
        self.settings.package.version = Some(version.into());
        self.settings.package.release = release;
        self
    }

    /// Same icon for all sizes.
    pub fn icon(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.icons = IconSettings::all(path);
        self
    }

    /// Signing key material; enables signing.
    pub fn signing(mut self, key: impl Into<PathBuf>, cert: impl Into<PathBuf>) -> Self {
        self.settings.signing = SigningSettings {
            enabled: true,
            key: Some(key.into()),
            cert: Some(cert.into()),
            password: None,
        };
        self
    }

    /// Disables signing.
    pub fn without_signing(mut self) -> Self {
        self.settings.signing.enabled = false;
        self
    }

    /// Enables the package validator.
    pub fn validator(mut self, enabled: bool) -> Self {
        self.settings.validator.enabled = enabled;
        self
    }

    /// Enabled optional permissions.
    pub fn permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.settings.permissions = permissions;
        self
    }

    /// Project root.
    pub fn project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.project.path = path.into();
        self
    }

    /// Export path.
    pub fn export_path(mut self, path: impl Into<String>) -> Self {
        self.settings.export.path = path.into();
        self
    }

    /// Debug pack.
    pub fn debug(mut self, debug: bool) -> Self {
        self.settings.export.debug = debug;
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> ExportSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let text = r#"
            permissions = ["Internet", "NFC"]

            [sdk]
            path = "/opt/AuroraOS"
            tool = "ssh"
            ssh_port = 2223

            [templates]
            aarch64 = "/opt/templates/arm64"

            [architectures]
            aarch64 = true

            [package]
            organization = "ru.example"
            name = "game"
            release = 3

            [icons]
            "86x86" = "res://icons/86.png"
        "#;
        let settings: ExportSettings = toml::from_str(text).unwrap();
        assert_eq!(settings.sdk.tool, TransportKind::Ssh);
        assert_eq!(settings.sdk.ssh_port, 2223);
        assert_eq!(settings.sdk.ssh_user, "mersdk");
        assert_eq!(settings.architectures.enabled(), vec![Arch::Aarch64]);
        assert_eq!(settings.package.package_name(), "ru.example.game");
        assert_eq!(settings.package.release, 3);
        assert!(settings.signing.enabled);
        assert!(settings.permission_enabled(Permission::Nfc));
        assert_eq!(
            settings.icons.get(IconSize::S86),
            Some(Path::new("res://icons/86.png"))
        );
    }

    #[test]
    fn test_tool_alias() {
        let settings: ExportSettings = toml::from_str("[sdk]\ntool = \"tool\"\n").unwrap();
        assert_eq!(settings.sdk.tool, TransportKind::Sfdk);
    }

    #[test]
    fn test_empty_template_is_unset() {
        let mut templates = TemplateSettings::default();
        templates.set(Arch::Armv7hl, "");
        assert!(templates.get(Arch::Armv7hl).is_none());
    }

    #[test]
    fn test_resolve_resource() {
        let settings = ExportSettings::builder().project_path("/work/game").build();
        assert_eq!(
            settings.resolve_resource(Path::new("res://icons/a.png")),
            PathBuf::from("/work/game/icons/a.png")
        );
        assert_eq!(
            settings.resolve_resource(Path::new("/abs/a.png")),
            PathBuf::from("/abs/a.png")
        );
    }

    #[test]
    fn test_genname_marker_removed() {
        let package = PackageSettings {
            organization: "ru.example".into(),
            name: "$gennamegame".into(),
            ..Default::default()
        };
        assert_eq!(package.package_name(), "ru.example.game");
    }
}
