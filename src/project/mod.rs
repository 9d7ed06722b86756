//! Godot project access.
//!
//! [`ProjectSettings`] is an in-memory view of `project.godot`. The exporter
//! never writes it back: temporary changes made through
//! [`ProjectSettings::override_scope`] are handed to the pack exporter as an
//! `override.cfg` fragment and undone when the scope ends.

pub mod extensions;
pub mod pack;

pub use extensions::ManifestOverride;
pub use pack::{AssetPackExporter, GodotEditorExporter, PackRequest, SharedObject};

use crate::bundler::error::{ErrorExt, Result};
use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Project configuration file name.
pub const PROJECT_FILE: &str = "project.godot";

/// Setting toggled while the asset pack is exported.
pub const USE_CUSTOM_USER_DIR: &str = "application/config/use_custom_user_dir";

/// Directory name used when [`USE_CUSTOM_USER_DIR`] is on.
pub const CUSTOM_USER_DIR_NAME: &str = "application/config/custom_user_dir_name";

/// Parsed `project.godot`.
///
/// Keys are `section/key` (`application/config/name`); keys before the first
/// section have no prefix. Values are kept as raw Godot literals.
#[derive(Clone, Debug, Default)]
pub struct ProjectSettings {
    root: PathBuf,
    values: BTreeMap<String, String>,
    loaded: BTreeMap<String, String>,
}

impl ProjectSettings {
    /// Loads `<root>/project.godot`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(PROJECT_FILE);
        let text = std::fs::read_to_string(&path).fs_context("reading project settings", &path)?;
        Ok(Self::parse(root, &text))
    }

    /// Parses project settings text for the project at `root`.
    pub fn parse(root: &Path, text: &str) -> Self {
        let mut values = BTreeMap::new();
        let mut section = String::new();
        let mut pending: Option<(String, String)> = None;

        for line in text.lines() {
            if let Some((key, mut value)) = pending.take() {
                value.push('\n');
                value.push_str(line);
                if bracket_depth(&value) > 0 {
                    pending = Some((key, value));
                } else {
                    values.insert(key, value);
                }
                continue;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let key = if section.is_empty() {
                key.trim().to_string()
            } else {
                format!("{}/{}", section, key.trim())
            };
            let value = value.trim().to_string();
            if bracket_depth(&value) > 0 {
                pending = Some((key, value));
            } else {
                values.insert(key, value);
            }
        }
        if let Some((key, value)) = pending {
            values.insert(key, value);
        }

        Self {
            root: root.to_path_buf(),
            loaded: values.clone(),
            values,
        }
    }

    /// Project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw value of `key`.
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// String value of `key` with quotes and escapes removed.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_raw(key).map(unquote)
    }

    /// Boolean value of `key`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get_raw(key)? {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// Sets `key` to a raw Godot literal.
    pub fn set_raw(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    fn restore(&mut self, key: String, value: Option<String>) {
        match value {
            Some(value) => {
                self.values.insert(key, value);
            }
            None => {
                self.values.remove(&key);
            }
        }
    }

    /// Applies `overrides` (raw literals) until the returned guard is dropped.
    ///
    /// Prior values are restored on every exit path, including early returns
    /// and unwinding.
    pub fn override_scope(&mut self, overrides: &[(&str, String)]) -> ScopedOverride<'_> {
        let mut saved = Vec::with_capacity(overrides.len());
        for (key, value) in overrides {
            saved.push((key.to_string(), self.values.get(*key).cloned()));
            self.set_raw(key, value.clone());
        }
        ScopedOverride {
            settings: self,
            saved,
        }
    }

    /// Settings changed since loading, rendered in `override.cfg` format.
    pub fn overrides_since_load(&self) -> String {
        let mut sections: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
        for (key, value) in &self.values {
            if self.loaded.get(key) == Some(value) {
                continue;
            }
            let (section, name) = key.split_once('/').unwrap_or(("", key.as_str()));
            sections.entry(section).or_default().push((name, value));
        }

        let mut text = String::new();
        for (section, entries) in sections {
            if !section.is_empty() {
                text.push_str(&format!("[{}]\n\n", section));
            }
            for (name, value) in entries {
                text.push_str(&format!("{}={}\n", name, value));
            }
            text.push('\n');
        }
        text
    }
}

/// Guard returned by [`ProjectSettings::override_scope`].
pub struct ScopedOverride<'a> {
    settings: &'a mut ProjectSettings,
    saved: Vec<(String, Option<String>)>,
}

impl Deref for ScopedOverride<'_> {
    type Target = ProjectSettings;

    fn deref(&self) -> &ProjectSettings {
        self.settings
    }
}

impl Drop for ScopedOverride<'_> {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            self.settings.restore(key, value);
        }
    }
}

/// Quotes `value` as a Godot string literal.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Removes the quotes and escapes of a Godot string literal.
pub fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn bracket_depth(value: &str) -> i32 {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in value.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// User data directory name for the packaged application.
///
/// `harbour-` and `<organization>.` prefixes become `<organization>/`.
pub fn custom_user_dir_name(package_name: &str, organization: &str) -> String {
    package_name
        .replace("harbour-", &format!("{}/", organization))
        .replace(&format!("{}.", organization), &format!("{}/", organization))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"; Engine configuration file.
config_version=5

[application]

config/name="Space \"Rocks\""
config/version="1.2.0"
config/features=PackedStringArray("4.2", "Mobile")
run/main_scene="res://main.tscn"

[input]

jump={
"deadzone": 0.5,
"events": []
}

[rendering]

renderer/rendering_method="mobile"
"#;

    fn project() -> ProjectSettings {
        ProjectSettings::parse(Path::new("/work/game"), PROJECT)
    }

    #[test]
    fn test_parse_sections_and_strings() {
        let settings = project();
        assert_eq!(settings.get_raw("config_version"), Some("5"));
        assert_eq!(
            settings.get_string("application/config/name").as_deref(),
            Some("Space \"Rocks\"")
        );
        assert_eq!(
            settings.get_string("rendering/renderer/rendering_method").as_deref(),
            Some("mobile")
        );
        assert!(settings.get_raw("input/jump").unwrap().ends_with('}'));
        assert!(settings.overrides_since_load().is_empty());
    }

    #[test]
    fn test_scoped_override_restores_prior_values() {
        let mut settings = project();
        settings.set_raw(CUSTOM_USER_DIR_NAME, quote("old"));
        {
            let scoped = settings.override_scope(&[
                (USE_CUSTOM_USER_DIR, "true".into()),
                (CUSTOM_USER_DIR_NAME, quote("ru.example/game")),
            ]);
            assert_eq!(scoped.get_bool(USE_CUSTOM_USER_DIR), Some(true));
            let cfg = scoped.overrides_since_load();
            assert!(cfg.contains("[application]"));
            assert!(cfg.contains("config/use_custom_user_dir=true"));
            assert!(cfg.contains("config/custom_user_dir_name=\"ru.example/game\""));
        }
        assert_eq!(settings.get_bool(USE_CUSTOM_USER_DIR), None);
        assert_eq!(settings.get_string(CUSTOM_USER_DIR_NAME).as_deref(), Some("old"));
    }

    #[test]
    fn test_scoped_override_restores_on_error_path() {
        fn failing_step(settings: &mut ProjectSettings) -> Result<()> {
            let _scope = settings.override_scope(&[(USE_CUSTOM_USER_DIR, "true".into())]);
            crate::bail!("pack export failed");
        }

        let mut settings = project();
        settings.set_raw(USE_CUSTOM_USER_DIR, "false");
        assert!(failing_step(&mut settings).is_err());
        assert_eq!(settings.get_bool(USE_CUSTOM_USER_DIR), Some(false));
    }

    #[test]
    fn test_custom_user_dir_name() {
        assert_eq!(custom_user_dir_name("ru.example.game", "ru.example"), "ru.example/game");
        assert_eq!(custom_user_dir_name("harbour-game", "ru.example"), "ru.example/game");
    }

    #[test]
    fn test_quote_round_trip() {
        assert_eq!(unquote(&quote(r#"a "b" \c"#)), r#"a "b" \c"#);
    }
}
