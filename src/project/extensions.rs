//! GDExtension manifest handling.
//!
//! Native extensions declare one library path per platform feature tag in the
//! `[libraries]` section of their `.gdextension` file. For Aurora OS the
//! entries matching the export flavour are pointed at the package's private
//! library directory. The rewrite happens in memory; the result is written
//! only into the shadow project the pack is exported from.

use crate::bundler::error::{ErrorExt, Result};
use crate::project::pack::SharedObject;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Manifest file extension.
pub const MANIFEST_EXTENSION: &str = "gdextension";

/// Rewritten contents for one manifest, relative to the project root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManifestOverride {
    /// Manifest path relative to the project root
    pub relative_path: PathBuf,
    /// Rewritten manifest text
    pub contents: String,
}

/// Finds every `.gdextension` file below `root`, skipping `.godot` and `.git`.
pub fn find_manifests(root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(e.file_type().is_dir() && (name == ".godot" || name == ".git"))
        })
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path().extension().is_some_and(|ext| ext == MANIFEST_EXTENSION)
        })
        .map(|e| e.into_path())
        .collect();
    found.sort();
    found
}

/// Whether a `[libraries]` key is the Aurora OS entry for this export flavour.
pub fn entry_applies(key: &str, debug: bool) -> bool {
    key.contains("auroraos.") && key.contains(if debug { "debug" } else { "release" })
}

/// Installed location of an extension library inside the package.
pub fn installed_library_path(package_name: &str, library: &str) -> String {
    let file_name = library.rsplit('/').next().unwrap_or(library);
    format!("/usr/share/{}/lib/{}", package_name, file_name)
}

/// Iterates the `(key, value)` pairs of the `[libraries]` section, values unquoted.
fn library_entries(content: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut in_libraries = false;
    content.lines().filter_map(move |line| {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            in_libraries = trimmed == "[libraries]";
            return None;
        }
        if !in_libraries {
            return None;
        }
        let (key, value) = trimmed.split_once('=')?;
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some((key.trim(), value))
    })
}

/// Points the applying `[libraries]` entries at the package library directory.
///
/// All other lines are kept verbatim.
pub fn rewrite_manifest(content: &str, package_name: &str, debug: bool) -> String {
    let mut out = String::with_capacity(content.len());
    let mut in_libraries = false;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            in_libraries = trimmed == "[libraries]";
            out.push_str(line);
            continue;
        }

        let rewritten = in_libraries
            .then(|| trimmed.split_once('='))
            .flatten()
            .filter(|(key, _)| entry_applies(key.trim(), debug))
            .map(|(key, value)| {
                let value = value.trim().trim_matches('"');
                let installed = installed_library_path(package_name, value);
                log::debug!("Extension library {} -> {}", value, installed);
                format!("{} = \"{}\"", key.trim(), installed)
            });

        match rewritten {
            Some(text) => {
                out.push_str(&text);
                if line.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => out.push_str(line),
        }
    }
    out
}

/// Rewritten manifests for every extension that has an applying entry.
pub fn manifest_overrides(root: &Path, package_name: &str, debug: bool) -> Result<Vec<ManifestOverride>> {
    let mut overrides = Vec::new();
    for path in find_manifests(root) {
        let content = std::fs::read_to_string(&path).fs_context("reading extension manifest", &path)?;
        let contents = rewrite_manifest(&content, package_name, debug);
        if contents != content {
            overrides.push(ManifestOverride {
                relative_path: path.strip_prefix(root)?.to_path_buf(),
                contents,
            });
        }
    }
    log::debug!("{} extension manifest(s) rewritten", overrides.len());
    Ok(overrides)
}

/// Resolves a manifest library path to a host file.
fn resolve_library(root: &Path, manifest: &Path, value: &str) -> PathBuf {
    match value.strip_prefix("res://") {
        Some(rest) => root.join(rest),
        None => manifest.parent().unwrap_or(root).join(value),
    }
}

/// Libraries the applying manifest entries reference. Missing files are skipped.
pub fn collect_shared_objects(root: &Path, debug: bool) -> Result<Vec<SharedObject>> {
    let mut objects: Vec<SharedObject> = Vec::new();
    for manifest in find_manifests(root) {
        let content =
            std::fs::read_to_string(&manifest).fs_context("reading extension manifest", &manifest)?;
        for (key, value) in library_entries(&content) {
            if !entry_applies(key, debug) {
                continue;
            }
            let path = resolve_library(root, &manifest, value);
            if !path.is_file() {
                log::warn!(
                    "Extension library {} declared in {} not found",
                    path.display(),
                    manifest.display()
                );
                continue;
            }
            if !objects.iter().any(|o| o.path == path) {
                objects.push(SharedObject { path });
            }
        }
    }
    Ok(objects)
}

/// Logs every library entry relevant to Aurora OS or Linux.
pub fn log_diagnostics(root: &Path) {
    const INTERESTING: [&str; 5] = ["auroraos", "linux", "armv7hl", "aarch64", "x86_64"];

    for manifest in find_manifests(root) {
        let Ok(content) = std::fs::read_to_string(&manifest) else {
            continue;
        };
        for (key, value) in library_entries(&content) {
            if INTERESTING.iter().any(|tag| key.contains(tag)) {
                log::debug!("{}: {} = {}", manifest.display(), key, value);
            }
        }
    }
}
