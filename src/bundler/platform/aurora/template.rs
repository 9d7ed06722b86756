//! Export template checks.
//!
//! A template built for the wrong CPU produces a package that installs but
//! never starts, so the ELF header is compared against the target before the
//! binary is staged.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::settings::Arch;
use goblin::elf::Elf;
use goblin::elf::header::{ELFCLASS32, EI_CLASS, EM_AARCH64, EM_ARM, EM_X86_64};
use std::io::Read;
use std::path::Path;

const ELF_HEADER_LEN: usize = 64;
const ELF32_HEADER_LEN: usize = 52;

/// Architecture recorded in an ELF header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DetectedArch {
    /// A supported architecture
    Known(Arch),
    /// Valid ELF for some other machine
    Other(String),
}

/// Reads the ELF header of `path`.
///
/// `Ok(None)` means the header could not be interpreted; callers treat that
/// as "architecture unknown", not as a failure.
pub fn detect_arch(path: &Path) -> Result<Option<DetectedArch>> {
    let mut file = std::fs::File::open(path).fs_context("opening export template", path)?;
    let mut header = Vec::with_capacity(ELF_HEADER_LEN);
    file.by_ref()
        .take(ELF_HEADER_LEN as u64)
        .read_to_end(&mut header)
        .fs_context("reading export template", path)?;

    if header.len() < ELF32_HEADER_LEN {
        log::debug!("{} is too short to be an ELF binary", path.display());
        return Ok(None);
    }
    let parsed = match Elf::parse_header(&header) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::debug!("Cannot parse ELF header of {}: {}", path.display(), e);
            return Ok(None);
        }
    };

    let is_32bit = parsed.e_ident[EI_CLASS] == ELFCLASS32;
    let detected = match parsed.e_machine {
        EM_ARM if is_32bit => DetectedArch::Known(Arch::Armv7hl),
        EM_AARCH64 => DetectedArch::Known(Arch::Aarch64),
        EM_X86_64 => DetectedArch::Known(Arch::X86_64),
        machine => DetectedArch::Other(goblin::elf::header::machine_to_str(machine).to_string()),
    };
    Ok(Some(detected))
}

/// Checks that the template exists and matches `expected`.
///
/// Missing or mismatched templates are errors; an unreadable header only warns.
pub fn validate_template(path: &Path, expected: Arch) -> Result<()> {
    if !path.is_file() {
        return Err(Error::TemplateNotFound(path.to_path_buf()));
    }

    match detect_arch(path)? {
        Some(DetectedArch::Known(arch)) if arch == expected => {
            log::debug!("Template {} matches {}", path.display(), expected);
            Ok(())
        }
        Some(DetectedArch::Known(arch)) => Err(Error::TemplateArchitectureMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            detected: arch.to_string(),
        }),
        Some(DetectedArch::Other(machine)) => Err(Error::TemplateArchitectureMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            detected: machine,
        }),
        None => {
            log::warn!(
                "Cannot determine the architecture of {}, assuming {}",
                path.display(),
                expected
            );
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal little-endian ELF header for `machine`.
    pub(crate) fn elf_header(is_64: bool, machine: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; 64];
        bytes[..4].copy_from_slice(b"\x7fELF");
        bytes[4] = if is_64 { 2 } else { 1 };
        bytes[5] = 1;
        bytes[6] = 1;
        bytes[16..18].copy_from_slice(&2u16.to_le_bytes());
        bytes[18..20].copy_from_slice(&machine.to_le_bytes());
        bytes[20..24].copy_from_slice(&1u32.to_le_bytes());
        bytes
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_detects_supported_machines() {
        let dir = tempfile::tempdir().unwrap();
        let arm = write(dir.path(), "arm", &elf_header(false, EM_ARM));
        let arm64 = write(dir.path(), "arm64", &elf_header(true, EM_AARCH64));
        let x64 = write(dir.path(), "x64", &elf_header(true, EM_X86_64));
        assert_eq!(detect_arch(&arm).unwrap(), Some(DetectedArch::Known(Arch::Armv7hl)));
        assert_eq!(detect_arch(&arm64).unwrap(), Some(DetectedArch::Known(Arch::Aarch64)));
        assert_eq!(detect_arch(&x64).unwrap(), Some(DetectedArch::Known(Arch::X86_64)));
    }

    #[test]
    fn test_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let x64 = write(dir.path(), "x64", &elf_header(true, EM_X86_64));
        let err = validate_template(&x64, Arch::Aarch64).unwrap_err();
        assert!(matches!(err, Error::TemplateArchitectureMismatch { .. }));
        assert!(!err.is_run_fatal());
    }

    #[test]
    fn test_unreadable_header_only_warns() {
        let dir = tempfile::tempdir().unwrap();
        let script = write(dir.path(), "script", b"#!/bin/sh\necho hi\n");
        assert!(validate_template(&script, Arch::Armv7hl).is_ok());
    }

    #[test]
    fn test_missing_template() {
        let err = validate_template(Path::new("/nonexistent/template"), Arch::X86_64).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(_)));
    }
}
