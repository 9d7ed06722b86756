//! Package signing and validation.
//!
//! Signing runs `rpmsign-external` inside the target's scratchbox, so every
//! path it receives must be a build engine path. Validation runs `sfdk check`
//! on the host and is only available through the `sfdk` transport.

use crate::bundler::error::Result;
use crate::bundler::targets::BuildTarget;
use crate::bundler::transport::Transport;

/// Passphrase handed to `rpmsign-external` when none is configured, so it never prompts.
pub const NO_PASSWORD: &str = "nopassword";

/// Key material for one signing run, already translated to build engine paths.
#[derive(Clone, Debug)]
pub struct SigningRequest<'a> {
    /// Private key
    pub key: &'a str,
    /// Certificate
    pub cert: &'a str,
    /// Key passphrase
    pub password: Option<&'a str>,
    /// Package to sign
    pub artifact: &'a str,
}

/// `sb2 -t <target> env KEY_PASSPHRASE=... rpmsign-external sign ...`
pub fn sign_args(target: &BuildTarget, request: &SigningRequest<'_>) -> Vec<String> {
    let password = request
        .password
        .filter(|p| !p.is_empty())
        .unwrap_or(NO_PASSWORD);
    vec![
        "sb2".into(),
        "-t".into(),
        target.sb2_target(),
        "env".into(),
        format!("KEY_PASSPHRASE={}", password),
        "rpmsign-external".into(),
        "sign".into(),
        "--key".into(),
        request.key.into(),
        "--cert".into(),
        request.cert.into(),
        request.artifact.into(),
    ]
}

/// `-c target=<target> check <artifact>`
pub fn validate_args(target: &BuildTarget, artifact: &str) -> Vec<String> {
    vec![
        "-c".into(),
        format!("target={}", target.name()),
        "check".into(),
        artifact.into(),
    ]
}

/// Signs the package in the build engine.
pub async fn sign_package(
    transport: &Transport,
    target: &BuildTarget,
    request: &SigningRequest<'_>,
) -> Result<()> {
    log::info!("Signing {}", request.artifact);
    transport.execute(&sign_args(target, request)).await?;
    Ok(())
}

/// Runs the SDK validator. Returns `false` when the transport cannot validate.
pub async fn validate_package(transport: &Transport, target: &BuildTarget, artifact: &str) -> Result<bool> {
    if !transport.supports_validation() {
        log::warn!("Package validation needs the sfdk transport; skipping {}", artifact);
        return Ok(false);
    }
    log::info!("Validating {}", artifact);
    transport.execute_tool(&validate_args(target, artifact)).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::settings::Arch;
    use std::path::PathBuf;

    fn target() -> BuildTarget {
        BuildTarget {
            platform: "AuroraOS".into(),
            version: [5, 0, 0, 60],
            variant: Some("-base".into()),
            arch: Arch::Aarch64,
            template: PathBuf::from("/t"),
        }
    }

    #[test]
    fn test_sign_args_use_sentinel_password() {
        let request = SigningRequest {
            key: "/home/mersdk/share/keys/key.pem",
            cert: "/home/mersdk/share/keys/cert.pem",
            password: None,
            artifact: "/home/mersdk/share/game/export/game-1.0-1.aarch64.rpm",
        };
        let args = sign_args(&target(), &request);
        assert_eq!(
            args,
            vec![
                "sb2",
                "-t",
                "AuroraOS-5.0.0.60-base-aarch64.default",
                "env",
                "KEY_PASSPHRASE=nopassword",
                "rpmsign-external",
                "sign",
                "--key",
                "/home/mersdk/share/keys/key.pem",
                "--cert",
                "/home/mersdk/share/keys/cert.pem",
                "/home/mersdk/share/game/export/game-1.0-1.aarch64.rpm",
            ]
        );
    }

    #[test]
    fn test_validate_args_drop_default_suffix() {
        let args = validate_args(&target(), "/out/game.rpm");
        assert_eq!(
            args,
            vec!["-c", "target=AuroraOS-5.0.0.60-base-aarch64", "check", "/out/game.rpm"]
        );
    }
}
