use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn exporter() -> Command {
    let mut cmd = Command::cargo_bin("kodegen_bundler_aurora").unwrap();
    cmd.env_remove("AURORA_EXPORT_CONFIG").env("RUST_LOG", "off");
    cmd
}

/// SDK, shared directory settings, template and icon under `root`.
fn write_fixture(root: &Path) -> std::path::PathBuf {
    let sdk = root.join("sdk");
    std::fs::create_dir_all(sdk.join("bin")).unwrap();
    std::fs::write(sdk.join("bin/sfdk"), b"").unwrap();
    std::fs::write(
        sdk.join("sdk-release"),
        "SDK_RELEASE=5.1.0.112\nSDK_CONFIG_DIR=AuroraOS-SDK\n",
    )
    .unwrap();

    let config_dir = root.join("config");
    std::fs::create_dir_all(config_dir.join("libsfdk")).unwrap();
    std::fs::write(
        config_dir.join("libsfdk/buildengines.xml"),
        format!(
            r#"<value type="QString" key="SharedHome">{}</value>"#,
            root.display()
        ),
    )
    .unwrap();

    std::fs::write(root.join("template.aarch64"), b"\x7fELF").unwrap();
    let game = root.join("game");
    std::fs::create_dir_all(&game).unwrap();
    std::fs::write(game.join("project.godot"), "[application]\n").unwrap();
    std::fs::write(game.join("icon.png"), b"png").unwrap();

    let config = root.join("aurora-export.toml");
    std::fs::write(
        &config,
        format!(
            r#"
[sdk]
path = "{root}/sdk"
config_dir = "{root}/config"

[templates]
aarch64 = "{root}/template.aarch64"

[architectures]
aarch64 = true

[package]
organization = "ru.example"
name = "game"

[icons]
"86x86" = "res://icon.png"
"108x108" = "res://icon.png"
"128x128" = "res://icon.png"
"172x172" = "res://icon.png"

[signing]
enabled = false

[project]
path = "{root}/game"
"#,
            root = root.display()
        ),
    )
    .unwrap();
    config
}

#[test]
fn test_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    exporter()
        .current_dir(dir.path())
        .arg("check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_unknown_architecture_rejected() {
    exporter()
        .args(["export", "--arch", "mips"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mips"));
}

#[test]
fn test_check_passes_for_complete_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(dir.path());
    exporter()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("SDK release: 5.1.0.112"))
        .stdout(predicate::str::contains(
            "Configuration of ru.example.game is ready for export",
        ));
}

#[test]
fn test_check_reports_missing_sdk() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(dir.path());
    std::fs::remove_dir_all(dir.path().join("sdk")).unwrap();
    exporter()
        .arg("-c")
        .arg(&config)
        .arg("check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Aurora SDK not found"))
        .stdout(predicate::str::contains("Install the Aurora SDK"));
}

#[test]
fn test_config_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(dir.path());
    exporter()
        .env("AURORA_EXPORT_CONFIG", &config)
        .arg("check")
        .assert()
        .success();
}
