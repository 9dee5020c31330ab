use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn gargantua(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_gargantua"));
    command
        .env("GARGANTUA_CONFIG_DIR", config_dir)
        .env_remove("GARGANTUA_CONFIG")
        .env("RUST_LOG", "warn");
    command
}

#[test]
fn config_prints_discovered_scene_with_overrides() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("scene.toml"),
        "version = 1\nmode = \"3d\"\n\n[parameters]\ndisk_opacity = 0.5\n",
    )
    .unwrap();

    let output = gargantua(root.path())
        .args(["config", "--mode", "2d"])
        .output()
        .expect("failed to run gargantua config");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("scene.toml"));
    assert!(stdout.contains("mode = \"2d\""));
    assert!(stdout.contains("disk_opacity = 0.5"));
}

#[test]
fn invalid_scene_file_fails() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("scene.toml"), "version = 2\n").unwrap();

    let output = gargantua(root.path())
        .arg("config")
        .output()
        .expect("failed to run gargantua config");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("version"));
}

#[test]
fn simulate_reports_frames_and_clean_shutdown() {
    let root = TempDir::new().unwrap();

    let output = gargantua(root.path())
        .args(["simulate", "--frames", "12", "--mode", "3d", "--toggle-every", "4"])
        .output()
        .expect("failed to run gargantua simulate");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("frames: 12"));
    assert!(stdout.contains("presented: 12"));
    assert!(stdout.contains("mode switches: 2"));
    assert!(stdout.contains("final mode: 3D"));
    assert!(stdout.contains("leaked after shutdown: 0"));
}
