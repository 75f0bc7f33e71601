//! The `dartc` binary

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn dartc(
    dir: &Path,
    args: &[&str],
) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dartc"))
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap()
}

fn project(app: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app.dart"), app).unwrap();
    dir
}

#[test]
fn test_compile_succeeds() {
    let dir = project("main() { print('hi'); }\n");
    let output = dartc(dir.path(), &["compile", "app.dart", "--out", "build", "--no-color"]);
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(dir.path().join("build/app.js").is_file());
    assert!(dir.path().join("out/.dartc").is_dir());
}

#[test]
fn test_failed_compile_exits_one() {
    let dir = project("main() { missing(); }\n");
    let output = dartc(dir.path(), &["compile", "app.dart", "--fatal-warnings", "--no-color"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("E0503"), "{}", stderr);
}

#[test]
fn test_unknown_flag() {
    let dir = project("main() {}\n");
    let output = dartc(dir.path(), &["compile", "app.dart", "--frobnicate"]);
    assert_eq!(output.status.code(), Some(2));

    let output = dartc(
        dir.path(),
        &["compile", "app.dart", "--frobnicate", "--ignore-unrecognized-flags"],
    );
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn test_project_file_and_clean() {
    let dir = project("main() {}\n");
    std::fs::write(dir.path().join("dartc.toml"), "[build]\nwork_dir = \"cache\"\n").unwrap();

    let output = dartc(dir.path(), &["compile", "app.dart", "--metrics", "summary"]);
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(dir.path().join("cache").is_dir());

    let output = dartc(dir.path(), &["clean"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(!dir.path().join("cache").exists());
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    let output = dartc(dir.path(), &["version"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("dartc "));
}

#[test]
fn test_explain() {
    let dir = TempDir::new().unwrap();
    let output = dartc(dir.path(), &["explain", "e0503"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("E0503"), "{}", stdout);
    assert!(stdout.contains("Cannot resolve '{name}'"));

    let output = dartc(dir.path(), &["explain", "E9999"]);
    assert_eq!(output.status.code(), Some(2));
}
