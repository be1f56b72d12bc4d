//! Command-line behavior of the sfpkg binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::process;
use tempfile::TempDir;

fn sfpkg() -> Command {
    let mut cmd = cargo_bin_cmd!("sfpkg");
    cmd.env_remove("SFPKG_API_VERSION")
        .env_remove("SFPKG_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Run plain git in `dir`, panicking on failure
fn git(dir: &TempDir, args: &[&str]) {
    let status = process::Command::new("git")
        .arg("-C")
        .arg(dir.path())
        .args(["-c", "user.name=Test User", "-c", "user.email=test@example.com"])
        .args(args)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

#[test]
fn no_subcommand_prints_help_and_fails() {
    sfpkg()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn unknown_subcommand_fails() {
    sfpkg().arg("partial").assert().failure().code(2);
}

#[test]
fn full_writes_and_echoes_manifest() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("package.xml");

    let assert = sfpkg()
        .args(["full", "--api-version", "58.0", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
        ))
        .stdout(predicate::str::contains("<name>StaticResource</name>"))
        .stdout(predicate::str::contains("<version>58.0</version>"));

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(String::from_utf8_lossy(&assert.get_output().stdout), written);
    assert_eq!(written.matches("<members>*</members>").count(), 23);
}

#[test]
fn full_reads_api_version_from_env() {
    let dir = TempDir::new().unwrap();

    sfpkg()
        .current_dir(dir.path())
        .env("SFPKG_API_VERSION", "61.0")
        .arg("full")
        .assert()
        .success();

    let written = fs::read_to_string(dir.path().join("package.xml")).unwrap();
    assert!(written.contains("<version>61.0</version>"));
}

#[test]
fn full_requires_api_version() {
    sfpkg()
        .arg("full")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--api-version"));
}

#[test]
fn diff_builds_manifest_from_history() {
    let repo = TempDir::new().unwrap();
    git(&repo, &["init", "-q"]);
    let classes = repo.path().join("force-app/main/default/classes");
    fs::create_dir_all(&classes).unwrap();
    fs::write(classes.join("Foo.cls"), "public class Foo {}\n").unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-q", "-m", "base"]);
    git(&repo, &["tag", "base"]);

    fs::write(classes.join("Bar.cls"), "public class Bar {}\n").unwrap();
    fs::write(classes.join("Bar.cls-meta.xml"), "<ApexClass/>\n").unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-q", "-m", "feature"]);

    let out = TempDir::new().unwrap();
    let output = out.path().join("package.xml");

    sfpkg()
        .args(["diff", "--api-version", "58.0", "--source", "base", "--target", "HEAD", "--timeout", "60"])
        .arg("--repo")
        .arg(repo.path())
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("<members>Bar</members>"))
        .stdout(predicate::str::contains("<members>Foo</members>").not());

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(written.matches("<members>Bar</members>").count(), 1);
}

#[test]
fn diff_failure_writes_nothing() {
    let repo = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let output = out.path().join("package.xml");

    sfpkg()
        .args(["diff", "--api-version", "58.0", "--source", "main", "--target", "HEAD"])
        .arg("--repo")
        .arg(repo.path())
        .arg("--output")
        .arg(&output)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error:"));

    assert!(!output.exists());
}

#[test]
fn completions_are_generated() {
    sfpkg()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sfpkg"));
}
