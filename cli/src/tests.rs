#![allow(clippy::unwrap_used)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn verify_cli_structure() {
    use super::Cli;
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[test]
fn prints_help() {
    Command::cargo_bin("cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Command line driver for the okto emulator cores",
        ));
}

#[test]
fn prints_version() {
    Command::cargo_bin("cli")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn run_missing_image_errors() {
    Command::cargo_bin("cli")
        .unwrap()
        .args(["run", "not_a_file.bin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("image file not found"));
}

#[test]
fn run_rejects_unknown_cpu() {
    Command::cargo_bin("cli")
        .unwrap()
        .args(["run", "prog.bin", "--cpu", "6510"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn snapshot_missing_file_errors() {
    Command::cargo_bin("cli")
        .unwrap()
        .args(["snapshot", "not_a_file.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("snapshot file not found"));
}

#[test]
fn runs_a_program_and_writes_a_snapshot() {
    // MVI A,$42 / HLT on the 8080.
    let mut image = NamedTempFile::new().unwrap();
    image.write_all(&[0x3E, 0x42, 0x76]).unwrap();
    let snap = NamedTempFile::new().unwrap();

    Command::cargo_bin("cli")
        .unwrap()
        .arg("run")
        .arg(image.path())
        .args(["--cpu", "8080", "--steps", "10"])
        .arg("--snapshot-out")
        .arg(snap.path())
        .assert()
        .success();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(snap.path()).unwrap()).unwrap();
    assert_eq!(written["cpu"], "8080");
    assert_eq!(written["a"], 0x42);
}

#[test]
fn inspect_reports_the_architecture() {
    let mut image = NamedTempFile::new().unwrap();
    image.write_all(&[0x00, 0x76]).unwrap();
    let snap = NamedTempFile::new().unwrap();

    Command::cargo_bin("cli")
        .unwrap()
        .arg("run")
        .arg(image.path())
        .args(["--cpu", "z80", "--steps", "10"])
        .arg("--snapshot-out")
        .arg(snap.path())
        .assert()
        .success();

    Command::cargo_bin("cli")
        .unwrap()
        .arg("snapshot")
        .arg(snap.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("architecture: z80"));
}

#[test]
fn trace_prints_one_line_per_instruction() {
    let mut image = NamedTempFile::new().unwrap();
    image.write_all(&[0x3E, 0x42, 0x76]).unwrap();

    Command::cargo_bin("cli")
        .unwrap()
        .arg("run")
        .arg(image.path())
        .args(["--cpu", "8080", "--steps", "10", "--trace"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MVI A,{i8}").and(predicate::str::contains("HLT")));
}
