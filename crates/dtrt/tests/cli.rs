//! Command-line integration tests for the `dtrt` binary.
//!
//! Drives the compiled executable directly, the way the teacher's own CLI
//! crate tests its subcommands.

use assert_cmd::cargo::CommandCargoExt;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

fn dtrt() -> Command {
    Command::cargo_bin("dtrt").expect("failed to find dtrt binary")
}

#[test]
fn compiles_inline_source_and_prints_ir_to_stdout() {
    dtrt()
        .arg("lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> [b](str)\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"dict/y\""))
        .stdout(predicate::str::contains("\"pointA\"").not());
}

#[test]
fn emit_ir_writes_to_requested_file() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out.json");

    dtrt()
        .arg("lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> [b](str)\n")
        .arg("--emit-ir")
        .arg(&out)
        .assert()
        .success();

    let written = fs::read_to_string(&out).unwrap();
    assert!(written.contains("\"dict/y\""));
}

#[test]
fn fatal_diagnostic_exits_nonzero_and_prints_to_stderr() {
    dtrt()
        .arg("lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [] -> [](str)\n")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error in line"));
}

#[test]
fn missing_source_file_is_an_io_failure() {
    dtrt()
        .arg("/nonexistent/path/definitely-not-there.txt")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("I/O error"));
}

#[test]
fn color_never_strips_ansi_even_on_failure() {
    let output = dtrt()
        .arg("lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [] -> [](str)\n")
        .arg("--color")
        .arg("never")
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains('\u{1b}'));
}

#[test]
fn color_always_emits_ansi_even_when_piped() {
    let output = dtrt()
        .arg("lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [] -> [](str)\n")
        .arg("--color")
        .arg("always")
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains('\u{1b}'));
}

#[test]
fn lang_ru_switches_diagnostic_language() {
    let output = dtrt()
        .arg("lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [] -> [](str)\n")
        .arg("--lang")
        .arg("ru")
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Ошибка в строке"));
}
