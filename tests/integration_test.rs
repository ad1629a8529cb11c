#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const GREETER: &str = r#"
echo "Hello!"
printf "Name? "
read name
echo "Hi $name"
"#;

fn write_program(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("program.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("Failed to write program");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make program executable");
    path
}

fn write_script(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("session.simile");
    fs::write(&path, content).expect("Failed to write test script");
    path
}

fn simile() -> Command {
    Command::cargo_bin("simile").expect("simile binary")
}

#[test]
fn test_matching_session() {
    let dir = TempDir::new().unwrap();
    let program = write_program(dir.path(), GREETER);
    let script = write_script(dir.path(), "Hello!\nName? {{Chris}}\nHi Chris\n");

    simile()
        .arg("--script")
        .arg(&script)
        .arg("--command")
        .arg(&program)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Hi Chris"))
        .stdout(predicate::str::contains("3/3 lines matched"));
}

#[test]
fn test_mismatch_fails_with_expected_text() {
    let dir = TempDir::new().unwrap();
    let program = write_program(dir.path(), GREETER);
    let script = write_script(dir.path(), "Hello!\nName? {{Chris}}\nHi Kris\n");

    simile()
        .arg("-s")
        .arg(&script)
        .arg("-c")
        .arg(&program)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("expected: Hi Kris"))
        .stdout(predicate::str::contains("2/3 lines matched"));
}

#[test]
fn test_legacy_script() {
    let dir = TempDir::new().unwrap();
    let program = write_program(dir.path(), GREETER);
    let script = write_script(
        dir.path(),
        "# greeter\n.Hello!\n;Name? \n>Chris\n.Hi Chris\n",
    );

    simile()
        .arg("-s")
        .arg(&script)
        .arg("-c")
        .arg(&program)
        .arg("--legacy")
        .assert()
        .success()
        .stdout(predicate::str::contains("3/3 lines matched"));
}

#[test]
fn test_numeric_tags() {
    let dir = TempDir::new().unwrap();
    let program = write_program(
        dir.path(),
        "echo \"You are 7 years old\"\necho \"Pi is 3.14159\"\necho \"Grade: B\"\n",
    );
    let script = write_script(
        dir.path(),
        "You are [[t=int;min=0;max=120]] years old\n\
         Pi is [[t=d;p=2;v={3.14}]]\n\
         Grade: [[t=c;v={A,B,C}]]\n",
    );

    simile()
        .arg("-s")
        .arg(&script)
        .arg("-c")
        .arg(&program)
        .assert()
        .success()
        .stdout(predicate::str::contains("3/3 lines matched"));
}

#[test]
fn test_program_arguments_are_passed() {
    let dir = TempDir::new().unwrap();
    let program = write_program(dir.path(), "echo \"args: $1 $2\"\n");
    let script = write_script(dir.path(), "args: one two\n");

    simile()
        .arg("-s")
        .arg(&script)
        .arg("-c")
        .arg(&program)
        .arg("--")
        .arg("one")
        .arg("two")
        .assert()
        .success();
}

#[test]
fn test_early_exit_reports_remaining_lines() {
    let dir = TempDir::new().unwrap();
    let program = write_program(dir.path(), "echo one\n");
    let script = write_script(dir.path(), "one\ntwo\nthree\n");

    simile()
        .arg("-s")
        .arg(&script)
        .arg("-c")
        .arg(&program)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("✗ <no output>"))
        .stdout(predicate::str::contains("1/3 lines matched"));
}

#[test]
fn test_stderr_is_surfaced_not_compared() {
    let dir = TempDir::new().unwrap();
    let program = write_program(dir.path(), "echo oops >&2\necho done\n");
    let script = write_script(dir.path(), "done\n");

    simile()
        .arg("-s")
        .arg(&script)
        .arg("-c")
        .arg(&program)
        .assert()
        .success()
        .stderr(predicate::str::contains("stderr: oops"));
}

#[test]
fn test_stall_note() {
    let dir = TempDir::new().unwrap();
    let program = write_program(dir.path(), "sleep 1\n");
    let script = write_script(dir.path(), "never printed\n");

    simile()
        .arg("-s")
        .arg(&script)
        .arg("-c")
        .arg(&program)
        .arg("--stall-timeout")
        .arg("200ms")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("note: still running"));
}

#[test]
fn test_invalid_script() {
    let dir = TempDir::new().unwrap();
    let program = write_program(dir.path(), GREETER);
    let script = write_script(dir.path(), "Score: [[t=int]] {{5}}\n");

    simile()
        .arg("-s")
        .arg(&script)
        .arg("-c")
        .arg(&program)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to parse script file"))
        .stderr(predicate::str::contains("input tag mixed with numeric tag"));
}

#[test]
fn test_missing_executable() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "Hello!\n");

    simile()
        .arg("-s")
        .arg(&script)
        .arg("-c")
        .arg(dir.path().join("missing"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("executable not found"));
}

#[test]
fn test_check_reports_every_bad_line() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "fine\n{{a}} {{b}}\n# comment\nvalue [[t=huge]]\n",
    );

    simile()
        .arg("-s")
        .arg(&script)
        .arg("--check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("line 2: more than one input tag"))
        .stderr(predicate::str::contains("line 4: unknown numeric type 'huge'"));
}

#[test]
fn test_check_valid_script() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "Hello!\nName? {{Chris}}\n[[t=i]] apples\n");

    simile()
        .arg("-s")
        .arg(&script)
        .arg("--check")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn test_byte_order_mark_is_ignored() {
    let dir = TempDir::new().unwrap();
    let program = write_program(dir.path(), GREETER);
    let script = write_script(dir.path(), "\u{FEFF}.Hello!\n;Name? \n>Chris\n.Hi Chris\n");

    simile()
        .arg("-s")
        .arg(&script)
        .arg("--check")
        .arg("--legacy")
        .assert()
        .success();

    simile()
        .arg("-s")
        .arg(&script)
        .arg("-c")
        .arg(&program)
        .arg("--legacy")
        .assert()
        .success()
        .stdout(predicate::str::contains("3/3 lines matched"));
}
