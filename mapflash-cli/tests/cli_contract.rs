//! CLI contract tests: argument surface and failure modes that must stay
//! stable for scripts driving the tool.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write as _;

fn mapflash() -> Command {
    Command::cargo_bin("mapflash").expect("binary exists")
}

#[test]
fn test_help_lists_subcommands() {
    mapflash()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("write")
                .and(predicate::str::contains("read"))
                .and(predicate::str::contains("verify"))
                .and(predicate::str::contains("erase"))
                .and(predicate::str::contains("header"))
                .and(predicate::str::contains("ports")),
        );
}

#[test]
fn test_version_flag() {
    mapflash()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mapflash"));
}

#[test]
fn test_missing_subcommand_fails() {
    mapflash().assert().failure();
}

#[test]
fn test_unknown_section_is_reported() {
    let mut config = tempfile::NamedTempFile::new().expect("temp config");
    writeln!(
        config,
        r#"
[[sections]]
name = "boot"
address = 0x0000_1000
size = 0x1000
"#
    )
    .expect("write config");

    let mut output = tempfile::NamedTempFile::new().expect("temp output");
    output.flush().expect("flush");

    mapflash()
        .args(["read", "missing", "-o"])
        .arg(output.path())
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("unknown section")
                .and(predicate::str::contains("boot")),
        );
}

#[test]
fn test_missing_port_is_reported() {
    let mut config = tempfile::NamedTempFile::new().expect("temp config");
    writeln!(
        config,
        r#"
[[sections]]
name = "boot"
address = 0x0000_1000
size = 0x1000
"#
    )
    .expect("write config");

    mapflash()
        .args(["erase", "boot"])
        .arg("--config")
        .arg(config.path())
        .env_remove("MAPFLASH_PORT")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no serial port"));
}
