//! End-to-end tests for the tagvm binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn source_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn tagvm() -> Command {
    let mut cmd = Command::cargo_bin("tagvm").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn parse_prints_tags_by_default() {
    let file = source_file("1 + 2");
    tagvm()
        .arg("parse")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("<!doctype urn:tagvm:arithmetic>\n<$>\n"))
        .stdout(predicate::str::contains("^^^ left"));
}

#[test]
fn parse_as_treeviz() {
    let file = source_file("${} * 3");
    tagvm()
        .args(["parse", "--format", "treeviz"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("left: <//>"))
        .stdout(predicate::str::contains("right: Number \"3\""));
}

#[test]
fn config_file_selects_the_format() {
    let file = source_file("42");
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, "[output]\nformat = \"json\"").unwrap();

    tagvm()
        .arg("parse")
        .arg(file.path())
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"doctype\""));
}

#[test]
fn format_flag_overrides_the_config_file() {
    let file = source_file("42");
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, "[output]\nformat = \"json\"").unwrap();

    tagvm()
        .args(["parse", "--format", "yaml", "--config"])
        .arg(config.path())
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("type: doctype"));
}

#[test]
fn digits_language_is_selectable() {
    let file = source_file("7");
    tagvm()
        .args(["parse", "--language", "digits"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("<!doctype urn:tagvm:digits>"));
}

#[test]
fn parse_errors_exit_nonzero() {
    let file = source_file("1 +");
    tagvm()
        .arg("parse")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"));
}

#[test]
fn unknown_language_is_reported() {
    let file = source_file("1");
    tagvm()
        .args(["parse", "--language", "cobol"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown language 'cobol'"));
}

#[test]
fn unknown_format_is_reported() {
    let file = source_file("1");
    tagvm()
        .args(["parse", "--format", "xml"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn missing_file_is_reported() {
    tagvm()
        .args(["parse", "/nonexistent/input.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error reading file"));
}

#[test]
fn lists_formats_and_languages() {
    tagvm()
        .arg("list-formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("json"))
        .stdout(predicate::str::contains("treeviz"));

    tagvm()
        .arg("list-languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("arithmetic"))
        .stdout(predicate::str::contains("digits"));
}
