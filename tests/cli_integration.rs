//! Integration tests for the lkks CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Passwords are supplied through `LKKS_PASSWORD` so nothing prompts, and
//! every temp project carries a `.lkks.toml` with the cheapest Argon2
//! settings.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

const PASSWORD: &str = "correct-horse";

/// Helper: get a Command pointing at the lkks binary.
fn lkks() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("lkks").expect("binary should exist")
}

/// Helper: a temp project with fast KDF settings.
fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    tmp.child(".lkks.toml")
        .write_str("argon2_memory_kib = 8192\nargon2_iterations = 1\nargon2_parallelism = 1\n")
        .unwrap();
    tmp
}

/// Helper: lkks run inside `dir` with the password set.
fn lkks_in(dir: &TempDir) -> Command {
    let mut cmd = lkks();
    cmd.current_dir(dir.path()).env("LKKS_PASSWORD", PASSWORD);
    cmd
}

#[test]
fn help_flag_shows_usage() {
    lkks()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Password-protected keystore for keys and certificates",
        ))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("add-secret"))
        .stdout(predicate::str::contains("add-cert"))
        .stdout(predicate::str::contains("add-private"))
        .stdout(predicate::str::contains("remove"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("change-password"));
}

#[test]
fn version_flag_shows_version() {
    lkks()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lkks"));
}

#[test]
fn no_args_shows_help() {
    lkks()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn init_creates_store_with_magic() {
    let tmp = project();

    lkks_in(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Keystore created"));

    let bytes = std::fs::read(tmp.path().join("keystore.lkks")).unwrap();
    assert_eq!(&bytes[..4], b"LKKS");
    assert_eq!(bytes.len(), 124);
}

#[test]
fn init_twice_fails() {
    let tmp = project();
    lkks_in(&tmp).arg("init").assert().success();

    lkks_in(&tmp)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn init_with_bad_kdf_settings_leaves_no_file() {
    let tmp = TempDir::new().unwrap();
    tmp.child(".lkks.toml")
        .write_str("argon2_memory_kib = 1024\nargon2_iterations = 1\nargon2_parallelism = 1\n")
        .unwrap();

    lkks_in(&tmp)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Key derivation failed"));

    tmp.child("keystore.lkks").assert(predicate::path::missing());
}

#[test]
fn init_rejects_short_password() {
    let tmp = project();
    lkks()
        .current_dir(tmp.path())
        .env("LKKS_PASSWORD", "short")
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 8"));
}

#[test]
fn list_on_missing_store_fails() {
    let tmp = project();
    lkks_in(&tmp)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no keystore"));
}

#[test]
fn add_get_remove_secret() {
    let tmp = project();
    lkks_in(&tmp).arg("init").assert().success();

    lkks_in(&tmp)
        .args(["add-secret", "api", "--base64", "AAECAwQFBgcICQoLDA0ODw=="])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added secret key 'api'"));

    lkks_in(&tmp)
        .args(["get", "api", "--type", "secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AAECAwQFBgcICQoLDA0ODw=="));

    lkks_in(&tmp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("api"))
        .stdout(predicate::str::contains("AES, 128 bits"));

    lkks_in(&tmp)
        .args(["remove", "api", "--type", "secret", "--force"])
        .assert()
        .success();

    lkks_in(&tmp)
        .args(["get", "api", "--type", "secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No secret key entry named 'api'"));

    let len = std::fs::metadata(tmp.path().join("keystore.lkks"))
        .unwrap()
        .len();
    assert_eq!(len, 124);
}

#[test]
fn add_cert_and_private_from_files() {
    let tmp = project();
    tmp.child("server.der").write_binary(&[0x30u8, 0x03, 0x02, 0x01, 0x05]).unwrap();
    tmp.child("server.key").write_binary(&[0x30u8, 0x03, 0x02, 0x01, 0x00]).unwrap();
    lkks_in(&tmp).arg("init").assert().success();

    lkks_in(&tmp)
        .args(["add-cert", "server", "server.der"])
        .assert()
        .success();
    lkks_in(&tmp)
        .args(["add-private", "server", "server.key"])
        .assert()
        .success();

    lkks_in(&tmp)
        .args(["get", "server", "--type", "cert", "--output", "out.der"])
        .assert()
        .success();
    tmp.child("out.der").assert(predicate::path::exists());
    assert_eq!(
        std::fs::read(tmp.path().join("out.der")).unwrap(),
        vec![0x30, 0x03, 0x02, 0x01, 0x05]
    );
}

#[test]
fn duplicate_add_fails() {
    let tmp = project();
    lkks_in(&tmp).arg("init").assert().success();
    lkks_in(&tmp)
        .args(["add-secret", "k", "--base64", "AQID"])
        .assert()
        .success();

    lkks_in(&tmp)
        .args(["add-secret", "k", "--base64", "BAUG"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn wrong_password_fails() {
    let tmp = project();
    lkks_in(&tmp).arg("init").assert().success();

    lkks()
        .current_dir(tmp.path())
        .env("LKKS_PASSWORD", "not-the-password")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authentication failed"));
}

#[test]
fn change_password_reencrypts() {
    let tmp = project();
    lkks_in(&tmp).arg("init").assert().success();
    lkks_in(&tmp)
        .args(["add-secret", "k", "--base64", "AQID"])
        .assert()
        .success();

    lkks_in(&tmp)
        .arg("change-password")
        .env("LKKS_NEW_PASSWORD", "battery-staple")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 entries re-encrypted"));

    lkks_in(&tmp).arg("list").assert().failure();
    lkks()
        .current_dir(tmp.path())
        .env("LKKS_PASSWORD", "battery-staple")
        .args(["get", "k", "--type", "secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AQID"));
}

#[test]
fn store_flag_overrides_config() {
    let tmp = project();
    lkks_in(&tmp)
        .args(["--store", "team.lkks", "init"])
        .assert()
        .success();

    tmp.child("team.lkks").assert(predicate::path::exists());
    tmp.child("keystore.lkks")
        .assert(predicate::path::missing());
}

#[test]
fn completions_for_bash() {
    lkks()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lkks"));
}
