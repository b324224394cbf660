use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_exits_zero() {
    Command::cargo_bin("agor")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Control plane"));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    Command::cargo_bin("agor")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .code(64);
}

#[test]
fn bad_session_id_is_fatal_error() {
    // Parses fine, fails at id validation before dialing the daemon
    Command::cargo_bin("agor")
        .unwrap()
        .args(["stop", "not-a-uuid", "also-not-a-uuid"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("bad session id"));
}

#[test]
fn session_list_without_daemon_fails_cleanly() {
    Command::cargo_bin("agor")
        .unwrap()
        .args(["--daemon-url", "127.0.0.1:1", "session", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}
