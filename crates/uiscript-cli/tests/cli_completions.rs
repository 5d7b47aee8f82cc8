//! Tests for shell completion generation.
// Test module - relaxed lint rules
#![allow(clippy::expect_used)]

use std::process::Command;

fn uiscript_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_uiscript"))
}

#[test]
fn completions_generates_bash_output() {
    let output = uiscript_bin()
        .arg("completions")
        .arg("bash")
        .output()
        .expect("failed to execute");

    assert!(
        output.status.success(),
        "completions bash should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("_uiscript"), "bash completions should contain function name");
    assert!(stdout.contains("add-step"), "bash completions should list subcommands");
}

#[test]
fn completions_rejects_unknown_shell() {
    let output = uiscript_bin()
        .arg("completions")
        .arg("cmd.exe")
        .output()
        .expect("failed to execute");
    assert!(!output.status.success());
}
