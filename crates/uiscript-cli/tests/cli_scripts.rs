// Test module - relaxed lint rules
#![allow(clippy::default_trait_access)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::manual_assert)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

//! Script management through the CLI.

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn uiscript(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_uiscript"))
        .arg("--home")
        .arg(home)
        .arg("--color")
        .arg("never")
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn create_add_step_and_show() {
    let home = tempfile::tempdir().unwrap();
    let created = uiscript(home.path(), &["create", "login", "--description", "logs in"]);
    assert!(created.status.success(), "{}", String::from_utf8_lossy(&created.stderr));

    let added = uiscript(
        home.path(),
        &[
            "add-step",
            "login",
            "--command",
            "find_element",
            "--param",
            "automationId=userName",
            "--store-result",
            "user",
        ],
    );
    assert!(added.status.success(), "{}", String::from_utf8_lossy(&added.stderr));
    assert!(stdout(&added).contains("added step 0 to login"));

    let added = uiscript(
        home.path(),
        &[
            "add-step",
            "login",
            "--type",
            "assertion",
            "--command",
            "element_exists",
            "--param",
            "automationId=userName",
            "--expected",
            "true",
            "--continue-on-failure",
        ],
    );
    assert!(added.status.success());

    let shown = uiscript(home.path(), &["show", "login"]);
    assert!(shown.status.success());
    let script: Value = serde_json::from_str(&stdout(&shown)).unwrap();
    assert_eq!(script["description"], "logs in");
    assert_eq!(script["steps"][0]["params"]["automationId"], "userName");
    assert_eq!(script["steps"][0]["storeResult"], "user");
    assert_eq!(script["steps"][1]["type"], "assertion");
    assert_eq!(script["steps"][1]["expected"], "true");
    assert_eq!(script["steps"][1]["continueOnFailure"], true);
    assert!(home.path().join("scripts").join("login.json").exists());
}

#[test]
fn add_step_to_missing_script_exits_not_found() {
    let home = tempfile::tempdir().unwrap();
    let output = uiscript(home.path(), &["add-step", "ghost", "--command", "wait"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Script not found: ghost"));
}

#[test]
fn malformed_param_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let output = uiscript(
        home.path(),
        &["add-step", "any", "--command", "wait", "--param", "duration"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("KEY=VALUE"));
}

#[test]
fn import_list_and_delete() {
    let home = tempfile::tempdir().unwrap();
    let document = home.path().join("smoke.json");
    fs::write(
        &document,
        r#"{"name": "smoke", "steps": [{"type": "wait", "command": "wait", "params": {"duration": 0}}]}"#,
    )
    .unwrap();
    assert!(uiscript(home.path(), &["import", document.to_str().unwrap()]).status.success());
    assert!(uiscript(home.path(), &["create", "alpha"]).status.success());

    let listed = uiscript(home.path(), &["list", "--json"]);
    let scripts: Vec<Value> = serde_json::from_str(&stdout(&listed)).unwrap();
    let names: Vec<_> = scripts.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["alpha", "smoke"]);

    assert!(uiscript(home.path(), &["delete", "smoke"]).status.success());
    let again = uiscript(home.path(), &["delete", "smoke"]);
    assert_eq!(again.status.code(), Some(2));
}

#[test]
fn import_of_malformed_document_is_invalid_argument() {
    let home = tempfile::tempdir().unwrap();
    let document = home.path().join("broken.json");
    fs::write(&document, "{ \"name\": ").unwrap();
    let output = uiscript(home.path(), &["import", document.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn config_file_supplies_the_home_directory() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("suite");
    let config = dir.path().join("engine.yaml");
    let mut document = serde_json::Map::new();
    document.insert("home".into(), Value::from(home.to_str().unwrap()));
    fs::write(&config, serde_yml::to_string(&document).unwrap()).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_uiscript"))
        .arg("--config")
        .arg(&config)
        .args(["create", "from-config"])
        .output()
        .expect("failed to execute");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(home.join("scripts").join("from-config.json").exists());
}
