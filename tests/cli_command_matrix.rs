mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::TestEnv;
use predicates::str::contains;
use tempfile::TempDir;

fn run_help(home: &TempDir, args: &[&str]) {
    let mut cmd = cargo_bin_cmd!("mindpack");
    cmd.env("HOME", home.path())
        .args(args)
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn every_cli_command_has_help_path() {
    let home = TempDir::new().expect("temp home");

    // top-level
    run_help(&home, &[]);

    // runtime commands
    run_help(&home, &["install"]);
    run_help(&home, &["sync"]);
    run_help(&home, &["remove"]);
    run_help(&home, &["status"]);
    run_help(&home, &["list"]);
    run_help(&home, &["search"]);
    run_help(&home, &["route"]);
    run_help(&home, &["watch"]);

    // author commands
    run_help(&home, &["publish"]);
    run_help(&home, &["token"]);
    run_help(&home, &["token", "set"]);
    run_help(&home, &["token", "show"]);
    run_help(&home, &["token", "clear"]);
}

#[test]
fn empty_state_commands_report_cleanly() {
    let env = TestEnv::new();

    let status = env.run_json(&["status"]);
    assert_eq!(status["ok"], true);
    assert_eq!(status["data"]["packages"], serde_json::json!([]));

    let list = env.run_json(&["list"]);
    assert_eq!(list["data"], serde_json::json!([]));

    let hits = env.run_json(&["search", "anything"]);
    assert_eq!(hits["data"], serde_json::json!([]));

    let route = env.run_json(&["route"]);
    assert!(route["data"].as_str().unwrap().ends_with("ROUTING.md"));
    assert!(env.root.join("ROUTING.md").exists());
}

#[test]
fn token_set_show_clear_round_trip() {
    let env = TestEnv::new();

    let set = env.run_json(&["token", "set", "tok_abc123"]);
    assert_eq!(set["data"], "default");

    let show = env.run_json(&["token", "show"]);
    assert_eq!(show["data"], "tok_abc123");

    let scoped = env.run_json(&["token", "set", "tok_scoped", "--package", "acme"]);
    assert_eq!(scoped["data"], "acme");
    let show = env.run_json(&["token", "show", "--package", "acme"]);
    assert_eq!(show["data"], "tok_scoped");

    let cleared = env.run_json(&["token", "clear"]);
    assert_eq!(cleared["data"], true);
    env.cmd()
        .args(["token", "show"])
        .assert()
        .failure()
        .stderr(contains("no token stored"));
}

#[test]
fn publish_init_scaffolds_a_publishable_directory() {
    let env = TestEnv::new();
    let dir = env.home.join("new-pack");

    let out = env.run_json(&[
        "publish",
        dir.to_str().unwrap(),
        "--init",
        "--name",
        "Field Notes",
    ]);
    assert_eq!(out["ok"], true);
    let manifest = std::fs::read_to_string(dir.join("MANIFEST.md")).unwrap();
    assert!(manifest.starts_with("# Field Notes"));
    assert!(dir.join("knowledge/getting-started.md").exists());

    // The scaffold passes validation as-is.
    let dry = env.run_json(&["publish", dir.to_str().unwrap(), "--dry-run"]);
    assert_eq!(dry["data"]["uploaded"], false);
    assert_eq!(dry["data"]["file_count"], 2);

    // Re-running init refuses to clobber the manifest.
    env.cmd()
        .args(["publish", dir.to_str().unwrap(), "--init"])
        .assert()
        .failure()
        .stderr(contains("already exists"));
}

#[test]
fn unknown_package_and_missing_install_fail_with_clear_errors() {
    let env = TestEnv::new();

    env.cmd()
        .args(["install", "nope", "--free"])
        .assert()
        .failure()
        .stderr(contains("not found"));

    env.cmd()
        .args(["remove", "nope"])
        .assert()
        .failure()
        .stderr(contains("not installed"));

    env.cmd()
        .args(["sync", "nope"])
        .assert()
        .failure()
        .stderr(contains("not installed"));

    // JSON mode keeps stdout clean and reports the failure on stderr.
    env.cmd()
        .args(["--json", "install", "nope", "--free"])
        .assert()
        .failure()
        .stdout(predicates::str::is_empty())
        .stderr(contains("\"ok\":false"));

    env.cmd()
        .args(["install", "paid-pack"])
        .assert()
        .failure()
        .stderr(contains("no access token"));
}

#[test]
fn validation_failures_list_every_problem_at_once() {
    let env = TestEnv::new();
    let dir = env.home.join("broken");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("only.md"), "no metadata\n").unwrap();

    let out = env
        .cmd()
        .args(["publish", dir.to_str().unwrap()])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&out);
    assert!(stderr.contains("missing MANIFEST.md"));
    assert!(stderr.contains("Load for"));
    assert!(stderr.contains("Creator"));
}
