use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

fn run_help(home: &TempDir, args: &[&str]) {
    let mut cmd = cargo_bin_cmd!("trustline");
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

    // runs
    run_help(&home, &["provision"]);
    run_help(&home, &["verify"]);

    // inspection
    run_help(&home, &["targets"]);
    run_help(&home, &["anchor"]);

    // grouped subcommands
    run_help(&home, &["backups"]);
    run_help(&home, &["backups", "list"]);
    run_help(&home, &["backups", "restore"]);
}

#[test]
fn missing_explicit_config_exits_one() {
    let home = TempDir::new().expect("temp home");
    let missing = home.path().join("absent.toml");
    cargo_bin_cmd!("trustline")
        .env("HOME", home.path())
        .arg("--config")
        .arg(&missing)
        .arg("targets")
        .assert()
        .code(1)
        .stderr(predicates::str::contains("does not exist"));
}
