mod test_env;
// Display selection, identity persistence and error reporting

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use std::fs;

fn setup_test_env() -> (TempDir, std::sync::MutexGuard<'static, ()>) {
    let guard = test_env::lock_test_env();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let config_dir = temp_dir.path().join(".kboard");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("rc"), format!("data.location={}\n", db_path.display())).unwrap();
    (temp_dir, guard)
}

fn new_cmd(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kboard").unwrap();
    cmd.env("HOME", temp_dir.path());
    cmd
}

fn identity_file(temp_dir: &TempDir) -> std::path::PathBuf {
    temp_dir.path().join(".kboard").join("display")
}

#[test]
fn test_displays_empty() {
    let (temp_dir, _guard) = setup_test_env();

    new_cmd(&temp_dir)
        .args(&["displays"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No displays configured"));
}

#[test]
fn test_select_by_name_persists_identity() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir)
        .args(&["admin", "display", "Grill", "--critical", "20", "--sound", "false"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created display 1 'Grill'"));

    new_cmd(&temp_dir)
        .args(&["select", "grill"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Selected display 1 (Grill). SLA 15/20 min, sound off."));

    assert_eq!(fs::read_to_string(identity_file(&temp_dir)).unwrap().trim(), "1");

    new_cmd(&temp_dir)
        .args(&["displays"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1*"))
        .stdout(predicate::str::contains("15/20").not())
        .stdout(predicate::str::contains("-/20"));
}

#[test]
fn test_select_unknown_suggests() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir).args(&["admin", "display", "Grill"]).assert().success();

    new_cmd(&temp_dir)
        .args(&["select", "Gril"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Did you mean: Grill (1)?"));

    new_cmd(&temp_dir)
        .args(&["select", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Display '42' not found"));

    assert!(!identity_file(&temp_dir).exists());
}

#[test]
fn test_board_requires_display() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir).args(&["admin", "display", "Grill"]).assert().success();

    new_cmd(&temp_dir)
        .args(&["board"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Grill"))
        .stderr(predicate::str::contains("No display selected"));
}

#[test]
fn test_forget() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir).args(&["admin", "display", "Grill"]).assert().success();
    new_cmd(&temp_dir).args(&["select", "1"]).assert().success();

    new_cmd(&temp_dir)
        .args(&["forget"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Display selection cleared."));
    assert!(!identity_file(&temp_dir).exists());

    new_cmd(&temp_dir).args(&["board"]).assert().failure();
}

#[test]
fn test_deleted_display_is_forgotten() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir).args(&["admin", "display", "Grill"]).assert().success();
    new_cmd(&temp_dir).args(&["select", "1"]).assert().success();
    new_cmd(&temp_dir)
        .args(&["admin", "remove-display", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted display 1"));

    new_cmd(&temp_dir)
        .args(&["board"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No display selected"));
    assert!(!identity_file(&temp_dir).exists());
}

#[test]
fn test_bad_config_value_is_user_error() {
    let (temp_dir, _guard) = setup_test_env();
    let rc = temp_dir.path().join(".kboard").join("rc");
    let mut content = fs::read_to_string(&rc).unwrap();
    content.push_str("sla.warning=soon\n");
    fs::write(&rc, content).unwrap();

    new_cmd(&temp_dir)
        .args(&["displays"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("sla.warning"));
}

#[test]
fn test_command_abbreviations() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir).args(&["adm", "disp", "Grill"]).assert().success();

    new_cmd(&temp_dir)
        .args(&["disp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Grill"));

    new_cmd(&temp_dir)
        .args(&["s", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Ambiguous command 's'"));
}

#[test]
fn test_admin_order_rejects_bad_input() {
    let (temp_dir, _guard) = setup_test_env();

    new_cmd(&temp_dir)
        .args(&["admin", "order", "Order 0001", "--at", "yesterday"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid timestamp"));

    new_cmd(&temp_dir)
        .args(&["admin", "order", "Order 0001", "--line", "soup"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid product ID"));
}

#[test]
fn test_version() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir)
        .args(&["--version"])
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
