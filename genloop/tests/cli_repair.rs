//! `genloop-repair` as a subprocess: exit codes and report lines.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn repair_bin(dir: &Path, cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_genloop-repair"))
        .arg(dir)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn genloop-repair")
}

#[test]
fn renames_then_reports_nothing_on_second_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    let round = temp.path().join("project").join("round_1");
    fs::create_dir_all(&round).expect("mkdir");
    fs::write(round.join("`main.py`"), "print('hi')\n").expect("write");
    fs::write(round.join("ok.js"), "let a;\n").expect("write");

    let first = repair_bin(&temp.path().join("project"), temp.path());
    assert!(first.status.success(), "stderr: {}", String::from_utf8_lossy(&first.stderr));
    let stdout = String::from_utf8_lossy(&first.stdout);
    assert!(stdout.contains("renamed "), "stdout: {stdout}");
    assert!(stdout.contains("main.py"), "stdout: {stdout}");
    assert!(stdout.ends_with("1 renamed, 0 unresolved, 0 failed\n"), "stdout: {stdout}");
    assert_eq!(
        fs::read_to_string(round.join("main.py")).expect("renamed file"),
        "print('hi')\n"
    );

    let second = repair_bin(&temp.path().join("project"), temp.path());
    assert!(second.status.success());
    assert_eq!(
        String::from_utf8_lossy(&second.stdout),
        "0 renamed, 0 unresolved, 0 failed\n"
    );
}

#[test]
fn missing_directory_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = repair_bin(&temp.path().join("nope"), temp.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn file_argument_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = temp.path().join("notes.txt");
    fs::write(&file, "x").expect("write");
    let output = repair_bin(&file, temp.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("is not a directory"));
}
