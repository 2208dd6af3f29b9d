use std::fs;
use std::process::Command;

fn bilua() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bilua"))
}

#[test]
fn runs_a_program_and_reports_the_result_on_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prog.lua");
    fs::write(&path, "print(\"out\")\nreturn 25 + 13").unwrap();

    let output = bilua().arg(&path).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("38"));
}

#[test]
fn exit_codes_distinguish_failure_modes() {
    let dir = tempfile::tempdir().unwrap();

    // 1: usage (no file argument)
    let output = bilua().output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    // 2: load failure
    let output = bilua().arg(dir.path().join("absent.lua")).output().unwrap();
    assert_eq!(output.status.code(), Some(2));

    // 3: parse failure
    let bad = dir.path().join("bad.lua");
    fs::write(&bad, "local = 1").unwrap();
    let output = bilua().arg(&bad).output().unwrap();
    assert_eq!(output.status.code(), Some(3));

    // 4: evaluation failure
    let boom = dir.path().join("boom.lua");
    fs::write(&boom, "return nil + 1").unwrap();
    let output = bilua().arg(&boom).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn suggested_changes_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("force.lua");
    fs::write(&path, "force(25 + 13, 27)").unwrap();

    let output = bilua().arg(&path).output().unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("suggested source change"));
    assert!(stderr.contains("14"));
}
