//! End-to-end scenarios driven against the compiled `tsh` binary, one shell
//! process per test, commands piped in over stdin.

use std::io::Write;
use std::process::{Command, Stdio};

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tsh"))
        .arg("-p")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
    }

    child.wait_with_output().expect("wait on tsh")
}

#[test]
fn simple_foreground_exit() {
    let output = run_shell(&["/bin/echo hello", "quit"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello\n"), "stdout was: {stdout}");
    assert!(output.status.success());
}

#[test]
fn background_job_then_jobs_then_fg() {
    let output = run_shell(&["/bin/sleep 1 &", "jobs", "fg %1", "quit"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout
            .lines()
            .any(|l| l.starts_with("[1] (") && l.contains("Running") && l.contains("/bin/sleep 1")),
        "stdout was: {stdout}"
    );
}

#[test]
fn pipeline_connects_stdout_to_stdin() {
    let output = run_shell(&["/bin/echo abc | /usr/bin/tr a-z A-Z", "quit"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ABC\n"), "stdout was: {stdout}");
}

#[test]
fn redirection_precedence_truncates_every_opened_file() {
    let pid = std::process::id();
    let dir = std::env::temp_dir();
    let file_a = dir.join(format!("tsh_test_a_{pid}.txt"));
    let file_b = dir.join(format!("tsh_test_b_{pid}.txt"));
    let _ = std::fs::remove_file(&file_a);
    let _ = std::fs::remove_file(&file_b);

    let line = format!(
        "/bin/echo hi > {} > {}",
        file_a.display(),
        file_b.display()
    );
    run_shell(&[&line, "quit"]);

    assert_eq!(std::fs::read_to_string(&file_b).unwrap(), "hi\n");
    assert_eq!(std::fs::read_to_string(&file_a).unwrap(), "");

    let _ = std::fs::remove_file(&file_a);
    let _ = std::fs::remove_file(&file_b);
}

#[test]
fn unknown_job_spec_reports_diagnostic_and_keeps_running() {
    let output = run_shell(&["fg %99", "/bin/echo still-alive", "quit"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Numero de processo nao reconhecido: %99"),
        "stdout was: {stdout}"
    );
    assert!(stdout.contains("still-alive"), "stdout was: {stdout}");
}

#[test]
fn missing_job_spec_reports_diagnostic() {
    let output = run_shell(&["fg", "quit"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Numero de processo nao informado"),
        "stdout was: {stdout}"
    );
}

#[test]
fn quit_exits_with_status_zero() {
    let output = run_shell(&["quit"]);
    assert!(output.status.success());
}

#[test]
fn end_of_input_exits_cleanly() {
    let output = run_shell(&[]);
    assert!(output.status.success());
}

#[test]
fn job_table_overflow_reports_diagnostic() {
    let mut lines: Vec<String> = (0..20).map(|_| "/bin/sleep 1 &".to_string()).collect();
    lines.push("quit".to_string());
    let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let output = run_shell(&line_refs);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Tried to create too many jobs"),
        "stdout was: {stdout}"
    );
}
