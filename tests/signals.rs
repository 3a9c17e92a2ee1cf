//! Signal-driven job-control scenarios: `SIGTSTP` suspending the foreground
//! job, `bg` resuming it, and `SIGQUIT` terminating the shell itself.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

fn spawn_tsh() -> std::process::Child {
    Command::new(env!("CARGO_BIN_EXE_tsh"))
        .arg("-p")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tsh")
}

#[test]
fn sigtstp_stops_foreground_job_then_bg_resumes_it() {
    let mut child = spawn_tsh();
    let tsh_pid = child.id() as libc::pid_t;

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        writeln!(stdin, "/bin/sleep 1").expect("write line");
    }
    // Give tsh time to fork /bin/sleep and enter its foreground wait before
    // the SIGTSTP arrives.
    thread::sleep(Duration::from_millis(200));
    unsafe {
        libc::kill(tsh_pid, libc::SIGTSTP);
    }
    thread::sleep(Duration::from_millis(200));

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        writeln!(stdin, "jobs").expect("write line");
        writeln!(stdin, "bg %1").expect("write line");
        writeln!(stdin, "quit").expect("write line");
    }

    let output = child.wait_with_output().expect("wait on tsh");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout
            .lines()
            .any(|l| l.contains("Stopped") && l.contains("/bin/sleep 1")),
        "stdout was: {stdout}"
    );
    assert!(
        stdout.contains("terminou com valor"),
        "background completion notice missing; stdout was: {stdout}"
    );
}

#[test]
fn sigint_forwarded_to_foreground_job_does_not_kill_shell() {
    let mut child = spawn_tsh();
    let tsh_pid = child.id() as libc::pid_t;

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        writeln!(stdin, "/bin/sleep 30").expect("write line");
    }
    thread::sleep(Duration::from_millis(200));
    unsafe {
        libc::kill(tsh_pid, libc::SIGINT);
    }
    thread::sleep(Duration::from_millis(200));

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        writeln!(stdin, "/bin/echo still-alive").expect("write line");
        writeln!(stdin, "quit").expect("write line");
    }

    let output = child.wait_with_output().expect("wait on tsh");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("still-alive"), "stdout was: {stdout}");
}

#[test]
fn sigquit_terminates_shell_with_notice() {
    let mut child = spawn_tsh();
    let tsh_pid = child.id() as libc::pid_t;

    thread::sleep(Duration::from_millis(100));
    unsafe {
        libc::kill(tsh_pid, libc::SIGQUIT);
    }

    let output = child.wait_with_output().expect("wait on tsh");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Terminating after receipt of SIGQUIT signal"),
        "stdout was: {stdout}"
    );
    assert_eq!(output.status.code(), Some(1));
}
