//! Process launcher: spawns one pipeline plan, wiring pipes and per-stage
//! redirections, places every stage in a single process group, and
//! registers the leader in the job table.
//!
//! Ported from `tsh.c`'s fork/setpgid/exec sequence in `eval()`, but built
//! on `std::process::Command` the way this repo's executor already pipes
//! stages together with `os_pipe` — `CommandExt::process_group` performs
//! the child's `setpgid` as part of process creation itself, which closes
//! the classic fork/setpgid/exec race by construction instead of needing a
//! second, redundant `setpgid` call from the parent (see DESIGN.md).

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::FromRawFd;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::sync::atomic::Ordering;

use crate::jobs::JobState;
use crate::parser::{PipelinePlan, PipelineStage, RedirectAction};
use crate::signals;

/// Launch a parsed pipeline. Builtins never reach this function — the REPL
/// dispatches those inline (spec.md §4.D step 1).
pub fn launch(plan: &PipelinePlan, cmdline: &str) {
    if plan.stages.iter().any(|s| s.argv.is_empty()) {
        return;
    }

    let initial_state = if plan.background {
        JobState::Background
    } else {
        JobState::Foreground
    };

    // Spawning and registering the leader happen under one uninterrupted
    // SIGCHLD-blocked window (spec.md §4.D step 2, §5): splitting this into
    // two separate blocked sections would reopen the race where a
    // fast-exiting child is reaped before it has a job-table entry.
    let result = signals::with_sigchld_blocked(|| {
        let leader_pid = spawn_pipeline(&plan.stages)?;
        let mut table = signals::JOB_TABLE.lock().expect("job table poisoned");
        Ok((leader_pid, table.add(leader_pid, initial_state, cmdline.to_string())))
    });

    let (leader_pid, jid): (libc::pid_t, Option<u32>) = match result {
        Ok(pair) => pair,
        Err(msg) => {
            eprintln!("{msg}");
            return;
        }
    };

    let Some(jid) = jid else {
        // The job table was full; the pipeline is already running and
        // unreaped. Kill the whole group so nothing is left orphaned.
        unsafe {
            libc::kill(-leader_pid, libc::SIGKILL);
        }
        reap_group_blocking(leader_pid);
        return;
    };

    if signals::VERBOSE.load(Ordering::SeqCst) {
        println!("Added job [{jid}] {leader_pid} {cmdline}");
    }

    if plan.background {
        println!("[{jid}] ({leader_pid})");
        return;
    }

    signals::set_foreground_pgid(leader_pid);
    wait_for_foreground(leader_pid);
    signals::clear_foreground_pgid();
}

/// Spawn every stage, piping stage `i`'s stdout into stage `i+1`'s stdin,
/// and place them all in the process group led by stage 0. Returns the
/// leader's pid, or an error if any stage failed to spawn (in which case
/// every stage spawned so far is killed and reaped — spec.md §9's pipeline
/// error handling open question, resolved as "no partial pipeline survives
/// a later failure").
fn spawn_pipeline(stages: &[PipelineStage]) -> Result<libc::pid_t, String> {
    let mut leader_pid: Option<libc::pid_t> = None;
    let mut spawned_pids = Vec::with_capacity(stages.len());
    let mut next_stdin: Option<Stdio> = None;

    for (index, stage) in stages.iter().enumerate() {
        let is_last = index + 1 == stages.len();

        let (stdout_stdio, downstream_stdin) = if is_last {
            (None, None)
        } else {
            match os_pipe::pipe() {
                Ok((reader, writer)) => (Some(Stdio::from(writer)), Some(Stdio::from(reader))),
                Err(e) => {
                    kill_and_reap(&spawned_pids);
                    return Err(format!("tsh: pipe: {e}"));
                }
            }
        };

        let result = spawn_stage(stage, next_stdin.take(), stdout_stdio, leader_pid);
        next_stdin = downstream_stdin;

        match result {
            Ok(pid) => {
                spawned_pids.push(pid);
                if leader_pid.is_none() {
                    leader_pid = Some(pid);
                }
            }
            Err(msg) => {
                kill_and_reap(&spawned_pids);
                return Err(msg);
            }
        }
    }

    leader_pid.ok_or_else(|| "tsh: empty pipeline".to_string())
}

fn spawn_stage(
    stage: &PipelineStage,
    stdin: Option<Stdio>,
    stdout: Option<Stdio>,
    leader_pid: Option<libc::pid_t>,
) -> Result<libc::pid_t, String> {
    let mut redirected = apply_redirects(&stage.redirs);

    let mut command = Command::new(&stage.argv[0]);
    command.args(&stage.argv[1..]);
    command.process_group(leader_pid.unwrap_or(0));

    command.stdin(redirected[0].take().map_or_else(
        || stdin.unwrap_or_else(Stdio::inherit),
        Stdio::from,
    ));
    command.stdout(redirected[1].take().map_or_else(
        || stdout.unwrap_or_else(Stdio::inherit),
        Stdio::from,
    ));
    command.stderr(
        redirected[2]
            .take()
            .map_or_else(Stdio::inherit, Stdio::from),
    );

    // `spawn_pipeline` runs under a blocked SIGCHLD (see `launch`); the
    // child inherits that mask across exec (exec resets caught-signal
    // dispositions but never the mask), so unblock it here before the
    // replaced image runs (spec.md §4.D: "unblock SIGCHLD, inherited mask").
    unsafe {
        command.pre_exec(|| {
            let mut set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGCHLD);
            libc::sigprocmask(libc::SIG_UNBLOCK, &set, std::ptr::null_mut());
            Ok(())
        });
    }

    command
        .spawn()
        .map(|child| child.id() as libc::pid_t)
        .map_err(|e| format!("Erro ao executar {}: {e}", stage.argv[0]))
}

/// Resolve a stage's ordered redirection list into the file that should end
/// up on each of fd 0/1/2. Every entry is opened in order — even one a
/// later entry for the same fd supersedes — so `echo hi > a > b` truncates
/// `a` on disk even though only `b` is actually wired to the child
/// (spec.md §8 scenario 5, P6).
fn apply_redirects(redirs: &[(i32, RedirectAction)]) -> [Option<File>; 3] {
    let mut slots: [Option<File>; 3] = [None, None, None];

    for (fd, action) in redirs {
        let idx = *fd as usize;
        let result = match action {
            RedirectAction::ReadFile(path) => open_for(path, false, false),
            RedirectAction::WriteTruncate(path) => open_for(path, true, false),
            RedirectAction::WriteAppend(path) => open_for(path, true, true),
            RedirectAction::DupToFd(peer) => match &slots[*peer as usize] {
                Some(file) => file.try_clone().map_err(|e| format!("tsh: dup: {e}")),
                None => dup_inherited(*peer),
            },
        };
        // An open failure is reported but leaves this fd's previous entry
        // (or the inherited default, if none succeeded yet) in place —
        // the command still launches (spec.md §4.C, §7).
        match result {
            Ok(file) => slots[idx] = Some(file),
            Err(msg) => eprintln!("{msg}"),
        }
    }

    slots
}

fn open_for(path: &str, write: bool, append: bool) -> Result<File, String> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    if write {
        options.write(true).create(true).mode(0o660);
        if append {
            options.append(true);
        } else {
            options.truncate(true);
        }
    } else {
        options.read(true);
    }

    let verb = if write { "escrita" } else { "leitura" };
    options
        .open(path)
        .map_err(|e| format!("Erro ao abrir o arquivo {path} para {verb}: {e}"))
}

fn dup_inherited(fd: i32) -> Result<File, String> {
    let dup_fd = unsafe { libc::dup(fd) };
    if dup_fd < 0 {
        return Err(format!("tsh: dup: {}", io::Error::last_os_error()));
    }
    Ok(unsafe { File::from_raw_fd(dup_fd) })
}

fn kill_and_reap(pids: &[libc::pid_t]) {
    for &pid in pids {
        unsafe {
            libc::kill(pid, libc::SIGKILL);
        }
    }
    for &pid in pids {
        let mut status: libc::c_int = 0;
        unsafe {
            libc::waitpid(pid, &mut status, 0);
        }
    }
}

fn reap_group_blocking(leader_pid: libc::pid_t) {
    let mut status: libc::c_int = 0;
    loop {
        let pid = unsafe { libc::waitpid(-leader_pid, &mut status, 0) };
        if pid < 0 {
            break;
        }
    }
}

/// Busy-poll until the foreground job is no longer foreground: either
/// reaped by the `SIGCHLD` handler, or moved to `Stopped` by `SIGTSTP`.
/// Spec.md §4.E: ~500µs sleeps, and a deliberate exit if the sleep is
/// itself interrupted by signal delivery.
pub fn wait_for_foreground(leader_pid: libc::pid_t) {
    loop {
        // Block SIGCHLD around the lock: the main thread is the only thread
        // here, so if SIGCHLD were delivered while this lock is held, its
        // handler would re-lock the same non-reentrant mutex and deadlock.
        let still_foreground = signals::with_sigchld_blocked(|| {
            let table = signals::JOB_TABLE.lock().expect("job table poisoned");
            table
                .find_by_pid(leader_pid)
                .is_some_and(|job| job.state == JobState::Foreground)
        });
        if !still_foreground {
            return;
        }
        if unsafe { libc::usleep(500) } != 0 {
            return;
        }
    }
}
