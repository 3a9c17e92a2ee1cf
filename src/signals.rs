//! Signal router: installs `SIGINT`/`SIGTSTP`/`SIGCHLD`/`SIGQUIT` handlers
//! and keeps the process-global job table consistent with the kernel's view
//! of child processes.
//!
//! Ported from `tsh.c`'s `Signal()` wrapper and its four `sig*_handler`
//! functions. The job table itself lives behind a `Mutex` here rather than
//! as a bare global array, since Rust has no implicit "single translation
//! unit, single thread, trust yourself" escape hatch the way the C source
//! does — but the only place that mutex is ever contended is the narrow
//! fork-and-register window the REPL blocks `SIGCHLD` around (spec.md §5),
//! so in practice the handler never blocks on it. `SIGINT`/`SIGTSTP`
//! additionally consult a lock-free `AtomicI32` snapshot of the foreground
//! process group, rather than taking the job-table lock from inside the
//! handler at all, mirroring the `FOREGROUND_PID`-style atomic used for the
//! same purpose in comparable shell signal modules in this corpus.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;

use crate::jobs::{JobState, JobTable};

/// The process-wide job table. Mutated by the REPL (builtins, launcher) and
/// by the `SIGCHLD` handler; see the module docs for why a `Mutex` is safe
/// here despite being taken from signal-handler context.
pub static JOB_TABLE: Mutex<JobTable> = Mutex::new(JobTable::new());

/// Process group of the current foreground job, or 0 if none. Updated
/// whenever a job transitions into or out of the foreground so `SIGINT`/
/// `SIGTSTP` handlers never need to touch `JOB_TABLE`.
static FOREGROUND_PGID: AtomicI32 = AtomicI32::new(0);

/// Mirrors the `-v` flag: gates the `Added job [%d] %d %s` diagnostic.
pub static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_foreground_pgid(pgid: libc::pid_t) {
    FOREGROUND_PGID.store(pgid, Ordering::SeqCst);
}

pub fn clear_foreground_pgid() {
    FOREGROUND_PGID.store(0, Ordering::SeqCst);
}

fn foreground_pgid() -> libc::pid_t {
    FOREGROUND_PGID.load(Ordering::SeqCst)
}

/// Install the shell's four signal handlers with `SA_RESTART` and an empty
/// additional mask, exactly as `tsh.c`'s `Signal()` helper does. Failure
/// here is fatal at startup (spec.md §7).
pub fn install() -> io::Result<()> {
    install_one(libc::SIGINT, handle_sigint)?;
    install_one(libc::SIGTSTP, handle_sigtstp)?;
    install_one(libc::SIGCHLD, handle_sigchld)?;
    install_one(libc::SIGQUIT, handle_sigquit)?;
    Ok(())
}

fn install_one(signum: libc::c_int, handler: extern "C" fn(libc::c_int)) -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = libc::SA_RESTART;

        if libc::sigaction(signum, &action, std::ptr::null_mut()) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Block `SIGCHLD`, run `f`, then restore the previous signal mask.
///
/// Used by the launcher to close the window between `fork` and inserting
/// the new job into the table (spec.md §4.D step 2, §5): without this, a
/// fast-exiting child could be reaped by `SIGCHLD` before it has a job-table
/// entry to delete.
pub fn with_sigchld_blocked<T>(f: impl FnOnce() -> T) -> T {
    unsafe {
        let mut block_set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut block_set);
        libc::sigaddset(&mut block_set, libc::SIGCHLD);

        let mut old_set: libc::sigset_t = std::mem::zeroed();
        libc::sigprocmask(libc::SIG_BLOCK, &block_set, &mut old_set);

        let result = f();

        libc::sigprocmask(libc::SIG_SETMASK, &old_set, std::ptr::null_mut());
        result
    }
}

extern "C" fn handle_sigint(_sig: libc::c_int) {
    let pgid = foreground_pgid();
    if pgid > 0 {
        unsafe {
            libc::kill(-pgid, libc::SIGINT);
        }
    }
}

extern "C" fn handle_sigtstp(_sig: libc::c_int) {
    let pgid = foreground_pgid();
    if pgid <= 0 {
        return;
    }
    unsafe {
        libc::kill(-pgid, libc::SIGTSTP);
    }
    // Optimistically mark the job stopped; the SIGCHLD that follows (WUNTRACED)
    // confirms it. This mirrors tsh.c's sigtstp_handler setting job->state = ST
    // directly rather than waiting for the confirming SIGCHLD.
    //
    // SIGCHLD is blocked here too: this handler's own sa_mask is empty, so
    // without this a SIGCHLD delivered while the lock below is held would
    // re-enter handle_sigchld on the same thread and deadlock on the
    // non-reentrant mutex.
    with_sigchld_blocked(|| {
        if let Ok(mut table) = JOB_TABLE.lock() {
            if let Some(job) = table.find_by_pid_mut(pgid) {
                job.state = JobState::Stopped;
            }
        }
    });
}

extern "C" fn handle_sigquit(_sig: libc::c_int) {
    println!("Terminating after receipt of SIGQUIT signal");
    std::process::exit(1);
}

extern "C" fn handle_sigchld(_sig: libc::c_int) {
    loop {
        let mut raw_status: libc::c_int = 0;
        let pid = unsafe { libc::waitpid(-1, &mut raw_status, libc::WNOHANG | libc::WUNTRACED) };
        if pid <= 0 {
            break;
        }

        let Ok(mut table) = JOB_TABLE.lock() else {
            break;
        };

        let Some(job) = table.find_by_pid(pid) else {
            continue;
        };
        let was_foreground = job.state == JobState::Foreground;
        let jid = job.jid;

        if unsafe { libc::WIFEXITED(raw_status) } {
            let code = unsafe { libc::WEXITSTATUS(raw_status) };
            if !was_foreground {
                println!("O processo %{jid} (pid {pid}) terminou com valor {code}");
            }
            table.delete(pid);
        } else if unsafe { libc::WIFSIGNALED(raw_status) } {
            let signum = unsafe { libc::WTERMSIG(raw_status) };
            if !was_foreground {
                println!("O processo %{jid} (pid {pid}) foi terminado com o sinal {signum}");
            }
            table.delete(pid);
        } else if unsafe { libc::WIFSTOPPED(raw_status) } {
            if let Some(job) = table.find_by_pid_mut(pid) {
                job.state = JobState::Stopped;
            }
        }
    }
}
