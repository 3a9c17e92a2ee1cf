//! Built-in commands: `quit`, `jobs`, `fg`, `bg`.
//!
//! Ported from `tsh.c`'s `builtin_cmd()`/`do_bgfg()`. Unlike the launcher's
//! external commands, these never fork — they act directly on the shared
//! job table (spec.md §4.D step 1, §4.E).

use std::sync::atomic::Ordering;

use crate::jobs::JobState;
use crate::signals;

/// The argv[0] names this module handles without forking.
const BUILTINS: &[&str] = &["quit", "jobs", "fg", "bg"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Dispatch a builtin. `argv[0]` must already be known to satisfy
/// [`is_builtin`].
pub fn execute(argv: &[String]) {
    match argv[0].as_str() {
        "quit" => std::process::exit(0),
        "jobs" => {
            signals::with_sigchld_blocked(|| {
                let table = signals::JOB_TABLE.lock().expect("job table poisoned");
                table.list();
            });
        }
        "fg" => bg_fg(argv, true),
        "bg" => bg_fg(argv, false),
        other => unreachable!("{other} is not a registered builtin"),
    }
}

/// A job specifier: either `%<jid>` or a bare `<pid>`.
enum JobSpec {
    Jid(u32),
    Pid(libc::pid_t),
}

fn parse_spec(token: &str) -> Option<JobSpec> {
    if let Some(rest) = token.strip_prefix('%') {
        rest.parse::<u32>().ok().map(JobSpec::Jid)
    } else {
        token.parse::<libc::pid_t>().ok().map(JobSpec::Pid)
    }
}

fn bg_fg(argv: &[String], foreground: bool) {
    let Some(token) = argv.get(1) else {
        println!("Numero de processo nao informado");
        return;
    };

    let Some(spec) = parse_spec(token) else {
        println!("Numero de processo nao reconhecido: {token}");
        return;
    };

    let resolved_pid = signals::with_sigchld_blocked(|| {
        let table = signals::JOB_TABLE.lock().expect("job table poisoned");
        match spec {
            JobSpec::Jid(jid) => table.find_by_jid(jid).map(|job| job.pid),
            JobSpec::Pid(pid) => table.find_by_pid(pid).map(|job| job.pid),
        }
    });

    let Some(pid) = resolved_pid else {
        println!("Numero de processo nao reconhecido: {token}");
        return;
    };

    unsafe {
        libc::kill(-pid, libc::SIGCONT);
    }

    let new_state = if foreground {
        JobState::Foreground
    } else {
        JobState::Background
    };

    signals::with_sigchld_blocked(|| {
        let mut table = signals::JOB_TABLE.lock().expect("job table poisoned");
        if let Some(job) = table.find_by_pid_mut(pid) {
            job.state = new_state;
        }
    });

    if signals::VERBOSE.load(Ordering::SeqCst) {
        println!("{} resumed via {}", pid, if foreground { "fg" } else { "bg" });
    }

    if foreground {
        signals::set_foreground_pgid(pid);
        crate::launcher::wait_for_foreground(pid);
        signals::clear_foreground_pgid();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_all_four_builtins() {
        for name in ["quit", "jobs", "fg", "bg"] {
            assert!(is_builtin(name));
        }
    }

    #[test]
    fn external_commands_are_not_builtins() {
        assert!(!is_builtin("/bin/echo"));
        assert!(!is_builtin("ls"));
    }

    #[test]
    fn jid_spec_parses() {
        assert!(matches!(parse_spec("%3"), Some(JobSpec::Jid(3))));
    }

    #[test]
    fn pid_spec_parses() {
        assert!(matches!(parse_spec("1234"), Some(JobSpec::Pid(1234))));
    }

    #[test]
    fn garbage_spec_is_none() {
        assert!(parse_spec("%abc").is_none());
        assert!(parse_spec("abc").is_none());
    }
}
