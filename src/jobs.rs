//! The job table: a fixed-capacity registry of live child pipelines.
//!
//! Ported from `tsh.c`'s `struct job_t jobs[MAXJOBS]` array and its
//! `addjob`/`deletejob`/`getjobpid`/`getjobjid`/`fgpid`/`listjobs` helpers.
//! The `pid == 0` sentinel for a free slot becomes `Option<Job>` here; the
//! array layout, wraparound jid counter, and slot-order listing are kept.

/// Maximum number of jobs the table can track at once.
pub const MAXJOBS: usize = 16;

/// The lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Running in the foreground; at most one job may hold this state.
    Foreground,
    /// Running in the background.
    Background,
    /// Stopped (suspended via SIGTSTP or the `bg`/`fg` protocol).
    Stopped,
}

impl JobState {
    /// The label `jobs` prints next to the job's `[jid] (pid)` prefix.
    fn label(self) -> &'static str {
        match self {
            JobState::Background => "Running",
            JobState::Foreground => "Foreground",
            JobState::Stopped => "Stopped",
        }
    }
}

/// A single tracked pipeline leader.
#[derive(Debug, Clone)]
pub struct Job {
    pub pid: libc::pid_t,
    pub jid: u32,
    pub state: JobState,
    pub cmdline: String,
}

/// Fixed-capacity table of live jobs, indexed by slot (not by jid).
///
/// Mutations performed from the `SIGCHLD` handler and mutations performed
/// from the REPL thread are serialized by a `Mutex` (see `signals.rs`); the
/// table itself assumes single-writer-at-a-time access and does no locking
/// of its own.
pub struct JobTable {
    slots: [Option<Job>; MAXJOBS],
    next_jid: u32,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub const fn new() -> Self {
        JobTable {
            slots: [const { None }; MAXJOBS],
            next_jid: 1,
        }
    }

    /// Insert a new job into the first free slot. Returns the assigned jid,
    /// or `None` (after printing `Tried to create too many jobs`) if the
    /// table is full. `pid` must be nonzero.
    pub fn add(&mut self, pid: libc::pid_t, state: JobState, cmdline: String) -> Option<u32> {
        debug_assert!(pid > 0, "job pid must be positive");

        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                let jid = self.next_jid;
                self.next_jid += 1;
                if self.next_jid > MAXJOBS as u32 {
                    self.next_jid = 1;
                }
                *slot = Some(Job {
                    pid,
                    jid,
                    state,
                    cmdline,
                });
                Some(jid)
            }
            None => {
                println!("Tried to create too many jobs");
                None
            }
        }
    }

    /// Remove the job with the given pid, if present. Resets the jid
    /// counter to `max(jid) + 1` so jids don't grow unboundedly under churn.
    pub fn delete(&mut self, pid: libc::pid_t) -> bool {
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| matches!(s, Some(j) if j.pid == pid))
        else {
            return false;
        };
        *slot = None;
        self.next_jid = self.max_jid() + 1;
        if self.next_jid > MAXJOBS as u32 {
            self.next_jid = 1;
        }
        true
    }

    fn max_jid(&self) -> u32 {
        self.slots
            .iter()
            .flatten()
            .map(|job| job.jid)
            .max()
            .unwrap_or(0)
    }

    /// The pid of the unique foreground job, or 0 if none is foreground.
    pub fn fg_pid(&self) -> libc::pid_t {
        self.slots
            .iter()
            .flatten()
            .find(|job| job.state == JobState::Foreground)
            .map(|job| job.pid)
            .unwrap_or(0)
    }

    pub fn find_by_pid(&self, pid: libc::pid_t) -> Option<&Job> {
        self.slots.iter().flatten().find(|job| job.pid == pid)
    }

    pub fn find_by_pid_mut(&mut self, pid: libc::pid_t) -> Option<&mut Job> {
        self.slots.iter_mut().flatten().find(|job| job.pid == pid)
    }

    pub fn find_by_jid(&self, jid: u32) -> Option<&Job> {
        self.slots.iter().flatten().find(|job| job.jid == jid)
    }

    pub fn find_by_jid_mut(&mut self, jid: u32) -> Option<&mut Job> {
        self.slots.iter_mut().flatten().find(|job| job.jid == jid)
    }

    /// Print every live job in slot order: `[jid] (pid) <state> <cmdline>`.
    pub fn list(&self) {
        for job in self.slots.iter().flatten() {
            println!(
                "[{}] ({}) {} {}",
                job.jid,
                job.pid,
                job.state.label(),
                job.cmdline
            );
        }
    }

    /// All live jobs in slot order, for callers that need to inspect rather
    /// than print them (tests, `fg`/`bg` spec resolution).
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().flatten()
    }
}
