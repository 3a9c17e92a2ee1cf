//! `tsh` — a small interactive job-control shell.
//!
//! Entry point: parses the shell's own flags, installs signal handlers,
//! redirects stderr onto stdout (test-harness expectation, spec.md §6),
//! then runs the read-eval-print loop.

mod builtins;
mod jobs;
mod launcher;
mod parser;
mod signals;

use std::io::{self, Write};
use std::sync::atomic::Ordering;

const USAGE: &str = "Usage: tsh [-hvp]\n";

struct Options {
    verbose: bool,
    prompt: bool,
}

fn parse_flags(args: &[String]) -> Result<Options, ()> {
    let mut options = Options {
        verbose: false,
        prompt: true,
    };

    for arg in args {
        match arg.as_str() {
            "-h" => return Err(()),
            "-v" => options.verbose = true,
            "-p" => options.prompt = false,
            _ => return Err(()),
        }
    }

    Ok(options)
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_flags(&args) {
        Ok(options) => options,
        Err(()) => {
            eprint!("{USAGE}");
            std::process::exit(1);
        }
    };

    signals::VERBOSE.store(options.verbose, Ordering::SeqCst);

    if let Err(e) = signals::install() {
        eprintln!("tsh: failed to install signal handlers: {e}");
        std::process::exit(1);
    }

    // Diagnostics and command output share one stream (test harness
    // expectation, spec.md §6).
    unsafe {
        libc::dup2(1, 2);
    }

    run_repl(options.prompt);
}

fn run_repl(show_prompt: bool) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if show_prompt {
            print!("tsh> ");
            if stdout.flush().is_err() {
                break;
            }
        }

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break, // end-of-stream
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("tsh: error reading input: {e}");
                break;
            }
        }

        dispatch(&line);
    }

    std::process::exit(0);
}

fn dispatch(line: &str) {
    let plan = match parser::parse_line(line) {
        Ok(Some(plan)) => plan,
        Ok(None) => return,
        Err(msg) => {
            eprintln!("{msg}");
            return;
        }
    };

    let Some(leader) = plan.stages.first() else {
        return;
    };
    let Some(program) = leader.argv.first() else {
        return;
    };

    if builtins::is_builtin(program) {
        builtins::execute(&leader.argv);
        return;
    }

    launcher::launch(&plan, line.trim_end_matches(|c| c == '\n' || c == '\r'));
}
