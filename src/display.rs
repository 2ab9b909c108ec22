//! Colored CLI display utilities for run output.
//!
//! Helper output is relayed unchanged: stdout lines go to stdout, stderr
//! lines to stderr. Status lines are written to stderr so that redirecting
//! stdout captures only what the remote command printed.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::runner::{OutputStream, ProcessOutcome, RunError};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to a maximum length, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Join arguments into one line, quoting where a shell would need it.
#[must_use]
pub fn format_args(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape::escape(a.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print run start information.
pub fn print_run_start(host: &str, identity: &str, command: &str) {
    let identity = if identity.is_empty() { "-" } else { identity };
    eprintln!(
        "{} {} host={}, identity={} {}",
        timestamp().dimmed(),
        "[RUN]".blue().bold(),
        host.cyan(),
        identity.cyan(),
        truncate(command, DEFAULT_MAX_LEN).dimmed()
    );
    let _ = io::stderr().flush();
}

/// Relay one helper output line.
pub fn print_line(stream: OutputStream, line: &str) {
    match stream {
        OutputStream::Stdout => {
            println!("{line}");
            let _ = io::stdout().flush();
        }
        OutputStream::Stderr => {
            eprintln!("{}", line.red());
            let _ = io::stderr().flush();
        }
    }
}

/// Print the result of a run.
pub fn print_run_end(result: &Result<ProcessOutcome, RunError>) {
    let ts = timestamp();
    match result {
        Ok(_) => eprintln!(
            "{} {} Command completed",
            ts.dimmed(),
            "[RUN]".green().bold()
        ),
        Err(e) => eprintln!(
            "{} {} {}",
            ts.dimmed(),
            "[FAILED]".red().bold(),
            truncate(&e.to_string(), 200).red()
        ),
    }
    let _ = io::stderr().flush();
}

/// Print the helper command line without running it.
pub fn print_args(program: &str, args: &[String]) {
    println!("{} {}", program.bold(), format_args(args));
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stderr().flush();
}
