//! Terminal side of the progress editor: questions, confirmations, git.
use super::ProgressEntry;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;
use std::process::Command;

/// Printed when the session is aborted.
pub const CANCELLED_MESSAGE: &str = "\n\n\u{1f44b} Progress update cancelled.\n";

/// The user aborted the session (end of input or interrupt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("progress update cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Ask for every field of a progress entry.
///
/// Technical details are read one per line until an empty line. End of
/// input at any question yields [`Cancelled`].
pub fn collect_entry<R, W>(
    input: &mut R,
    output: &mut W,
    timestamp: NaiveDateTime,
) -> Result<ProgressEntry>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "\u{1f3af} CYOA MLOps Progress Update Tool")?;
    writeln!(output, "{}", "=".repeat(40))?;

    let accomplishment = ask(
        input,
        output,
        "\n\u{2705} What did you accomplish? (brief description): ",
    )?;
    let time_spent = ask(
        input,
        output,
        "\u{23f0} Time spent (e.g., '30 min', '2 hours'): ",
    )?;

    writeln!(
        output,
        "\n\u{1f527} Technical details (optional, press Enter to skip):"
    )?;
    let mut technical_details = Vec::new();
    loop {
        let detail = ask(input, output, "  - ")?;
        if detail.is_empty() {
            break;
        }
        technical_details.push(detail);
    }

    let issues = ask(
        input,
        output,
        "\n\u{1f6a7} Any issues encountered? (optional): ",
    )?;
    let notes = ask(input, output, "\u{1f4dd} Additional notes? (optional): ")?;

    Ok(ProgressEntry {
        accomplishment,
        time_spent,
        technical_details,
        issues: non_empty(issues),
        notes: non_empty(notes),
        timestamp,
    })
}

/// Ask a yes/no question; any answer starting with `y` (any case) is yes.
pub fn confirm<R, W>(input: &mut R, output: &mut W, question: &str) -> Result<bool>
where
    R: BufRead,
    W: Write,
{
    let answer = ask(input, output, question)?;
    Ok(answer.to_lowercase().starts_with('y'))
}

fn ask<R, W>(input: &mut R, output: &mut W, question: &str) -> Result<String>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{question}")?;
    output.flush()?;
    let mut line = String::new();
    let read = input.read_line(&mut line).context("read answer")?;
    if read == 0 {
        return Err(Cancelled.into());
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// True when `err` (or anything in its chain) is a [`Cancelled`].
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<Cancelled>().is_some())
}

/// Exit quietly with the cancellation message on Ctrl-C.
pub fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        print!("{CANCELLED_MESSAGE}");
        let _ = std::io::stdout().flush();
        std::process::exit(0);
    })
    .context("install Ctrl-C handler")
}

/// `git add .` then `git commit -m <message>` in `repo`.
pub fn commit_all(repo: &Path, message: &str) -> Result<()> {
    run_git(repo, &["add", "."])?;
    run_git(repo, &["commit", "-m", message])
}

pub fn push(repo: &Path) -> Result<()> {
    run_git(repo, &["push"])
}

fn run_git(repo: &Path, args: &[&str]) -> Result<()> {
    tracing::debug!(?args, repo = %repo.display(), "running git");
    let status = Command::new("git")
        .args(args)
        .current_dir(repo)
        .status()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !status.success() {
        return Err(anyhow!("git {} failed with status {status}", args.join(" ")));
    }
    Ok(())
}
