//! Progress log editing.
//!
//! `PROGRESS.md` is organised as a top-level log header, one section per day
//! (`### 🗓️ <Month DD, YYYY>`), and a trailing sprint-goals section. New
//! entries are spliced into the document with plain substring searches; the
//! functions here are pure so the splicing can be tested without a terminal.
//! Interactive collection lives in [`prompt`].
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;

pub mod prompt;

pub const DAY_HEADER_PREFIX: &str = "### \u{1f5d3}\u{fe0f}";
pub const SPRINT_GOALS_HEADER: &str = "## \u{1f3af} Current Sprint Goals";
pub const LOG_HEADER: &str = "## \u{1f4c5} Detailed Progress Log";

/// The timestamp line as first authored. Only this exact text is refreshed.
pub const INITIAL_LAST_UPDATED: &str = "**Last Updated**: January 1, 2025, 10:30 PM";

const ENTRY_MARK: &str = "\u{2705}";

/// Ordered keyword rules for conventional commit prefixes.
const COMMIT_RULES: &[(&[&str], &str)] = &[
    (&["fix", "bug", "error", "issue"], "fix"),
    (&["add", "new", "create", "implement"], "feat"),
    (&["doc", "readme", "comment"], "docs"),
    (&["test", "testing"], "test"),
    (&["refactor", "clean", "organize"], "refactor"),
];

/// One unit of recorded work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEntry {
    pub accomplishment: String,
    pub time_spent: String,
    pub technical_details: Vec<String>,
    pub issues: Option<String>,
    pub notes: Option<String>,
    pub timestamp: NaiveDateTime,
}

/// Where an entry ended up in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Today's section exists and a later day follows it.
    BeforeNextDay,
    /// Today's section is the latest; entry placed before the sprint goals.
    BeforeSprintGoals,
    /// Today's section is the latest and nothing follows it.
    AppendedToToday,
    /// New day section placed before the sprint goals.
    NewDayBeforeSprintGoals,
    /// New day section appended at the end of the document.
    NewDayAppended,
    /// First day section, placed right under the log header.
    NewDayAfterLogHeader,
    /// No day sections and no log header: nothing was inserted.
    Skipped,
}

pub fn date_label(timestamp: &NaiveDateTime) -> String {
    timestamp.format("%B %d, %Y").to_string()
}

pub fn day_header(timestamp: &NaiveDateTime) -> String {
    format!("{DAY_HEADER_PREFIX} {}", date_label(timestamp))
}

/// Render an entry as the markdown block inserted into a day section.
pub fn format_entry(entry: &ProgressEntry) -> String {
    let mut block = format!(
        "\n#### {ENTRY_MARK} {} - {}\n**Duration**: {}\n",
        entry.timestamp.format("%I:%M %p"),
        entry.accomplishment,
        entry.time_spent
    );
    if !entry.technical_details.is_empty() {
        block.push_str("\n**Technical Details**:\n");
        for detail in &entry.technical_details {
            block.push_str(&format!("- {detail}\n"));
        }
    }
    if let Some(issues) = entry.issues.as_deref().filter(|s| !s.is_empty()) {
        block.push_str(&format!("\n**Issues**: {issues}\n"));
    }
    if let Some(notes) = entry.notes.as_deref().filter(|s| !s.is_empty()) {
        block.push_str(&format!("\n**Notes**: {notes}\n"));
    }
    block
}

/// Insert `entry` into `content` under the section for its day.
pub fn splice_entry(content: &str, entry: &ProgressEntry) -> (String, Placement) {
    let block = format_entry(entry);
    let today = day_header(&entry.timestamp);

    if let Some(day_pos) = content.find(&today) {
        let after_header = day_pos + today.len();
        if let Some(next_day) = find_from(content, DAY_HEADER_PREFIX, after_header) {
            let spliced = insert_at(content, next_day, &format!("{block}\n"));
            return (spliced, Placement::BeforeNextDay);
        }
        return match find_from(content, SPRINT_GOALS_HEADER, after_header) {
            Some(goals) => (
                insert_at(content, goals, &format!("{block}\n")),
                Placement::BeforeSprintGoals,
            ),
            None => (format!("{content}{block}"), Placement::AppendedToToday),
        };
    }

    let section = format!("\n{today}\n{block}\n");
    if let Some(last_day) = content.rfind(DAY_HEADER_PREFIX) {
        return match find_from(content, SPRINT_GOALS_HEADER, last_day) {
            Some(goals) => (
                insert_at(content, goals, &format!("{section}\n")),
                Placement::NewDayBeforeSprintGoals,
            ),
            None => (format!("{content}{section}"), Placement::NewDayAppended),
        };
    }

    match content.find(LOG_HEADER) {
        Some(log_pos) => {
            let line_end = content[log_pos..]
                .find('\n')
                .map(|offset| log_pos + offset + 1)
                .unwrap_or(content.len());
            (
                insert_at(content, line_end, &section),
                Placement::NewDayAfterLogHeader,
            )
        }
        None => (content.to_string(), Placement::Skipped),
    }
}

/// Replace the initial "last updated" line with `timestamp`.
///
/// Only [`INITIAL_LAST_UPDATED`] is matched, so once it has been replaced the
/// timestamp is never refreshed again. Returns whether a replacement happened.
pub fn update_last_updated(content: &str, timestamp: &NaiveDateTime) -> (String, bool) {
    if !content.contains(INITIAL_LAST_UPDATED) {
        return (content.to_string(), false);
    }
    let refreshed = format!(
        "**Last Updated**: {}",
        timestamp.format("%B %d, %Y, %I:%M %p")
    );
    (content.replace(INITIAL_LAST_UPDATED, &refreshed), true)
}

/// Splice `entry` into the progress file and rewrite it in place.
///
/// Returns `None` without touching anything when the file does not exist.
pub fn update_progress_file(path: &Path, entry: &ProgressEntry) -> Result<Option<Placement>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let (content, placement) = splice_entry(&content, entry);
    if placement == Placement::Skipped {
        tracing::warn!(
            path = %path.display(),
            "no day sections and no log header; entry not inserted"
        );
    }
    let (content, refreshed) = update_last_updated(&content, &entry.timestamp);
    if !refreshed {
        tracing::debug!(path = %path.display(), "last-updated line left unchanged");
    }
    fs::write(path, content.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(Some(placement))
}

/// Conventional-commit style message for an accomplishment.
pub fn suggest_commit_message(accomplishment: &str) -> String {
    let lower = accomplishment.to_lowercase();
    let prefix = COMMIT_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map(|(_, prefix)| *prefix)
        .unwrap_or("chore");
    format!("{prefix}: {accomplishment}")
}

fn find_from(content: &str, needle: &str, from: usize) -> Option<usize> {
    content
        .get(from..)
        .and_then(|rest| rest.find(needle))
        .map(|offset| from + offset)
}

fn insert_at(content: &str, pos: usize, text: &str) -> String {
    let mut out = String::with_capacity(content.len() + text.len());
    out.push_str(&content[..pos]);
    out.push_str(text);
    out.push_str(&content[pos..]);
    out
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
