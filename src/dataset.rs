//! Scenario and result datasets.
//!
//! Columns are resolved by name; a missing file or a missing required column
//! is fatal for the command that needs it.
use crate::util::ensure_parent_dir;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Ordered substring rules mapping a branch type to a dialogue style.
pub const STYLE_RULES: &[(&str, &str)] = &[
    ("sheriff", "straightforward_concerned"),
    ("diner", "warm_informative"),
];

pub const DEFAULT_STYLE: &str = "quirky_observational";

const BRANCH_COLUMN: &str = "branch_type";
const STYLE_COLUMN: &str = "dialogue_style";

/// One story scenario as authored in the dataset CSV.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScenarioRow {
    pub prompt: String,
    /// The human-authored continuation.
    pub response: String,
    pub branch_type: String,
    pub atmosphere_level: String,
    pub dialogue_style: String,
    #[serde(default)]
    pub story_arc: Option<String>,
    pub choice_a: String,
    pub choice_b: String,
}

/// A scenario paired with the generated continuation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ResultRow {
    #[serde(default)]
    pub scenario_id: Option<usize>,
    pub prompt: String,
    pub human_response: String,
    pub ai_response: String,
    pub branch_type: String,
    pub atmosphere_level: String,
    pub dialogue_style: String,
    #[serde(default)]
    pub story_arc: Option<String>,
    pub choice_a: String,
    pub choice_b: String,
}

impl ResultRow {
    pub fn from_scenario(scenario_id: Option<usize>, row: &ScenarioRow, ai_response: String) -> Self {
        ResultRow {
            scenario_id,
            prompt: row.prompt.clone(),
            human_response: row.response.clone(),
            ai_response,
            branch_type: row.branch_type.clone(),
            atmosphere_level: row.atmosphere_level.clone(),
            dialogue_style: row.dialogue_style.clone(),
            story_arc: row.story_arc.clone(),
            choice_a: row.choice_a.clone(),
            choice_b: row.choice_b.clone(),
        }
    }

    /// Length of the generated text in characters.
    pub fn response_chars(&self) -> usize {
        self.ai_response.chars().count()
    }
}

/// Pick the dialogue style for a branch type: first matching rule wins.
pub fn derive_dialogue_style(branch_type: &str) -> &'static str {
    STYLE_RULES
        .iter()
        .find(|(keyword, _)| branch_type.contains(keyword))
        .map(|(_, style)| *style)
        .unwrap_or(DEFAULT_STYLE)
}

/// Copy a scenario CSV, setting `dialogue_style` on every row from its branch type.
///
/// All other columns are carried through untouched. Returns the row count.
pub fn enhance_dataset(input: &Path, output: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("open dataset {}", input.display()))?;
    let mut headers = reader
        .headers()
        .with_context(|| format!("read headers of {}", input.display()))?
        .clone();
    let branch_idx = column_index(&headers, BRANCH_COLUMN)
        .ok_or_else(|| anyhow!("{} has no {BRANCH_COLUMN} column", input.display()))?;
    let style_idx = match column_index(&headers, STYLE_COLUMN) {
        Some(idx) => idx,
        None => {
            headers.push_field(STYLE_COLUMN);
            headers.len() - 1
        }
    };

    ensure_parent_dir(output)?;
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("create {}", output.display()))?;
    writer.write_record(&headers).context("write dataset headers")?;

    let mut rows = 0;
    for record in reader.records() {
        let record = record.with_context(|| format!("read row {} of {}", rows + 1, input.display()))?;
        let style = derive_dialogue_style(record.get(branch_idx).unwrap_or(""));
        let mut fields: Vec<&str> = record.iter().collect();
        fields.resize(headers.len(), "");
        fields[style_idx] = style;
        writer.write_record(fields).context("write dataset row")?;
        rows += 1;
    }
    writer
        .flush()
        .with_context(|| format!("write {}", output.display()))?;
    Ok(rows)
}

pub fn load_scenarios(path: &Path) -> Result<Vec<ScenarioRow>> {
    load_rows(path)
}

pub fn load_results(path: &Path) -> Result<Vec<ResultRow>> {
    load_rows(path)
}

#[derive(Deserialize)]
struct ResponseRow {
    ai_response: String,
}

/// Only the `ai_response` column of a results CSV; other columns may be absent.
pub fn load_responses(path: &Path) -> Result<Vec<String>> {
    let rows: Vec<ResponseRow> = load_rows(path)?;
    Ok(rows.into_iter().map(|row| row.ai_response).collect())
}

fn load_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("open {}", path.display()))?;
    let mut rows = Vec::new();
    for (idx, row) in reader.deserialize().enumerate() {
        let row: T = row.with_context(|| format!("parse row {} of {}", idx + 1, path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write result rows with a column set fixed for the whole file.
///
/// `scenario_id` and `story_arc` columns appear only when some row carries them.
pub fn write_results(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let with_id = rows.iter().any(|row| row.scenario_id.is_some());
    let with_arc = rows.iter().any(|row| row.story_arc.is_some());

    let mut headers = Vec::new();
    if with_id {
        headers.push("scenario_id");
    }
    headers.extend([
        "prompt",
        "human_response",
        "ai_response",
        "branch_type",
        "atmosphere_level",
        "dialogue_style",
    ]);
    if with_arc {
        headers.push("story_arc");
    }
    headers.extend(["choice_a", "choice_b"]);

    ensure_parent_dir(path)?;
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    writer.write_record(&headers).context("write result headers")?;
    for row in rows {
        let mut record = Vec::with_capacity(headers.len());
        if with_id {
            record.push(row.scenario_id.map(|id| id.to_string()).unwrap_or_default());
        }
        record.extend([
            row.prompt.clone(),
            row.human_response.clone(),
            row.ai_response.clone(),
            row.branch_type.clone(),
            row.atmosphere_level.clone(),
            row.dialogue_style.clone(),
        ]);
        if with_arc {
            record.push(row.story_arc.clone().unwrap_or_default());
        }
        record.extend([row.choice_a.clone(), row.choice_b.clone()]);
        writer.write_record(record).context("write result row")?;
    }
    writer
        .flush()
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Count occurrences per value, most frequent first; ties keep first-seen order.
pub fn value_counts<'a, I>(values: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value.to_string(), 1)),
        }
    }
    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Distinct values in first-seen order.
pub fn unique_in_order<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut unique: Vec<String> = Vec::new();
    for value in values {
        if !unique.iter().any(|seen| seen == value) {
            unique.push(value.to_string());
        }
    }
    unique
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header.trim() == name)
}

#[cfg(test)]
#[path = "dataset_tests.rs"]
mod tests;
