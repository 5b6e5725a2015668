//! Printed summaries and keyword heuristics over generated stories.
//!
//! Everything here is read-only and advisory: scores are printed for a human
//! reader and never feed back into generation.
use crate::dataset::{unique_in_order, value_counts, ResultRow, ScenarioRow};
use crate::util::truncate_chars;
use anyhow::Result;
use std::path::Path;

pub const MYSTERY_WORDS: &[&str] = &["detective", "sheriff", "sarah", "pine", "mystery"];
pub const ATMOSPHERE_WORDS: &[&str] = &["fog", "dark", "strange", "alien", "entity", "consciousness"];
pub const ON_TOPIC_WORDS: &[&str] = &["sarah", "pine", "mystery", "disappeared", "town"];
pub const ATMOSPHERIC_WORDS: &[&str] = &["forest", "fog", "dark", "strange", "whisper"];
pub const MYSTERY_THEME_WORDS: &[&str] =
    &["detective", "sheriff", "mystery", "disappeared", "town", "coffee"];
pub const ANIME_THEME_WORDS: &[&str] = &["magic", "academy", "guild", "festival", "cherry", "spirits"];

const SHORT_RESPONSE_CHARS: usize = 100;
const LONG_RESPONSE_CHARS: usize = 500;
const RULE: &str = "============================================================";

/// Whether any keyword occurs in `text`, ignoring case.
pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keyword_hits(text, keywords) > 0
}

/// How many of `keywords` occur in `text`, ignoring case.
pub fn keyword_hits(text: &str, keywords: &[&str]) -> usize {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .filter(|keyword| lower.contains(&keyword.to_lowercase()))
        .count()
}

/// A named character or one of the town's staples shows up.
pub fn character_consistent(text: &str) -> bool {
    text.contains("Detective") || contains_any(text, &["sheriff", "coffee"])
}

/// Heuristic flags for one generated continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleQuality {
    pub mystery_elements: bool,
    pub character_consistency: bool,
    pub atmospheric: bool,
}

impl SampleQuality {
    pub fn of(text: &str) -> Self {
        SampleQuality {
            mystery_elements: contains_any(text, ON_TOPIC_WORDS),
            character_consistency: character_consistent(text),
            atmospheric: contains_any(text, ATMOSPHERIC_WORDS),
        }
    }
}

pub fn average_response_chars(rows: &[ResultRow]) -> f64 {
    average_chars(rows.iter().map(|row| row.ai_response.as_str()))
}

/// Mean length in characters; zero for no responses.
pub fn average_chars<'a, I>(responses: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    mean(responses.into_iter().map(|text| text.chars().count()))
}

/// Mean number of theme keywords per response.
pub fn theme_score<'a, I>(responses: I, keywords: &[&str]) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    mean(
        responses
            .into_iter()
            .map(|text| keyword_hits(text, keywords)),
    )
}

fn mean(values: impl Iterator<Item = usize>) -> f64 {
    let (total, count) = values.fold((0usize, 0usize), |(total, count), value| {
        (total + value, count + 1)
    });
    if count == 0 {
        return 0.0;
    }
    total as f64 / count as f64
}

pub fn count_atmosphere(rows: &[ResultRow], level: &str) -> usize {
    rows.iter().filter(|row| row.atmosphere_level == level).count()
}

/// Print story arc, atmosphere and branch distributions of a dataset.
pub fn print_dataset_summary(rows: &[ScenarioRow]) {
    println!("Loaded {} mystery scenarios", rows.len());
    if rows.iter().any(|row| row.story_arc.is_some()) {
        println!("\nStory arc distribution:");
        print_counts(&value_counts(
            rows.iter().filter_map(|row| row.story_arc.as_deref()),
        ));
    }
    println!("\nAtmosphere progression:");
    print_counts(&value_counts(rows.iter().map(|row| row.atmosphere_level.as_str())));
    println!("\nStory branches:");
    print_counts(&value_counts(rows.iter().map(|row| row.branch_type.as_str())));
    println!(
        "\nDialogue styles: {} unique styles",
        unique_in_order(rows.iter().map(|row| row.dialogue_style.as_str())).len()
    );
}

fn print_counts(counts: &[(String, usize)]) {
    for (value, count) in counts {
        println!("  - {value}: {count} scenarios");
    }
}

/// Print every generated story with its advisory scores.
pub fn print_results(rows: &[ResultRow]) {
    println!("\nGENERATED STORIES");
    println!("{RULE}");
    for row in rows {
        let heading = match &row.story_arc {
            Some(arc) => format!("{} - {} ({})", arc.to_uppercase(), row.branch_type, row.atmosphere_level),
            None => format!("{} ({})", row.branch_type, row.atmosphere_level),
        };
        println!("\n{heading}");
        println!("PROMPT: {}...", truncate_chars(&row.prompt, 100));
        println!("HUMAN: {}...", truncate_chars(&row.human_response, 120));
        println!("AI: {}...", truncate_chars(&row.ai_response, 120));
        println!(
            "  mystery elements: {}/{}",
            keyword_hits(&row.ai_response, MYSTERY_WORDS),
            MYSTERY_WORDS.len()
        );
        println!(
            "  atmosphere words: {}/{}",
            keyword_hits(&row.ai_response, ATMOSPHERE_WORDS),
            ATMOSPHERE_WORDS.len()
        );
        println!("------------------------------------------------------------");
    }
}

/// Cross-experiment analysis of a results file, optionally against a baseline.
pub fn run_analysis(results: &Path, baseline: &Path) -> Result<()> {
    println!("CYOA EXPERIMENT ANALYSIS");
    println!("{RULE}");

    if !results.is_file() {
        println!("results not found: {}", results.display());
        return Ok(());
    }
    let primary = crate::dataset::load_results(results)?;
    println!("Mystery experiment: {} scenarios", primary.len());

    let comparison = if baseline.is_file() {
        let responses = crate::dataset::load_responses(baseline)?;
        println!("Baseline experiment: {} scenarios", responses.len());
        Some(responses)
    } else {
        println!("baseline not found for comparison: {}", baseline.display());
        None
    };

    print_analysis(&primary, comparison.as_deref());
    Ok(())
}

fn print_analysis(primary: &[ResultRow], baseline: Option<&[String]>) {
    println!("\n{RULE}");
    println!("MYSTERY EXPERIMENT ANALYSIS");
    println!("{RULE}");

    println!("\nBasic metrics:");
    println!("  - Stories generated: {}", primary.len());
    println!(
        "  - Avg response length: {:.1} chars",
        average_response_chars(primary)
    );
    println!(
        "  - Twin Peaks scenarios: {}",
        count_atmosphere(primary, "twin_peaks")
    );
    println!(
        "  - Stranger Things scenarios: {}",
        count_atmosphere(primary, "stranger_things")
    );

    println!("\nDialogue style distribution:");
    print_unique_counts(primary.iter().map(|row| row.dialogue_style.as_str()));
    println!("\nStory branch distribution:");
    print_unique_counts(primary.iter().map(|row| row.branch_type.as_str()));

    let short = primary
        .iter()
        .filter(|row| row.response_chars() < SHORT_RESPONSE_CHARS)
        .count();
    let long = primary
        .iter()
        .filter(|row| row.response_chars() > LONG_RESPONSE_CHARS)
        .count();
    println!("\nQuality observations:");
    println!("  - Short responses (<{SHORT_RESPONSE_CHARS} chars): {short}");
    println!("  - Long responses (>{LONG_RESPONSE_CHARS} chars): {long}");

    println!("\nSample response analysis:");
    for (idx, row) in primary.iter().take(3).enumerate() {
        let quality = SampleQuality::of(&row.ai_response);
        println!(
            "\nSample {} ({} - {}):",
            idx + 1,
            row.atmosphere_level,
            row.dialogue_style
        );
        println!("  Prompt: {}...", truncate_chars(&row.prompt, 80));
        println!("  Human: {}...", truncate_chars(&row.human_response, 80));
        println!("  AI: {}...", truncate_chars(&row.ai_response, 80));
        println!("  Mystery elements: {}", yes_no(quality.mystery_elements));
        println!(
            "  Character consistency: {}",
            yes_no(quality.character_consistency)
        );
        println!("  Atmospheric: {}", yes_no(quality.atmospheric));
    }

    if let Some(baseline) = baseline {
        println!("\n{RULE}");
        println!("MYSTERY vs BASELINE COMPARISON");
        println!("{RULE}");
        let mystery_avg = average_response_chars(primary);
        let baseline_avg = average_chars(baseline.iter().map(String::as_str));
        println!("\nLength comparison:");
        println!("  - Mystery avg: {mystery_avg:.1} chars");
        println!("  - Baseline avg: {baseline_avg:.1} chars");
        println!("  - Difference: {:+.1} chars", mystery_avg - baseline_avg);
        println!("\nTheme consistency:");
        println!(
            "  - Mystery theme words per response: {:.2}",
            theme_score(
                primary.iter().map(|row| row.ai_response.as_str()),
                MYSTERY_THEME_WORDS
            )
        );
        println!(
            "  - Anime theme words per response: {:.2}",
            theme_score(baseline.iter().map(String::as_str), ANIME_THEME_WORDS)
        );
    }

    println!("\n{RULE}");
    println!("KEY FINDINGS & NEXT STEPS");
    println!("{RULE}");
    println!("\nObservations:");
    println!("  - The model generates long, somewhat coherent responses");
    println!("  - Mystery atmosphere is partially maintained");
    println!("  - Character consistency needs improvement");
    println!("\nRecommendations:");
    println!("  1. Fine-tune on mystery/thriller literature");
    println!("  2. Add more reference dialogue examples");
    println!("  3. Improve prompt construction");
    println!("  4. Create evaluation metrics for atmosphere");
    println!("  5. Expand the dataset to 20+ scenarios per branch");
}

fn print_unique_counts<'a, I>(values: I)
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    for value in unique_in_order(values.clone()) {
        let count = values.clone().into_iter().filter(|v| *v == value).count();
        println!("  - {value}: {count} scenarios");
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}
