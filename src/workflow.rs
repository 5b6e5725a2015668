use crate::cli::{AnalyzeArgs, CollectArgs, GenerateArgs, PatternsArgs, ProgressArgs};
use crate::dataset::{self, ResultRow, ScenarioRow};
use crate::dialogue;
use crate::experiment::{self, ExperimentConfig};
use crate::generate::{self, CommandGenerator, Generator, Selection};
use crate::progress::{self, prompt};
use crate::report;
use crate::tracking::{self, with_run, Tracker};
use crate::util::truncate_chars;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use std::io::{self, Write};
use std::path::Path;

const DATA_EXPERIMENT: &str = "cyoa_mystery_data";
const DATA_RUN: &str = "twin_peaks_data_collection";

pub fn run_collect(args: CollectArgs) -> Result<()> {
    let mut tracker =
        tracking::tracker_from_args(args.tracking.tracking_uri.as_deref(), args.tracking.no_track);
    collect_dataset(&args.input, &args.output, &args.profiles, tracker.as_mut())
}

/// Style the mystery dataset and log the collection run.
fn collect_dataset(
    input: &Path,
    output: &Path,
    profiles: &Path,
    tracker: &mut dyn Tracker,
) -> Result<()> {
    println!("Creating Twin Peaks-inspired mystery dataset...");
    let corpus = dialogue::authentic_dialogue();
    println!("Collected {} dialogue samples", corpus.len());
    for record in corpus {
        println!(
            "  - {} [{}, {}]: {}",
            record.character,
            record.style,
            record.context,
            truncate_chars(record.dialogue, 60)
        );
    }
    let styles = dialogue::style_names();
    println!("Catalogued {} dialogue style patterns", styles.len());

    let rows = dataset::enhance_dataset(input, output)?;
    println!("Enhanced {rows} story segments -> {}", output.display());

    let dialogue_styles =
        serde_json::to_string(&styles).context("serialize dialogue style names")?;
    with_run(tracker, DATA_EXPERIMENT, DATA_RUN, |run| {
        run.log_param("data_source", "twin_peaks_scripts")?;
        run.log_param("story_theme", "pine_hollow_mystery")?;
        run.log_param("num_story_segments", &rows.to_string())?;
        run.log_param("dialogue_styles", &dialogue_styles)?;

        run.log_metric("stories_per_branch", rows as f64 / 3.0)?;
        run.log_metric("twin_peaks_atmosphere_level", 1.0)?;

        run.log_artifact(output)?;
        if profiles.is_file() {
            run.log_artifact(profiles)?;
        } else {
            tracing::warn!(path = %profiles.display(), "character profiles missing; not logged");
        }
        Ok(())
    })?;

    println!("Mystery dataset logged to {DATA_EXPERIMENT}/{DATA_RUN}");
    Ok(())
}

pub fn run_patterns(args: PatternsArgs) -> Result<()> {
    let text = match args.style.as_deref() {
        Some(name) => {
            let pattern = dialogue::pattern(name).ok_or_else(|| {
                anyhow!(
                    "unknown dialogue style {name:?} (known: {})",
                    dialogue::style_names().join(", ")
                )
            })?;
            serde_json::to_string_pretty(pattern)
        }
        None => serde_json::to_string_pretty(dialogue::catalogue()),
    }
    .context("serialize dialogue catalogue")?;
    println!("{text}");
    Ok(())
}

pub fn run_generate(args: GenerateArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => experiment::load_config(path)?,
        None => experiment::preset_config(args.preset),
    };
    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(output) = args.output {
        config.output = output;
    }
    experiment::validate_config(&config)?;

    let command = experiment::resolve_lm_command(args.lm.as_deref(), &config)?;
    let mut generator = CommandGenerator::new(&command)?;
    let mut tracker =
        tracking::tracker_from_args(args.tracking.tracking_uri.as_deref(), args.tracking.no_track);
    run_experiment(&config, &mut generator, tracker.as_mut())
}

/// Load, generate, report, persist and log one experiment.
///
/// Generation happens before the tracking run opens; a generator failure
/// leaves no results file and no run behind.
pub fn run_experiment(
    config: &ExperimentConfig,
    generator: &mut dyn Generator,
    tracker: &mut dyn Tracker,
) -> Result<()> {
    let scenarios = dataset::load_scenarios(&config.input)?;
    report::print_dataset_summary(&scenarios);

    println!("\nGenerating stories with {}...", config.model_name);
    let selection = config.selection();
    let results =
        generate::run_inference(&scenarios, &selection, &config.sampling(), generator)?;
    report::print_results(&results);

    dataset::write_results(&config.output, &results)?;
    println!("\nResults saved to {}", config.output.display());

    with_run(tracker, &config.experiment, &config.run_name, |run| {
        log_experiment(run, config, &selection, &scenarios, &results)
    })?;
    println!("Experiment logged as {}", config.run_name);
    Ok(())
}

fn log_experiment(
    run: &mut dyn Tracker,
    config: &ExperimentConfig,
    selection: &Selection,
    scenarios: &[ScenarioRow],
    results: &[ResultRow],
) -> Result<()> {
    run.log_param("model_name", &config.model_name)?;
    run.log_param("story_theme", &config.story_theme)?;
    run.log_param("data_source", &config.data_source)?;
    match selection {
        Selection::All => run.log_param("num_scenarios", &scenarios.len().to_string())?,
        Selection::Indices(_) => {
            run.log_param("total_scenarios", &scenarios.len().to_string())?;
            run.log_param("tested_scenarios", &results.len().to_string())?;
        }
    }
    let arcs = dataset::unique_in_order(scenarios.iter().filter_map(|row| row.story_arc.as_deref()));
    if !arcs.is_empty() {
        let arcs = serde_json::to_string(&arcs).context("serialize story arcs")?;
        run.log_param("story_arcs", &arcs)?;
    }
    for (key, value) in &config.params {
        run.log_param(key, value)?;
    }

    run.log_metric("stories_generated", results.len() as f64)?;
    run.log_metric("avg_response_length", report::average_response_chars(results))?;
    match selection {
        Selection::All => {
            let levels =
                dataset::value_counts(results.iter().map(|row| row.atmosphere_level.as_str()));
            log_counts(run, FIXED_LEVELS, levels, "stories")?;
        }
        Selection::Indices(_) => {
            let arcs = dataset::value_counts(
                scenarios.iter().filter_map(|row| row.story_arc.as_deref()),
            );
            log_counts(run, FIXED_ARCS, arcs, "scenarios")?;
            let levels =
                dataset::value_counts(scenarios.iter().map(|row| row.atmosphere_level.as_str()));
            log_counts(run, FIXED_LEVELS, levels, "scenarios")?;
        }
    }

    run.log_artifact(&config.output)?;
    run.log_artifact(&config.input)?;
    Ok(())
}

/// Atmosphere levels and story arcs whose counts are always logged, zero when absent.
const FIXED_LEVELS: &[&str] = &["twin_peaks", "stranger_things"];
const FIXED_ARCS: &[&str] = &["opening", "climax"];

/// Log `{value}_{suffix}` for each fixed value, then for any other counted value.
fn log_counts(
    run: &mut dyn Tracker,
    fixed: &[&str],
    counts: Vec<(String, usize)>,
    suffix: &str,
) -> Result<()> {
    for value in fixed {
        let count = counts
            .iter()
            .find(|(counted, _)| counted == value)
            .map_or(0, |(_, count)| *count);
        run.log_metric(&metric_key(value, suffix), count as f64)?;
    }
    for (value, count) in counts {
        if !fixed.contains(&value.as_str()) {
            run.log_metric(&metric_key(&value, suffix), count as f64)?;
        }
    }
    Ok(())
}

/// `{value}_{suffix}` restricted to characters tracking keys accept.
fn metric_key(value: &str, suffix: &str) -> String {
    let value: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{value}_{suffix}")
}

pub fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    report::run_analysis(&args.results, &args.baseline)
}

/// Interactive progress entry. Returns the process exit code.
pub fn run_progress(args: ProgressArgs) -> Result<i32> {
    prompt::install_interrupt_handler()?;
    let timestamp = match args.at.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None => chrono::Local::now().naive_local(),
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    match edit_progress(&args.file, timestamp, &mut input, &mut output) {
        Ok(()) => Ok(0),
        Err(err) if prompt::is_cancelled(&err) => {
            print!("{}", prompt::CANCELLED_MESSAGE);
            Ok(0)
        }
        Err(err) => {
            println!("\n\u{274c} Error: {err}");
            Ok(1)
        }
    }
}

fn edit_progress<R, W>(
    file: &Path,
    timestamp: NaiveDateTime,
    input: &mut R,
    output: &mut W,
) -> Result<()>
where
    R: io::BufRead,
    W: Write,
{
    let entry = prompt::collect_entry(input, output, timestamp)?;
    let Some(placement) = progress::update_progress_file(file, &entry)? else {
        writeln!(output, "\u{274c} {} not found!", file.display())?;
        return Ok(());
    };
    tracing::info!(?placement, path = %file.display(), "progress entry written");
    writeln!(output, "\n\u{2705} Progress updated in {}!", file.display())?;

    let message = progress::suggest_commit_message(&entry.accomplishment);
    writeln!(output, "\n\u{1f4dd} Suggested commit message:")?;
    writeln!(output, "   {message}")?;

    let repo = match file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        Some(dir) => dir,
        None => Path::new("."),
    };
    if prompt::confirm(input, output, "\n\u{1f504} Auto-commit these changes? (y/n): ")? {
        prompt::commit_all(repo, &message)?;
        writeln!(output, "\u{2705} Changes committed!")?;
        if prompt::confirm(input, output, "\u{1f4e4} Push to GitHub? (y/n): ")? {
            prompt::push(repo)?;
            writeln!(output, "\u{2705} Changes pushed to GitHub!")?;
        }
    }

    writeln!(output, "\n\u{1f389} Progress tracking updated successfully!")?;
    writeln!(output, "\u{1f4ca} Check {} for the full log", file.display())?;
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map_err(|err| anyhow!("invalid --at {raw:?} (expected YYYY-MM-DDTHH:MM): {err}"))
}
