//! CLI argument parsing for the experiment scripts.
//!
//! Each subcommand corresponds to one linear script: the commands share no
//! runtime state beyond files on disk.
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "cyoa",
    version,
    about = "Choose-your-own-adventure text generation experiments",
    after_help = "Commands:\n  collect                   Build the styled mystery dataset and log it\n  patterns                  Print the dialogue style catalogue as JSON\n  generate --preset <name>  Run a generation experiment over a scenario CSV\n  analyze                   Compare generated results across experiments\n  progress                  Record a progress entry in PROGRESS.md\n\nExamples:\n  cyoa collect\n  cyoa generate --preset expanded --lm 'python3 gen.py --max-length {max_length}'\n  cyoa analyze --results generated_stories_pine_hollow_baseline.csv\n  cyoa progress --file PROGRESS.md",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Derive dialogue styles for the mystery dataset and log the collection run
    Collect(CollectArgs),
    /// Print the dialogue style catalogue as JSON
    Patterns(PatternsArgs),
    /// Generate story continuations for a scenario dataset
    Generate(GenerateArgs),
    /// Summarize generated stories and compare against a baseline
    Analyze(AnalyzeArgs),
    /// Interactively add an entry to the progress log
    Progress(ProgressArgs),
}

/// Tracking service selection shared by commands that log runs.
#[derive(Parser, Debug, Clone)]
pub struct TrackingArgs {
    /// Tracking server base URL (falls back to MLFLOW_TRACKING_URI)
    #[arg(long, value_name = "URL")]
    pub tracking_uri: Option<String>,

    /// Skip experiment tracking entirely
    #[arg(long, conflicts_with = "tracking_uri")]
    pub no_track: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Derive dialogue styles for the mystery dataset and log the collection run")]
pub struct CollectArgs {
    /// Source scenario CSV (must contain a branch_type column)
    #[arg(long, value_name = "PATH", default_value = "data/pine_hollow_enhanced_v2.csv")]
    pub input: PathBuf,

    /// Output path for the styled dataset
    #[arg(long, value_name = "PATH", default_value = "data/pine_hollow_enhanced.csv")]
    pub output: PathBuf,

    /// Character profiles CSV uploaded alongside the dataset when present
    #[arg(long, value_name = "PATH", default_value = "data/character_profiles.csv")]
    pub profiles: PathBuf,

    #[command(flatten)]
    pub tracking: TrackingArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Print the dialogue style catalogue as JSON")]
pub struct PatternsArgs {
    /// Print only this style
    #[arg(long, value_name = "NAME")]
    pub style: Option<String>,
}

/// Built-in experiment presets.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Every row of the enhanced dataset, temperature 0.8
    Baseline,
    /// Key story moments of the expanded dataset, temperature 0.7
    Expanded,
}

#[derive(Parser, Debug)]
#[command(about = "Generate story continuations for a scenario dataset")]
pub struct GenerateArgs {
    /// Built-in experiment preset
    #[arg(long, value_enum, default_value = "baseline", conflicts_with = "config")]
    pub preset: Preset,

    /// Experiment config JSON (overrides the preset)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the scenario CSV
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Override the results CSV
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Generator command (shell words; falls back to CYOA_LM_COMMAND)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    #[command(flatten)]
    pub tracking: TrackingArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Summarize generated stories and compare against a baseline")]
pub struct AnalyzeArgs {
    /// Results CSV of the experiment under analysis
    #[arg(long, value_name = "PATH", default_value = "generated_stories_pine_hollow_baseline.csv")]
    pub results: PathBuf,

    /// Results CSV of the comparison baseline
    #[arg(long, value_name = "PATH", default_value = "generated_stories_baseline.csv")]
    pub baseline: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Interactively add an entry to the progress log")]
pub struct ProgressArgs {
    /// Markdown progress log to edit
    #[arg(long, value_name = "PATH", default_value = "PROGRESS.md")]
    pub file: PathBuf,

    /// Entry timestamp as YYYY-MM-DDTHH:MM (defaults to now)
    #[arg(long, value_name = "TIME", hide = true)]
    pub at: Option<String>,
}
