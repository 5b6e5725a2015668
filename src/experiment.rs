//! Experiment configuration.
//!
//! An experiment is described by a small JSON document so runs are
//! reproducible from a file; the two built-in presets mirror the baseline and
//! expanded mystery experiments.
use crate::cli::Preset;
use crate::generate::{SamplingConfig, Selection};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

pub const MODEL_EXPERIMENT: &str = "cyoa_model_experiments";
pub const DEFAULT_MODEL: &str = "gpt2";

/// Key story moments: opening, revelation, escalation, climax, resolution.
pub const KEY_SCENARIOS: &[usize] = &[0, 3, 5, 8, 10, 13, 15];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    pub schema_version: u32,
    /// Tracking experiment the run is logged under.
    pub experiment: String,
    pub run_name: String,
    pub model_name: String,
    pub story_theme: String,
    pub data_source: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub temperature: f64,
    pub length_offset: usize,
    /// Row indices to generate for; all rows when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_ids: Option<Vec<usize>>,
    /// Extra string parameters logged with the run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_command: Option<String>,
}

impl ExperimentConfig {
    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig {
            temperature: self.temperature,
            length_offset: self.length_offset,
            ..SamplingConfig::default()
        }
    }

    pub fn selection(&self) -> Selection {
        match &self.scenario_ids {
            Some(ids) => Selection::Indices(ids.clone()),
            None => Selection::All,
        }
    }
}

/// Every row of the enhanced dataset.
pub fn baseline_config() -> ExperimentConfig {
    let mut params = BTreeMap::new();
    params.insert(
        "atmosphere_progression".to_string(),
        "twin_peaks_to_stranger_things".to_string(),
    );
    ExperimentConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        experiment: MODEL_EXPERIMENT.to_string(),
        run_name: "pine_hollow_mystery_baseline".to_string(),
        model_name: DEFAULT_MODEL.to_string(),
        story_theme: "pine_hollow_mystery".to_string(),
        data_source: "twin_peaks_inspired".to_string(),
        input: PathBuf::from("data/pine_hollow_enhanced_v2.csv"),
        output: PathBuf::from("generated_stories_pine_hollow_baseline.csv"),
        temperature: 0.8,
        length_offset: 40,
        scenario_ids: None,
        params,
        lm_command: None,
    }
}

/// Key story moments of the expanded dataset, with a more focused temperature.
pub fn expanded_config() -> ExperimentConfig {
    ExperimentConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        experiment: MODEL_EXPERIMENT.to_string(),
        run_name: "pine_hollow_expanded_experiment".to_string(),
        model_name: DEFAULT_MODEL.to_string(),
        story_theme: "pine_hollow_expanded".to_string(),
        data_source: "twin_peaks_to_stranger_things".to_string(),
        input: PathBuf::from("data/pine_hollow_expanded.csv"),
        output: PathBuf::from("generated_stories_expanded_pine_hollow.csv"),
        temperature: 0.7,
        length_offset: 50,
        scenario_ids: Some(KEY_SCENARIOS.to_vec()),
        params: BTreeMap::new(),
        lm_command: None,
    }
}

pub fn preset_config(preset: Preset) -> ExperimentConfig {
    match preset {
        Preset::Baseline => baseline_config(),
        Preset::Expanded => expanded_config(),
    }
}

pub fn load_config(path: &Path) -> Result<ExperimentConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ExperimentConfig =
        serde_json::from_slice(&bytes).context("parse experiment config JSON")?;
    Ok(config)
}

/// Reject configs that cannot drive a generation run.
pub fn validate_config(config: &ExperimentConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported experiment config schema_version {}",
            config.schema_version
        ));
    }
    for (label, value) in [
        ("experiment", &config.experiment),
        ("run_name", &config.run_name),
        ("model_name", &config.model_name),
    ] {
        if value.trim().is_empty() {
            return Err(anyhow!("{label} must be non-empty"));
        }
    }
    if !config.temperature.is_finite() || config.temperature <= 0.0 {
        return Err(anyhow!(
            "temperature must be a positive number (got {})",
            config.temperature
        ));
    }
    if config.scenario_ids.as_ref().is_some_and(Vec::is_empty) {
        return Err(anyhow!("scenario_ids must list at least one row when present"));
    }
    if config.input == config.output {
        return Err(anyhow!(
            "output must differ from input ({})",
            config.input.display()
        ));
    }
    Ok(())
}

/// Resolve the generator command: explicit arg > config > CYOA_LM_COMMAND.
pub fn resolve_lm_command(explicit: Option<&str>, config: &ExperimentConfig) -> Result<String> {
    explicit
        .map(|s| s.to_string())
        .or_else(|| config.lm_command.clone())
        .or_else(|| std::env::var("CYOA_LM_COMMAND").ok())
        .filter(|command| !command.trim().is_empty())
        .ok_or_else(|| anyhow!("no generator configured; pass --lm or set CYOA_LM_COMMAND"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        validate_config(&baseline_config()).expect("baseline preset");
        validate_config(&expanded_config()).expect("expanded preset");
    }

    #[test]
    fn preset_sampling_and_selection() {
        let expanded = expanded_config();
        assert_eq!(expanded.sampling().temperature, 0.7);
        assert_eq!(expanded.sampling().length_offset, 50);
        assert_eq!(
            expanded.selection(),
            Selection::Indices(vec![0, 3, 5, 8, 10, 13, 15])
        );
        assert_eq!(baseline_config().selection(), Selection::All);
    }

    #[test]
    fn config_round_trips_through_json_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("experiment.json");
        let config = baseline_config();
        fs::write(
            &path,
            serde_json::to_string_pretty(&config).expect("serialize config"),
        )
        .expect("write config");
        assert_eq!(load_config(&path).expect("load config"), config);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("experiment.json");
        let mut value = serde_json::to_value(baseline_config()).expect("serialize config");
        value["max_tokens"] = serde_json::json!(10);
        fs::write(&path, value.to_string()).expect("write config");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = baseline_config();
        config.temperature = 0.0;
        assert!(validate_config(&config).is_err());

        let mut config = baseline_config();
        config.scenario_ids = Some(Vec::new());
        assert!(validate_config(&config).is_err());

        let mut config = baseline_config();
        config.schema_version = 2;
        assert!(validate_config(&config).is_err());

        let mut config = baseline_config();
        config.output = config.input.clone();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn explicit_lm_command_wins_over_config() {
        let mut config = baseline_config();
        config.lm_command = Some("from-config".to_string());
        assert_eq!(
            resolve_lm_command(Some("from-flag"), &config).expect("resolve"),
            "from-flag"
        );
        assert_eq!(
            resolve_lm_command(None, &config).expect("resolve"),
            "from-config"
        );
    }
}
