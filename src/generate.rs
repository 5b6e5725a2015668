//! Story continuation generation.
//!
//! The model is an external text-generation command: it receives the prompt
//! (on stdin, or substituted into argv) and prints the generated text, which
//! echoes the prompt the way text-generation pipelines do. The echoed prefix
//! is stripped by length.
//!
//! Generation is strictly sequential: one blocking call per scenario, no
//! timeout and no retry. The first failure aborts the run.
use crate::dataset::{ResultRow, ScenarioRow};
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Literal prefix placed before every scenario prompt.
pub const PROMPT_PREFIX: &str = "Mystery Story: ";

/// Token id used for padding (GPT-2's end-of-text token).
pub const EOS_TOKEN_ID: u32 = 50256;

/// Sampling configuration shared by every row of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f64,
    /// Added to the prompt's word count to bound the output length.
    pub length_offset: usize,
    pub do_sample: bool,
    pub pad_token_id: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            temperature: 0.8,
            length_offset: 40,
            do_sample: true,
            pad_token_id: EOS_TOKEN_ID,
        }
    }
}

/// Parameters for a single generator call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_length: usize,
    pub temperature: f64,
    pub do_sample: bool,
    pub pad_token_id: u32,
    pub num_return_sequences: usize,
}

impl GenerationParams {
    pub fn for_prompt(prompt: &str, sampling: &SamplingConfig) -> Self {
        GenerationParams {
            max_length: prompt.split_whitespace().count() + sampling.length_offset,
            temperature: sampling.temperature,
            do_sample: sampling.do_sample,
            pad_token_id: sampling.pad_token_id,
            num_return_sequences: 1,
        }
    }
}

/// A pretrained text-generation model.
pub trait Generator {
    /// Return the model output for `prompt`, including the echoed prompt.
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Generator backed by a user-configured command.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    argv: Vec<String>,
}

impl CommandGenerator {
    /// Parse a command line with shell quoting rules.
    pub fn new(command: &str) -> Result<Self> {
        let argv = shell_words::split(command)
            .with_context(|| format!("parse generator command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("generator command is empty"));
        }
        Ok(CommandGenerator { argv })
    }

    fn render_argv(&self, prompt: &str, params: &GenerationParams) -> (Vec<String>, bool) {
        let mut prompt_in_argv = false;
        let argv = self
            .argv
            .iter()
            .map(|arg| {
                if arg.contains("{prompt}") {
                    prompt_in_argv = true;
                }
                arg.replace("{prompt}", prompt)
                    .replace("{max_length}", &params.max_length.to_string())
                    .replace("{temperature}", &params.temperature.to_string())
                    .replace("{do_sample}", &params.do_sample.to_string())
                    .replace("{pad_token_id}", &params.pad_token_id.to_string())
                    .replace(
                        "{num_return_sequences}",
                        &params.num_return_sequences.to_string(),
                    )
            })
            .collect();
        (argv, prompt_in_argv)
    }
}

impl Generator for CommandGenerator {
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let (argv, prompt_in_argv) = self.render_argv(prompt, params);
        let start = Instant::now();

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command.stdin(if prompt_in_argv {
            Stdio::null()
        } else {
            Stdio::piped()
        });
        let mut child = command
            .spawn()
            .with_context(|| format!("spawn generator command: {}", argv[0]))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .context("write prompt to generator stdin")?;
        }

        let output = child.wait_with_output().context("wait for generator command")?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::info!(
            elapsed_ms,
            max_length = params.max_length,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "generator invoke complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "generator command failed with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout).context("decode generator stdout as UTF-8")
    }
}

/// Join the fixed prefix, the scenario prompt and the human response.
pub fn build_prompt(row: &ScenarioRow) -> String {
    format!("{PROMPT_PREFIX}{} {}", row.prompt, row.response)
}

/// Drop as many leading characters as the prompt has, then trim.
pub fn extract_continuation(prompt: &str, output: &str) -> String {
    let skip = prompt.chars().count();
    let rest = match output.char_indices().nth(skip) {
        Some((offset, _)) => &output[offset..],
        None => "",
    };
    rest.trim().to_string()
}

/// Which dataset rows a run generates for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Row indices; indices past the end of the dataset are skipped.
    Indices(Vec<usize>),
}

impl Selection {
    fn resolve(&self, len: usize) -> Vec<usize> {
        match self {
            Selection::All => (0..len).collect(),
            Selection::Indices(indices) => indices.iter().copied().filter(|&idx| idx < len).collect(),
        }
    }
}

/// Generate one continuation per selected scenario.
///
/// Result rows carry a `scenario_id` only for explicit index selections.
pub fn run_inference(
    rows: &[ScenarioRow],
    selection: &Selection,
    sampling: &SamplingConfig,
    generator: &mut dyn Generator,
) -> Result<Vec<ResultRow>> {
    let targets = selection.resolve(rows.len());
    let tag_ids = matches!(selection, Selection::Indices(_));
    let mut results = Vec::with_capacity(targets.len());

    for idx in targets {
        let row = &rows[idx];
        let prompt = build_prompt(row);
        let params = GenerationParams::for_prompt(&prompt, sampling);
        let output = generator
            .generate(&prompt, &params)
            .with_context(|| format!("generate scenario {idx}"))?;
        let continuation = extract_continuation(&prompt, &output);

        match &row.story_arc {
            Some(arc) if tag_ids => println!(
                "Generated story {} - {} ({})",
                idx + 1,
                arc,
                row.atmosphere_level
            ),
            _ => println!(
                "Generated story {}/{} - {} atmosphere",
                idx + 1,
                rows.len(),
                row.atmosphere_level
            ),
        }

        results.push(ResultRow::from_scenario(
            tag_ids.then_some(idx),
            row,
            continuation,
        ));
    }
    Ok(results)
}
