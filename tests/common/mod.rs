//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

pub const SCENARIO_HEADER: &str =
    "prompt,response,branch_type,atmosphere_level,dialogue_style,choice_a,choice_b";

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// Command line for the mock generator script.
pub fn mock_generator_command() -> String {
    let script = manifest_dir().join("tests/mock-generator.sh").display().to_string();
    shell_words::join(["sh", script.as_str()])
}

/// `cyoa` with logging silenced and tracking env cleared, run in `dir`.
pub fn cyoa(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_cyoa"));
    command
        .current_dir(dir)
        .env_remove("CYOA_LM_COMMAND")
        .env_remove("MLFLOW_TRACKING_URI")
        .env("CYOA_LOG", "off");
    command
}

/// Run `command`, feeding `stdin` and collecting output.
pub fn run_with_stdin(mut command: Command, stdin: &str) -> Output {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn cyoa");
    child
        .stdin
        .take()
        .expect("piped stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait for cyoa")
}

/// Write a small baseline-shaped scenario CSV with `rows` rows.
pub fn write_scenarios(path: &Path, rows: usize) {
    let levels = ["twin_peaks", "twin_peaks", "stranger_things"];
    let mut text = format!("{SCENARIO_HEADER}\n");
    for idx in 0..rows {
        text.push_str(&format!(
            "\"Scene {idx}, at the diner.\",You order coffee.,diner_investigation,{},warm_informative,Ask Lucy,Leave\n",
            levels[idx % levels.len()]
        ));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create scenario dir");
    }
    fs::write(path, text).expect("write scenarios");
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "cyoa failed ({}):\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}
