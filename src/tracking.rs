//! Experiment tracking.
//!
//! Runs are logged through the narrow [`Tracker`] interface so commands can
//! be exercised without a live tracking server. [`MlflowTracker`] speaks the
//! MLflow REST API; [`NoopTracker`] only emits debug events.
//!
//! A run is always closed by [`with_run`]: `FINISHED` when the body succeeds
//! and `FAILED` when it returns an error, so the server never keeps a
//! half-logged run in the `RUNNING` state.
use crate::util::now_epoch_ms;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TRACKING_URI: &str = "http://localhost:5000";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const ARTIFACT_PROXY_SCHEME: &str = "mlflow-artifacts:/";

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// A sink for run parameters, metrics and artifacts.
pub trait Tracker {
    /// Select (creating if needed) the experiment and open a run in it.
    fn start_run(&mut self, experiment: &str, run_name: &str) -> Result<()>;
    fn log_param(&mut self, key: &str, value: &str) -> Result<()>;
    fn log_metric(&mut self, key: &str, value: f64) -> Result<()>;
    /// Attach a file to the open run.
    fn log_artifact(&mut self, path: &Path) -> Result<()>;
    fn end_run(&mut self, status: RunStatus) -> Result<()>;
}

/// Run `body` inside a tracking run, closing the run whatever the outcome.
pub fn with_run<T, F>(
    tracker: &mut dyn Tracker,
    experiment: &str,
    run_name: &str,
    body: F,
) -> Result<T>
where
    F: FnOnce(&mut dyn Tracker) -> Result<T>,
{
    tracker.start_run(experiment, run_name)?;
    match body(&mut *tracker) {
        Ok(value) => {
            tracker.end_run(RunStatus::Finished)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(close_err) = tracker.end_run(RunStatus::Failed) {
                tracing::warn!(error = %close_err, run_name, "failed to close run");
            }
            Err(err)
        }
    }
}

/// Build the tracker selected on the command line.
pub fn tracker_from_args(tracking_uri: Option<&str>, no_track: bool) -> Box<dyn Tracker> {
    if no_track {
        return Box::new(NoopTracker);
    }
    Box::new(MlflowTracker::new(&resolve_tracking_uri(tracking_uri)))
}

/// Resolve the server URL: explicit arg > MLFLOW_TRACKING_URI > default.
pub fn resolve_tracking_uri(explicit: Option<&str>) -> String {
    explicit
        .map(|s| s.to_string())
        .or_else(|| std::env::var("MLFLOW_TRACKING_URI").ok())
        .filter(|uri| !uri.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TRACKING_URI.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Tracker that drops everything.
#[derive(Debug, Default)]
pub struct NoopTracker;

impl Tracker for NoopTracker {
    fn start_run(&mut self, experiment: &str, run_name: &str) -> Result<()> {
        tracing::debug!(experiment, run_name, "tracking disabled: start run");
        Ok(())
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        tracing::debug!(key, value, "tracking disabled: param");
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        tracing::debug!(key, value, "tracking disabled: metric");
        Ok(())
    }

    fn log_artifact(&mut self, path: &Path) -> Result<()> {
        tracing::debug!(path = %path.display(), "tracking disabled: artifact");
        Ok(())
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        tracing::debug!(status = status.as_str(), "tracking disabled: end run");
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ActiveRun {
    run_id: String,
    artifact_uri: String,
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: ExperimentInfo,
}

#[derive(Debug, Deserialize)]
struct ExperimentInfo {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: RunPayload,
}

#[derive(Debug, Deserialize)]
struct RunPayload {
    info: RunInfo,
}

#[derive(Debug, Deserialize)]
struct RunInfo {
    run_id: String,
    #[serde(default)]
    artifact_uri: String,
}

/// Client for an MLflow tracking server.
pub struct MlflowTracker {
    base_url: String,
    agent: ureq::Agent,
    run: Option<ActiveRun>,
}

impl MlflowTracker {
    pub fn new(base_url: &str) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(HTTP_TIMEOUT))
            .build();
        MlflowTracker {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: config.into(),
            run: None,
        }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{endpoint}", self.base_url)
    }

    fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let url = self.api_url(endpoint);
        tracing::debug!(%url, "tracking request");
        let mut response = self
            .agent
            .post(&url)
            .send_json(body)
            .with_context(|| format!("POST {url}"))?;
        response
            .body_mut()
            .read_json::<Value>()
            .with_context(|| format!("decode response of {url}"))
    }

    fn active_run(&self) -> Result<&ActiveRun> {
        self.run
            .as_ref()
            .ok_or_else(|| anyhow!("no active tracking run"))
    }

    fn experiment_id(&self, name: &str) -> Result<String> {
        let url = self.api_url("experiments/get-by-name");
        match self
            .agent
            .get(&url)
            .query("experiment_name", name)
            .call()
        {
            Ok(mut response) => {
                let found: GetExperimentResponse = response
                    .body_mut()
                    .read_json()
                    .with_context(|| format!("decode response of {url}"))?;
                Ok(found.experiment.experiment_id)
            }
            Err(ureq::Error::StatusCode(404)) => {
                tracing::info!(experiment = name, "creating tracking experiment");
                let created: CreateExperimentResponse =
                    serde_json::from_value(self.post("experiments/create", &json!({ "name": name }))?)
                        .context("decode experiments/create response")?;
                Ok(created.experiment_id)
            }
            Err(err) => Err(err).with_context(|| format!("GET {url}")),
        }
    }
}

impl Tracker for MlflowTracker {
    fn start_run(&mut self, experiment: &str, run_name: &str) -> Result<()> {
        if self.run.is_some() {
            return Err(anyhow!("a tracking run is already active"));
        }
        let experiment_id = self.experiment_id(experiment)?;
        let body = json!({
            "experiment_id": experiment_id,
            "run_name": run_name,
            "start_time": now_epoch_ms()?,
            "tags": [{ "key": "mlflow.runName", "value": run_name }],
        });
        let created: CreateRunResponse = serde_json::from_value(self.post("runs/create", &body)?)
            .context("decode runs/create response")?;
        tracing::info!(run_id = %created.run.info.run_id, run_name, "tracking run started");
        self.run = Some(ActiveRun {
            run_id: created.run.info.run_id,
            artifact_uri: created.run.info.artifact_uri,
        });
        Ok(())
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        let run_id = self.active_run()?.run_id.clone();
        self.post(
            "runs/log-parameter",
            &json!({ "run_id": run_id, "key": key, "value": value }),
        )?;
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        let run_id = self.active_run()?.run_id.clone();
        self.post(
            "runs/log-metric",
            &json!({
                "run_id": run_id,
                "key": key,
                "value": value,
                "timestamp": now_epoch_ms()?,
                "step": 0,
            }),
        )?;
        Ok(())
    }

    fn log_artifact(&mut self, path: &Path) -> Result<()> {
        let run = self.active_run()?.clone();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("artifact path has no file name: {}", path.display()))?;
        match artifact_destination(&run.artifact_uri) {
            ArtifactDestination::Proxy(prefix) => {
                let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
                let url = format!(
                    "{}/api/2.0/mlflow-artifacts/artifacts/{prefix}/{file_name}",
                    self.base_url
                );
                self.agent
                    .put(&url)
                    .header("Content-Type", "application/octet-stream")
                    .send(&bytes[..])
                    .with_context(|| format!("PUT {url}"))?;
            }
            ArtifactDestination::Local(dir) => {
                fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
                let target = dir.join(file_name);
                fs::copy(path, &target).with_context(|| {
                    format!("copy {} to {}", path.display(), target.display())
                })?;
            }
        }
        tracing::debug!(path = %path.display(), "artifact logged");
        Ok(())
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        let Some(run) = self.run.take() else {
            return Ok(());
        };
        self.post(
            "runs/update",
            &json!({
                "run_id": run.run_id,
                "status": status.as_str(),
                "end_time": now_epoch_ms()?,
            }),
        )?;
        tracing::info!(run_id = %run.run_id, status = status.as_str(), "tracking run closed");
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ArtifactDestination {
    /// Path below the server's artifact proxy.
    Proxy(String),
    /// Directory on the local filesystem.
    Local(PathBuf),
}

fn artifact_destination(artifact_uri: &str) -> ArtifactDestination {
    if let Some(rest) = artifact_uri.strip_prefix(ARTIFACT_PROXY_SCHEME) {
        return ArtifactDestination::Proxy(rest.trim_matches('/').to_string());
    }
    let local = artifact_uri
        .strip_prefix("file://")
        .unwrap_or(artifact_uri);
    ArtifactDestination::Local(PathBuf::from(local))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};

    /// One call recorded by [`RecordingTracker`].
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Event {
        Start(String, String),
        Param(String, String),
        Metric(String, f64),
        Artifact(PathBuf),
        End(RunStatus),
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingTracker {
        pub(crate) events: Vec<Event>,
    }

    impl RecordingTracker {
        pub(crate) fn param(&self, key: &str) -> Option<&str> {
            self.events.iter().find_map(|event| match event {
                Event::Param(k, v) if k == key => Some(v.as_str()),
                _ => None,
            })
        }

        pub(crate) fn metric(&self, key: &str) -> Option<f64> {
            self.events.iter().find_map(|event| match event {
                Event::Metric(k, v) if k == key => Some(*v),
                _ => None,
            })
        }
    }

    impl Tracker for RecordingTracker {
        fn start_run(&mut self, experiment: &str, run_name: &str) -> Result<()> {
            self.events
                .push(Event::Start(experiment.to_string(), run_name.to_string()));
            Ok(())
        }

        fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
            self.events
                .push(Event::Param(key.to_string(), value.to_string()));
            Ok(())
        }

        fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
            self.events.push(Event::Metric(key.to_string(), value));
            Ok(())
        }

        fn log_artifact(&mut self, path: &Path) -> Result<()> {
            self.events.push(Event::Artifact(path.to_path_buf()));
            Ok(())
        }

        fn end_run(&mut self, status: RunStatus) -> Result<()> {
            self.events.push(Event::End(status));
            Ok(())
        }
    }

    #[test]
    fn with_run_finishes_on_success() {
        let mut tracker = RecordingTracker::default();
        let value = with_run(&mut tracker, "exp", "run", |run| {
            run.log_param("model_name", "gpt2")?;
            Ok(7)
        })
        .expect("run succeeds");
        assert_eq!(value, 7);
        assert_eq!(
            tracker.events,
            vec![
                Event::Start("exp".to_string(), "run".to_string()),
                Event::Param("model_name".to_string(), "gpt2".to_string()),
                Event::End(RunStatus::Finished),
            ]
        );
    }

    #[test]
    fn with_run_marks_failed_runs() {
        let mut tracker = RecordingTracker::default();
        let result: Result<()> = with_run(&mut tracker, "exp", "run", |run| {
            run.log_metric("stories_generated", 3.0)?;
            Err(anyhow!("artifact missing"))
        });
        assert!(result.is_err());
        assert_eq!(tracker.events.last(), Some(&Event::End(RunStatus::Failed)));
        assert_eq!(tracker.metric("stories_generated"), Some(3.0));
    }

    #[test]
    fn artifact_destination_follows_uri_scheme() {
        assert_eq!(
            artifact_destination("mlflow-artifacts:/1/abc/artifacts"),
            ArtifactDestination::Proxy("1/abc/artifacts".to_string())
        );
        assert_eq!(
            artifact_destination("file:///tmp/mlruns/1/abc/artifacts"),
            ArtifactDestination::Local(PathBuf::from("/tmp/mlruns/1/abc/artifacts"))
        );
        assert_eq!(
            artifact_destination("./mlruns/1/abc/artifacts"),
            ArtifactDestination::Local(PathBuf::from("./mlruns/1/abc/artifacts"))
        );
    }

    #[test]
    fn explicit_tracking_uri_wins_and_loses_trailing_slash() {
        assert_eq!(
            resolve_tracking_uri(Some("http://mlflow:5000/")),
            "http://mlflow:5000"
        );
    }

    /// One HTTP request seen by [`serve_mlflow`].
    #[derive(Debug)]
    struct Seen {
        method: String,
        path: String,
        body: Vec<u8>,
    }

    impl Seen {
        fn json(&self) -> Value {
            serde_json::from_slice(&self.body).expect("json request body")
        }
    }

    fn read_request(stream: &TcpStream) -> Seen {
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).expect("read request line");
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();

        let mut content_length = 0;
        let mut chunked = false;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("read header");
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').expect("header separator");
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().expect("length"),
                "transfer-encoding" => chunked = value.trim().eq_ignore_ascii_case("chunked"),
                _ => {}
            }
        }

        let mut body = Vec::new();
        if chunked {
            loop {
                let mut size = String::new();
                reader.read_line(&mut size).expect("read chunk size");
                let size = usize::from_str_radix(size.trim(), 16).expect("chunk size");
                let mut chunk = vec![0; size + 2];
                reader.read_exact(&mut chunk).expect("read chunk");
                if size == 0 {
                    break;
                }
                body.extend_from_slice(&chunk[..size]);
            }
        } else {
            body.resize(content_length, 0);
            reader.read_exact(&mut body).expect("read body");
        }
        Seen { method, path, body }
    }

    fn respond(mut stream: &TcpStream, status: &str, body: &str) {
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .expect("write response");
        stream.flush().expect("flush response");
    }

    /// Answer like an MLflow server with no experiments yet, one request per
    /// connection, until a request for `/stop` arrives.
    fn serve_mlflow(listener: TcpListener) -> Vec<Seen> {
        let mut seen = Vec::new();
        for stream in listener.incoming() {
            let stream = stream.expect("accept connection");
            let request = read_request(&stream);
            let route = request.path.split('?').next().unwrap_or_default().to_string();
            match route.as_str() {
                "/stop" => break,
                "/api/2.0/mlflow/experiments/get-by-name" => {
                    respond(&stream, "404 Not Found", r#"{"error_code":"RESOURCE_DOES_NOT_EXIST"}"#)
                }
                "/api/2.0/mlflow/experiments/create" => {
                    respond(&stream, "200 OK", r#"{"experiment_id":"7"}"#)
                }
                "/api/2.0/mlflow/runs/create" => respond(
                    &stream,
                    "200 OK",
                    r#"{"run":{"info":{"run_id":"r1","artifact_uri":"mlflow-artifacts:/7/r1/artifacts"}}}"#,
                ),
                _ => respond(&stream, "200 OK", "{}"),
            }
            seen.push(request);
        }
        seen
    }

    #[test]
    fn mlflow_tracker_speaks_the_rest_api() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let server = std::thread::spawn(move || serve_mlflow(listener));

        let dir = tempfile::tempdir().expect("create temp dir");
        let artifact = dir.path().join("results.csv");
        fs::write(&artifact, "prompt,ai_response\nFog.,X\n").expect("write artifact");

        let mut tracker = MlflowTracker::new(&format!("http://{addr}/"));
        let outcome = with_run(&mut tracker, "cyoa_model_experiments", "baseline", |run| {
            run.log_param("model_name", "gpt2")?;
            run.log_metric("avg_response_length", 2.5)?;
            run.log_artifact(&artifact)
        });

        let mut stop = TcpStream::connect(addr).expect("connect to stop server");
        stop.write_all(b"GET /stop HTTP/1.1\r\nHost: stub\r\n\r\n")
            .expect("send stop");
        let seen = server.join().expect("server thread");
        outcome.expect("tracked run succeeds");

        let calls: Vec<(&str, &str)> = seen
            .iter()
            .map(|req| (req.method.as_str(), req.path.split('?').next().unwrap_or_default()))
            .collect();
        assert_eq!(
            calls,
            vec![
                ("GET", "/api/2.0/mlflow/experiments/get-by-name"),
                ("POST", "/api/2.0/mlflow/experiments/create"),
                ("POST", "/api/2.0/mlflow/runs/create"),
                ("POST", "/api/2.0/mlflow/runs/log-parameter"),
                ("POST", "/api/2.0/mlflow/runs/log-metric"),
                ("PUT", "/api/2.0/mlflow-artifacts/artifacts/7/r1/artifacts/results.csv"),
                ("POST", "/api/2.0/mlflow/runs/update"),
            ]
        );
        assert!(seen[0].path.contains("experiment_name=cyoa_model_experiments"));
        assert_eq!(seen[1].json()["name"], "cyoa_model_experiments");

        let create = seen[2].json();
        assert_eq!(create["experiment_id"], "7");
        assert_eq!(create["run_name"], "baseline");
        assert_eq!(create["tags"][0]["key"], "mlflow.runName");
        assert_eq!(create["tags"][0]["value"], "baseline");

        let param = seen[3].json();
        assert_eq!(param["run_id"], "r1");
        assert_eq!(param["key"], "model_name");
        assert_eq!(param["value"], "gpt2");

        let metric = seen[4].json();
        assert_eq!(metric["run_id"], "r1");
        assert_eq!(metric["key"], "avg_response_length");
        assert_eq!(metric["value"], 2.5);
        assert_eq!(metric["step"], 0);
        assert!(metric["timestamp"].is_u64());

        assert_eq!(seen[5].body, b"prompt,ai_response\nFog.,X\n");

        let update = seen[6].json();
        assert_eq!(update["run_id"], "r1");
        assert_eq!(update["status"], "FINISHED");
        assert!(update["end_time"].is_u64());
    }

    #[test]
    fn mlflow_tracker_requires_an_active_run() {
        let mut tracker = MlflowTracker::new("http://127.0.0.1:9");
        assert!(tracker.log_param("k", "v").is_err());
        // closing without a run is a no-op
        tracker.end_run(RunStatus::Finished).expect("nothing to close");
    }
}
