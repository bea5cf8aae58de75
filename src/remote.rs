//! Remote execution through an external sandbox launcher.
//!
//! The launcher runs `storyline generate --emit-result` somewhere else and
//! relays its output. The last line prefixed with [`RESULT_MARKER`] carries the
//! structured result back.

use crate::config::RemoteSettings;
use crate::error::{Result, StorylineError};
use crate::orchestrator::PipelineOutcome;
use crate::story::{StoryPlan, WrittenStories};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Prefix of the line carrying the JSON result.
pub const RESULT_MARKER: &str = "__SPRITE_RESULT__";

const TAIL_LINES: usize = 50;
const ERROR_TAIL_LINES: usize = 20;

/// Structured result relayed by a remote worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResult {
    pub plan: StoryPlan,
    pub written: WrittenStories,
    #[serde(default)]
    pub run_dir: String,
    #[serde(default)]
    pub sprite_name: String,
    #[serde(default)]
    pub audio_bunny_url: String,
}

impl RemoteResult {
    pub fn from_outcome(outcome: &PipelineOutcome, sprite_name: impl Into<String>) -> Self {
        Self {
            plan: outcome.plan.clone(),
            written: outcome.written.clone(),
            run_dir: outcome.run_dir.display().to_string(),
            sprite_name: sprite_name.into(),
            audio_bunny_url: outcome
                .audio
                .as_ref()
                .map(|a| a.url.clone())
                .unwrap_or_default(),
        }
    }

    /// The single marker line a worker prints on success.
    pub fn to_marker_line(&self) -> Result<String> {
        Ok(format!("{}{}", RESULT_MARKER, serde_json::to_string(self)?))
    }

    pub fn from_marker_line(line: &str) -> Result<Self> {
        let payload = line.strip_prefix(RESULT_MARKER).ok_or_else(|| {
            StorylineError::Remote("line does not carry a result marker".to_string())
        })?;
        serde_json::from_str(payload)
            .map_err(|e| StorylineError::Remote(format!("Malformed remote result: {e}")))
    }
}

/// One remote run.
#[derive(Debug, Clone, Default)]
pub struct RemoteRequest {
    pub topic: String,
    pub model: String,
    pub provider: String,
    pub output_dir: String,
    pub with_audio: bool,
    pub gateway_api_key: String,
    pub cartesia_api_key: Option<String>,
    pub token: String,
    pub name: String,
    pub git_repo: String,
    pub git_ref: Option<String>,
    pub keep: bool,
}

impl RemoteRequest {
    fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(StorylineError::InvalidArgument("Enter a topic.".to_string()));
        }
        if self.token.trim().is_empty() {
            return Err(StorylineError::Configuration(
                "Missing sandbox token. Set SPRITES_TOKEN.".to_string(),
            ));
        }
        if self.git_repo.trim().is_empty() {
            return Err(StorylineError::Configuration(
                "Missing git repository for the remote run.".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(StorylineError::Configuration(
                "Missing sandbox name for the remote run.".to_string(),
            ));
        }
        Ok(())
    }

    /// Launcher arguments following the launcher command itself.
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--topic".to_string(),
            self.topic.trim().to_string(),
            "--model".to_string(),
            self.model.clone(),
            "--provider".to_string(),
            self.provider.clone(),
            "--output-dir".to_string(),
            self.output_dir.clone(),
            "--sprite-name".to_string(),
            self.name.trim().to_string(),
            "--git-repo".to_string(),
            self.git_repo.trim().to_string(),
        ];

        if let Some(git_ref) = self.git_ref.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            args.extend(["--git-ref".to_string(), git_ref.to_string()]);
        }
        if self.with_audio {
            args.extend(["--with-audio".to_string(), "true".to_string()]);
        }
        if self.keep {
            args.extend(["--keep-sprite".to_string(), "true".to_string()]);
        }
        args
    }
}

/// Spawns the launcher and collects its result.
pub struct RemoteRunner {
    launcher: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl RemoteRunner {
    pub fn new(settings: &RemoteSettings) -> Self {
        Self {
            launcher: settings.launcher.clone(),
            working_dir: settings
                .working_dir
                .as_deref()
                .map(|d| PathBuf::from(shellexpand::tilde(d).into_owned())),
        }
    }

    /// Run remotely, passing every non-empty output line to `on_line`.
    #[instrument(skip_all, fields(topic = %request.topic))]
    pub async fn run<F>(&self, request: &RemoteRequest, on_line: F) -> Result<RemoteResult>
    where
        F: Fn(&str) + Send + Sync,
    {
        request.validate()?;

        let (program, leading) = self.launcher.split_first().ok_or_else(|| {
            StorylineError::Configuration("Remote launcher command is empty".to_string())
        })?;

        let mut command = Command::new(program);
        command
            .args(leading)
            .args(request.args())
            .env("SPRITES_TOKEN", &request.token)
            .env("GATEWAY_API_KEY", &request.gateway_api_key)
            .env("PYDANTIC_AI_GATEWAY_API_KEY", &request.gateway_api_key)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if request.with_audio {
            if let Some(key) = request.cartesia_api_key.as_deref().filter(|k| !k.is_empty()) {
                command.env("CARTESIA_API_KEY", key);
            }
        }
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        info!("Launching remote run: {}", self.launcher.join(" "));
        let mut child = command.spawn().map_err(|e| {
            StorylineError::Remote(format!("Could not start launcher {}: {e}", program))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StorylineError::Remote("launcher stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StorylineError::Remote("launcher stderr unavailable".to_string()))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let (mut out_done, mut err_done) = (false, false);

        let mut marker: Option<String> = None;
        let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);

        let mut handle = |line: String| {
            if line.starts_with(RESULT_MARKER) {
                marker = Some(line);
                return;
            }
            if !line.is_empty() {
                on_line(&line);
            }
            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        };

        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => match line? {
                    Some(line) => handle(line),
                    None => out_done = true,
                },
                line = err_lines.next_line(), if !err_done => match line? {
                    Some(line) => handle(line),
                    None => err_done = true,
                },
            }
        }

        let status = child.wait().await?;
        debug!("Launcher exited with {}", status);

        if !status.success() {
            let skip = tail.len().saturating_sub(ERROR_TAIL_LINES);
            let recent: Vec<&str> = tail.iter().skip(skip).map(String::as_str).collect();
            return Err(StorylineError::Remote(format!(
                "Launcher exited with {}. Check that its dependencies are installed and the token and repository are valid.\n{}",
                status,
                recent.join("\n")
            )));
        }

        let marker = marker.ok_or_else(|| {
            StorylineError::Remote(
                "Remote run completed but no structured result was returned.".to_string(),
            )
        })?;

        RemoteResult::from_marker_line(&marker)
    }
}
