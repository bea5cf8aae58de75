//! Web form for running the pipeline from a browser.
//!
//! Serves a single-page form, runs the pipeline locally or through the remote
//! launcher, and exposes the artifacts of finished runs.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{PipelineConfig, RunOverrides, Settings};
use crate::error::StorylineError;
use crate::orchestrator::{Orchestrator, Progress};
use crate::persist::ARTIFACT_FILES;
use crate::remote::{RemoteRequest, RemoteRunner};
use crate::story::{StoryPlan, WrittenStories};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

const FORM_HTML: &str = include_str!("form.html");

/// Shared application state.
struct AppState {
    settings: Settings,
}

/// Run the web form server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let state = Arc::new(AppState { settings });
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Storyline Web Form");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Form", "GET  /");
    Output::kv("Run", "POST /api/run");
    Output::kv("Artifacts", "GET  /runs/{run}/{file}");
    Output::kv("Health", "GET  /health");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(form))
        .route("/health", get(health))
        .route("/api/run", post(run))
        .route("/runs/{run}/{file}", get(artifact))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunRequest {
    topic: String,
    gateway_api_key: Option<String>,
    cartesia_api_key: Option<String>,
    model: Option<String>,
    provider: Option<String>,
    output_dir: Option<String>,
    with_audio: bool,
    remote: bool,
    remote_token: Option<String>,
    remote_name: Option<String>,
    remote_git_repo: Option<String>,
    remote_git_ref: Option<String>,
    keep_remote: Option<bool>,
}

impl RunRequest {
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            model: self.model.clone(),
            provider: self.provider.clone(),
            api_key: self.gateway_api_key.clone(),
            cartesia_api_key: self.cartesia_api_key.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct RunResponse {
    success: bool,
    log: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<StoryPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    written: Option<WrittenStories>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_dir: Option<String>,
    /// Run folder name, set only for local runs whose artifacts this server can serve.
    #[serde(skip_serializing_if = "Option::is_none")]
    run_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Client-side mistakes are 400s; everything upstream is a 500.
fn status_for(err: &StorylineError) -> StatusCode {
    match err {
        StorylineError::InvalidArgument(_) | StorylineError::Configuration(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: StorylineError, log: Vec<String>) -> Response {
    (
        status_for(&err),
        Json(RunResponse {
            success: false,
            log,
            error: Some(err.to_string()),
            ..Default::default()
        }),
    )
        .into_response()
}

/// Only a bare directory name is accepted as a run id.
fn is_safe_run_name(run: &str) -> bool {
    !run.is_empty() && run != "." && run != ".." && !run.contains(['/', '\\'])
}

fn content_type_for(file: &str) -> &'static str {
    if file.ends_with(".json") {
        "application/json"
    } else if file.ends_with(".wav") {
        "audio/wav"
    } else {
        "text/plain; charset=utf-8"
    }
}

// === Handlers ===

async fn form() -> Html<&'static str> {
    Html(FORM_HTML)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn run(State(state): State<Arc<AppState>>, Json(req): Json<RunRequest>) -> Response {
    if req.topic.trim().is_empty() {
        return failure(StorylineError::InvalidArgument("Enter a topic.".to_string()), Vec::new());
    }

    let settings = req.overrides().apply(state.settings.clone());

    if req.remote {
        run_remote(&req, &settings).await
    } else {
        run_local(&req, &settings, &state.settings.output_dir()).await
    }
}

/// Name of a run folder the artifact route can reach, i.e. one directly under `served_root`.
fn servable_run_name(run_dir: &std::path::Path, served_root: &std::path::Path) -> Option<String> {
    if run_dir.parent()? != served_root {
        return None;
    }
    run_dir.file_name().map(|n| n.to_string_lossy().into_owned())
}

async fn run_local(req: &RunRequest, settings: &Settings, served_root: &std::path::Path) -> Response {
    let operation = if req.with_audio {
        Operation::GenerateWithAudio
    } else {
        Operation::Generate
    };
    if let Err(e) = preflight::check(settings, operation).await {
        return failure(e, Vec::new());
    }

    let orchestrator = match PipelineConfig::from_settings(settings, req.with_audio)
        .and_then(Orchestrator::new)
    {
        Ok(orchestrator) => orchestrator,
        Err(e) => return failure(e, Vec::new()),
    };

    let log = Mutex::new(Vec::new());
    let on_progress = |p: &Progress| {
        if let Ok(mut log) = log.lock() {
            log.push(format!("Step {}/{}: {}", p.step, p.total, p.label));
        }
    };

    let result = orchestrator.run(&req.topic, &on_progress).await;
    let log = log.into_inner().unwrap_or_default();

    match result {
        Ok(outcome) => {
            let run_name = servable_run_name(&outcome.run_dir, served_root);
            Json(RunResponse {
                success: true,
                log,
                plan: Some(outcome.plan),
                written: Some(outcome.written),
                run_dir: Some(outcome.run_dir.display().to_string()),
                run_name,
                audio_url: outcome.audio.map(|a| a.url),
                ..Default::default()
            })
            .into_response()
        }
        Err(e) => failure(e, log),
    }
}

async fn run_remote(req: &RunRequest, settings: &Settings) -> Response {
    if let Err(e) = preflight::check(settings, Operation::Remote).await {
        return failure(e, Vec::new());
    }

    let Some(gateway_api_key) = settings.llm.api_key.clone() else {
        return failure(
            StorylineError::Configuration(
                "Missing API key. Set GATEWAY_API_KEY or pass it in the form.".to_string(),
            ),
            Vec::new(),
        );
    };
    if req.with_audio && settings.speech.api_key.is_none() {
        return failure(
            StorylineError::Configuration(
                "Audio requested, but CARTESIA_API_KEY is missing.".to_string(),
            ),
            Vec::new(),
        );
    }

    let pick = |value: &Option<String>, fallback: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };

    let remote = &settings.remote;
    let request = RemoteRequest {
        topic: req.topic.trim().to_string(),
        model: settings.llm.model.clone(),
        provider: settings.llm.provider.clone(),
        output_dir: settings.general.output_dir.clone(),
        with_audio: req.with_audio,
        gateway_api_key,
        cartesia_api_key: settings.speech.api_key.clone(),
        token: pick(&req.remote_token, remote.token.as_deref().unwrap_or_default()),
        name: pick(&req.remote_name, &remote.name),
        git_repo: pick(&req.remote_git_repo, &remote.git_repo),
        git_ref: Some(pick(&req.remote_git_ref, remote.git_ref.as_deref().unwrap_or_default()))
            .filter(|r| !r.is_empty()),
        keep: req.keep_remote.unwrap_or(remote.keep),
    };

    let log = Mutex::new(vec!["Step 1/1: Running remotely".to_string()]);
    let on_line = |line: &str| {
        if let Ok(mut log) = log.lock() {
            log.push(line.to_string());
        }
    };

    let result = RemoteRunner::new(remote).run(&request, on_line).await;
    let log = log.into_inner().unwrap_or_default();

    match result {
        Ok(result) => Json(RunResponse {
            success: true,
            log,
            plan: Some(result.plan),
            written: Some(result.written),
            run_dir: Some(result.run_dir),
            audio_url: Some(result.audio_bunny_url).filter(|u| !u.is_empty()),
            remote_name: Some(result.sprite_name).filter(|n| !n.is_empty()),
            ..Default::default()
        })
        .into_response(),
        Err(e) => failure(e, log),
    }
}

async fn artifact(
    State(state): State<Arc<AppState>>,
    Path((run, file)): Path<(String, String)>,
) -> Response {
    let not_found = |what: String| {
        (StatusCode::NOT_FOUND, Json(ErrorResponse { error: what })).into_response()
    };

    if !is_safe_run_name(&run) || !ARTIFACT_FILES.contains(&file.as_str()) {
        return not_found(format!("Unknown artifact: {}/{}", run, file));
    }

    let path = state.settings.output_dir().join(&run).join(&file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type_for(&file))], bytes).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            not_found(format!("Artifact not found: {}/{}", run, file))
        }
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: e.to_string() }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{PLAN_FILE, WRITTEN_TEXT_FILE};

    fn state_with_output(dir: &std::path::Path) -> Arc<AppState> {
        let mut settings = Settings::default();
        settings.general.output_dir = dir.display().to_string();
        Arc::new(AppState { settings })
    }

    #[test]
    fn test_run_name_rejects_traversal() {
        assert!(is_safe_run_name("coral-reef-bleaching_20250101T000000Z"));
        assert!(!is_safe_run_name(".."));
        assert!(!is_safe_run_name("a/b"));
        assert!(!is_safe_run_name(""));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&StorylineError::Configuration("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&StorylineError::UpstreamUpload("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(PLAN_FILE), "application/json");
        assert_eq!(content_type_for("written_stories_audio.wav"), "audio/wav");
        assert_eq!(content_type_for(WRITTEN_TEXT_FILE), "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn test_artifact_serves_known_files_only() {
        let root = tempfile::tempdir().unwrap();
        let run_dir = root.path().join("tides_20250101T000000Z");
        std::fs::create_dir(&run_dir).unwrap();
        std::fs::write(run_dir.join(WRITTEN_TEXT_FILE), "Topic: tides").unwrap();
        std::fs::write(run_dir.join("notes.txt"), "private").unwrap();
        let state = state_with_output(root.path());

        let ok = artifact(
            State(state.clone()),
            Path(("tides_20250101T000000Z".to_string(), WRITTEN_TEXT_FILE.to_string())),
        )
        .await;
        assert_eq!(ok.status(), StatusCode::OK);

        let unknown = artifact(
            State(state.clone()),
            Path(("tides_20250101T000000Z".to_string(), "notes.txt".to_string())),
        )
        .await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let missing = artifact(
            State(state),
            Path(("tides_20250101T000000Z".to_string(), PLAN_FILE.to_string())),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_rejects_blank_topic() {
        let root = tempfile::tempdir().unwrap();
        let response = run(
            State(state_with_output(root.path())),
            Json(RunRequest {
                topic: "   ".to_string(),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_local_run_without_key_is_bad_request() {
        let root = tempfile::tempdir().unwrap();
        let response = run(
            State(state_with_output(root.path())),
            Json(RunRequest {
                topic: "tides".to_string(),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    fn completion(content: &str) -> String {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000u32,
            "model": "gpt-test",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
        .to_string()
    }

    async fn mock_gateway(server: &mut mockito::ServerGuard) {
        let plan = crate::story::fixtures::plan("any");
        let written = crate::story::fixtures::written(&plan);

        server
            .mock("POST", "/openai/chat/completions")
            .match_body(mockito::Matcher::Regex(r#""name":"story_plan""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion(&serde_json::to_string(&plan).unwrap()))
            .create_async()
            .await;
        server
            .mock("POST", "/openai/chat/completions")
            .match_body(mockito::Matcher::Regex(r#""name":"written_stories""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion(&serde_json::to_string(&written).unwrap()))
            .create_async()
            .await;
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_servable_run_name_requires_served_root() {
        let root = std::path::Path::new("/srv/output");
        assert_eq!(
            servable_run_name(&root.join("tides_20250101T000000Z"), root).as_deref(),
            Some("tides_20250101T000000Z")
        );
        assert!(servable_run_name(std::path::Path::new("/tmp/other/tides_x"), root).is_none());
    }

    #[tokio::test]
    async fn test_run_links_only_artifacts_the_server_can_serve() {
        let mut server = mockito::Server::new_async().await;
        mock_gateway(&mut server).await;

        let served = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.output_dir = served.path().display().to_string();
        settings.general.temp_dir = served.path().join("tmp").display().to_string();
        settings.llm.gateway_url = server.url();
        let state = Arc::new(AppState { settings });

        let response = run(
            State(state.clone()),
            Json(RunRequest {
                topic: "tides".to_string(),
                gateway_api_key: Some("paig_test".to_string()),
                output_dir: Some(elsewhere.path().display().to_string()),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert!(body.get("run_name").is_none());
        assert_eq!(std::fs::read_dir(elsewhere.path()).unwrap().count(), 1);

        let response = run(
            State(state.clone()),
            Json(RunRequest {
                topic: "coral reef bleaching".to_string(),
                gateway_api_key: Some("paig_test".to_string()),
                ..Default::default()
            }),
        )
        .await;
        let body = json_body(response).await;
        let run_name = body["run_name"].as_str().unwrap().to_string();
        assert!(run_name.starts_with("coral-reef-bleaching_"));

        let served_file = artifact(State(state), Path((run_name, WRITTEN_TEXT_FILE.to_string()))).await;
        assert_eq!(served_file.status(), StatusCode::OK);
    }
}
