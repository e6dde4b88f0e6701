//! HTTP handlers (§4.10, §6 "responses uniformly shaped
//! `{code, message, result|detail}`").

use std::path::PathBuf;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::jobs::{Job, JobState};
use crate::state::AppState;

fn envelope(code: u16, message: &str, body: serde_json::Value) -> serde_json::Value {
    let key = if code < 300 { "result" } else { "detail" };
    let mut map = serde_json::Map::new();
    map.insert("code".to_string(), json!(code));
    map.insert("message".to_string(), json!(message));
    map.insert(key.to_string(), body);
    serde_json::Value::Object(map)
}

fn ok(body: serde_json::Value) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(envelope(200, "ok", body)))
}

fn error(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(envelope(status.as_u16(), message, json!(null))))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin auth guard (mirrors `AdminConfig::token_env` — §10.1)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn check_admin_token(
    headers: &HeaderMap,
    token_env: &str,
) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    let expected = match std::env::var(token_env) {
        Ok(t) if !t.is_empty() => t,
        _ => return Ok(()), // no token configured -> dev mode, allow all
    };

    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    // Constant-time comparison to avoid leaking token length/content via timing.
    if provided.len() != expected.len() {
        return Err(error(StatusCode::UNAUTHORIZED, "invalid admin token"));
    }
    let diff = provided
        .as_bytes()
        .iter()
        .zip(expected.as_bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    if diff != 0 {
        return Err(error(StatusCode::UNAUTHORIZED, "invalid admin token"));
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub user: String,
    /// Simple-task shorthand.
    #[serde(default)]
    pub instruction: Option<String>,
    /// Full scenario reference: an uploaded scenario token + scenario id.
    #[serde(default)]
    pub scenario_token: Option<String>,
    #[serde(default)]
    pub scenario_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunAccepted {
    job_id: Uuid,
}

pub async fn run(State(state): State<AppState>, Json(req): Json<RunRequest>) -> impl IntoResponse {
    let has_simple = req.instruction.as_deref().map(|s| !s.is_empty()).unwrap_or(false);
    let has_scenario = req.scenario_token.is_some() && req.scenario_id.is_some();
    if has_simple == has_scenario {
        return error(
            StatusCode::BAD_REQUEST,
            "exactly one of `instruction` or `scenario_token`+`scenario_id` is required",
        );
    }

    let instruction = req.instruction.clone().unwrap_or_else(|| {
        format!(
            "scenario:{}/{}",
            req.scenario_token.as_deref().unwrap_or(""),
            req.scenario_id.as_deref().unwrap_or("")
        )
    });

    let job = Job::new(req.user.clone(), instruction, PathBuf::new());
    let job_id = job.id;
    if let Err(existing) = state.users.try_acquire(&req.user, job_id) {
        return error(
            StatusCode::BAD_REQUEST,
            &format!("user already has an active job ({existing})"),
        );
    }

    let run_dir = PathBuf::from(&state.config.run_root).join(job_id.to_string());
    if let Err(e) = std::fs::create_dir_all(&run_dir) {
        state.users.release(&req.user);
        return error(StatusCode::INTERNAL_SERVER_ERROR, &format!("creating run dir: {e}"));
    }

    let job = Job { run_dir, ..job };
    state.jobs.insert(job);

    if state.queue_tx.send(job_id).await.is_err() {
        state.jobs.finalize(job_id, JobState::Failed, Some("queue closed".into()));
        return error(StatusCode::INTERNAL_SERVER_ERROR, "job queue is not accepting work");
    }

    ok(serde_json::to_value(RunAccepted { job_id }).unwrap_or(json!(null)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /stop/{job_id}
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn stop(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> impl IntoResponse {
    let Some(job) = state.jobs.get(job_id) else {
        return error(StatusCode::NOT_FOUND, "job not found");
    };
    if job.state.is_terminal() {
        return ok(json!({ "job_id": job_id, "state": job.state }));
    }

    state.processes.stop(job_id).await;
    state.jobs.mark_stopped(job_id);
    ok(json!({ "job_id": job_id, "state": "stopped" }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /status/{job_id}
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn status(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> impl IntoResponse {
    let Some(job) = state.jobs.get(job_id) else {
        return error(StatusCode::NOT_FOUND, "job not found");
    };
    let artifacts = job.artifacts();
    ok(json!({
        "job_id": job.id,
        "user": job.user,
        "state": job.state,
        "device_id": job.device_id,
        "created_at": job.created_at,
        "finished_at": job.finished_at,
        "error": job.error,
        "artifacts": artifacts,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /download/{job_id}/{file}
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn download(
    State(state): State<AppState>,
    Path((job_id, file)): Path<(Uuid, String)>,
) -> impl IntoResponse {
    let Some(job) = state.jobs.get(job_id) else {
        return error(StatusCode::NOT_FOUND, "job not found").into_response();
    };

    // Path-containment check: reject any component that could escape
    // the run directory (`..`, absolute paths, embedded separators).
    if file.contains("..") || file.contains('/') || file.contains('\\') || file.is_empty() {
        return error(StatusCode::BAD_REQUEST, "invalid file name").into_response();
    }

    let path = job.run_dir.join(&file);
    let Ok(canonical_run_dir) = job.run_dir.canonicalize() else {
        return error(StatusCode::NOT_FOUND, "run directory missing").into_response();
    };
    let Ok(canonical_path) = path.canonicalize() else {
        return error(StatusCode::NOT_FOUND, "file not found").into_response();
    };
    if !canonical_path.starts_with(&canonical_run_dir) {
        return error(StatusCode::BAD_REQUEST, "path escapes run directory").into_response();
    }

    match tokio::fs::read(&canonical_path).await {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(_) => error(StatusCode::NOT_FOUND, "file not found").into_response(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /upload — `.json` scenario or `.apk`, tokenized by UUID
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if let Err(e) = check_admin_token(&headers, &state.config.admin_token_env) {
        return e.into_response();
    }

    let field = match multipart.next_field().await {
        Ok(Some(f)) => f,
        Ok(None) => return error(StatusCode::BAD_REQUEST, "missing upload field").into_response(),
        Err(e) => return error(StatusCode::BAD_REQUEST, &format!("multipart error: {e}")).into_response(),
    };

    let original_name = field.file_name().unwrap_or("upload").to_string();
    let ext = original_name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    if ext != "json" && ext != "apk" {
        return error(StatusCode::BAD_REQUEST, "only .json and .apk uploads are accepted").into_response();
    }

    let bytes = match field.bytes().await {
        Ok(b) => b,
        Err(e) => return error(StatusCode::BAD_REQUEST, &format!("reading upload body: {e}")).into_response(),
    };
    if bytes.len() as u64 > state.config.upload_max_bytes {
        return error(StatusCode::PAYLOAD_TOO_LARGE, "upload exceeds configured max size").into_response();
    }

    let token = Uuid::new_v4();
    let uploads_dir = PathBuf::from(&state.config.run_root).join("uploads");
    if let Err(e) = tokio::fs::create_dir_all(&uploads_dir).await {
        return error(StatusCode::INTERNAL_SERVER_ERROR, &format!("creating uploads dir: {e}")).into_response();
    }
    let dest = uploads_dir.join(format!("{token}.{ext}"));
    if let Err(e) = tokio::fs::write(&dest, &bytes).await {
        return error(StatusCode::INTERNAL_SERVER_ERROR, &format!("writing upload: {e}")).into_response();
    }

    ok(json!({ "token": token, "kind": ext })).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /config — persist/mask model credentials (§4.10)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SetConfigRequest {
    pub provider_id: String,
    pub base_url: Option<String>,
    /// Accepted but never persisted: credentials are resolved from the
    /// env var named in `ProviderConfig::auth.env`, not stored on disk.
    #[serde(default)]
    pub api_key: Option<String>,
}

pub async fn set_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SetConfigRequest>,
) -> impl IntoResponse {
    if let Err(e) = check_admin_token(&headers, &state.config.admin_token_env) {
        return e.into_response();
    }
    let Some(config_path) = state.agent_config_path.as_ref() else {
        return error(StatusCode::BAD_REQUEST, "no config file configured for this job service").into_response();
    };

    let raw = tokio::fs::read_to_string(config_path).await.unwrap_or_default();
    let mut doc: sa_domain::config::Config = if raw.trim().is_empty() {
        sa_domain::config::Config::default()
    } else {
        match toml::from_str(&raw) {
            Ok(c) => c,
            Err(e) => return error(StatusCode::INTERNAL_SERVER_ERROR, &format!("existing config is invalid: {e}")).into_response(),
        }
    };

    let mut found = false;
    for provider in &mut doc.llm.providers {
        if provider.id == req.provider_id {
            if let Some(base_url) = &req.base_url {
                provider.base_url = base_url.clone();
            }
            found = true;
        }
    }
    if !found {
        return error(StatusCode::NOT_FOUND, "provider_id not found in config").into_response();
    }

    let serialized = match toml::to_string_pretty(&doc) {
        Ok(s) => s,
        Err(e) => return error(StatusCode::INTERNAL_SERVER_ERROR, &format!("serializing config: {e}")).into_response(),
    };
    if let Err(e) = tokio::fs::write(config_path, serialized).await {
        return error(StatusCode::INTERNAL_SERVER_ERROR, &format!("writing config: {e}")).into_response();
    }

    // The response never echoes back api_key / secrets, even though the
    // request carried one — only confirmation that it was accepted.
    ok(json!({ "provider_id": req.provider_id, "updated": true })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_picks_result_key_for_2xx_and_detail_otherwise() {
        let ok_env = envelope(200, "ok", json!({"a": 1}));
        assert!(ok_env.get("result").is_some());
        assert!(ok_env.get("detail").is_none());

        let err_env = envelope(404, "missing", json!(null));
        assert!(err_env.get("detail").is_some());
        assert!(err_env.get("result").is_none());
    }

    #[test]
    fn admin_token_guard_allows_dev_mode_when_env_unset() {
        let headers = HeaderMap::new();
        let result = check_admin_token(&headers, "SA_JOB_SERVICE_TEST_TOKEN_UNSET");
        assert!(result.is_ok());
    }

    #[test]
    fn admin_token_guard_rejects_wrong_token_when_env_set() {
        std::env::set_var("SA_JOB_SERVICE_TEST_TOKEN_SET", "secret123");
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer wrong".parse().unwrap());
        let result = check_admin_token(&headers, "SA_JOB_SERVICE_TEST_TOKEN_SET");
        std::env::remove_var("SA_JOB_SERVICE_TEST_TOKEN_SET");
        assert!(result.is_err());
    }
}
