//! End-to-end HTTP tests against the assembled router (§10.4): a
//! fake `sa-agent` stand-in (`echo`/`sh -c`) plays the subprocess so no
//! real device or model calls are required.

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use sa_domain::config::JobServiceConfig;
use sa_job_service::app::build_router;
use sa_job_service::jobs::{JobStore, UserActiveMap};
use sa_job_service::pool::DevicePool;
use sa_job_service::spawn::ProcessTable;
use sa_job_service::state::AppState;
use sa_job_service::worker::spawn_workers;
use tokio::sync::mpsc;
use tower::ServiceExt;

fn build_state(agent_binary: &str, devices: Vec<&str>) -> AppState {
    let (queue_tx, queue_rx) = mpsc::channel(16);
    let state = AppState {
        config: Arc::new(JobServiceConfig {
            stop_grace_period_secs: 1,
            ..JobServiceConfig::default()
        }),
        agent_binary: Arc::new(agent_binary.to_string()),
        agent_config_path: Arc::new(None),
        jobs: Arc::new(JobStore::new()),
        users: Arc::new(UserActiveMap::new()),
        devices: Arc::new(DevicePool::new(
            devices.into_iter().map(String::from).collect(),
            "adb",
        )),
        processes: Arc::new(ProcessTable::new()),
        queue_tx,
    };
    spawn_workers(state.clone(), queue_rx);
    state
}

/// `sa-agent` is invoked with a fixed flag shape (`--instruction ...
/// --device-id ... --run-dir ...`), so a fake stand-in must ignore its
/// arguments entirely rather than interpret `instruction` as a shell
/// command.
fn write_fake_agent(tmp: &tempfile::TempDir, body: &str) -> String {
    let path = tmp.path().join("fake-sa-agent.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().to_string()
}

async fn wait_for_terminal(state: &AppState, job_id: uuid::Uuid) -> sa_job_service::jobs::Job {
    for _ in 0..100 {
        if let Some(job) = state.jobs.get(job_id) {
            if job.state.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn run_then_status_reports_success_for_a_fast_agent() {
    let state = build_state("true", vec!["dev-1"]);
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/run")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"user":"alice","instruction":"open wifi settings"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let job_id: uuid::Uuid = json["result"]["job_id"].as_str().unwrap().parse().unwrap();

    let job = wait_for_terminal(&state, job_id).await;
    assert_eq!(job.state, sa_job_service::jobs::JobState::Success);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/status/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["result"]["state"], "success");
}

#[tokio::test]
async fn second_run_for_same_user_is_rejected_while_first_is_active() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = write_fake_agent(&tmp, "sleep 30");
    let state = build_state(&agent, vec!["dev-1"]);
    let app = build_router(state.clone());

    let first = Request::builder()
        .method("POST")
        .uri("/run")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"user":"bob","instruction":"first task"}"#))
        .unwrap();
    let response = app.clone().oneshot(first).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let first_job_id = json["result"]["job_id"].as_str().unwrap().to_string();

    let second = Request::builder()
        .method("POST")
        .uri("/run")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"user":"bob","instruction":"second task"}"#))
        .unwrap();
    let response = app.oneshot(second).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let message = json["message"].as_str().unwrap();
    assert!(
        message.contains(&first_job_id),
        "rejection message {message:?} must name the first request's job_id {first_job_id}"
    );
}

#[tokio::test]
async fn stop_marks_a_running_job_stopped() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = write_fake_agent(&tmp, "sleep 30");
    let state = build_state(&agent, vec!["dev-1"]);
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/run")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"user":"carol","instruction":"open wifi settings"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let job_id: uuid::Uuid = json["result"]["job_id"].as_str().unwrap().parse().unwrap();

    // Give the worker a moment to actually spawn the subprocess.
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/stop/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let job = wait_for_terminal(&state, job_id).await;
    assert_eq!(job.state, sa_job_service::jobs::JobState::Stopped);
}

#[tokio::test]
async fn download_rejects_path_traversal() {
    let state = build_state("true", vec!["dev-1"]);
    let app = build_router(state.clone());

    let job = sa_job_service::jobs::Job::new(
        "dave".into(),
        "x".into(),
        std::env::temp_dir(),
    );
    let job_id = job.id;
    state.jobs.insert(job);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/download/{job_id}/..%2f..%2fetc%2fpasswd"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
