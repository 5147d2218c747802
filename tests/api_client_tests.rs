// Integration tests for the HTTP task client
//
// Runs an in-process axum server on an ephemeral port as the backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use voice_task_capture::api::{HttpTaskApi, TaskApi, UploadError, AUDIO_FIELD, UPLOAD_FILENAME};
use voice_task_capture::audio::{encode_wav, AudioBlob, DecodedAudio};

#[derive(Debug, Clone)]
struct ReceivedPart {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct Received {
    parts: Mutex<Vec<ReceivedPart>>,
}

type Shared = Arc<Received>;

async fn collect_parts(state: &Received, mut multipart: Multipart) {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.unwrap().to_vec();
        state.parts.lock().unwrap().push(ReceivedPart {
            name,
            file_name,
            content_type,
            bytes,
        });
    }
}

async fn process_voice(State(state): State<Shared>, multipart: Multipart) -> Json<Value> {
    collect_parts(&state, multipart).await;
    Json(json!({
        "transcription": "schedule the safety inspection for friday",
        "task": {
            "title": "Safety inspection",
            "deadline": "Friday",
            "category": "Inspection"
        }
    }))
}

async fn save_audio(State(state): State<Shared>, multipart: Multipart) -> Json<Value> {
    collect_parts(&state, multipart).await;
    Json(json!({
        "success": true,
        "transcription": "replace the lobby light bulbs",
        "task": { "title": "Replace bulbs", "assignee": "Dana" }
    }))
}

async fn categories() -> Json<Value> {
    Json(json!([
        { "id": 1, "title": "Maintenance", "image": "/img/maintenance.png", "tasks": [
            { "title": "Fix HVAC" }, { "title": "Replace bulbs" }
        ]},
        { "id": "inspection", "title": "Inspection", "tasks": [] }
    ]))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "task-board" }))
}

async fn spawn_backend() -> Result<(String, Shared)> {
    let state = Shared::default();

    let app = Router::new()
        .route("/process-voice", post(process_voice))
        .route("/save-audio", post(save_audio))
        .route("/categories", get(categories))
        .route("/health", get(health))
        .route(
            "/broken/process-voice",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "transcription service down") }),
        )
        .route("/garbled/health", get(|| async { "<html>not json</html>" }))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((format!("http://{}", addr), state))
}

fn client(base_url: &str) -> Result<HttpTaskApi> {
    Ok(HttpTaskApi::new(base_url, Duration::from_secs(5))?)
}

fn wav_recording() -> Result<AudioBlob> {
    let audio = DecodedAudio::new(16000, vec![vec![0.1; 160]])?;
    Ok(encode_wav(&audio))
}

#[tokio::test]
async fn test_process_voice_upload() -> Result<()> {
    let (base_url, received) = spawn_backend().await?;
    let api = client(&base_url)?;
    let recording = wav_recording()?;

    let response = api.process_voice(&recording).await?;

    assert_eq!(response.transcription, "schedule the safety inspection for friday");
    let task = response.task.expect("task in response");
    assert_eq!(task.title.as_deref(), Some("Safety inspection"));
    assert_eq!(task.deadline.as_deref(), Some("Friday"));
    assert!(task.assignee.is_none());

    let parts = received.parts.lock().unwrap();
    assert_eq!(parts.len(), 1, "exactly one form part");
    let part = &parts[0];
    assert_eq!(part.name.as_deref(), Some(AUDIO_FIELD));
    assert_eq!(part.file_name.as_deref(), Some(UPLOAD_FILENAME));
    assert_eq!(part.content_type.as_deref(), Some("audio/wav"));
    assert_eq!(part.bytes, recording.bytes());

    Ok(())
}

#[tokio::test]
async fn test_fallback_container_keeps_its_type() -> Result<()> {
    let (base_url, received) = spawn_backend().await?;
    let api = client(&base_url)?;
    let recording = AudioBlob::new(b"opus clusters".to_vec(), "audio/webm;codecs=opus");

    api.process_voice(&recording).await?;

    let parts = received.parts.lock().unwrap();
    assert_eq!(parts[0].file_name.as_deref(), Some("recording.wav"));
    assert_eq!(
        parts[0].content_type.as_deref(),
        Some("audio/webm;codecs=opus")
    );
    assert_eq!(parts[0].bytes, b"opus clusters");

    Ok(())
}

#[tokio::test]
async fn test_save_audio_upload() -> Result<()> {
    let (base_url, received) = spawn_backend().await?;
    // trailing slash is tolerated
    let api = client(&format!("{}/", base_url))?;

    let response = api.save_audio(&wav_recording()?).await?;

    assert!(response.success);
    assert_eq!(response.transcription, "replace the lobby light bulbs");
    assert!(response.error.is_none());
    assert!(response.summary().contains("Assignee: Dana"));
    assert_eq!(received.parts.lock().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_server_error_status() -> Result<()> {
    let (base_url, _) = spawn_backend().await?;
    let api = client(&format!("{}/broken", base_url))?;

    let err = api.process_voice(&wav_recording()?).await.unwrap_err();

    match err {
        UploadError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "transcription service down");
        }
        other => panic!("expected status error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_invalid_json_response() -> Result<()> {
    let (base_url, _) = spawn_backend().await?;
    let api = client(&format!("{}/garbled", base_url))?;

    let err = api.health().await.unwrap_err();

    assert!(matches!(err, UploadError::InvalidResponse(_)), "{:?}", err);

    Ok(())
}

#[tokio::test]
async fn test_unreachable_backend() -> Result<()> {
    // bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let api = client(&format!("http://{}", addr))?;
    let err = api.process_voice(&wav_recording()?).await.unwrap_err();

    assert!(matches!(err, UploadError::Network(_)), "{:?}", err);

    Ok(())
}

#[tokio::test]
async fn test_categories() -> Result<()> {
    let (base_url, _) = spawn_backend().await?;
    let api = client(&base_url)?;

    let categories = api.categories().await?;

    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].id, "1");
    assert_eq!(categories[0].title, "Maintenance");
    assert_eq!(categories[0].image.as_deref(), Some("/img/maintenance.png"));
    assert_eq!(categories[0].tasks.len(), 2);
    assert_eq!(categories[1].id, "inspection");
    assert!(categories[1].tasks.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let (base_url, _) = spawn_backend().await?;
    let api = client(&base_url)?;

    let status = api.health().await?;

    assert_eq!(status.status, "healthy");
    assert_eq!(status.service.as_deref(), Some("task-board"));

    Ok(())
}
