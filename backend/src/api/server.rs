//! HTTP server for blob ingestion.
//!
//! # API Endpoints
//!
//! | Method | Path                 | Description                              |
//! |--------|----------------------|------------------------------------------|
//! | GET    | `/health`            | Health check                             |
//! | POST   | `/api/blobs`         | Upload a results CSV (multipart `file`)  |
//! | GET    | `/api/results`       | List stored records                      |
//! | GET    | `/api/results/{id}`  | One stored record with its statistics    |
//! | GET    | `/api/logs`          | SSE stream of pipeline logs              |
//!
//! The multipart part's file name is the blob identifier
//! (`<results_type>_<location>_<sequence>.csv`).

use axum::{
    extract::{Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, sse::KeepAlive, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{error_response, status_for, ProcessResponse, RecordResponse};
use crate::config::AppConfig;
use crate::error::{PersistenceError, ServerError};
use crate::processor::BlobProcessor;
use crate::storage::FileResultsRepository;

/// Log entries replayed to a new SSE subscriber.
const LOG_BACKLOG: usize = 50;

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
struct AppState {
    config: AppConfig,
    processor: BlobProcessor,
    repository: FileResultsRepository,
}

/// Build the router with all routes and CORS.
pub fn router(config: AppConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let state = AppState {
        processor: config.blob_processor(),
        repository: config.repository(),
        config,
    };

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/blobs", post(upload_blob))
        .route("/api/results", get(list_results))
        .route("/api/results/{id}", get(get_result))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> Result<(), ServerError> {
    let port = config.port;
    let data_dir = config.data_dir.display().to_string();
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("Election results server running on http://localhost:{}", port);
    println!("   POST /api/blobs        - Upload results CSV");
    println!("   GET  /api/results      - Stored records");
    println!("   GET  /api/logs         - SSE log stream");
    println!("   GET  /health           - Health check");
    println!("   Records in {}", data_dir);
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "election-results",
        "version": env!("CARGO_PKG_VERSION"),
        "failurePolicy": state.config.failure_policy.name(),
        "parserEvaluation": state.config.parser_evaluation.name(),
        "endpoints": {
            "upload": "POST /api/blobs",
            "results": "GET /api/results",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint: recent backlog first, then live entries.
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before reading the backlog so nothing falls in between.
    let rx = LOG_BROADCASTER.subscribe();
    let backlog = tokio_stream::iter(LOG_BROADCASTER.recent(LOG_BACKLOG));
    let live = BroadcastStream::new(rx).filter_map(|result| result.ok());

    let stream = backlog.chain(live).filter_map(|entry| {
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn upload_blob(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, Json(error_response(&format!("Multipart error: {}", e))))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            (StatusCode::BAD_REQUEST, Json(error_response(&format!("Read error: {}", e))))
        })?;
        upload = Some((file_name, bytes.to_vec()));
    }

    let (file_name, bytes) = upload.ok_or_else(|| {
        (StatusCode::BAD_REQUEST, Json(error_response("No file provided")))
    })?;
    if file_name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(error_response("The file part needs a file name")),
        ));
    }

    log_info(format!("Upload '{}' ({} bytes)", file_name, bytes.len()));

    let ctx = state.config.process_context();
    let record = state
        .processor
        .process_stream_with(&bytes[..], &file_name, &ctx)
        .await
        .map_err(|e| (status_for(&e), Json(error_response(&e.to_string()))))?;

    Ok(Json(ProcessResponse::from(record)))
}

async fn list_results(State(state): State<AppState>) -> Result<Json<Vec<RecordResponse>>, ApiError> {
    let records = state.repository.list().await.map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response(&e.to_string())))
    })?;
    Ok(Json(records.into_iter().map(RecordResponse::from).collect()))
}

async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecordResponse>, ApiError> {
    match state.repository.get(&id).await {
        Ok(record) => Ok(Json(RecordResponse::from(record))),
        Err(PersistenceError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(error_response(&format!("No record '{}'", id))),
        )),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, Json(error_response(&e.to_string())))),
    }
}
