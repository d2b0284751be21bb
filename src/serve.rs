use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use log::{info, warn};
use sqlx::SqlitePool;
use std::io;
use std::sync::Arc as StdArc;
use tokio_util::io::ReaderStream;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::ServerConfig;
use crate::constants::{RECORDINGS_PATH, UPLOAD_SUCCESS_MESSAGE, VIDEO_FIELD};
use crate::db::{self, DynError};
use crate::error::{ApiError, ApiResult};
use crate::models::{RecordingEntry, UploadResponse};
use crate::store::{self, FileStore, StoredFile};

// State shared by the recordings handlers
pub struct AppState {
    pub pool: SqlitePool,
    pub store: FileStore,
    /// Prefix for synthesized stream URLs, without trailing slash
    pub public_base_url: String,
}

/// Stream URL advertised for a recording id
pub fn stream_url(base_url: &str, id: i64) -> String {
    format!("{}{}/{}", base_url, RECORDINGS_PATH, id)
}

/// Content type sent with a streamed file, chosen by its stored extension
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("webm") => "video/webm",
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Build the HTTP router; CORS only admits `allowed_origin`
///
/// Requests from any other origin get no `Access-Control-Allow-Origin` header.
pub fn build_router(
    state: StdArc<AppState>,
    allowed_origin: HeaderValue,
    max_upload_bytes: usize,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([allowed_origin]))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route(RECORDINGS_PATH, get(list_handler).post(upload_handler))
        .route(&format!("{}/{{id}}", RECORDINGS_PATH), get(stream_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Run the recordings server until Ctrl-C
pub async fn serve(config: ServerConfig) -> Result<(), DynError> {
    config.validate()?;

    let pool = db::open_database_connection(&config.database_path).await?;
    db::init_database_schema(&pool).await?;

    let store = FileStore::open(&config.upload_dir).await.map_err(|e| {
        format!(
            "Failed to create upload directory '{}': {}",
            config.upload_dir.display(),
            e
        )
    })?;

    let allowed_origin = HeaderValue::from_str(&config.allowed_origin_header())?;
    let public_base_url = config.public_base_url();

    info!("Upload directory: {}", store.root().display());
    info!("Allowed origin: {}", config.allowed_origin_header());
    info!("Listening on: http://0.0.0.0:{}", config.port);
    info!("Endpoints:");
    info!("  GET  /health  - Health check");
    info!("  POST {}  - Upload a recording (multipart field '{}')", RECORDINGS_PATH, VIDEO_FIELD);
    info!("  GET  {}  - List recordings, newest first", RECORDINGS_PATH);
    info!("  GET  {}/:id  - Stream a recording", RECORDINGS_PATH);

    let state = StdArc::new(AppState {
        pool,
        store,
        public_base_url,
    });
    let app = build_router(state, allowed_origin, config.max_upload_bytes());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .map_err(|e| format!("Failed to bind to port {}: {}", config.port, e))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

// Health check endpoint - returns 200 OK if server is running
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// POST /api/recordings - write the file first, then insert its row
async fn upload_handler(
    State(state): State<StdArc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut stored: Option<StoredFile> = None;

    if let Err(e) = receive_video(&state.store, &mut multipart, &mut stored).await {
        if let Some(file) = stored {
            file.discard().await;
        }
        return Err(e);
    }

    let stored = stored
        .ok_or_else(|| ApiError::BadRequest(format!("Missing '{}' field", VIDEO_FIELD)))?;
    let recording = stored.commit(&state.pool).await?;

    info!(
        "Stored recording {} as {} ({} bytes)",
        recording.id, recording.filepath, recording.filesize
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: UPLOAD_SUCCESS_MESSAGE.to_string(),
            recording: recording.into(),
        }),
    ))
}

/// Stream the single `video` part to the file store
///
/// Plain text parts (no file name) are skipped. A file part under any other
/// name, or a second `video` part, rejects the request.
async fn receive_video(
    store: &FileStore,
    multipart: &mut Multipart,
    stored: &mut Option<StoredFile>,
) -> ApiResult<()> {
    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        if name != VIDEO_FIELD {
            if field.file_name().is_none() {
                continue;
            }
            return Err(ApiError::BadRequest(format!("Unexpected field '{}'", name)));
        }
        if stored.is_some() {
            return Err(ApiError::BadRequest(format!(
                "More than one '{}' field",
                VIDEO_FIELD
            )));
        }

        // Dropped unfinished on any error, which removes the partial file
        let mut writer = store.create(Utc::now(), field.file_name()).await?;
        while let Some(chunk) = field.chunk().await? {
            writer.write_chunk(&chunk).await?;
        }
        *stored = Some(writer.finish().await?);
    }
    Ok(())
}

// GET /api/recordings - full scan, newest first, with stream URLs
async fn list_handler(
    State(state): State<StdArc<AppState>>,
) -> ApiResult<Json<Vec<RecordingEntry>>> {
    let recordings = db::list_recordings(&state.pool).await?;

    let entries = recordings
        .into_iter()
        .map(|recording| {
            let url = stream_url(&state.public_base_url, recording.id);
            RecordingEntry { recording, url }
        })
        .collect();

    Ok(Json(entries))
}

// GET /api/recordings/{id} - whole-file body, no range support
async fn stream_handler(
    State(state): State<StdArc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id: i64 = id.parse().map_err(|_| ApiError::NotFound)?;

    let recording = match db::get_recording(&state.pool, id).await {
        Ok(Some(recording)) => recording,
        Ok(None) => return Err(ApiError::NotFound),
        Err(e) => {
            warn!("Lookup of recording {} failed: {}", id, e);
            return Err(ApiError::NotFound);
        }
    };

    let path = store::resolve(&recording.filepath)?;
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(
                "Recording {} points at missing file {}",
                id,
                path.display()
            );
            return Err(ApiError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata().await?.len();

    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type_for(&recording.filename)),
        ),
        (header::CONTENT_LENGTH, HeaderValue::from(len)),
    ];
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((headers, body).into_response())
}
