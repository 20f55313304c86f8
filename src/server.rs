//! HTTP surface over [`MatchService`].
//!
//! - `POST /match` multipart form: `image` (file), `category`, `score`
//! - `GET /uploads/{filename}` returns a previously uploaded query image
//! - `POST /reload` reloads the feature store from disk and swaps it in

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::LookalikeConfig;
use crate::embedding::Extractor;
use crate::error::{ErrorKind, MatchError};
use crate::matching::{MatchResult, Matcher};
use crate::service::MatchService;
use crate::store::persist;

#[derive(Clone)]
pub struct AppState {
    service: Arc<MatchService>,
    upload_dir: PathBuf,
    store_path: PathBuf,
}

impl AppState {
    pub fn new(service: Arc<MatchService>, upload_dir: PathBuf, store_path: PathBuf) -> Self {
        Self {
            service,
            upload_dir,
            store_path,
        }
    }
}

#[derive(Debug, Serialize)]
struct MatchResponse {
    query: String,
    results: Vec<MatchResult>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    images: usize,
}

fn error_response(status: StatusCode, error: impl Into<String>, kind: Option<ErrorKind>) -> Response {
    let body = ErrorBody {
        error: error.into(),
        kind,
    };
    (status, Json(body)).into_response()
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Decode => StatusCode::BAD_REQUEST,
        ErrorKind::Capability => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::DimensionMismatch => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for MatchError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        error_response(status_for(kind), self.to_string(), Some(kind))
    }
}

/// Build the router. Separate from [`serve`] so tests can mount it on any listener.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/match", post(match_handler))
        .route("/uploads/{filename}", get(upload_handler))
        .route("/reload", post(reload_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Load the store and model, then serve until ctrl-c.
pub async fn serve(config: LookalikeConfig) -> Result<()> {
    let store_path = config.resolved_store_path();
    let load_path = store_path.clone();
    let (store, info) =
        tokio::task::spawn_blocking(move || persist::load_with_info(&load_path)).await??;

    if let Some(ref stored_model) = info.model {
        if stored_model != &config.embedding.model {
            tracing::warn!(
                stored = %stored_model,
                configured = %config.embedding.model,
                "feature store was built with a different model, run `lookalike index` to rebuild"
            );
        }
    }

    let embedding_config = config.embedding.clone();
    let extractor =
        tokio::task::spawn_blocking(move || Extractor::from_config(&embedding_config)).await??;
    tracing::info!("embedding extractor ready");

    let service = MatchService::new(
        extractor,
        store,
        Matcher::new(config.storage.asset_url_prefix.clone()),
        Duration::from_secs(config.embedding.timeout_secs),
    )?;

    let upload_dir = config.resolved_upload_dir();
    tokio::fs::create_dir_all(&upload_dir).await?;

    let state = AppState::new(Arc::new(service), upload_dir, store_path);
    let app = router(state, config.server.max_upload_bytes);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr}/match");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down server");
        })
        .await?;

    Ok(())
}

#[derive(Default)]
struct MatchForm {
    image: Option<(String, Bytes)>,
    category: Option<String>,
    score: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<MatchForm, MultipartError> {
    let mut form = MatchForm::default();
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("image") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                form.image = Some((name, bytes));
            }
            Some("category") => form.category = Some(field.text().await?),
            Some("score") => form.score = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(form)
}

async fn match_handler(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string(), None),
    };

    let Some((original_name, bytes)) = form.image.filter(|(_, b)| !b.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "No image received", None);
    };

    let stored_name = unique_upload_name(&original_name, Local::now(), &random_suffix());
    let upload_path = state.upload_dir.join(&stored_name);
    if let Err(e) = tokio::fs::write(&upload_path, &bytes).await {
        tracing::error!(path = %upload_path.display(), error = %e, "failed to save upload");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {e}"),
            None,
        );
    }

    let category = form.category.filter(|c| !c.is_empty());
    tracing::info!(
        upload = %stored_name,
        category = category.as_deref().unwrap_or(""),
        score = form.score.as_deref().unwrap_or(""),
        "match requested"
    );

    match state
        .service
        .match_image(bytes.to_vec(), category, form.score.as_deref())
        .await
    {
        Ok(results) => Json(MatchResponse {
            query: format!("/uploads/{stored_name}"),
            results,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(upload = %stored_name, kind = %e.kind(), error = %e, "match failed");
            e.into_response()
        }
    }
}

async fn upload_handler(State(state): State<AppState>, UrlPath(filename): UrlPath<String>) -> Response {
    if !is_plain_file_name(&filename) {
        return error_response(StatusCode::BAD_REQUEST, "invalid file name", None);
    }
    let path = state.upload_dir.join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = image::ImageFormat::from_path(&path)
                .map(|f| f.to_mime_type())
                .unwrap_or("application/octet-stream");
            ([(header::CONTENT_TYPE, mime)], bytes).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error_response(StatusCode::NOT_FOUND, "not found", None)
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None),
    }
}

async fn reload_handler(State(state): State<AppState>) -> Response {
    match state.service.reload_from(&state.store_path).await {
        Ok(images) => Json(ReloadResponse { images }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "reload failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"), None)
        }
    }
}

// ── Upload naming ─────────────────────────────────────────────────────────────

/// Reduce a client-supplied file name to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// `<stem>_<YYYYmmdd_HHMMSS>_<suffix><.ext>` from a sanitized client name.
pub fn unique_upload_name(original: &str, now: DateTime<Local>, suffix: &str) -> String {
    let clean = sanitize_filename(original);
    let (stem, ext) = match clean.rfind('.') {
        Some(dot) if dot > 0 => clean.split_at(dot),
        _ => (clean.as_str(), ""),
    };
    format!("{stem}_{}_{suffix}{ext}", now.format("%Y%m%d_%H%M%S"))
}

fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..") && name == sanitize_filename(name)
}
