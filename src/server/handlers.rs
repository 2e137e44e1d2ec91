//! HTTP request handlers.

use crate::db::{Book, Library, Media, Series};
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::tasks::Task;
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use serde_json::json;

/// Format a millisecond timestamp as an HTTP date.
fn http_date(millis: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

/// Check an If-Modified-Since header against a millisecond timestamp.
/// HTTP dates carry second precision, so the comparison truncates.
fn not_modified_since(headers: &HeaderMap, updated_at: i64) -> bool {
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
        .is_some_and(|since| updated_at / 1000 <= since.timestamp())
}

/// Build an image response with caching headers tied to the media row.
fn image_response(bytes: Vec<u8>, media_type: &str, updated_at: i64) -> Response<Body> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, media_type)
        .header(header::CACHE_CONTROL, "private, max-age=3600");

    if let Some(date) = http_date(updated_at) {
        builder = builder.header(header::LAST_MODIFIED, date);
    }

    builder
        .body(Body::from(bytes))
        .unwrap_or_else(|_| Response::default())
}

fn not_modified() -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .body(Body::empty())
        .unwrap_or_else(|_| Response::default())
}

// ============================================================================
// SERVER INFO
// ============================================================================

/// Server info and catalog counts.
pub async fn api_info(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let libraries = state.db.list_libraries()?;
    let mut series = 0;
    let mut books = 0;
    for lib in &libraries {
        series += state.db.count_series(lib.id)?;
        books += state.db.count_books(lib.id)?;
    }

    Ok(Json(json!({
        "title": state.config.server.title,
        "version": env!("CARGO_PKG_VERSION"),
        "libraries": libraries.len(),
        "series": series,
        "books": books,
    })))
}

// ============================================================================
// LIBRARY HANDLERS
// ============================================================================

/// List all libraries.
pub async fn library_list(State(state): State<AppState>) -> Result<Json<Vec<Library>>> {
    Ok(Json(state.db.list_libraries()?))
}

/// Library metadata.
pub async fn library_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Library>> {
    let library = state
        .db
        .get_library(id)?
        .ok_or_else(|| AppError::NotFound(format!("Library {}", id)))?;
    Ok(Json(library))
}

/// Request a library scan. The scan runs on the task worker; the request
/// returns as soon as the task is enqueued.
pub async fn library_scan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let library = state
        .db
        .get_library(id)?
        .ok_or_else(|| AppError::NotFound(format!("Library {}", id)))?;

    state.queue.submit(Task::ScanLibrary {
        library_id: library.id,
    });
    Ok(StatusCode::ACCEPTED)
}

/// List a library's series.
pub async fn library_series(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Series>>> {
    if state.db.get_library(id)?.is_none() {
        return Err(AppError::NotFound(format!("Library {}", id)));
    }
    Ok(Json(state.db.find_series_by_library(id)?))
}

// ============================================================================
// SERIES HANDLERS
// ============================================================================

/// Series metadata.
pub async fn series_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Series>> {
    let series = state
        .db
        .get_series(id)?
        .ok_or_else(|| AppError::NotFound(format!("Series {}", id)))?;
    Ok(Json(series))
}

/// List a series' books in reading order.
pub async fn series_books(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Book>>> {
    if state.db.get_series(id)?.is_none() {
        return Err(AppError::NotFound(format!("Series {}", id)));
    }
    Ok(Json(state.db.find_books_by_series(id)?))
}

// ============================================================================
// BOOK HANDLERS
// ============================================================================

/// Book metadata.
pub async fn book_get(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Book>> {
    Ok(Json(state.lifecycle.book(id)?))
}

/// Book media: analysis status, page listing, auxiliary files.
pub async fn book_media(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Media>> {
    state.lifecycle.book(id)?;
    Ok(Json(state.lifecycle.media(id)?))
}

/// Request re-analysis of a book.
pub async fn book_analyze(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let book = state.lifecycle.book(id)?;
    state.queue.submit(Task::AnalyzeBook { book_id: book.id });
    Ok(StatusCode::ACCEPTED)
}

/// Request a metadata refresh for a book.
pub async fn book_refresh_metadata(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let book = state.lifecycle.book(id)?;
    state
        .queue
        .submit(Task::RefreshBookMetadata { book_id: book.id });
    Ok(StatusCode::ACCEPTED)
}

/// Request thumbnail regeneration for a book.
pub async fn book_regenerate_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let book = state.lifecycle.book(id)?;
    state
        .queue
        .submit(Task::GenerateBookThumbnail { book_id: book.id });
    Ok(StatusCode::ACCEPTED)
}

/// Stored book thumbnail (PNG, derived from the first page at analysis).
pub async fn book_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response<Body>> {
    let (thumb, updated_at) = state.lifecycle.get_thumbnail(id)?;

    if not_modified_since(&headers, updated_at) {
        return Ok(not_modified());
    }
    Ok(image_response(thumb, "image/png", updated_at))
}

/// Query parameters for page retrieval.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Target format name ("png" or "jpeg").
    pub convert: Option<String>,
    /// Proportional resize bound in pixels.
    pub size: Option<u32>,
}

fn parse_convert(convert: Option<&str>) -> Result<Option<crate::media::image::OutputFormat>> {
    match convert {
        None => Ok(None),
        Some(name) => crate::media::image::OutputFormat::from_name(name)
            .map(Some)
            .ok_or_else(|| {
                AppError::Conversion(format!("Unsupported conversion target: {}", name))
            }),
    }
}

/// One page of a book. Pages are numbered from 1 in reading order.
pub async fn book_page(
    State(state): State<AppState>,
    Path((id, page)): Path<(i64, i64)>,
    Query(params): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Response<Body>> {
    let convert_to = parse_convert(params.convert.as_deref())?;

    // Conditional check before touching the archive.
    let media = state.lifecycle.media(id)?;
    if not_modified_since(&headers, media.updated_at) {
        return Ok(not_modified());
    }

    let content = state
        .lifecycle
        .get_book_page(id, page, convert_to, params.size)?;
    Ok(image_response(
        content.bytes,
        &content.media_type,
        media.updated_at,
    ))
}

/// Downscaled rendition of one page.
pub async fn book_page_thumbnail(
    State(state): State<AppState>,
    Path((id, page)): Path<(i64, i64)>,
    headers: HeaderMap,
) -> Result<Response<Body>> {
    let media = state.lifecycle.media(id)?;
    if not_modified_since(&headers, media.updated_at) {
        return Ok(not_modified());
    }

    let size = state.config.media.thumbnail_size;
    let content = state.lifecycle.get_book_page(id, page, None, Some(size))?;
    Ok(image_response(
        content.bytes,
        &content.media_type,
        media.updated_at,
    ))
}
