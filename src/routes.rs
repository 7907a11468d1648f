use std::{io, path::Path, sync::Arc};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::TryStreamExt;
use serde::Deserialize;
use tokio::fs;
use tokio_util::io::{ReaderStream, StreamReader};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::ShareError,
    listing, pages,
    resolve::resolve,
    upload::UploadReceiver,
};

type SharedConfig = Arc<Config>;

#[derive(Deserialize, Debug)]
struct SearchQuery {
    q: Option<String>,
}

/// Builds the application router around an immutable config.
pub fn router(config: Config) -> Router {
    Router::new()
        .route("/", get(serve_handler).post(upload_handler))
        .route("/*path", get(serve_handler).post(upload_handler))
        // Upload size is bounded by the declared Content-Length only.
        .layer(DefaultBodyLimit::disable())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(Arc::new(config))
}

/// GET and HEAD for everything below the root: files, index pages, listings.
async fn serve_handler(
    State(config): State<SharedConfig>,
    uri: Uri,
) -> Result<Response, ShareError> {
    if let Some(filter) = search_filter(&uri) {
        return search(&config, &uri, &filter).await;
    }

    let raw_path = request_target(&uri);
    let path = resolve(config.root(), raw_path);
    debug!(request = raw_path, resolved = %path.display(), "resolved request path");

    let metadata = fs::metadata(&path).await.map_err(|e| {
        info!("Not found: {} ({})", path.display(), e);
        ShareError::NotFound
    })?;

    if !metadata.is_dir() {
        return serve_file(&path).await;
    }

    if !uri.path().ends_with('/') {
        let location = match uri.query() {
            Some(query) => format!("{}/?{}", uri.path(), query),
            None => format!("{}/", uri.path()),
        };
        return Ok(
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        );
    }

    for index in &config.index_files {
        let candidate = path.join(index);
        if fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
            return serve_file(&candidate).await;
        }
    }

    let listing = listing::list(&path, None).await?;
    Ok(pages::listing_page(&display_path(uri.path()), &listing, None).into_response())
}

/// `q` of a `/search?q=...` request. Any other request, including `/search` without `q`,
/// is a plain path.
fn search_filter(uri: &Uri) -> Option<String> {
    if uri.path() != "/search" {
        return None;
    }
    Query::<SearchQuery>::try_from_uri(uri).ok()?.0.q
}

/// Listing of the served root, filtered by `q`. Uploads from this page go to the root.
async fn search(config: &Config, uri: &Uri, filter: &str) -> Result<Response, ShareError> {
    info!("Search query: {:?}", filter);
    let listing = listing::list(config.root(), Some(filter)).await?;
    let page = pages::listing_page(&display_path(request_target(uri)), &listing, Some("/"));
    Ok(page.into_response())
}

async fn upload_handler(
    State(config): State<SharedConfig>,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ShareError> {
    let boundary = multipart_boundary(&headers).ok_or_else(|| {
        ShareError::BadRequest("Expected multipart/form-data with a boundary".to_string())
    })?;
    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or(ShareError::LengthRequired)?;

    let dest_dir = resolve(config.root(), request_target(&uri));
    info!(dest = %dest_dir.display(), declared_len, "upload requested");

    let reader = StreamReader::new(
        body.into_data_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
    );
    let outcome = UploadReceiver::new(config.collision_suffix)
        .receive(boundary.as_bytes(), declared_len, reader, &dest_dir)
        .await;

    let status = match &outcome {
        Ok(stored) => {
            info!(
                path = %stored.path.display(),
                bytes = stored.bytes_written,
                "upload stored"
            );
            StatusCode::OK
        }
        Err(err) => {
            warn!(error = %err, dest = %dest_dir.display(), "upload failed");
            if config.strict_upload_status {
                err.status()
            } else {
                StatusCode::OK
            }
        }
    };

    Ok((status, pages::upload_result_page(outcome.as_ref())).into_response())
}

async fn serve_file(path: &Path) -> Result<Response, ShareError> {
    let file = fs::File::open(path).await.map_err(|e| {
        info!("Failed to open {}: {}", path.display(), e);
        ShareError::NotFound
    })?;
    let metadata = file.metadata().await.map_err(|e| {
        warn!("Failed to stat {}: {}", path.display(), e);
        ShareError::NotFound
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&guess_content_type(path))
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
    if let Ok(modified) = metadata.modified() {
        if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((StatusCode::OK, headers, body).into_response())
}

/// Source files are shown as text rather than downloaded.
fn guess_content_type(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("py" | "c" | "h") => "text/plain".to_string(),
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string(),
    }
}

/// `boundary` parameter of a `multipart/form-data` Content-Type.
fn multipart_boundary(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mut params = content_type.split(';');
    let essence = params.next()?.trim();
    if !essence.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
}

fn request_target(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}

fn display_path(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}
