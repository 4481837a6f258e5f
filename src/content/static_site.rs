//! Static site handler.
//!
//! - `GET /` serves the index file
//! - `GET <prefix><path>` serves `<root>/<path>`
//! - any other `GET` gets a plain liveness message
//! - other methods get 405

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};

use super::etag::{etag_for, is_fresh};
use crate::config::SiteConfig;
use crate::http::response;
use crate::scheduler::{Handler, HandlerError, HandlerFuture};

/// Serves files from one directory, with ETag revalidation.
#[derive(Debug, Clone)]
pub struct StaticSite {
    root: PathBuf,
    url_prefix: String,
    index_file: String,
}

impl StaticSite {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root_dir),
            url_prefix: config.url_prefix.clone(),
            index_file: config.index_file.clone(),
        }
    }

    async fn respond(&self, request: Request) -> Result<Response, HandlerError> {
        let (parts, _body) = request.into_parts();
        if parts.method != Method::GET {
            return Ok(response::text(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed",
            ));
        }

        let path = parts.uri.path();
        if path == "/" {
            return self.serve_file(&parts.headers, Path::new(&self.index_file)).await;
        }

        match path.strip_prefix(self.url_prefix.as_str()) {
            Some(relative) => match sanitize(relative) {
                Some(relative) => self.serve_file(&parts.headers, &relative).await,
                None => Ok(not_found()),
            },
            None => Ok(response::text(StatusCode::OK, "Server is up and running.")),
        }
    }

    async fn serve_file(&self, headers: &HeaderMap, relative: &Path) -> Result<Response, HandlerError> {
        let full_path = self.root.join(relative);
        let is_file = match tokio::fs::metadata(&full_path).await {
            Ok(meta) => meta.is_file(),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(HandlerError::Io(e)),
        };
        if !is_file {
            tracing::debug!(path = %full_path.display(), "File not found");
            return Ok(not_found());
        }

        let data = tokio::fs::read(&full_path).await?;

        let etag = etag_for(&data);
        if is_fresh(headers, &etag) {
            return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
        }

        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type(relative))
            .header(header::ETAG, etag)
            .body(Body::from(data))
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(response)
    }
}

impl Handler for StaticSite {
    fn handle(&self, request: Request) -> HandlerFuture<'_> {
        Box::pin(self.respond(request))
    }
}

fn not_found() -> Response {
    response::text(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Keep only plain path segments; anything that could climb out of the root
/// yields `None`.
fn sanitize(relative: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(segment) => clean.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// MIME type by file extension.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") | Some("mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
