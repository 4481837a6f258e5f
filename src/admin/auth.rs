use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

/// Expected `Authorization` header value.
#[derive(Clone)]
pub struct AdminAuth {
    expected: Arc<str>,
}

impl AdminAuth {
    pub fn new(api_key: String) -> Self {
        Self {
            expected: format!("Bearer {api_key}").into(),
        }
    }
}

pub async fn admin_auth_middleware(
    State(auth): State<AdminAuth>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match auth_header {
        Some(value) if value == &*auth.expected => Ok(next.run(request).await),
        _ => {
            tracing::warn!("Rejected admin request without a valid token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
