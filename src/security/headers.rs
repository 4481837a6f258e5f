//! Response security headers and CORS.
//!
//! # Responsibilities
//! - Content-Security-Policy on every response
//! - Strict-Transport-Security on every response
//! - CORS headers, with preflight answered before any limiter runs
//!
//! # Design Decisions
//! - Handler-provided values win (`if_not_present`)
//! - CORS sits outside the rate limiter so preflight never costs quota

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityConfig;

/// Wrap `router` with the configured header and CORS layers.
pub fn apply(router: Router, config: &SecurityConfig) -> Router {
    let mut router = router;

    if config.enable_headers {
        match HeaderValue::from_str(&config.content_security_policy) {
            Ok(csp) => {
                router = router.layer(SetResponseHeaderLayer::if_not_present(
                    header::CONTENT_SECURITY_POLICY,
                    csp,
                ));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Invalid Content-Security-Policy, header not applied");
            }
        }

        router = router.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            hsts_value(config.hsts_max_age_secs),
        ));
    }

    if config.cors_enabled {
        router = router.layer(cors_layer());
    }

    router
}

/// `Strict-Transport-Security` value forcing HTTPS on the domain and its subdomains.
pub fn hsts_value(max_age_secs: u64) -> HeaderValue {
    let value = format!("max-age={max_age_secs}; includeSubDomains; preload");
    HeaderValue::try_from(value).unwrap_or_else(|_| HeaderValue::from_static("max-age=31536000"))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static(crate::scheduler::PRIORITY_HEADER),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/custom",
                get(|| async { ([(header::CONTENT_SECURITY_POLICY, "default-src *")], "ok") }),
            )
    }

    #[tokio::test]
    async fn test_headers_applied() {
        let app = apply(router(), &SecurityConfig::default());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(
            headers[header::CONTENT_SECURITY_POLICY],
            "default-src 'self'; script-src 'self'; style-src 'self'"
        );
        assert_eq!(
            headers[header::STRICT_TRANSPORT_SECURITY],
            "max-age=31536000; includeSubDomains; preload"
        );
    }

    #[tokio::test]
    async fn test_handler_value_wins() {
        let app = apply(router(), &SecurityConfig::default());
        let response = app
            .oneshot(Request::builder().uri("/custom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers()[header::CONTENT_SECURITY_POLICY], "default-src *");
    }

    #[tokio::test]
    async fn test_headers_disabled() {
        let config = SecurityConfig {
            enable_headers: false,
            cors_enabled: false,
            ..SecurityConfig::default()
        };
        let app = apply(router(), &config);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().get(header::CONTENT_SECURITY_POLICY).is_none());
        assert!(response.headers().get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let app = apply(router(), &SecurityConfig::default());
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/")
                    .header(header::ORIGIN, "https://example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_success());
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
