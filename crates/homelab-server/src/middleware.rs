//! Per-request access log.

use std::time::Instant;

use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use tracing::{Level, event};

/// One access-log event per request.
///
/// 5xx responses are logged at `error` since they mean the cache or an
/// upstream is in trouble; 4xx at `warn`.
pub async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    macro_rules! access {
        ($level:expr) => {
            event!(
                $level,
                %method,
                path = uri.path(),
                query = uri.query().unwrap_or(""),
                status,
                latency_ms,
                "access"
            )
        };
    }
    match status {
        0..=399 => access!(Level::INFO),
        400..=499 => access!(Level::WARN),
        _ => access!(Level::ERROR),
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_passes_response_through() {
        let app = Router::new()
            .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
            .layer(axum::middleware::from_fn(request_logging_middleware));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/teapot?x=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }
}
