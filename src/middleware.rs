//! HTTP 中间件
//! 应用状态与请求追踪

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::TokenValidator,
    config::AppConfig,
    error::REQUEST_ID_HEADER,
    repository::{BookStore, UserStore},
    services::AuthService,
};

/// 应用状态
///
/// 存储以 trait 对象注入，测试可替换为内存实现。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub users: Arc<dyn UserStore>,
    pub books: Arc<dyn BookStore>,
    pub auth_service: Arc<AuthService>,
    pub token_validator: Arc<TokenValidator>,
}

const TRACE_ID_HEADER: &str = "x-trace-id";

tokio::task_local! {
    /// 当前请求的 request_id，与 `http_request` span 上记录的一致
    pub(crate) static REQUEST_ID: String;
}

/// 读取当前请求的 request_id，不在请求上下文中时返回 `None`
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    let scoped_id = request_id.clone();
    let handled = async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        let status = response.status().as_u16();
        metrics::counter!(
            "http_requests_total",
            "method" => method_label(method.as_str()),
            "status" => status_label(status)
        )
        .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert(TRACE_ID_HEADER, value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        response
    };

    REQUEST_ID
        .scope(scoped_id, handled)
        .instrument(span)
        .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        _ => "OTHER",
    }
}

fn status_label(status: u16) -> &'static str {
    match status {
        200 => "200",
        201 => "201",
        400 => "400",
        401 => "401",
        404 => "404",
        409 => "409",
        500 => "500",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use axum::{body::Body, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn tracked_router() -> Router {
        Router::new()
            .route("/id", get(|| async { current_request_id().unwrap_or_default() }))
            .route("/fail", get(|| async { Err::<(), _>(AppError::Unauthorized) }))
            .layer(axum::middleware::from_fn(request_tracking_middleware))
    }

    async fn header_and_body(uri: &str) -> (String, Vec<u8>) {
        let response = tracked_router()
            .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let header = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (header, body)
    }

    #[tokio::test]
    async fn test_handlers_see_the_tracked_request_id() {
        let (header, body) = header_and_body("/id").await;
        assert!(!header.is_empty());
        assert_eq!(String::from_utf8(body).unwrap(), header);
    }

    #[tokio::test]
    async fn test_error_body_reuses_the_tracked_request_id() {
        let (header, body) = header_and_body("/fail").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["request_id"], header);
    }

    #[test]
    fn test_no_request_id_outside_a_request() {
        assert!(current_request_id().is_none());
    }

    #[test]
    fn test_extract_or_generate_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_ID_HEADER, "test-trace-123".parse().unwrap());

        let trace_id = extract_or_generate_trace_id(&headers);
        assert_eq!(trace_id, "test-trace-123");

        let headers = HeaderMap::new();
        let trace_id = extract_or_generate_trace_id(&headers);
        assert!(!trace_id.is_empty());
        assert_ne!(trace_id, "test-trace-123");
    }

    #[test]
    fn test_metric_labels() {
        assert_eq!(method_label("POST"), "POST");
        assert_eq!(method_label("OPTIONS"), "OTHER");
        assert_eq!(status_label(401), "401");
        assert_eq!(status_label(418), "other");
    }
}
