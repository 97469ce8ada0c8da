//! HTTP logging interceptor
//!
//! Axum middleware that wraps every request/response pair: generates a
//! correlation id, buffers and replays both bodies so the client receives
//! byte-identical output, redacts sensitive fields, and feeds the event log.
//! Recording is best-effort; the middleware never turns a logging problem
//! into a request failure.

use crate::error::AppError;
use crate::events::{
    redact_body, redact_headers, ApiEvent, EventKind, EventLog, RequestId, REDACTED,
};
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Bodies that fail to parse as JSON are stored as text, truncated to this
/// many bytes with a marker appended.
const BODY_PREVIEW_BYTES: usize = 1000;

const TRUNCATION_MARKER: &str = "...[truncated]";

/// Request headers whose values are redacted before storage.
const SENSITIVE_REQUEST_HEADERS: &[&str] = &["authorization", "cookie"];

/// Response headers whose values are redacted before storage.
const SENSITIVE_RESPONSE_HEADERS: &[&str] = &["set-cookie"];

pub async fn logging_middleware(
    State(log): State<Arc<EventLog>>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4();
    let started = Instant::now();

    let (mut parts, body) = request.into_parts();

    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();
    let query_params = parse_query_params(parts.uri.query());
    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let mut request_headers = headers_to_map(&parts.headers);
    redact_headers(&mut request_headers, SENSITIVE_REQUEST_HEADERS);

    // Only buffer bodies for methods that conventionally carry one; the
    // buffered bytes are replayed downstream unchanged.
    let (request_body, replay_body) = if matches!(
        parts.method,
        Method::POST | Method::PUT | Method::PATCH
    ) {
        match to_bytes(body, usize::MAX).await {
            Ok(bytes) => {
                let captured = capture_request_body(&bytes);
                (captured, Body::from(bytes))
            }
            Err(err) => {
                log.record(ApiEvent::new(
                    request_id,
                    EventKind::Error {
                        status_code: 400,
                        message: format!("Failed to read request body: {err}"),
                        stack_trace: None,
                    },
                ));
                return AppError::Validation(format!("Failed to read request body: {err}"))
                    .into_response();
            }
        }
    } else {
        (None, body)
    };

    log.record(ApiEvent::new(
        request_id,
        EventKind::Request {
            method,
            path,
            headers: request_headers,
            body: request_body,
            query_params,
            client_ip,
        },
    ));

    parts.extensions.insert(RequestId(request_id));
    let request = Request::from_parts(parts, replay_body);

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            log.record(ApiEvent::new(
                request_id,
                EventKind::Error {
                    status_code: 500,
                    message: format!("Failed to buffer response body: {err}"),
                    stack_trace: None,
                },
            ));
            return AppError::Internal(format!("Failed to buffer response body: {err}"))
                .into_response();
        }
    };

    let mut response_headers = headers_to_map(&parts.headers);
    redact_headers(&mut response_headers, SENSITIVE_RESPONSE_HEADERS);

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let response_body = capture_response_body(&bytes, content_type);

    // Failed handlers surface as error responses here rather than as raised
    // exceptions; record the error event alongside the response event so the
    // log still carries message + status for the failure.
    if parts.status.is_server_error() {
        let message = response_body
            .as_ref()
            .and_then(|body| body.get("error"))
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status {}", parts.status));

        log.record(ApiEvent::new(
            request_id,
            EventKind::Error {
                status_code: parts.status.as_u16(),
                message,
                stack_trace: None,
            },
        ));
    }

    log.record(ApiEvent::new(
        request_id,
        EventKind::Response {
            status_code: parts.status.as_u16(),
            headers: response_headers,
            body: response_body,
            processing_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
        },
    ));

    // Reassemble with the same parts and full body bytes: status, headers,
    // and payload reach the client exactly as the handler produced them.
    Response::from_parts(parts, Body::from(bytes))
}

fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or(REDACTED).to_string(),
            )
        })
        .collect()
}

fn parse_query_params(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a request body as JSON (redacting any `password` key); fall back to
/// a truncated text preview.
fn capture_request_body(bytes: &Bytes) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(mut value) => {
            redact_body(&mut value);
            Some(value)
        }
        Err(_) => Some(Value::String(text_preview(bytes))),
    }
}

/// Parse a response body as JSON when the content type says so; otherwise
/// store a truncated text preview.
fn capture_response_body(bytes: &Bytes, content_type: &str) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    if content_type.contains("application/json") {
        if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
            return Some(value);
        }
    }
    Some(Value::String(text_preview(bytes)))
}

fn text_preview(bytes: &Bytes) -> String {
    let cut = bytes.len().min(BODY_PREVIEW_BYTES);
    let mut preview = String::from_utf8_lossy(&bytes[..cut]).into_owned();
    if bytes.len() > BODY_PREVIEW_BYTES {
        preview.push_str(TRUNCATION_MARKER);
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        middleware,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    fn test_app(log: Arc<EventLog>) -> Router {
        Router::new()
            .route("/echo", post(|body: Bytes| async move { body }))
            .route(
                "/json",
                get(|| async { Json(json!({"message": "hola"})) }),
            )
            .route(
                "/boom",
                get(|| async { AppError::Execution("db exploded".to_string()) }),
            )
            .layer(middleware::from_fn_with_state(log, logging_middleware))
    }

    async fn send(
        app: Router,
        request: axum::http::Request<Body>,
    ) -> (axum::http::response::Parts, Bytes) {
        let response = app.oneshot(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        (parts, bytes)
    }

    #[tokio::test]
    async fn test_response_body_replay_is_lossless() {
        let log = Arc::new(EventLog::new());
        let payload = b"opaque \xF0\x9F\x91\x8D bytes".to_vec();

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::from(payload.clone()))
            .unwrap();

        let (parts, bytes) = send(test_app(log.clone()), request).await;
        assert_eq!(parts.status, 200);
        assert_eq!(bytes.as_ref(), payload.as_slice());

        // One request and one response event, sharing a correlation id
        let events = log.query(&Default::default()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, events[1].id);
    }

    #[tokio::test]
    async fn test_request_headers_and_password_redacted() {
        let log = Arc::new(EventLog::new());

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/echo?foo=bar")
            .header("authorization", "Bearer X")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"user":"ana","password":"p"}"#))
            .unwrap();

        send(test_app(log.clone()), request).await;

        let events = log.query(&query_kind("request")).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].kind {
            EventKind::Request {
                headers,
                body,
                query_params,
                ..
            } => {
                assert_eq!(headers["authorization"], REDACTED);
                assert_eq!(body.as_ref().unwrap()["password"], REDACTED);
                assert_eq!(body.as_ref().unwrap()["user"], "ana");
                assert_eq!(query_params["foo"], "bar");
            }
            other => panic!("expected request event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_truncated() {
        let log = Arc::new(EventLog::new());
        let long_body = "x".repeat(1500);

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::from(long_body))
            .unwrap();

        send(test_app(log.clone()), request).await;

        let events = log.query(&query_kind("request")).unwrap();
        match &events[0].kind {
            EventKind::Request { body, .. } => {
                let text = body.as_ref().unwrap().as_str().unwrap();
                assert!(text.ends_with(TRUNCATION_MARKER));
                assert_eq!(text.len(), BODY_PREVIEW_BYTES + TRUNCATION_MARKER.len());
            }
            other => panic!("expected request event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_json_response_recorded_structured() {
        let log = Arc::new(EventLog::new());

        let request = axum::http::Request::builder()
            .uri("/json")
            .body(Body::empty())
            .unwrap();

        send(test_app(log.clone()), request).await;

        let events = log.query(&query_kind("response")).unwrap();
        match &events[0].kind {
            EventKind::Response {
                status_code,
                body,
                processing_time_ms,
                ..
            } => {
                assert_eq!(*status_code, 200);
                assert_eq!(body.as_ref().unwrap()["message"], "hola");
                assert!(processing_time_ms.is_some());
            }
            other => panic!("expected response event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_also_records_error_event() {
        let log = Arc::new(EventLog::new());

        let request = axum::http::Request::builder()
            .uri("/boom")
            .body(Body::empty())
            .unwrap();

        let (parts, _) = send(test_app(log.clone()), request).await;
        assert_eq!(parts.status, 500);

        let errors = log.query(&query_kind("error")).unwrap();
        assert_eq!(errors.len(), 1);
        match &errors[0].kind {
            EventKind::Error {
                status_code,
                message,
                ..
            } => {
                assert_eq!(*status_code, 500);
                assert!(message.contains("db exploded"));
            }
            other => panic!("expected error event, got {other:?}"),
        }

        // The error response itself is still recorded as a response event
        let responses = log.query(&query_kind("response")).unwrap();
        assert_eq!(responses.len(), 1);
    }

    fn query_kind(kind: &str) -> crate::events::LogQuery {
        crate::events::LogQuery {
            type_filter: Some(kind.to_string()),
            ..Default::default()
        }
    }
}
