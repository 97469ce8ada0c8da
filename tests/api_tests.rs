//! Router-level integration tests: real in-memory database, mocked Gemini.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use neoreg::{
    config::{
        Config, DatabaseConfig, EventLogConfig, GeminiConfig, ServerConfig, StorageConfig,
        VectorConfig,
    },
    events::EventLog,
    nlq::NlqService,
    server::{create_router, AppState},
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceExt;

fn test_config(gemini_base_url: String, photo_dir: String) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "info".to_string(),
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        },
        gemini: GeminiConfig {
            enabled: true,
            api_key: "test-key".to_string(),
            base_url: gemini_base_url,
            model: "gemini-2.0-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            timeout_seconds: 10,
        },
        vector: VectorConfig {
            enabled: false,
            base_url: "http://localhost:6333".to_string(),
            collection: "employees".to_string(),
            vector_size: 768,
            timeout_seconds: 10,
        },
        storage: StorageConfig {
            photo_dir,
            max_photo_bytes: 2 * 1024 * 1024,
        },
        event_log: EventLogConfig { capacity: 1000 },
    }
}

async fn test_app(gemini_base_url: String, photo_dir: String) -> (Router, AppState) {
    let config = Arc::new(test_config(gemini_base_url, photo_dir));

    let db = SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&db).await.unwrap();

    let http_client = reqwest::Client::new();
    let event_log = Arc::new(EventLog::new());
    let nlq = Arc::new(NlqService::new(
        http_client.clone(),
        config.gemini.clone(),
        db.clone(),
        event_log.clone(),
    ));

    let state = AppState {
        config,
        db,
        http_client,
        event_log: event_log.clone(),
        nlq,
        vector: None,
    };

    (create_router(state.clone(), event_log), state)
}

async fn app() -> (Router, AppState) {
    let dir = tempfile::tempdir().unwrap();
    test_app(
        "http://unused.invalid".to_string(),
        dir.keep().to_string_lossy().into_owned(),
    )
    .await
}

fn persona_json(correo: &str, nro_documento: &str) -> Value {
    json!({
        "primer_nombre": "Ana",
        "segundo_nombre": null,
        "apellidos": "Gomez",
        "fecha_nacimiento": "1990-04-01",
        "genero": "FEMENINO",
        "correo": correo,
        "celular": "3001234567",
        "nro_documento": nro_documento,
        "tipo_documento": "CEDULA"
    })
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_persona_crud_roundtrip() {
    let (router, _) = app().await;

    // Create
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/personas/",
            persona_json("ana@example.com", "CC-1"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["primer_nombre"], "Ana");

    // Read back
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/personas/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Update
    let mut updated = persona_json("ana@example.com", "CC-1");
    updated["apellidos"] = json!("Gomez Perez");
    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/personas/{id}"),
            updated,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["apellidos"], "Gomez Perez");

    // Delete
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/personas/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "Persona deleted successfully"
    );

    // Gone
    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/personas/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_correo_is_validation_error() {
    let (router, _) = app().await;

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/personas/",
            persona_json("dup@example.com", "CC-1"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/personas/",
            persona_json("dup@example.com", "CC-2"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "validation_error");
}

#[tokio::test]
async fn test_execute_sql_allows_select_only() {
    let (router, _) = app().await;

    router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/personas/",
            persona_json("sql@example.com", "CC-9"),
        ))
        .await
        .unwrap();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/execute-sql",
            json!({"query": "SELECT primer_nombre, correo FROM personas"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // Bare array of row mappings, no envelope, column order preserved
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["primer_nombre"], "Ana");
    let columns: Vec<&String> = body[0].as_object().unwrap().keys().collect();
    assert_eq!(columns, ["primer_nombre", "correo"]);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/execute-sql",
            json!({"query": "DELETE FROM personas"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logs_capture_and_clear() {
    let (router, state) = app().await;

    router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/personas/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Request plus response event for the call above
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/logs?type_filter=request&path_filter=personas")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let events = body_json(response).await;
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["path"], "/api/v1/personas/");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/logs/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let stats = body_json(response).await;
    assert!(stats["requests"].as_u64().unwrap() >= 1);

    let count_before_clear = state.event_log.len();
    let response = router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/logs/clear")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    // The clear request itself was logged before the handler ran
    assert_eq!(
        body["message"],
        format!("Cleared {} logs from memory", count_before_clear + 1)
    );
}

#[tokio::test]
async fn test_sql_query_domain_mismatch_is_bad_request() {
    let (router, _) = app().await;

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/sql-query",
            json!({"question": "¿Cuánto es 2+2?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "domain_mismatch");
}

#[tokio::test]
async fn test_sql_query_full_pipeline() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent")
                .body_includes("traductor");
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "SELECT primer_nombre FROM personas"}]}
                }]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent")
                .body_includes("Responde la pregunta");
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Hay una empleada: Ana."}]}
                }]
            }));
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (router, state) = test_app(
        server.base_url(),
        dir.keep().to_string_lossy().into_owned(),
    )
    .await;

    router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/personas/",
            persona_json("nlq@example.com", "CC-7"),
        ))
        .await
        .unwrap();

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/sql-query",
            json!({"question": "¿Cuántos empleados hay?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["sql_query"], "SELECT primer_nombre FROM personas");
    assert_eq!(body["response"], "Hay una empleada: Ana.");
    assert_eq!(body["results"][0]["primer_nombre"], "Ana");

    // The AI events share the correlation id of the originating request
    let stats = state.event_log.stats();
    assert_eq!(stats.ai_requests, 2);
    assert_eq!(stats.ai_responses, 2);

    let events = state.event_log.query(&Default::default()).unwrap();
    let request_id = events
        .iter()
        .find(|e| e.path() == Some("/api/v1/sql-query"))
        .map(|e| e.id)
        .unwrap();
    let ai_with_same_id = events
        .iter()
        .filter(|e| e.kind_name().starts_with("ai_") && e.id == request_id)
        .count();
    assert_eq!(ai_with_same_id, 4);
}

#[tokio::test]
async fn test_photo_upload_and_fetch() {
    let (router, _) = app().await;

    let created = body_json(
        router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/personas/",
                persona_json("photo@example.com", "CC-5"),
            ))
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let boundary = "X-TEST-BOUNDARY";
    let png_bytes = b"\x89PNG\r\n\x1a\nfakeimagedata";
    let mut multipart = Vec::new();
    multipart.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"selfie.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    multipart.extend_from_slice(png_bytes);
    multipart.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/photos/upload/{id}"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(multipart))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let uploaded = body_json(response).await;
    let filename = uploaded["filename"].as_str().unwrap().to_string();
    assert!(filename.ends_with(".png"));
    assert_eq!(uploaded["original_filename"], "selfie.png");

    // Stored bytes come back unchanged with an image content type
    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/photos/person/{id}/{filename}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/png"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), png_bytes);
}

#[tokio::test]
async fn test_photo_upload_rejects_bad_extension() {
    let (router, _) = app().await;

    let created = body_json(
        router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/personas/",
                persona_json("exe@example.com", "CC-6"),
            ))
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let boundary = "X-TEST-BOUNDARY";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
         filename=\"evil.exe\"\r\n\r\npayload\r\n--{boundary}--\r\n"
    );

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/photos/upload/{id}"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_is_public() {
    let (router, state) = app().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Probes are not recorded in the event log
    assert!(state.event_log.is_empty());
}
