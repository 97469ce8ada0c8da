//! In-memory API event log
//!
//! Capacity-bounded, append-only store of structured request/response/error
//! and AI call events. Process-wide state: initialized empty at startup,
//! bounded by capacity (oldest entry evicted first), cleared only via an
//! explicit call, and lost on restart by design.

mod store;

pub use store::{EventLog, LogQuery, LogStats};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Marker written in place of sensitive header and body values.
pub const REDACTED: &str = "[REDACTED]";

/// Correlation id linking a request event to its response/error and any AI
/// events produced while handling it. Inserted into request extensions by the
/// logging middleware.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// One immutable record per observed request, response, error, or AI call.
#[derive(Debug, Clone, Serialize)]
pub struct ApiEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Closed set of event kinds; never extended at runtime.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Request {
        method: String,
        path: String,
        headers: HashMap<String, String>,
        body: Option<Value>,
        query_params: HashMap<String, String>,
        client_ip: Option<String>,
    },
    Response {
        status_code: u16,
        headers: HashMap<String, String>,
        body: Option<Value>,
        processing_time_ms: Option<f64>,
    },
    Error {
        status_code: u16,
        message: String,
        stack_trace: Option<String>,
    },
    AiRequest {
        model: Option<String>,
        prompt: String,
        parameters: Option<Value>,
    },
    AiResponse {
        response: String,
        processing_time_ms: Option<f64>,
    },
}

impl ApiEvent {
    pub fn new(id: Uuid, kind: EventKind) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Wire name of the kind, matching the `type` field in serialized form.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::Request { .. } => "request",
            EventKind::Response { .. } => "response",
            EventKind::Error { .. } => "error",
            EventKind::AiRequest { .. } => "ai_request",
            EventKind::AiResponse { .. } => "ai_response",
        }
    }

    pub fn path(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Request { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Request { method, .. } => Some(method),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.kind {
            EventKind::Response { status_code, .. } | EventKind::Error { status_code, .. } => {
                Some(*status_code)
            }
            _ => None,
        }
    }
}

/// Redact sensitive header values in place before storage. Irreversible;
/// applied at write time, never at read time.
pub fn redact_headers(headers: &mut HashMap<String, String>, sensitive: &[&str]) {
    for key in sensitive {
        if let Some(value) = headers.get_mut(*key) {
            *value = REDACTED.to_string();
        }
    }
}

/// Redact a `password` key in a JSON object body, if present.
pub fn redact_body(body: &mut Value) {
    if let Value::Object(map) = body {
        if let Some(password) = map.get_mut("password") {
            *password = Value::String(REDACTED.to_string());
        }
    }
}
