//! Natural-language query orchestrator
//!
//! Turns a free-text question about the employee records into a SQL query via
//! the LLM, executes it through the safety filter and gateway, and asks the
//! LLM to phrase an answer from the rows. Per question: classify → translate
//! → execute (one bounded fallback retry) → answer.

mod classifier;

pub use classifier::is_domain_question;

use crate::{
    config::GeminiConfig,
    error::AppError,
    events::{ApiEvent, EventKind, EventLog},
    gateway, providers, sqlguard,
};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Query issued when the LLM-generated statement fails to execute. Exactly
/// one retry: the orchestrator never loops.
const FALLBACK_QUERY: &str = "SELECT * FROM personas LIMIT 5";

const SCHEMA_DESCRIPTION: &str = "\
Tabla: personas
Columnas:
  id INTEGER (clave primaria)
  primer_nombre TEXT
  segundo_nombre TEXT (puede ser NULL)
  apellidos TEXT
  fecha_nacimiento DATE (formato YYYY-MM-DD)
  genero TEXT (valores: MASCULINO, FEMENINO, NO_BINARIO, PREFIERO_NO_REPORTAR)
  correo TEXT
  celular TEXT
  nro_documento TEXT
  tipo_documento TEXT (valores: TARJETA_DE_IDENTIDAD, CEDULA)";

/// Outcome of one orchestrated question.
#[derive(Debug, Serialize)]
pub struct NlqAnswer {
    pub question: String,
    pub sql_query: String,
    pub results: Vec<Map<String, Value>>,
    pub response: String,
}

pub struct NlqService {
    client: reqwest::Client,
    gemini: GeminiConfig,
    pool: SqlitePool,
    event_log: Arc<EventLog>,
}

impl NlqService {
    pub fn new(
        client: reqwest::Client,
        gemini: GeminiConfig,
        pool: SqlitePool,
        event_log: Arc<EventLog>,
    ) -> Self {
        Self {
            client,
            gemini,
            pool,
            event_log,
        }
    }

    /// Answer a natural-language question over the personas table.
    ///
    /// `request_id` is the correlation id of the HTTP request; the AI events
    /// recorded here share it with the request/response events.
    pub async fn answer_question(
        &self,
        request_id: Uuid,
        question: &str,
    ) -> Result<NlqAnswer, AppError> {
        // 1. Classify
        if !is_domain_question(question) {
            return Err(AppError::DomainMismatch(format!(
                "Question is not about the employee records: {question}"
            )));
        }

        // 2. Translate
        let sql_query = self.translate_to_sql(request_id, question).await?;
        tracing::info!(%request_id, sql = %sql_query, "Generated SQL from question");

        // 3. Execute, with one fallback retry
        let (sql_query, results) = self.execute_with_fallback(request_id, sql_query).await?;

        // 4. Answer from the rows only
        let response = self.phrase_answer(request_id, question, &results).await?;

        Ok(NlqAnswer {
            question: question.to_string(),
            sql_query,
            results,
            response,
        })
    }

    async fn translate_to_sql(&self, request_id: Uuid, question: &str) -> Result<String, AppError> {
        let system = format!(
            "Eres un traductor de preguntas a SQL para una base de datos de empleados.\n\
             {SCHEMA_DESCRIPTION}\n\
             Devuelve exactamente una sentencia SELECT de SQLite, sin punto y coma final, \
             sin explicaciones y sin formato adicional."
        );

        let raw = self
            .generate_logged(request_id, question, Some(&system))
            .await?;

        Ok(repair_sql(&raw))
    }

    /// Run the generated query through filter + gateway; on any failure fall
    /// back to [`FALLBACK_QUERY`] exactly once.
    async fn execute_with_fallback(
        &self,
        request_id: Uuid,
        sql_query: String,
    ) -> Result<(String, Vec<Map<String, Value>>), AppError> {
        let attempt = if sqlguard::is_safe_query(&sql_query) {
            gateway::execute_query(&self.pool, &sql_query).await
        } else {
            Err(AppError::Validation(
                "Generated query rejected by the safety filter".to_string(),
            ))
        };

        match attempt {
            Ok(rows) => Ok((sql_query, rows)),
            Err(err) => {
                tracing::warn!(
                    %request_id,
                    sql = %sql_query,
                    error = %err,
                    "Generated query failed, retrying with fallback"
                );
                let rows = gateway::execute_query(&self.pool, FALLBACK_QUERY).await?;
                Ok((FALLBACK_QUERY.to_string(), rows))
            }
        }
    }

    async fn phrase_answer(
        &self,
        request_id: Uuid,
        question: &str,
        results: &[Map<String, Value>],
    ) -> Result<String, AppError> {
        let rows = serde_json::to_string(results)
            .map_err(|e| AppError::Internal(format!("Failed to serialize rows: {e}")))?;

        let prompt = format!(
            "Pregunta: {question}\n\nDatos de empleados obtenidos de la base de datos:\n{rows}\n\n\
             Responde la pregunta únicamente con los datos suministrados y solo sobre el \
             dominio de registros de empleados. Responde en español y de forma concisa."
        );

        self.generate_logged(request_id, &prompt, None).await
    }

    /// Gemini call with ai_request / ai_response events around it.
    async fn generate_logged(
        &self,
        request_id: Uuid,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, AppError> {
        self.event_log.record(ApiEvent::new(
            request_id,
            EventKind::AiRequest {
                model: Some(self.gemini.model.clone()),
                prompt: prompt.to_string(),
                parameters: None,
            },
        ));

        let started = Instant::now();
        let text =
            providers::gemini::generate_text(&self.client, &self.gemini, prompt, system).await?;

        self.event_log.record(ApiEvent::new(
            request_id,
            EventKind::AiResponse {
                response: text.clone(),
                processing_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
            },
        ));

        Ok(text)
    }
}

/// Heuristic repair of LLM output into a bare SELECT statement: drop code
/// fences and semicolons, prefix `SELECT ` when the keyword is missing. The
/// safety filter remains the authority before execution.
fn repair_sql(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(stripped) = text.strip_prefix("```") {
        text = stripped
            .strip_prefix("sql")
            .unwrap_or(stripped)
            .trim_end_matches('`');
    }

    let cleaned = text.replace(';', "");
    let cleaned = cleaned.trim();

    if cleaned.to_lowercase().starts_with("select") {
        cleaned.to_string()
    } else {
        format!("SELECT {cleaned}")
    }
}
