//! Bounded event store with filtering and aggregate statistics.

use super::{ApiEvent, EventKind};
use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Default maximum number of events kept in memory.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Process-wide bounded event log.
///
/// Mutation (`record`, `clear`) and iteration (`query`, `stats`) take the
/// same mutex, so capacity eviction is atomic with append and readers never
/// observe a half-applied write. `record` never fails: logging must not break
/// the request path.
pub struct EventLog {
    capacity: usize,
    events: Mutex<VecDeque<ApiEvent>>,
}

/// Filters accepted by the `/logs` endpoint. All present filters must match.
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
    /// Exact event kind (`request`, `response`, `error`, `ai_request`, `ai_response`)
    pub type_filter: Option<String>,
    /// Substring match on the request path
    pub path_filter: Option<String>,
    /// Case-insensitive exact HTTP method match
    pub method_filter: Option<String>,
    /// Exact status code match
    pub status_code: Option<u16>,
    /// Absolute timestamp (RFC 3339) or relative duration like `2h`, `30m`, `1d`
    pub since: Option<String>,
}

/// Aggregates over the current log contents.
#[derive(Debug, Serialize)]
pub struct LogStats {
    pub total_logs: usize,
    pub requests: usize,
    pub responses: usize,
    pub errors: usize,
    pub ai_requests: usize,
    pub ai_responses: usize,
    pub methods: HashMap<String, usize>,
    pub status_codes: HashMap<u16, usize>,
    pub avg_ai_response_time_ms: Option<f64>,
    pub last_request: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub last_ai_request: Option<DateTime<Utc>>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Append one event, evicting the single oldest entry beyond capacity.
    pub fn record(&self, event: ApiEvent) {
        tracing::debug!(
            event_id = %event.id,
            event_type = event.kind_name(),
            "API event recorded"
        );

        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            // A poisoned lock still holds consistent data for a VecDeque of
            // plain values; recover rather than dropping the event.
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push_back(event);
        if events.len() > self.capacity {
            events.pop_front();
        }
    }

    /// Return events matching every present filter, newest first, truncated
    /// to `limit` (unset or 0 returns all matches).
    pub fn query(&self, query: &LogQuery) -> Result<Vec<ApiEvent>, AppError> {
        let since = query
            .since
            .as_deref()
            .map(|raw| parse_since(raw, Utc::now()))
            .transpose()?;

        let events = self.lock();
        let mut matches: Vec<ApiEvent> = events
            .iter()
            .filter(|event| {
                if let Some(kind) = &query.type_filter {
                    if event.kind_name() != kind {
                        return false;
                    }
                }
                if let Some(fragment) = &query.path_filter {
                    match event.path() {
                        Some(path) if path.contains(fragment.as_str()) => {}
                        _ => return false,
                    }
                }
                if let Some(method) = &query.method_filter {
                    match event.method() {
                        Some(m) if m.eq_ignore_ascii_case(method) => {}
                        _ => return false,
                    }
                }
                if let Some(status) = query.status_code {
                    if event.status_code() != Some(status) {
                        return false;
                    }
                }
                if let Some(boundary) = since {
                    if event.timestamp < boundary {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        drop(events);

        // Most recent first
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = query.limit.filter(|&l| l > 0) {
            matches.truncate(limit);
        }

        Ok(matches)
    }

    /// Aggregate statistics over all stored events.
    pub fn stats(&self) -> LogStats {
        let events = self.lock();

        let mut stats = LogStats {
            total_logs: events.len(),
            requests: 0,
            responses: 0,
            errors: 0,
            ai_requests: 0,
            ai_responses: 0,
            methods: HashMap::new(),
            status_codes: HashMap::new(),
            avg_ai_response_time_ms: None,
            last_request: None,
            last_error: None,
            last_ai_request: None,
        };

        let mut ai_time_sum = 0.0;
        let mut ai_time_count = 0usize;

        for event in events.iter() {
            match &event.kind {
                EventKind::Request { method, .. } => {
                    stats.requests += 1;
                    *stats.methods.entry(method.clone()).or_insert(0) += 1;
                }
                EventKind::Response { status_code, .. } => {
                    stats.responses += 1;
                    *stats.status_codes.entry(*status_code).or_insert(0) += 1;
                }
                EventKind::Error { .. } => stats.errors += 1,
                EventKind::AiRequest { .. } => stats.ai_requests += 1,
                EventKind::AiResponse {
                    processing_time_ms, ..
                } => {
                    stats.ai_responses += 1;
                    // Entries without a recorded time are excluded from the mean
                    if let Some(ms) = processing_time_ms {
                        ai_time_sum += ms;
                        ai_time_count += 1;
                    }
                }
            }
        }

        if ai_time_count > 0 {
            stats.avg_ai_response_time_ms = Some(ai_time_sum / ai_time_count as f64);
        }

        // Scan from the newest entry backward, first match wins
        for event in events.iter().rev() {
            match event.kind {
                EventKind::Request { .. } if stats.last_request.is_none() => {
                    stats.last_request = Some(event.timestamp);
                }
                EventKind::Error { .. } if stats.last_error.is_none() => {
                    stats.last_error = Some(event.timestamp);
                }
                EventKind::AiRequest { .. } if stats.last_ai_request.is_none() => {
                    stats.last_ai_request = Some(event.timestamp);
                }
                _ => {}
            }
        }

        stats
    }

    /// Empty the log, returning how many events were dropped.
    pub fn clear(&self) -> usize {
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = events.len();
        events.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ApiEvent>> {
        match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Resolve a `since` parameter to an absolute boundary.
///
/// Accepts an RFC 3339 / ISO-8601 timestamp, or a relative duration written
/// as `<integer><unit>` with unit `h` (hours), `m` (minutes), or `d` (days)
/// counted back from `now`. Anything else is a validation error.
fn parse_since(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    let invalid = || AppError::Validation(format!("Invalid 'since' parameter: {raw}"));

    let (number, unit) = raw.split_at(raw.len().saturating_sub(1));
    let amount: i64 = number.parse().map_err(|_| invalid())?;
    let delta = match unit {
        "h" => Duration::hours(amount),
        "m" => Duration::minutes(amount),
        "d" => Duration::days(amount),
        _ => return Err(invalid()),
    };

    Ok(now - delta)
}
