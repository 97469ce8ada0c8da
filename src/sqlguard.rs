//! SQL statement safety filter
//!
//! Allow-list classifier that admits single SELECT statements and nothing
//! else before they reach the execution gateway. This is deliberately
//! conservative: it may reject valid queries, and it is not a parser — a
//! database-specific extension could still smuggle side effects through a
//! SELECT. It is not a substitute for parameterized queries.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords rejected anywhere in the statement, matched on word boundaries
/// so identifiers like `updated_at` are not false positives.
const DENY_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "truncate", "create", "grant", "revoke",
    "commit", "rollback", "exec", "execute",
];

static DENY_RE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"\b(?:{})\b", DENY_KEYWORDS.join("|"));
    Regex::new(&pattern).expect("deny-list pattern is valid")
});

static UNION_SELECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"union\s+select").expect("union pattern is valid"));

/// Classify a free-text SQL statement as safe to execute.
///
/// Rules, applied in order on the lowercased and trimmed text:
/// 1. must start with the literal keyword `select`;
/// 2. must not contain a statement separator (`;`);
/// 3. must not contain any deny-listed keyword as a whole word;
/// 4. `union` is only allowed when immediately followed by `select`
///    (bare UNION is a common injection vector, UNION SELECT is legitimate).
pub fn is_safe_query(query: &str) -> bool {
    let query = query.trim().to_lowercase();

    if !query.starts_with("select") {
        return false;
    }

    if query.contains(';') {
        return false;
    }

    if DENY_RE.is_match(&query) {
        return false;
    }

    if query.contains("union") && !UNION_SELECT_RE.is_match(&query) {
        return false;
    }

    true
}
