//! Domain classifier for natural-language questions.
//!
//! Keyword allow-list combined with a pure-arithmetic detector. Inherently
//! fuzzy: the goal is to keep calculator-style questions away from the SQL
//! pipeline, not to understand the question.

use once_cell::sync::Lazy;
use regex::Regex;

/// Terms that mark a question as being about the stored employee records.
/// Spanish first (the data set is Spanish), with English equivalents.
const DOMAIN_KEYWORDS: &[&str] = &[
    "empleado",
    "empleada",
    "persona",
    "trabajador",
    "trabajadora",
    "registro",
    "nombre",
    "apellido",
    "correo",
    "celular",
    "documento",
    "genero",
    "género",
    "nacimiento",
    "femenino",
    "masculino",
    "employee",
    "person",
    "worker",
    "record",
    "email",
];

/// Aggregation terms that, together with a domain keyword, admit questions
/// like "total de empleados".
const AGGREGATION_KEYWORDS: &[&str] = &[
    "total", "sum", "suma", "average", "promedio", "cuantos", "cuántos", "cuantas", "cuántas",
];

static ARITHMETIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\s*[+\-*/]\s*\d+").expect("arithmetic pattern is valid"));

static CUANTO_ES_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"cu[aá]nto es\s*\d").expect("cuanto-es pattern is valid"));

/// Decide whether a question is about the employee records domain.
///
/// Accepted when it contains a domain keyword and is not pure arithmetic,
/// or when it is an aggregation question that also names the domain.
pub fn is_domain_question(question: &str) -> bool {
    let question = question.to_lowercase();

    let has_domain_keyword = DOMAIN_KEYWORDS.iter().any(|kw| question.contains(kw));
    let has_aggregation = AGGREGATION_KEYWORDS.iter().any(|kw| question.contains(kw));
    let pure_arithmetic =
        ARITHMETIC_RE.is_match(&question) || CUANTO_ES_NUMBER_RE.is_match(&question);

    (has_domain_keyword && !pure_arithmetic) || (has_aggregation && has_domain_keyword)
}
