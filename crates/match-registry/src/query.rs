//! The listing query language (spec §6):
//!
//! ```text
//! query := term ( SP term )*
//! term  := [+-]? field ":" value
//! field := identifier ( "." identifier )*
//! value := quoted-string | unquoted-token | range
//! range := "[" number "TO" number "]"
//! ```
//!
//! `+` is mandatory, `-` is negation, bare is optional (OR). Unknown
//! fields match nothing. Hand-written recursive-descent parser: no
//! parser-combinator crate is pulled in anywhere in the teacher repo, so
//! this follows that minimalism rather than reaching for `nom`/`pest`.
//!
//! Fields are addressed as `value.<path>` into the label parsed as JSON
//! (spec §6: "implementations are free to parse it as JSON for nested
//! field access") — `value` names the label document itself, mirroring
//! the `value.field` convention used by Nakama's own label index.

use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Mandatory,
    Negated,
    Optional,
}

#[derive(Debug, Clone, PartialEq)]
enum ValueMatcher {
    Token(String),
    Range(f64, f64),
}

#[derive(Debug, Clone)]
struct Term {
    modifier: Modifier,
    field: String,
    value: ValueMatcher,
}

#[derive(Debug)]
pub struct QueryParseError(pub String);

impl std::fmt::Display for QueryParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid listing query: {}", self.0)
    }
}

impl std::error::Error for QueryParseError {}

/// A parsed query, ready to test against labels.
pub struct Query(Vec<Term>);

pub fn parse(query: &str) -> Result<Query, QueryParseError> {
    let terms = query
        .split_whitespace()
        .map(parse_term)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Query(terms))
}

fn parse_term(raw: &str) -> Result<Term, QueryParseError> {
    let (modifier, rest) = match raw.as_bytes().first() {
        Some(b'+') => (Modifier::Mandatory, &raw[1..]),
        Some(b'-') => (Modifier::Negated, &raw[1..]),
        _ => (Modifier::Optional, raw),
    };

    let colon = rest
        .find(':')
        .ok_or_else(|| QueryParseError(format!("term {raw:?} is missing ':'")))?;
    let field = rest[..colon].to_string();
    if field.is_empty() {
        return Err(QueryParseError(format!("term {raw:?} has an empty field")));
    }
    let value = parse_value(&rest[colon + 1..])
        .ok_or_else(|| QueryParseError(format!("term {raw:?} has a malformed value")))?;

    Ok(Term { modifier, field, value })
}

fn parse_value(raw: &str) -> Option<ValueMatcher> {
    if let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let (lo, hi) = inner.split_once(" TO ")?;
        let lo: f64 = lo.trim().parse().ok()?;
        let hi: f64 = hi.trim().parse().ok()?;
        return Some(ValueMatcher::Range(lo, hi));
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Some(ValueMatcher::Token(raw[1..raw.len() - 1].to_string()));
    }
    if raw.is_empty() {
        return None;
    }
    Some(ValueMatcher::Token(raw.to_string()))
}

fn resolve_field<'a>(label: &'a Json, field: &str) -> Option<&'a Json> {
    let mut parts = field.split('.');
    if parts.next()? != "value" {
        return None;
    }
    let mut current = label;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn term_matches(term: &Term, label: &Json) -> bool {
    let Some(found) = resolve_field(label, &term.field) else {
        return false;
    };
    match &term.value {
        ValueMatcher::Token(expected) => match found {
            Json::String(s) => s == expected,
            Json::Number(n) => n.to_string() == *expected,
            Json::Bool(b) => b.to_string() == *expected,
            _ => false,
        },
        ValueMatcher::Range(lo, hi) => found.as_f64().map(|v| v >= *lo && v <= *hi).unwrap_or(false),
    }
}

impl Query {
    /// Evaluate against a label string, parsed as JSON. A label that
    /// isn't valid JSON matches no query with at least one term (an
    /// empty query matches everything).
    pub fn matches(&self, label_json: &str) -> bool {
        if self.0.is_empty() {
            return true;
        }
        let parsed: Json = serde_json::from_str(label_json).unwrap_or(Json::Null);

        let mandatory_ok = self
            .0
            .iter()
            .filter(|t| t.modifier == Modifier::Mandatory)
            .all(|t| term_matches(t, &parsed));
        if !mandatory_ok {
            return false;
        }

        let negated_ok = self
            .0
            .iter()
            .filter(|t| t.modifier == Modifier::Negated)
            .all(|t| !term_matches(t, &parsed));
        if !negated_ok {
            return false;
        }

        let has_mandatory = self.0.iter().any(|t| t.modifier == Modifier::Mandatory);
        let optional: Vec<&Term> = self.0.iter().filter(|t| t.modifier == Modifier::Optional).collect();
        if has_mandatory || optional.is_empty() {
            true
        } else {
            optional.iter().any(|t| term_matches(t, &parsed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mandatory_term_filters_by_nested_label_field() {
        let q = parse("+value.mode:duel").unwrap();
        assert!(q.matches(r#"{"mode":"duel","skill":5}"#));
        assert!(!q.matches(r#"{"mode":"party"}"#));
    }

    #[test]
    fn negated_term_excludes_matches() {
        let q = parse("-value.mode:party").unwrap();
        assert!(q.matches(r#"{"mode":"duel"}"#));
        assert!(!q.matches(r#"{"mode":"party"}"#));
    }

    #[test]
    fn bare_terms_are_optional_or() {
        let q = parse("value.mode:duel value.mode:party").unwrap();
        assert!(q.matches(r#"{"mode":"duel"}"#));
        assert!(q.matches(r#"{"mode":"party"}"#));
        assert!(!q.matches(r#"{"mode":"ffa"}"#));
    }

    #[test]
    fn range_matches_numeric_field() {
        let q = parse("+value.skill:[1 TO 10]").unwrap();
        assert!(q.matches(r#"{"skill":5}"#));
        assert!(!q.matches(r#"{"skill":20}"#));
    }

    #[test]
    fn unknown_field_matches_nothing() {
        let q = parse("+unknown.mode:duel").unwrap();
        assert!(!q.matches(r#"{"mode":"duel"}"#));
    }

    #[test]
    fn malformed_term_is_rejected() {
        assert!(parse("novalueseparator").is_err());
        assert!(parse(":novalue").is_err());
    }
}
