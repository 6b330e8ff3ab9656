//! Response normalization.
//!
//! The upstream LLM is the single largest source of invalid data in this
//! system. Everything downstream (storage, listing, the UI) assumes a clean,
//! fully-populated result schema, so coercion happens here and only here:
//! one chokepoint instead of null-checks scattered across the codebase.
//!
//! Normalization is a total, pure function. It never errors and never
//! suspends; the worst input produces a fallback record carrying an explicit
//! failure marker plus an `Unparseable` status the caller can surface.

use crate::entry::QueryKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marker written into scalar fields when the raw response could not be
/// decoded at all. Deliberately visible in stored and displayed records.
pub const FAILURE_MARKER: &str = "[could not parse response]";

/// Outcome of a normalization pass.
///
/// `PartialFailure` and `Unparseable` are not errors: the result is still
/// stored and returned, tagged so the degradation stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NormalizeStatus {
    /// The raw value already conformed to the target schema.
    Ok,
    /// Some fields were missing, of the wrong type, or recovered from
    /// surrounding text; defaults were substituted.
    PartialFailure,
    /// Nothing decodable was found; the result is the fallback record.
    Unparseable,
}

impl NormalizeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizeStatus::Ok => "ok",
            NormalizeStatus::PartialFailure => "partialFailure",
            NormalizeStatus::Unparseable => "unparseable",
        }
    }
}

/// Simplified explanation of a single medical term.
///
/// Field names match the JSON shape the upstream prompt requests, so a
/// well-behaved completion round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermResult {
    pub explanation: String,
    pub examples: Vec<String>,
    pub related_terms: Vec<String>,
    pub notes: String,
}

/// One explained term within a report analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalTermEntry {
    pub term: String,
    pub explanation: String,
}

/// Simplified analysis of a full medical report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResult {
    pub summary: String,
    pub key_points: Vec<String>,
    pub medical_terms: Vec<MedicalTermEntry>,
    pub actions: Vec<String>,
    pub warnings: Vec<String>,
}

/// A normalized result, shaped according to the query kind.
///
/// Untagged serialization is safe here because the two schemas share no
/// required field names and the normalizer guarantees every field is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedResult {
    Term(TermResult),
    Report(ReportResult),
}

impl NormalizedResult {
    pub fn kind(&self) -> QueryKind {
        match self {
            NormalizedResult::Term(_) => QueryKind::Term,
            NormalizedResult::Report(_) => QueryKind::Report,
        }
    }
}

/// Coerce an arbitrary raw LLM response into the fixed schema for `kind`.
///
/// Accepts an already-parsed JSON object, a JSON-encoded string (possibly
/// wrapped in markdown code fences or surrounded by prose), or anything else.
/// Always returns a fully-populated record; the status flag reports how much
/// coercion was necessary.
pub fn normalize(kind: QueryKind, raw: &Value) -> (NormalizedResult, NormalizeStatus) {
    let mut recovered = false;

    let object = match raw {
        Value::Object(map) => Some(map.clone()),
        Value::String(text) => decode_embedded_object(text, &mut recovered),
        _ => None,
    };

    let Some(object) = object else {
        return (fallback_result(kind), NormalizeStatus::Unparseable);
    };

    let mut degraded = recovered;
    let result = match kind {
        QueryKind::Term => NormalizedResult::Term(TermResult {
            explanation: take_string(&object, "explanation", &mut degraded),
            examples: take_string_list(&object, "examples", &mut degraded),
            related_terms: take_string_list(&object, "relatedTerms", &mut degraded),
            notes: take_string(&object, "notes", &mut degraded),
        }),
        QueryKind::Report => NormalizedResult::Report(ReportResult {
            summary: take_string(&object, "summary", &mut degraded),
            key_points: take_string_list(&object, "keyPoints", &mut degraded),
            medical_terms: take_term_list(&object, "medicalTerms", &mut degraded),
            actions: take_string_list(&object, "actions", &mut degraded),
            warnings: take_string_list(&object, "warnings", &mut degraded),
        }),
    };

    let status = if degraded {
        NormalizeStatus::PartialFailure
    } else {
        NormalizeStatus::Ok
    };
    (result, status)
}

/// The record returned when nothing decodable was found: scalar fields carry
/// the failure marker, list fields are empty.
pub fn fallback_result(kind: QueryKind) -> NormalizedResult {
    match kind {
        QueryKind::Term => NormalizedResult::Term(TermResult {
            explanation: FAILURE_MARKER.to_owned(),
            examples: Vec::new(),
            related_terms: Vec::new(),
            notes: FAILURE_MARKER.to_owned(),
        }),
        QueryKind::Report => NormalizedResult::Report(ReportResult {
            summary: FAILURE_MARKER.to_owned(),
            key_points: Vec::new(),
            medical_terms: Vec::new(),
            actions: Vec::new(),
            warnings: Vec::new(),
        }),
    }
}

/// Attempt to pull a JSON object out of free-form completion text.
///
/// Tries, in order: direct decode after stripping markdown code fences, then
/// decode of the first balanced `{...}` substring. Sets `recovered` when the
/// substring fallback was needed.
fn decode_embedded_object(text: &str, recovered: &mut bool) -> Option<Map<String, Value>> {
    let stripped = strip_code_fences(text);
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(stripped) {
        return Some(map);
    }

    let candidate = first_balanced_object(stripped)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => {
            *recovered = true;
            Some(map)
        }
        _ => None,
    }
}

/// Strip surrounding markdown code fences (``` or ```json) if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line, if any.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Locate the first balanced `{...}` substring, respecting string literals
/// and escape sequences. Returns `None` if no brace ever closes.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn take_string(object: &Map<String, Value>, key: &str, degraded: &mut bool) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.clone(),
        _ => {
            *degraded = true;
            String::new()
        }
    }
}

fn take_string_list(object: &Map<String, Value>, key: &str, degraded: &mut bool) -> Vec<String> {
    match object.get(key) {
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    // Non-string elements are dropped, not stringified.
                    _ => *degraded = true,
                }
            }
            out
        }
        _ => {
            *degraded = true;
            Vec::new()
        }
    }
}

fn take_term_list(
    object: &Map<String, Value>,
    key: &str,
    degraded: &mut bool,
) -> Vec<MedicalTermEntry> {
    match object.get(key) {
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(entry) => out.push(MedicalTermEntry {
                        term: take_string(entry, "term", degraded),
                        explanation: take_string(entry, "explanation", degraded),
                    }),
                    _ => *degraded = true,
                }
            }
            out
        }
        _ => {
            *degraded = true;
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_term_raw() -> Value {
        json!({
            "explanation": "high blood pressure",
            "examples": ["measured at 150/95"],
            "relatedTerms": ["bp"],
            "notes": ""
        })
    }

    #[test]
    fn valid_term_input_is_idempotent() {
        let raw = valid_term_raw();
        let (result, status) = normalize(QueryKind::Term, &raw);
        assert_eq!(status, NormalizeStatus::Ok);
        assert_eq!(serde_json::to_value(&result).unwrap(), raw);
    }

    #[test]
    fn missing_fields_get_schema_defaults() {
        let raw = json!({ "explanation": "high blood pressure" });
        let (result, status) = normalize(QueryKind::Term, &raw);
        assert_eq!(status, NormalizeStatus::PartialFailure);
        let NormalizedResult::Term(term) = result else {
            panic!("expected term result");
        };
        assert_eq!(term.explanation, "high blood pressure");
        assert!(term.examples.is_empty());
        assert!(term.related_terms.is_empty());
        assert_eq!(term.notes, "");
    }

    #[test]
    fn wrong_typed_fields_get_schema_defaults() {
        let raw = json!({
            "explanation": 42,
            "examples": "not a list",
            "relatedTerms": null,
            "notes": ["not", "a", "string"]
        });
        let (result, status) = normalize(QueryKind::Term, &raw);
        assert_eq!(status, NormalizeStatus::PartialFailure);
        let NormalizedResult::Term(term) = result else {
            panic!("expected term result");
        };
        assert_eq!(term.explanation, "");
        assert!(term.examples.is_empty());
        assert!(term.related_terms.is_empty());
        assert_eq!(term.notes, "");
    }

    #[test]
    fn code_fenced_json_is_extracted() {
        let raw = Value::String(
            "```json\n{\"explanation\":\"x\",\"examples\":[],\"relatedTerms\":[],\"notes\":\"\"}\n```"
                .to_owned(),
        );
        let (result, status) = normalize(QueryKind::Term, &raw);
        assert_eq!(status, NormalizeStatus::Ok);
        let NormalizedResult::Term(term) = result else {
            panic!("expected term result");
        };
        assert_eq!(term.explanation, "x");
    }

    #[test]
    fn object_embedded_in_prose_is_recovered() {
        let raw = Value::String(
            "Here is the JSON you asked for: {\"explanation\":\"x\",\"examples\":[],\
             \"relatedTerms\":[],\"notes\":\"see {braces} in strings\"} hope that helps!"
                .to_owned(),
        );
        let (result, status) = normalize(QueryKind::Term, &raw);
        // Recovery from surrounding prose is flagged even when all fields decode.
        assert_eq!(status, NormalizeStatus::PartialFailure);
        let NormalizedResult::Term(term) = result else {
            panic!("expected term result");
        };
        assert_eq!(term.notes, "see {braces} in strings");
    }

    #[test]
    fn unparseable_string_yields_fallback() {
        let raw = Value::String("not json at all".to_owned());
        let (result, status) = normalize(QueryKind::Term, &raw);
        assert_eq!(status, NormalizeStatus::Unparseable);
        let NormalizedResult::Term(term) = result else {
            panic!("expected term result");
        };
        assert_eq!(term.explanation, FAILURE_MARKER);
        assert_eq!(term.notes, FAILURE_MARKER);
        assert!(term.examples.is_empty());
        assert!(term.related_terms.is_empty());
    }

    #[test]
    fn truncated_object_yields_fallback() {
        let raw = Value::String("{\"summary\": \"cut off mid".to_owned());
        let (_, status) = normalize(QueryKind::Report, &raw);
        assert_eq!(status, NormalizeStatus::Unparseable);
    }

    #[test]
    fn non_object_values_yield_fallback() {
        for raw in [Value::Null, json!(7), json!(["a", "b"])] {
            let (result, status) = normalize(QueryKind::Report, &raw);
            assert_eq!(status, NormalizeStatus::Unparseable);
            let NormalizedResult::Report(report) = result else {
                panic!("expected report result");
            };
            assert_eq!(report.summary, FAILURE_MARKER);
            assert!(report.key_points.is_empty());
        }
    }

    #[test]
    fn report_term_list_drops_malformed_elements() {
        let raw = json!({
            "summary": "routine blood panel",
            "keyPoints": ["cholesterol slightly elevated", 3],
            "medicalTerms": [
                { "term": "LDL", "explanation": "bad cholesterol" },
                "free-floating string",
                { "term": "HDL" }
            ],
            "actions": [],
            "warnings": []
        });
        let (result, status) = normalize(QueryKind::Report, &raw);
        assert_eq!(status, NormalizeStatus::PartialFailure);
        let NormalizedResult::Report(report) = result else {
            panic!("expected report result");
        };
        assert_eq!(report.key_points, vec!["cholesterol slightly elevated"]);
        assert_eq!(report.medical_terms.len(), 2);
        assert_eq!(report.medical_terms[0].term, "LDL");
        assert_eq!(report.medical_terms[1].explanation, "");
    }

    #[test]
    fn valid_report_passes_through_unchanged() {
        let raw = json!({
            "summary": "all clear",
            "keyPoints": ["no findings"],
            "medicalTerms": [{ "term": "CBC", "explanation": "complete blood count" }],
            "actions": ["no follow-up needed"],
            "warnings": []
        });
        let (result, status) = normalize(QueryKind::Report, &raw);
        assert_eq!(status, NormalizeStatus::Ok);
        assert_eq!(serde_json::to_value(&result).unwrap(), raw);
    }

    #[test]
    fn fence_without_language_tag_is_stripped() {
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }
}
