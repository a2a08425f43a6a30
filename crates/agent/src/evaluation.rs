//! Self-evaluation scores and the parser for raw evaluator output
//!
//! The evaluator is a language model, so its reply is loosely typed: it may
//! be wrapped in code fences and scores may arrive as numbers or strings.
//! Parsing is strict about shape and range and never falls back to a default.

use askforge_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Lowest accepted score
pub const MIN_SCORE: u8 = 1;

/// Highest accepted score
pub const MAX_SCORE: u8 = 5;

/// Scores for one generated answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Does the answer address the question
    pub relevance: u8,

    /// Is the answer supported by the retrieved context
    pub faithfulness: u8,

    /// Is the answer easy to read
    pub clarity: u8,
}

fn fence_patterns() -> &'static (regex_lite::Regex, regex_lite::Regex) {
    static PATTERNS: OnceLock<(regex_lite::Regex, regex_lite::Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            regex_lite::Regex::new(r"^```(?:json)?\s*").expect("valid opening fence pattern"),
            regex_lite::Regex::new(r"\s*```$").expect("valid closing fence pattern"),
        )
    })
}

/// Remove a leading ```` ``` ````/```` ```json ```` and a trailing ```` ``` ````
pub fn strip_code_fences(raw: &str) -> String {
    let (open, close) = fence_patterns();
    let trimmed = raw.trim();
    let without_open = open.replace(trimmed, "");
    close.replace(&without_open, "").into_owned()
}

impl Evaluation {
    /// Parse raw evaluator output into validated scores
    pub fn parse(raw: &str) -> Result<Self> {
        let cleaned = strip_code_fences(raw);
        tracing::debug!(raw = %cleaned, "Raw evaluator output");

        let value: Value =
            serde_json::from_str(&cleaned).map_err(|e| AppError::EvaluationParse {
                message: format!("not valid JSON ({}): {}", e, cleaned),
            })?;

        let object = value.as_object().ok_or_else(|| AppError::EvaluationParse {
            message: format!("expected a JSON object, got: {}", cleaned),
        })?;

        Ok(Self {
            relevance: score_field(object, "relevance")?,
            faithfulness: score_field(object, "faithfulness")?,
            clarity: score_field(object, "clarity")?,
        })
    }
}

fn score_field(object: &Map<String, Value>, field: &str) -> Result<u8> {
    let value = object.get(field).ok_or_else(|| AppError::EvaluationParse {
        message: format!("missing field '{}'", field),
    })?;

    let coerced = coerce_integer(value).ok_or_else(|| AppError::ScoreCoercion {
        field: field.to_string(),
        message: format!("{} is not an integer", value),
    })?;

    if !(MIN_SCORE as i64..=MAX_SCORE as i64).contains(&coerced) {
        return Err(AppError::ScoreCoercion {
            field: field.to_string(),
            message: format!("{} is outside {}..={}", coerced, MIN_SCORE, MAX_SCORE),
        });
    }

    Ok(coerced as u8)
}

/// Integers pass through, finite floats truncate toward zero, and strings
/// must hold an integer. Everything else is rejected.
fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let eval = Evaluation::parse(r#"{"relevance": 4, "faithfulness": 5, "clarity": 3}"#).unwrap();
        assert_eq!(
            eval,
            Evaluation {
                relevance: 4,
                faithfulness: 5,
                clarity: 3
            }
        );
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"relevance\": 2, \"faithfulness\": 4, \"clarity\": 5}\n```";
        let eval = Evaluation::parse(raw).unwrap();
        assert_eq!(eval.relevance, 2);
        assert_eq!(eval.clarity, 5);

        let bare_fence = "```\n{\"relevance\": 1, \"faithfulness\": 1, \"clarity\": 1}\n```";
        assert_eq!(Evaluation::parse(bare_fence).unwrap().faithfulness, 1);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let eval =
            Evaluation::parse(r#"{"relevance": "4", "faithfulness": " 5 ", "clarity": 3}"#).unwrap();
        assert_eq!(eval.relevance, 4);
        assert_eq!(eval.faithfulness, 5);
    }

    #[test]
    fn test_floats_truncate() {
        let eval =
            Evaluation::parse(r#"{"relevance": 4.0, "faithfulness": 4.9, "clarity": 2.2}"#).unwrap();
        assert_eq!(eval.relevance, 4);
        assert_eq!(eval.faithfulness, 4);
        assert_eq!(eval.clarity, 2);
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let raw = r#"{"relevance": 3, "faithfulness": 4, "clarity": 5, "notes": "fine"}"#;
        assert!(Evaluation::parse(raw).is_ok());
    }

    #[test]
    fn test_non_numeric_value_is_coercion_failure() {
        let err =
            Evaluation::parse(r#"{"relevance": "high", "faithfulness": 4, "clarity": 5}"#).unwrap_err();
        match err {
            AppError::ScoreCoercion { field, .. } => assert_eq!(field, "relevance"),
            other => panic!("unexpected error: {other:?}"),
        }

        for bad in [r#"true"#, r#"null"#, r#"[4]"#, r#"{"v": 4}"#, r#""4.5""#] {
            let raw = format!(r#"{{"relevance": 3, "faithfulness": {}, "clarity": 3}}"#, bad);
            assert!(
                matches!(Evaluation::parse(&raw), Err(AppError::ScoreCoercion { .. })),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn test_out_of_range_is_coercion_failure() {
        for bad in ["0", "6", "-1"] {
            let raw = format!(r#"{{"relevance": 3, "faithfulness": 3, "clarity": {}}}"#, bad);
            assert!(matches!(
                Evaluation::parse(&raw),
                Err(AppError::ScoreCoercion { .. })
            ));
        }
    }

    #[test]
    fn test_missing_field_is_parse_failure() {
        let err = Evaluation::parse(r#"{"relevance": 3, "clarity": 3}"#).unwrap_err();
        assert!(matches!(err, AppError::EvaluationParse { .. }));
        assert!(err.to_string().contains("faithfulness"));
    }

    #[test]
    fn test_non_json_is_parse_failure() {
        assert!(matches!(
            Evaluation::parse("The answer is great, 5/5."),
            Err(AppError::EvaluationParse { .. })
        ));
        assert!(matches!(
            Evaluation::parse("[3, 4, 5]"),
            Err(AppError::EvaluationParse { .. })
        ));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
        assert_eq!(strip_code_fences("```{}```"), "{}");
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let eval = Evaluation {
            relevance: 5,
            faithfulness: 4,
            clarity: 3,
        };
        let value = serde_json::to_value(eval).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"relevance": 5, "faithfulness": 4, "clarity": 3})
        );
    }
}
