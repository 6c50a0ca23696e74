//! Decoding of LLM quiz output.
//!
//! The model is asked for `{"quizzes": [...]}` but often wraps it in a code
//! fence or a lead-in sentence, returns bare strings instead of objects, or
//! leaves citations blank. [`parse_quiz_output`] extracts the JSON block and
//! decodes each item on its own; items that fail to decode are skipped.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{ParseError, ParseErrorKind};
use super::model::{QuizItem, QuizType, short_id};
use crate::constants::RAW_EXCERPT_CHARS;
use crate::corpus::{Citation, truncate_chars};

/// Explanation given to items the model returned as a bare string.
pub const BARE_STATEMENT_EXPLANATION: &str = "引用に基づく正しい断言文です。";

/// Fallback citations attached when the model's own are missing or unusable.
const FALLBACK_CITATIONS_MAX: usize = 3;

/// A lead-in line shorter than this (and without `{`) is dropped.
const LEAD_IN_MAX_CHARS: usize = 50;

const STATEMENT_TERMINATORS: &[char] = &['。', '.', '！', '!', '？', '?'];

/// One entry of the `quizzes` list.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawItem {
    Statement(String),
    Object(Box<RawObject>),
}

#[derive(Deserialize)]
struct RawObject {
    #[serde(default)]
    id: Option<Value>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    statement: Option<String>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    answer_bool: Option<bool>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    citations: Option<Value>,
}

/// First 200 characters of the raw output, kept for diagnostics.
pub fn raw_excerpt(text: &str) -> String {
    truncate_chars(text, RAW_EXCERPT_CHARS).to_string()
}

/// Parses up to `count` items (all when `count == 0`), filling missing
/// citations from `fallback`. Fails when nothing usable is found.
pub fn parse_quiz_output(
    text: &str,
    fallback: &[Citation],
    count: usize,
) -> Result<Vec<QuizItem>, ParseError> {
    let json = extract_json_block(text)?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| ParseError::with_detail(ParseErrorKind::JsonParse, e.to_string()))?;

    let quizzes = match value.get("quizzes") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ParseError::with_detail(
                ParseErrorKind::JsonValidation,
                "'quizzes' はリストである必要があります",
            ));
        }
        None => {
            return Err(ParseError::with_detail(
                ParseErrorKind::JsonValidation,
                "JSONに 'quizzes' キーが含まれていません",
            ));
        }
    };

    let take = if count == 0 { quizzes.len() } else { count };
    if quizzes.len() > take {
        debug!(returned = quizzes.len(), take, "Truncating quiz list");
    }

    let items: Vec<QuizItem> = quizzes
        .iter()
        .take(take)
        .enumerate()
        .filter_map(|(index, raw)| match RawItem::deserialize(raw) {
            Ok(item) => decode_item(item, index, fallback),
            Err(e) => {
                warn!(index, error = %e, "Skipping undecodable quiz item");
                None
            }
        })
        .collect();

    if items.is_empty() {
        return Err(ParseError::new(ParseErrorKind::GeneratedZeroQuizzes));
    }
    Ok(items)
}

/// Strips code fences and lead-in text and returns the outermost `{ ... }`.
pub fn extract_json_block(text: &str) -> Result<&str, ParseError> {
    let mut body = text.trim();
    if body.is_empty() {
        return Err(ParseError::new(ParseErrorKind::EmptyResponse));
    }

    for fence in ["```json", "```"] {
        if let Some(start) = body.find(fence) {
            let rest = &body[start + fence.len()..];
            body = match rest.find("```") {
                Some(end) => &rest[..end],
                None => rest,
            }
            .trim();
            break;
        }
    }

    if let Some((first, rest)) = body.split_once('\n')
        && first.chars().count() < LEAD_IN_MAX_CHARS
        && !first.contains('{')
    {
        body = rest.trim();
    }

    match (body.find('{'), body.rfind('}')) {
        (Some(first), Some(last)) if last > first => Ok(&body[first..=last]),
        _ => Err(ParseError::with_detail(
            ParseErrorKind::JsonExtraction,
            "{} が見つかりません",
        )),
    }
}

fn decode_item(raw: RawItem, index: usize, fallback: &[Citation]) -> Option<QuizItem> {
    let obj = match raw {
        RawItem::Statement(statement) => return Some(rescue_bare_statement(statement, fallback)),
        RawItem::Object(obj) => *obj,
    };

    let Some(statement) = obj.statement.or(obj.question) else {
        warn!(index, "Quiz item has neither statement nor question");
        return None;
    };

    let id = match obj.id {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => short_id(),
    };

    Some(QuizItem {
        id,
        kind: normalize_type(obj.kind.as_deref(), index),
        statement,
        answer_bool: obj.answer_bool.unwrap_or(true),
        explanation: obj.explanation.unwrap_or_default(),
        citations: decode_citations(obj.citations, index, fallback),
    })
}

/// A bare string item is taken as a true statement grounded in the fallback
/// citations.
fn rescue_bare_statement(statement: String, fallback: &[Citation]) -> QuizItem {
    let mut statement = statement.trim().to_string();
    if !statement.ends_with(STATEMENT_TERMINATORS) {
        statement.push('。');
    }
    QuizItem::true_false(
        statement,
        true,
        BARE_STATEMENT_EXPLANATION,
        fallback_prefix(fallback, FALLBACK_CITATIONS_MAX),
    )
}

/// Template names such as `T3` and unknown tags become `true_false`.
fn normalize_type(kind: Option<&str>, index: usize) -> QuizType {
    match kind {
        None | Some("true_false") => QuizType::TrueFalse,
        Some("mcq") => QuizType::Mcq,
        Some(other) => {
            warn!(index, kind = other, "Replacing unexpected quiz type with true_false");
            QuizType::TrueFalse
        }
    }
}

fn decode_citations(raw: Option<Value>, index: usize, fallback: &[Citation]) -> Vec<Citation> {
    let list = match raw {
        Some(Value::Array(list)) => list,
        _ => {
            warn!(index, "Quiz item has no citation list, using fallback");
            return fallback_prefix(fallback, 1);
        }
    };

    if list.is_empty() {
        return fallback_prefix(fallback, FALLBACK_CITATIONS_MAX);
    }
    if !list.iter().all(Value::is_object) {
        warn!(index, "Quiz item citations are not objects, using fallback");
        return fallback_prefix(fallback, FALLBACK_CITATIONS_MAX);
    }

    let parsed: Vec<Citation> = list
        .iter()
        .map(|cit| {
            let mut source = str_field(cit, "source");
            let mut quote = str_field(cit, "quote");
            if (source.is_empty() || quote.is_empty()) && !fallback.is_empty() {
                let replacement = fallback
                    .iter()
                    .find(|c| !source.is_empty() && c.source == source)
                    .unwrap_or(&fallback[0]);
                source = replacement.source.clone();
                quote = replacement.quote.clone();
            }
            Citation::new(source, page_field(cit), quote)
        })
        .collect();

    if parsed.is_empty() {
        fallback_prefix(fallback, 1)
    } else {
        parsed
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn page_field(value: &Value) -> Option<u32> {
    match value.get("page")? {
        Value::Number(n) => n.as_u64().and_then(|p| u32::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn fallback_prefix(fallback: &[Citation], n: usize) -> Vec<Citation> {
    fallback.iter().take(n).cloned().collect()
}
