//! Acceptance rules for true/false items.
//!
//! [`validate_item`] is a pure predicate returning the first failing rule as a
//! [`Rejection`]. Rejections are values collected into diagnostics, never
//! errors.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::model::{QuizItem, QuizType};

/// Statements shorter than this many characters (trimmed) are rejected.
pub const MIN_STATEMENT_CHARS: usize = 12;

/// Citations at least this long take part in the keyword-overlap check.
pub const OVERLAP_MIN_QUOTE_CHARS: usize = 30;

/// Citations this long or longer skip the keyword-overlap check.
pub const OVERLAP_MAX_QUOTE_CHARS: usize = 100;

/// Imperative, hortative and polite-question forms.
pub const FORBIDDEN_PHRASES: &[&str] = &[
    "してください",
    "しなさい",
    "しましょう",
    "ください",
    "でしょう",
    "ましょう",
    "ますか",
];

/// Hedges that make a statement impossible to judge true or false.
pub const AMBIGUOUS_PHRASES: &[&str] = &[
    "場合がある",
    "ことがある",
    "かもしれない",
    "望ましい",
    "推奨",
    "基本的に",
    "状況による",
    "適宜",
    "必要に応じて",
    "問題になっていない",
    "問題にならない",
    "一般的に",
    "通常は",
    "原則として",
    "できる限り",
    "なるべく",
    "できれば",
    "好ましい",
    "望ましくない",
    "考えられる",
    "思われる",
    "みられる",
];

/// Negations an LLM-proposed true statement must not contain.
pub const NEGATIVE_PATTERNS: &[&str] = &[
    "しない",
    "ではない",
    "ではありません",
    "とは限らない",
    "禁止",
    "不要",
    "必要ない",
    "してはいけない",
    "してはならない",
    "すべきではない",
];

/// Citation vocabulary that forbids something.
pub const PROHIBITION_WORDS: &[&str] = &["禁止", "してはいけない", "してはならない", "行ってはいけない", "不可"];

/// Statement markers that count as carrying the prohibition.
const STATEMENT_NEGATION_MARKERS: &[&str] = &["ない", "禁止", "不可", "ません"];

const TERMINAL_PUNCTUATION: &[char] = &['。', '．', '.', '！', '!'];

static KEYWORD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[\p{Han}\p{Katakana}ー]{2,}|[A-Za-z0-9]{3,}").ok());

/// Why an item was rejected. `Display` gives the stable reason string used in
/// diagnostics and `dropped_reasons`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    InvalidType(QuizType),
    EmptyStatement,
    TooShort(usize),
    ContainsQuestionMark,
    QuestionFormEnding,
    ForbiddenPhrase(&'static str),
    MissingTerminalPunctuation,
    AmbiguousPhrase(&'static str),
    NoCitations,
    MissingCitationSource(usize),
    MissingCitationQuote(usize),
    /// The citation prohibits something the statement affirms.
    ContradictsCitation(&'static str),
    /// No citation keyword appears in the statement.
    NoKeywordOverlap,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidType(t) => write!(f, "invalid_type:{}", t.as_str()),
            Self::EmptyStatement => f.write_str("empty_statement"),
            Self::TooShort(n) => write!(f, "too_short:{n}chars"),
            Self::ContainsQuestionMark => f.write_str("contains_question_mark"),
            Self::QuestionFormEnding => f.write_str("question_form_ending"),
            Self::ForbiddenPhrase(p) => write!(f, "forbidden_phrase:{p}"),
            Self::MissingTerminalPunctuation => f.write_str("missing_terminal_punctuation"),
            Self::AmbiguousPhrase(p) => write!(f, "ambiguous_phrase:{p}"),
            Self::NoCitations => f.write_str("no_citations"),
            Self::MissingCitationSource(i) => write!(f, "missing_citation_source:index={i}"),
            Self::MissingCitationQuote(i) => write!(f, "missing_citation_quote:index={i}"),
            Self::ContradictsCitation(w) => write!(f, "contradicts_citation:{w}"),
            Self::NoKeywordOverlap => f.write_str("no_keyword_overlap"),
        }
    }
}

/// Checks every acceptance rule in order and returns the first failure.
pub fn validate_item(item: &QuizItem) -> Result<(), Rejection> {
    if item.kind != QuizType::TrueFalse {
        return Err(Rejection::InvalidType(item.kind));
    }

    let statement = item.statement.trim();
    if statement.is_empty() {
        return Err(Rejection::EmptyStatement);
    }
    let len = statement.chars().count();
    if len < MIN_STATEMENT_CHARS {
        return Err(Rejection::TooShort(len));
    }

    if statement.contains('?') || statement.contains('？') {
        return Err(Rejection::ContainsQuestionMark);
    }
    if statement.ends_with("でしょうか") || statement.ends_with("ですか") {
        return Err(Rejection::QuestionFormEnding);
    }
    if let Some(phrase) = FORBIDDEN_PHRASES.iter().find(|p| statement.contains(*p)) {
        return Err(Rejection::ForbiddenPhrase(phrase));
    }
    if !statement.ends_with(TERMINAL_PUNCTUATION) {
        return Err(Rejection::MissingTerminalPunctuation);
    }
    if let Some(phrase) = AMBIGUOUS_PHRASES.iter().find(|p| statement.contains(*p)) {
        return Err(Rejection::AmbiguousPhrase(phrase));
    }

    if item.citations.is_empty() {
        return Err(Rejection::NoCitations);
    }
    for (i, citation) in item.citations.iter().enumerate() {
        if citation.source.trim().is_empty() {
            return Err(Rejection::MissingCitationSource(i));
        }
        if citation.quote.trim().is_empty() {
            return Err(Rejection::MissingCitationQuote(i));
        }
    }

    if item.answer_bool {
        check_prohibition(statement, item)?;
    }
    check_keyword_overlap(statement, item)
}

/// An affirmative statement over a prohibiting citation must carry the
/// negation itself.
fn check_prohibition(statement: &str, item: &QuizItem) -> Result<(), Rejection> {
    let negated = STATEMENT_NEGATION_MARKERS.iter().any(|m| statement.contains(m));
    if negated {
        return Ok(());
    }
    for citation in &item.citations {
        if let Some(word) = PROHIBITION_WORDS.iter().find(|w| citation.quote.contains(*w)) {
            return Err(Rejection::ContradictsCitation(word));
        }
    }
    Ok(())
}

/// Mid-sized citations must share at least one keyword with the statement.
/// Short citations say too little and long ones too much to judge.
fn check_keyword_overlap(statement: &str, item: &QuizItem) -> Result<(), Rejection> {
    let mut judged = false;
    for citation in &item.citations {
        let len = citation.quote.chars().count();
        if !(OVERLAP_MIN_QUOTE_CHARS..OVERLAP_MAX_QUOTE_CHARS).contains(&len) {
            continue;
        }
        let keywords = extract_keywords(&citation.quote);
        if keywords.is_empty() {
            continue;
        }
        judged = true;
        if keywords.iter().any(|k| statement.contains(k.as_str())) {
            return Ok(());
        }
    }
    if judged {
        Err(Rejection::NoKeywordOverlap)
    } else {
        Ok(())
    }
}

/// Kanji/katakana runs of two or more characters and ASCII words of three or more.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let Some(re) = KEYWORD.as_ref() else {
        return Vec::new();
    };
    let mut keywords: Vec<String> = re.find_iter(text).map(|m| m.as_str().to_string()).collect();
    keywords.sort();
    keywords.dedup();
    keywords
}

/// Whether `statement` contains one of [`NEGATIVE_PATTERNS`]. True statements
/// proposed by the LLM must not, so falsification stays under local control.
pub fn contains_negative_phrase(statement: &str) -> bool {
    NEGATIVE_PATTERNS.iter().any(|p| statement.contains(p))
}
