use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::corpus::Citation;

/// Length of generated item ids.
pub const SHORT_ID_LEN: usize = 8;

/// Quiz difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    /// Japanese label used in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Beginner => "初級",
            Self::Intermediate => "中級",
            Self::Advanced => "上級",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!(
                "unknown level '{other}' (expected beginner, intermediate or advanced)"
            )),
        }
    }
}

/// Item type tag. Only `true_false` items pass validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    #[default]
    TrueFalse,
    Mcq,
}

impl QuizType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrueFalse => "true_false",
            Self::Mcq => "mcq",
        }
    }
}

/// A true/false quiz item grounded in one or more citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: QuizType,
    pub statement: String,
    pub answer_bool: bool,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl QuizItem {
    /// A `true_false` item with a fresh id.
    pub fn true_false(
        statement: impl Into<String>,
        answer_bool: bool,
        explanation: impl Into<String>,
        citations: Vec<Citation>,
    ) -> Self {
        Self {
            id: short_id(),
            kind: QuizType::TrueFalse,
            statement: statement.into(),
            answer_bool,
            explanation: explanation.into(),
            citations,
        }
    }

    /// Copy of this item asserting `false_statement`, with a new id and
    /// `answer_bool = false`.
    pub fn to_false(&self, false_statement: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            statement: false_statement.into(),
            answer_bool: false,
            ..self.clone()
        }
    }
}

/// Where the statement of a false item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FalseSource {
    /// A mutation rule.
    Mutator,
    /// The caller-side fallback cascade.
    Fallback,
    /// Nothing produced a differing statement.
    None,
}

impl FalseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mutator => "mutator",
            Self::Fallback => "fallback",
            Self::None => "none",
        }
    }
}

/// First eight characters of a random v4 UUID.
pub fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().to_string();
    id.truncate(SHORT_ID_LEN);
    id
}
