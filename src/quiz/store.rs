//! In-memory quiz store and answer judging.

use moka::sync::Cache;
use serde::Serialize;
use tracing::debug;

use super::model::QuizItem;
use crate::corpus::Citation;

/// Result of judging one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JudgeResult {
    pub is_correct: bool,
    pub correct_answer: bool,
    pub explanation: String,
    pub citations: Vec<Citation>,
}

/// Write-once, read-many store of single quizzes and serialized quiz sets,
/// keyed by random UUIDs.
pub struct QuizStore {
    items: Cache<String, QuizItem>,
    sets: Cache<String, String>,
}

impl std::fmt::Debug for QuizStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizStore").finish_non_exhaustive()
    }
}

impl Default for QuizStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizStore {
    const DEFAULT_CAPACITY: u64 = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Store holding at most `capacity` entries of each kind.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            items: Cache::builder().max_capacity(capacity).build(),
            sets: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Saves `item` under a new id and returns the id.
    pub fn save(&self, item: QuizItem) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        debug!(id = %id, statement = %item.statement, "Quiz saved");
        self.items.insert(id.clone(), item);
        id
    }

    pub fn get(&self, id: &str) -> Option<QuizItem> {
        self.items.get(id)
    }

    /// Saves a quiz set as an opaque JSON document and returns its id.
    pub fn save_set(&self, items: &[QuizItem]) -> Result<String, serde_json::Error> {
        let document = serde_json::to_string(items)?;
        let id = uuid::Uuid::new_v4().to_string();
        debug!(id = %id, items = items.len(), "Quiz set saved");
        self.sets.insert(id.clone(), document);
        Ok(id)
    }

    /// The JSON document of a saved set.
    pub fn get_set(&self, id: &str) -> Option<String> {
        self.sets.get(id)
    }

    pub fn clear(&self) {
        self.items.invalidate_all();
        self.sets.invalidate_all();
    }

    /// Compares `answer` with the stored answer. `None` for an unknown id.
    pub fn judge(&self, id: &str, answer: bool) -> Option<JudgeResult> {
        let item = self.get(id)?;
        Some(JudgeResult {
            is_correct: answer == item.answer_bool,
            correct_answer: item.answer_bool,
            explanation: item.explanation,
            citations: item.citations,
        })
    }
}
