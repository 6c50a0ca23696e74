//! Prompt construction for quiz generation and JSON repair.

use serde::Serialize;

use super::model::Level;
use crate::corpus::{Citation, truncate_chars};
use crate::llm::Message;

const QUIZ_SYSTEM_PROMPT: &str = "あなたは業務マニュアルの引用から○×クイズを作成するアシスタントです。

出力ルール（厳守）：
- 出力はJSONのみ。前置き・説明・コードフェンスは書かないでください
- 形式: {\"quizzes\": [{\"type\": \"true_false\", \"statement\": \"...\", \"answer_bool\": true, \"explanation\": \"...\", \"citations\": [{\"source\": \"...\", \"page\": null, \"quote\": \"...\"}]}]}
- statement は引用に書かれている内容を正しく言い切る断言文（○）にしてください
- statement は12文字以上で、「。」で終えてください
- 疑問形（？、ですか、でしょうか）・命令形（してください、しましょう）は禁止です
- 「場合がある」「望ましい」「基本的に」などの曖昧な表現は禁止です
- 否定文（しない、ではない、禁止、不要）にはしないでください
- answer_bool は必ず true にしてください
- citations には与えられた引用の source・page・quote をそのまま入れてください";

const FIX_SYSTEM_PROMPT: &str = "あなたはJSON修復アシスタントです。指定された形式の正しいJSONのみを出力してください。前置き・説明・コードフェンスは書かないでください。";

/// Keywords that steer relevance search towards level-appropriate passages.
pub fn level_search_keywords(level: Level) -> &'static str {
    match level {
        Level::Beginner => "基本 ルール 手順 定義 概要",
        Level::Intermediate => "理由 方法 適用 実務 目的",
        Level::Advanced => "例外 禁止 判断基準 注意 リスク",
    }
}

fn level_guidance(level: Level) -> &'static str {
    match level {
        Level::Beginner => "用語の定義・基本ルール・目的など、資料を読めばすぐに分かる事実を問う問題にしてください。",
        Level::Intermediate => "手順・方法・理由など、実務での適用を問う問題にしてください。",
        Level::Advanced => "例外・禁止事項・判断基準など、注意深く読まないと間違える事実を問う問題にしてください。",
    }
}

/// Query used to search for quiz material when no sampling pool is used.
pub fn build_search_query(level: Level, topic: Option<&str>) -> String {
    let keywords = level_search_keywords(level);
    match topic.map(str::trim).filter(|t| !t.is_empty()) {
        Some(topic) => format!("{topic} {keywords}"),
        None => keywords.to_string(),
    }
}

fn source_label(citation: &Citation) -> String {
    match citation.page {
        Some(page) => format!("{} (p.{page})", citation.source),
        None => citation.source.clone(),
    }
}

pub(crate) fn numbered_citations(citations: &[Citation]) -> String {
    citations
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. [{}]\n{}", i + 1, source_label(c), c.quote))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Size of a quiz prompt and of the reply it produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromptStats {
    pub llm_input_citations_count: usize,
    pub llm_input_total_quote_chars: usize,
    pub llm_prompt_chars: usize,
    pub banned_statements_count: usize,
    pub llm_output_chars: usize,
    pub llm_output_preview_head: String,
}

impl PromptStats {
    /// Records the (last) raw reply.
    pub fn record_output(&mut self, output: &str) {
        self.llm_output_chars = output.chars().count();
        self.llm_output_preview_head = truncate_chars(output, 200).to_string();
    }
}

/// Messages asking for `count` true statements grounded in `citations`.
/// `banned` statements (earlier output) are listed as "do not repeat".
pub fn quiz_generation_messages(
    level: Level,
    count: usize,
    topic: Option<&str>,
    citations: &[Citation],
    banned: &[String],
) -> (Vec<Message>, PromptStats) {
    let mut user = format!(
        "難易度: {}（{}）\n{}\n\n",
        level.label(),
        level.as_str(),
        level_guidance(level)
    );
    if let Some(topic) = topic.map(str::trim).filter(|t| !t.is_empty()) {
        user.push_str(&format!("トピック: {topic}\n\n"));
    }
    user.push_str(&format!("【引用】\n\n{}\n\n", numbered_citations(citations)));

    if !banned.is_empty() {
        user.push_str("次の文と同じ内容、またはその単純な否定形は出題しないでください：\n");
        for statement in banned {
            user.push_str(&format!("- {statement}\n"));
        }
        user.push('\n');
    }

    user.push_str(&format!(
        "上記の引用だけを根拠に、正しい断言文（○）のクイズを{count}件作成し、JSONのみを出力してください。"
    ));

    let stats = PromptStats {
        llm_input_citations_count: citations.len(),
        llm_input_total_quote_chars: citations.iter().map(|c| c.quote.chars().count()).sum(),
        llm_prompt_chars: QUIZ_SYSTEM_PROMPT.chars().count() + user.chars().count(),
        banned_statements_count: banned.len(),
        ..Default::default()
    };

    (vec![Message::system(QUIZ_SYSTEM_PROMPT), Message::user(user)], stats)
}

/// Messages for the single repair round-trip after unparseable output.
pub fn quiz_json_fix_messages(
    level: Level,
    count: usize,
    topic: Option<&str>,
    citations: &[Citation],
    previous_error: &str,
) -> Vec<Message> {
    let (generation, _) = quiz_generation_messages(level, count, topic, citations, &[]);
    let task = generation
        .into_iter()
        .last()
        .map(|m| m.content)
        .unwrap_or_default();

    let user = format!(
        "前回の出力はJSONとして読み取れませんでした（エラー: {previous_error}）。\n\
         次の形式のJSONのみを出力してください：\n\
         {{\"quizzes\": [{{\"type\": \"true_false\", \"statement\": \"...\", \"answer_bool\": true, \"explanation\": \"...\", \"citations\": [{{\"source\": \"...\", \"page\": null, \"quote\": \"...\"}}]}}]}}\n\n\
         {task}"
    );
    vec![Message::system(FIX_SYSTEM_PROMPT), Message::user(user)]
}
