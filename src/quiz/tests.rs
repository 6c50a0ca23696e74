use std::collections::HashSet;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::duplicate::{core_content_key, is_citation_used, normalize_statement};
use super::generator::AttemptStage;
use super::mutator::{LAST_RESORT_PREFIX, apply_rules};
use super::parser::{BARE_STATEMENT_EXPLANATION, extract_json_block, parse_quiz_output};
use super::pool::{ids_for_source, sample_multi_source};
use super::postprocess::{clean_statement, postprocess_item};
use super::prompt::{build_search_query, quiz_generation_messages, quiz_json_fix_messages};
use super::selector::score_chunk;
use super::validator::extract_keywords;
use super::*;
use crate::config::QuizConfig;
use crate::corpus::{Chunk, Citation};
use crate::embedding::{E5Embedder, EmbedRole, TextEmbedder};
use crate::llm::{LlmError, MockChatClient};
use crate::vectordb::{ChunkStore, MockChunkStore};

fn cite(quote: &str) -> Citation {
    Citation::new("manual.txt", Some(1), quote)
}

fn true_item(statement: &str, quote: &str) -> QuizItem {
    QuizItem::true_false(statement, true, "マニュアルの記載による。", vec![cite(quote)])
}

fn quiz_json(statement: &str) -> String {
    serde_json::json!({
        "quizzes": [{
            "type": "true_false",
            "statement": statement,
            "answer_bool": true,
            "explanation": "引用の通り。",
            "citations": [{"source": "manual.txt", "page": 1, "quote": "レジ締めは閉店後に二人で行う。"}]
        }]
    })
    .to_string()
}

async fn seeded_store(chunks: &[Chunk]) -> Arc<MockChunkStore> {
    let embedder = E5Embedder::stub();
    let store = MockChunkStore::new();
    store
        .ensure_collection(embedder.dimension() as u64)
        .await
        .unwrap();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let vectors = embedder.embed_batch(&texts, EmbedRole::Passage).unwrap();
    store.upsert(chunks, vectors).await.unwrap();
    Arc::new(store)
}

fn manual_chunks(source: &str, n: u32) -> Vec<Chunk> {
    (0..n)
        .map(|i| Chunk::new(source, Some(i + 1), i, format!("受付番号{i}の書類は本部で保管する。")))
        .collect()
}

// ---- mutator ----

#[test]
fn test_mutate_increments_counter() {
    assert_eq!(mutate("予備の手袋は3個用意する。"), "予備の手袋は4個用意する。");
    assert_eq!(mutate("点検は毎月2回実施する。"), "点検は毎月3回実施する。");
}

#[test]
fn test_mutate_swaps_prohibition_for_permission() {
    assert_eq!(
        mutate("店内での喫煙は禁止されている。"),
        "店内での喫煙は許可されている。"
    );
}

#[test]
fn test_mutate_swaps_order_before_actions() {
    assert_eq!(mutate("最初に店長へ連絡する。"), "最後に店長へ連絡する。");
}

#[test]
fn test_mutate_negates_copula_ending() {
    assert_eq!(mutate("この扉は非常口である。"), "この扉は非常口ではない。");
}

#[test]
fn test_fallback_negates_verb_ending() {
    let (mutated, source) = falsify_with_fallback("手順書に注意点を示す。");
    assert_eq!(mutated, "手順書に注意点を示さない。");
    assert_eq!(source, FalseSource::Fallback);
    assert!(apply_rules("手順書に注意点を示す。").is_none());
}

#[test]
fn test_mutate_prefixes_when_nothing_matches() {
    let statement = "これはペンです。";
    let (unchanged, source) = falsify_with_fallback(statement);
    assert_eq!(unchanged, statement);
    assert_eq!(source, FalseSource::None);
    assert_eq!(mutate(statement), format!("{LAST_RESORT_PREFIX}{statement}"));
}

#[test]
fn test_mutate_always_differs() {
    let statements = [
        "レジ締めは閉店後に二人で行う。",
        "鍵は必ず店長が保管する。",
        "防犯カメラの映像は30日保存する。",
        "すべての従業員が研修を受ける。",
        "これは安全のための決まりです。",
        "a",
        "。",
        "99999999999999999999999個",
    ];
    for statement in statements {
        assert_ne!(mutate(statement), statement, "unchanged: {statement}");
    }
}

// ---- validator ----

#[test]
fn test_validator_accepts_grounded_statement() {
    let item = true_item("レジ締めは閉店後に二人で行う。", "レジ締めは閉店後に二人で行う。");
    assert_eq!(validate_item(&item), Ok(()));
}

#[test]
fn test_validator_rejects_question_mark() {
    let item = true_item("レジ締めは二人で行うのですか?", "レジ締めは二人で行う。");
    assert_eq!(validate_item(&item), Err(Rejection::ContainsQuestionMark));
    let item = true_item("レジ締めは閉店後に二人で行う？", "レジ締めは二人で行う。");
    assert_eq!(validate_item(&item), Err(Rejection::ContainsQuestionMark));
}

#[test]
fn test_validator_rejects_short_statement() {
    let item = true_item("短い文。", "短い文。");
    assert_eq!(validate_item(&item), Err(Rejection::TooShort(4)));
    assert_eq!(Rejection::TooShort(4).to_string(), "too_short:4chars");
}

#[test]
fn test_validator_rejects_missing_citations() {
    let mut item = true_item("レジ締めは閉店後に二人で行う。", "x");
    item.citations.clear();
    assert_eq!(validate_item(&item), Err(Rejection::NoCitations));

    let mut item = true_item("レジ締めは閉店後に二人で行う。", "x");
    item.citations[0].quote = "  ".to_string();
    assert_eq!(
        validate_item(&item).map_err(|r| r.to_string()),
        Err("missing_citation_quote:index=0".to_string())
    );
}

#[test]
fn test_validator_rejects_wrong_type() {
    let mut item = true_item("レジ締めは閉店後に二人で行う。", "x");
    item.kind = QuizType::Mcq;
    assert_eq!(
        validate_item(&item).map_err(|r| r.to_string()),
        Err("invalid_type:mcq".to_string())
    );
}

#[test]
fn test_validator_rejects_phrasing() {
    let cases = [
        ("レジ締めは二人で確認してください。", "forbidden_phrase:してください"),
        ("レジ締めは閉店後に二人で行う", "missing_terminal_punctuation"),
        ("レジ締めは閉店後に行うことが望ましい。", "ambiguous_phrase:望ましい"),
    ];
    for (statement, expected) in cases {
        let item = true_item(statement, "レジ締め");
        assert_eq!(
            validate_item(&item).map_err(|r| r.to_string()),
            Err(expected.to_string()),
            "{statement}"
        );
    }
}

#[test]
fn test_validator_detects_contradicted_prohibition() {
    let item = true_item("店内では喫煙をすることができる。", "店内での喫煙は禁止されている。");
    assert_eq!(validate_item(&item), Err(Rejection::ContradictsCitation("禁止")));

    // The same citation is fine for a statement carrying the prohibition.
    let item = true_item("店内での喫煙は禁止されている。", "店内での喫煙は禁止されている。");
    assert_eq!(validate_item(&item), Ok(()));

    // False items are not checked against prohibitions.
    let mut item = true_item("店内では喫煙をすることができる。", "店内での喫煙は禁止されている。");
    item.answer_bool = false;
    assert_eq!(validate_item(&item), Ok(()));
}

#[test]
fn test_validator_keyword_overlap_for_mid_sized_quotes() {
    let quote = "防犯カメラの映像は本部のサーバーに一か月間保存される決まりになっている。";
    let unrelated = true_item("レジ締めは閉店後に二人で行う。", quote);
    assert_eq!(validate_item(&unrelated), Err(Rejection::NoKeywordOverlap));

    let related = true_item("防犯カメラの映像は一か月間保存される。", quote);
    assert_eq!(validate_item(&related), Ok(()));

    let long_quote = quote.repeat(3);
    let unrelated_long = true_item("レジ締めは閉店後に二人で行う。", &long_quote);
    assert_eq!(validate_item(&unrelated_long), Ok(()));
}

#[test]
fn test_extract_keywords() {
    let keywords = extract_keywords("防犯カメラの映像をPOSで確認");
    assert!(keywords.contains(&"防犯カメラ".to_string()));
    assert!(keywords.contains(&"映像".to_string()));
    assert!(keywords.contains(&"POS".to_string()));
    assert!(keywords.contains(&"確認".to_string()));
}

// ---- duplicate ----

#[test]
fn test_duplicate_exact_and_core_match() {
    assert!(is_duplicate_statement("Xをする。", &["Xをする。"]));
    assert!(is_duplicate_statement("Xをする。", &["Xをしない。"]));
    assert!(!is_duplicate_statement("A", &["B"]));
    assert!(is_duplicate_statement(
        "レジ締めは 閉店後に行う。",
        &["レジ締めは閉店後に行う"]
    ));
    assert!(!is_duplicate_statement::<&str>("レジ締めは閉店後に行う。", &[]));
}

#[test]
fn test_core_key_strips_negation() {
    assert_eq!(normalize_statement("A B。c、D."), "abcd");
    assert_eq!(core_content_key("喫煙は禁止。"), core_content_key("喫煙は。"));
    assert_eq!(core_content_key("報告を行わない。"), core_content_key("報告を行う。"));
}

#[test]
fn test_citation_used() {
    let used: HashSet<_> = [cite("レジ締めは閉店後に行う。").key()].into_iter().collect();
    assert!(is_citation_used(&[cite("レジ締めは閉店後に行う。")], &used));
    assert!(!is_citation_used(&[cite("別の引用。")], &used));
}

// ---- parser ----

#[test]
fn test_parse_fenced_json() {
    let raw = format!("```json\n{}\n```", quiz_json("レジ締めは閉店後に二人で行う。"));
    let items = parse_quiz_output(&raw, &[], 0).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].statement, "レジ締めは閉店後に二人で行う。");
    assert!(items[0].answer_bool);
    assert_eq!(items[0].citations[0].page, Some(1));
    assert_eq!(items[0].id.chars().count(), model::SHORT_ID_LEN);
}

#[test]
fn test_parse_skips_lead_in_line() {
    let raw = format!("以下がクイズです。\n{}", quiz_json("レジ締めは閉店後に二人で行う。"));
    assert_eq!(extract_json_block(&raw).unwrap().chars().next(), Some('{'));
    assert_eq!(parse_quiz_output(&raw, &[], 0).unwrap().len(), 1);
}

#[test]
fn test_parse_bare_string_item() {
    let fallback: Vec<Citation> = (0..4).map(|i| cite(&format!("引用{i}"))).collect();
    let raw = r#"{"quizzes": ["レジ締めは閉店後に行う"]}"#;
    let items = parse_quiz_output(raw, &fallback, 0).unwrap();
    assert_eq!(items[0].statement, "レジ締めは閉店後に行う。");
    assert_eq!(items[0].explanation, BARE_STATEMENT_EXPLANATION);
    assert_eq!(items[0].citations.len(), 3);
}

#[test]
fn test_parse_normalizes_type_and_question_key() {
    let raw = r#"{"quizzes": [
        {"type": "T3", "question": "レジ締めは閉店後に行う。", "citations": []},
        {"type": "mcq", "statement": "鍵は店長が保管する。", "citations": []}
    ]}"#;
    let items = parse_quiz_output(raw, &[cite("q")], 0).unwrap();
    assert_eq!(items[0].kind, QuizType::TrueFalse);
    assert_eq!(items[0].statement, "レジ締めは閉店後に行う。");
    assert!(items[0].answer_bool, "missing answer flag defaults to true");
    assert_eq!(items[1].kind, QuizType::Mcq);
}

#[test]
fn test_parse_citation_fallbacks() {
    let fallback = vec![
        Citation::new("manual.txt", Some(1), "マニュアルの引用。"),
        Citation::new("guide.txt", Some(2), "ガイドの引用。"),
    ];
    let raw = r#"{"quizzes": [
        {"statement": "引用のないクイズです。"},
        {"statement": "ソースだけのクイズです。", "citations": [{"source": "guide.txt", "page": "5", "quote": ""}]},
        {"statement": "文字列の引用のクイズです。", "citations": ["manual.txt"]}
    ]}"#;
    let items = parse_quiz_output(raw, &fallback, 0).unwrap();

    assert_eq!(items[0].citations, vec![fallback[0].clone()]);

    assert_eq!(items[1].citations.len(), 1);
    assert_eq!(items[1].citations[0].source, "guide.txt");
    assert_eq!(items[1].citations[0].quote, "ガイドの引用。");
    assert_eq!(items[1].citations[0].page, Some(5));

    assert_eq!(items[2].citations, fallback);
}

#[test]
fn test_parse_skips_non_bool_answer_and_truncates() {
    let raw = r#"{"quizzes": [
        {"statement": "回答が文字列のクイズです。", "answer_bool": "yes"},
        {"statement": "一件目の正しいクイズです。", "answer_bool": true},
        {"statement": "二件目の正しいクイズです。", "answer_bool": true}
    ]}"#;
    let items = parse_quiz_output(raw, &[cite("q")], 0).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].statement, "一件目の正しいクイズです。");

    let items = parse_quiz_output(raw, &[cite("q")], 2).unwrap();
    assert_eq!(items.len(), 1);
}

#[test]
fn test_parse_error_kinds() {
    let cases = [
        ("   ", ParseErrorKind::EmptyResponse),
        ("no json here", ParseErrorKind::JsonExtraction),
        (r#"{"quizzes": [}"#, ParseErrorKind::JsonParse),
        (r#"{"items": []}"#, ParseErrorKind::JsonValidation),
        (r#"{"quizzes": "x"}"#, ParseErrorKind::JsonValidation),
        (r#"{"quizzes": []}"#, ParseErrorKind::GeneratedZeroQuizzes),
        (r#"{"quizzes": [{"answer_bool": true}]}"#, ParseErrorKind::GeneratedZeroQuizzes),
    ];
    for (raw, kind) in cases {
        let err = parse_quiz_output(raw, &[], 0).unwrap_err();
        assert_eq!(err.kind, kind, "{raw}");
    }
    assert!(ParseErrorKind::JsonParse.is_repairable());
    assert!(!ParseErrorKind::GeneratedZeroQuizzes.is_repairable());
    assert_eq!(
        ParseError::new(ParseErrorKind::EmptyResponse).to_string(),
        "empty_response"
    );
}

// ---- postprocess ----

#[test]
fn test_clean_statement_strips_annotations() {
    assert_eq!(
        clean_statement(" 【手順】レジ締めは閉店後に行う。[1] "),
        "レジ締めは閉店後に行う。"
    );
}

#[test]
fn test_postprocess_dedups_and_caps_citations() {
    let mut item = true_item("レジ締めは閉店後に行う。", "同じ引用。");
    item.citations.push(cite("同じ引用。"));
    for i in 0..6 {
        item.citations.push(cite(&format!("引用{i}")));
    }
    let item = postprocess_item(item);
    assert_eq!(item.citations.len(), 5);
    assert_eq!(item.citations[0].quote, "同じ引用。");
    assert_eq!(item.citations[1].quote, "引用0");
}

// ---- prompt ----

#[test]
fn test_search_query_by_level_and_topic() {
    assert_eq!(build_search_query(Level::Beginner, None), "基本 ルール 手順 定義 概要");
    assert_eq!(
        build_search_query(Level::Advanced, Some(" 防犯 ")),
        "防犯 例外 禁止 判断基準 注意 リスク"
    );
}

#[test]
fn test_generation_prompt_lists_citations_and_banned() {
    let citations = [Citation::new("manual.txt", Some(3), "レジ締めは閉店後に二人で行う。")];
    let banned = vec!["鍵は店長が保管する。".to_string()];
    let (messages, stats) = quiz_generation_messages(Level::Intermediate, 1, Some("レジ"), &citations, &banned);

    let user = &messages[1].content;
    assert!(user.contains("中級"));
    assert!(user.contains("トピック: レジ"));
    assert!(user.contains("1. [manual.txt (p.3)]\nレジ締めは閉店後に二人で行う。"));
    assert!(user.contains("- 鍵は店長が保管する。"));
    assert_eq!(stats.llm_input_citations_count, 1);
    assert_eq!(stats.banned_statements_count, 1);
    assert_eq!(stats.llm_input_total_quote_chars, 15);

    let fix = quiz_json_fix_messages(Level::Intermediate, 1, None, &citations, "json_parse_error: x");
    assert!(fix[1].content.contains("json_parse_error: x"));
    assert!(fix[1].content.contains("レジ締めは閉店後に二人で行う。"));
}

// ---- selector ----

#[test]
fn test_selector_prefers_level_vocabulary() {
    let basic = "基本ルールとして、受付の手順を定義する。";
    let advanced = "例外的な場合の判断基準と禁止事項に注意する。";
    assert!(score_chunk(basic, Level::Beginner) > score_chunk(advanced, Level::Beginner));
    assert!(score_chunk(advanced, Level::Advanced) > score_chunk(basic, Level::Advanced));
}

// ---- pool ----

#[tokio::test]
async fn test_pool_groups_and_caps_by_source() {
    let mut chunks = manual_chunks("manual.txt", 5);
    chunks.extend(manual_chunks("guide.txt", 2));
    let store = seeded_store(&chunks).await;

    let pool = ChunkPool::new(store, 3, 2);
    let built = pool.get().await;
    assert_eq!(built.len(), 2);
    assert_eq!(ids_for_source(&built, "manual.txt").len(), 3);
    assert_eq!(ids_for_source(&built, "guide.txt").len(), 2);
    assert!(ids_for_source(&built, "missing.txt").is_empty());

    let again = pool.get().await;
    assert!(Arc::ptr_eq(&built, &again), "pool is built once");
    let rebuilt = pool.rebuild().await;
    assert!(!Arc::ptr_eq(&built, &rebuilt));
}

#[tokio::test]
async fn test_pool_read_failure_is_not_cached() {
    let store = seeded_store(&manual_chunks("manual.txt", 3)).await;
    store.fail_reads(true);
    let pool = ChunkPool::new(Arc::clone(&store), 10, 10);
    assert!(pool.get().await.is_empty());

    store.fail_reads(false);
    let built = pool.get().await;
    assert_eq!(ids_for_source(&built, "manual.txt").len(), 3);
}

#[test]
fn test_sample_multi_source_splits_evenly() {
    let mut pool = SourcePool::new();
    pool.insert("a.txt".to_string(), (0..10).collect());
    pool.insert("b.txt".to_string(), (100..110).collect());
    let mut rng = StdRng::seed_from_u64(7);

    let sources = vec!["a.txt".to_string(), "b.txt".to_string()];
    let sampled = sample_multi_source(&pool, Some(&sources), 5, &mut rng);
    assert_eq!(sampled.len(), 5);
    assert_eq!(sampled.iter().filter(|id| **id < 100).count(), 3);
    assert_eq!(sampled.iter().collect::<HashSet<_>>().len(), 5);

    let unknown = vec!["c.txt".to_string()];
    assert!(sample_multi_source(&pool, Some(&unknown), 5, &mut rng).is_empty());

    let all = sample_multi_source(&pool, None, 100, &mut rng);
    assert_eq!(all.len(), 20);
}

// ---- sampling ----

fn sampler(store: Arc<MockChunkStore>) -> SamplingRetriever<MockChunkStore> {
    let config = QuizConfig::default();
    let pool = Arc::new(ChunkPool::from_config(store, &config));
    SamplingRetriever::new(pool, config)
}

#[tokio::test]
async fn test_sampling_requires_exactly_one_source() {
    let sampler = sampler(seeded_store(&manual_chunks("manual.txt", 3)).await);

    assert!(matches!(
        sampler.retrieve(&[], Level::Beginner, 5).await,
        Err(QuizError::SourceRequired)
    ));
    let two = vec!["manual.txt".to_string(), "guide.txt".to_string()];
    assert!(matches!(
        sampler.retrieve(&two, Level::Beginner, 5).await,
        Err(QuizError::MultipleSources { count: 2 })
    ));
    let missing = vec!["missing.txt".to_string()];
    assert!(matches!(
        sampler.retrieve(&missing, Level::Beginner, 5).await,
        Err(QuizError::SourceNotFound { .. })
    ));
}

#[tokio::test]
async fn test_sampling_empty_pool() {
    let store = Arc::new(MockChunkStore::new());
    let sampler = sampler(store);
    let source = vec!["manual.txt".to_string()];
    assert!(matches!(
        sampler.retrieve(&source, Level::Beginner, 5).await,
        Err(QuizError::PoolEmpty)
    ));
}

#[tokio::test]
async fn test_sampling_collects_unique_citations_from_one_source() {
    let mut chunks = manual_chunks("manual.txt", 20);
    chunks.extend(manual_chunks("guide.txt", 20));
    let sampler = sampler(seeded_store(&chunks).await);

    let source = vec!["manual.txt".to_string()];
    let outcome = sampler.retrieve(&source, Level::Beginner, 5).await.unwrap();

    assert_eq!(outcome.citations.len(), 10);
    assert!(outcome.citations.iter().all(|c| c.source == "manual.txt"));
    let keys: HashSet<_> = outcome.citations.iter().map(Citation::key).collect();
    assert_eq!(keys.len(), outcome.citations.len());

    let debug = outcome.debug;
    assert_eq!(debug.quiz_pool_sources, vec!["manual.txt".to_string()]);
    assert_eq!(debug.quiz_pool_size, 20);
    assert_eq!(debug.quiz_sample_n, 30);
    assert_eq!(debug.quiz_final_citations_count, 10);
    assert_eq!(debug.quiz_sources_unique, vec!["manual.txt".to_string()]);
    assert_eq!(debug.quiz_retrieval_retry_count, 0);
    assert_eq!(debug.quiz_level_rules, "beginner_keywords");
}

#[tokio::test]
async fn test_sampling_retries_when_short() {
    let sampler = sampler(seeded_store(&manual_chunks("manual.txt", 3)).await);
    let source = vec!["manual.txt".to_string()];
    let outcome = sampler.retrieve(&source, Level::Beginner, 5).await.unwrap();
    assert_eq!(outcome.citations.len(), 3);
    assert_eq!(outcome.debug.quiz_retrieval_retry_count, 2);
    assert_eq!(outcome.debug.quiz_sample_n, 120);
}

// ---- generation call ----

fn request<'a>(citations: &'a [Citation], banned: &'a [String]) -> GenerationRequest<'a> {
    GenerationRequest {
        level: Level::Beginner,
        count: 1,
        topic: None,
        citations,
        banned,
    }
}

#[tokio::test]
async fn test_generation_parses_first_reply() {
    let client = MockChatClient::scripted([Ok(quiz_json("レジ締めは閉店後に二人で行う。"))]);
    let citations = [cite("レジ締めは閉店後に二人で行う。")];
    let call = generate_quizzes(&client, request(&citations, &[])).await;

    assert_eq!(call.items.unwrap().len(), 1);
    assert!(call.attempt_errors.is_empty());
    assert_eq!(client.call_count(), 1);
    assert!(call.prompt_stats.llm_output_chars > 0);
}

#[tokio::test]
async fn test_generation_repairs_unparseable_output_once() {
    let client = MockChatClient::scripted([
        Ok("申し訳ありません、JSONを出力できません".to_string()),
        Ok(quiz_json("レジ締めは閉店後に二人で行う。")),
    ]);
    let citations = [cite("レジ締めは閉店後に二人で行う。")];
    let call = generate_quizzes(&client, request(&citations, &[])).await;

    assert_eq!(call.items.unwrap().len(), 1);
    assert_eq!(client.call_count(), 2);
    assert_eq!(call.attempt_errors.len(), 2);
    assert_eq!(call.attempt_errors[0].stage, AttemptStage::Parse);
    assert_eq!(call.attempt_errors[0].kind, "json_extraction_error");
    assert!(call.attempt_errors[0].raw_excerpt.is_some());
    assert_eq!(call.attempt_errors[1].stage, AttemptStage::ParseFix);
    assert_eq!(call.attempt_errors[1].kind, "success");
    assert_eq!(call.attempt_errors[1].message, "JSON修復成功: 1件生成");
}

#[tokio::test]
async fn test_generation_gives_up_after_failed_repair() {
    let client = MockChatClient::scripted([Ok("{broken".to_string()), Ok("still broken".to_string())]);
    let citations = [cite("q")];
    let call = generate_quizzes(&client, request(&citations, &[])).await;

    let err = call.items.unwrap_err();
    assert_eq!(err.kind(), "json_fix_failed");
    assert_eq!(client.call_count(), 2);
    assert_eq!(call.attempt_errors[1].kind, "json_extraction_error");
}

#[tokio::test]
async fn test_generation_does_not_repair_zero_items() {
    let client = MockChatClient::scripted([Ok(r#"{"quizzes": []}"#.to_string())]);
    let citations = [cite("q")];
    let call = generate_quizzes(&client, request(&citations, &[])).await;

    assert_eq!(
        call.items.unwrap_err(),
        GenerationError::ParseFailed {
            reason: "generated_zero_quizzes".to_string()
        }
    );
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn test_generation_llm_failures() {
    let client = MockChatClient::scripted([Err(LlmError::Timeout { timeout_secs: 30 })]);
    let citations = [cite("q")];
    let call = generate_quizzes(&client, request(&citations, &[])).await;
    assert_eq!(call.items.unwrap_err().kind(), "timeout");
    assert_eq!(call.attempt_errors[0].stage, AttemptStage::Llm);
    assert_eq!(call.attempt_errors[0].kind, "timeout");

    let client = MockChatClient::scripted([Ok("garbage".to_string()), Err(LlmError::internal("boom"))]);
    let call = generate_quizzes(&client, request(&citations, &[])).await;
    assert_eq!(call.items.unwrap_err().kind(), "llm_internal_error");
    assert_eq!(call.attempt_errors[1].kind, "llm_error");
}

// ---- batch validation ----

#[test]
fn test_validate_and_process_builds_false_counterpart() {
    let batch = validate_and_process(vec![true_item(
        "レジ締めは閉店後に二人で行う。",
        "レジ締めは閉店後に二人で行う。",
    )]);

    assert_eq!(batch.pairs.len(), 1);
    let pair = &batch.pairs[0];
    let false_item = pair.false_item.as_ref().unwrap();
    assert!(!false_item.answer_bool);
    assert_ne!(false_item.statement, pair.true_item.statement);
    assert_ne!(false_item.id, pair.true_item.id);
    assert!(false_item.explanation.starts_with("この文は誤りです。正しくは「レジ締めは閉店後に二人で行う。」です。"));

    let accepted = batch.accepted();
    assert_eq!(accepted.len(), 2);
    assert!(accepted[0].answer_bool);
    assert!(!accepted[1].answer_bool);
    assert_eq!(batch.stats.generated_true_count, 1);
    assert_eq!(batch.stats.mutator_false_generated_count, 1);
    assert_eq!(batch.stats.false_source_stats.mutator, 1);
    assert!(batch.stats.sample_mutation_log.is_some());
}

#[test]
fn test_validate_and_process_ignores_llm_false_statement() {
    let raw = serde_json::json!({
        "quizzes": [{
            "statement": "受付番号3の書類は本部で保管する。",
            "answer_bool": true,
            "false_statement": "LLMが作った誤りの文章である。",
            "citations": [{"source": "manual.txt", "page": 1, "quote": "受付番号3の書類は本部で保管する。"}]
        }]
    })
    .to_string();
    let items = parse_quiz_output(&raw, &[], 0).unwrap();
    let batch = validate_and_process(items);

    let false_item = batch.pairs[0].false_item.as_ref().unwrap();
    assert_eq!(false_item.statement, mutate("受付番号3の書類は本部で保管する。"));
    assert_ne!(false_item.statement, "LLMが作った誤りの文章である。");
    assert_eq!(batch.stats.mutator_false_generated_count, 1);
}

#[test]
fn test_validate_and_process_rejections() {
    let batch = validate_and_process(vec![
        true_item("店内では喫煙をしない決まりである。", "喫煙"),
        true_item("短い。", "短い。"),
        true_item("これは安全のための決まりです。", "安全のための決まり。"),
    ]);

    let reasons: Vec<&str> = batch.rejected.iter().map(|r| r.reason.as_str()).collect();
    assert_eq!(
        reasons,
        vec!["llm_negative_phrase", "true:too_short:3chars", "false_generation_failed"]
    );
    assert_eq!(batch.stats.llm_negative_rejected_count, 1);
    assert_eq!(batch.stats.false_source_stats.none, 1);
    assert_eq!(batch.stats.dropped_reasons.get("true:too_short:3chars"), Some(&1));

    // The true item without a counterpart is still accepted.
    assert_eq!(batch.pairs.len(), 1);
    assert!(batch.pairs[0].false_item.is_none());
}

#[test]
fn test_stats_merge_sums() {
    let mut a = GenerationStats::default();
    a.record_drop("duplicate_statement");
    a.generated_true_count = 2;
    let mut b = GenerationStats::default();
    b.record_drop("duplicate_statement");
    b.generated_true_count = 1;
    b.false_source_stats.fallback = 1;
    a.merge(&b);
    assert_eq!(a.generated_true_count, 3);
    assert_eq!(a.dropped_reasons.get("duplicate_statement"), Some(&2));
    assert_eq!(a.false_source_stats.fallback, 1);
}

// ---- store ----

#[test]
fn test_store_save_get_judge_clear() {
    let store = QuizStore::new();
    let item = true_item("レジ締めは閉店後に二人で行う。", "レジ締めは閉店後に二人で行う。");
    let id = store.save(item.clone());
    assert_eq!(store.get(&id), Some(item));

    let judged = store.judge(&id, false).unwrap();
    assert!(!judged.is_correct);
    assert!(judged.correct_answer);
    assert_eq!(judged.citations.len(), 1);
    assert!(store.judge(&id, true).unwrap().is_correct);
    assert!(store.judge("missing", true).is_none());

    let set_id = store.save_set(&[true_item("一件目の正しいクイズです。", "q")]).unwrap();
    let document: serde_json::Value = serde_json::from_str(&store.get_set(&set_id).unwrap()).unwrap();
    assert_eq!(document[0]["type"], "true_false");

    store.clear();
    assert!(store.get(&id).is_none());
    assert!(store.get_set(&set_id).is_none());
}

// ---- citation matcher ----

async fn matcher(store: Arc<MockChunkStore>, chunks: Vec<Chunk>) -> CitationMatcher<MockChunkStore> {
    let retriever = crate::retrieval::HybridRetriever::new(
        store,
        Arc::new(E5Embedder::stub()),
        Arc::new(crate::embedding::Reranker::stub()),
        Arc::new(crate::search::KeywordIndex::new(chunks, 2)),
        crate::config::RetrievalConfig::default(),
    );
    CitationMatcher::new(Arc::new(retriever))
}

#[tokio::test]
async fn test_matcher_finds_filtered_citations() {
    let mut chunks = manual_chunks("manual.txt", 6);
    chunks.extend(manual_chunks("guide.txt", 6));
    let matcher = matcher(seeded_store(&chunks).await, chunks).await;
    let filter = crate::corpus::SourceFilter::from_sources(["guide.txt"]);

    let citations = matcher
        .citations_for("受付番号1の書類は本部で保管する。", filter.as_ref())
        .await;

    assert!(!citations.is_empty());
    assert!(citations.len() <= citation_matcher::MATCHED_CITATIONS);
    assert!(citations.iter().all(|c| c.source == "guide.txt"));
}

#[tokio::test]
async fn test_matcher_returns_nothing_on_blank_or_failure() {
    let chunks = manual_chunks("manual.txt", 3);
    let store = seeded_store(&chunks).await;
    let matcher = matcher(Arc::clone(&store), chunks).await;

    assert!(matcher.citations_for("  ", None).await.is_empty());

    store.fail_reads(true);
    assert!(matcher.citations_for("受付番号1の書類", None).await.is_empty());
}
