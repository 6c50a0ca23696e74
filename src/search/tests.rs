use super::*;
use crate::search::ngram::{SUBSTRING_BONUS, normalize};
use crate::search::stopwords::{is_stopword, remove_stopwords};

fn chunk(source: &str, idx: u32, text: &str) -> Chunk {
    Chunk::new(source, None, idx, text)
}

fn sample_index() -> KeywordIndex {
    KeywordIndex::new(
        vec![
            chunk("manual.txt", 0, "強盗が発生した場合は警察に通報する。"),
            chunk("manual.txt", 1, "通報の手順を確認する。"),
            chunk("manual.txt", 2, "レジの締め作業。"),
            chunk("other.txt", 0, "万引きを見つけたら対応する。"),
        ],
        DEFAULT_KEYWORD_MIN_SCORE,
    )
}

#[test]
fn test_token_scoring_orders_hits() {
    let index = sample_index();
    let hits = index.search("強盗 通報", 10, None).unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.chunk_index, 0);
    assert_eq!(hits[0].score, 7);
    assert_eq!(hits[1].chunk.chunk_index, 1);
    assert_eq!(hits[1].score, 5);
}

#[test]
fn test_whole_query_bonus() {
    let index = sample_index();
    let hits = index.search("レジの締め作業", 10, None).unwrap();

    // whole query +5, token +2, coverage +3, trigram +1
    assert_eq!(hits[0].score, 11);
    assert_eq!(hits[0].chunk.chunk_index, 2);
}

#[test]
fn test_k_truncates() {
    let index = sample_index();
    let hits = index.search("強盗 通報", 1, None).unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_falls_back_to_bigrams() {
    let index = sample_index();
    let hits = index.search("万引き対応", 10, None).unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.source, "other.txt");
    assert_eq!(hits[0].score, 3);
}

#[test]
fn test_bigram_fallback_dedups_same_snippet() {
    let index = KeywordIndex::new(
        vec![
            chunk("a.txt", 0, "万引きを見つけたら対応する。"),
            chunk("a.txt", 1, "万引きを見つけたら対応する。"),
            chunk("b.txt", 0, "万引きを見つけたら対応する。"),
        ],
        DEFAULT_KEYWORD_MIN_SCORE,
    );
    let hits = index.search("万引き対応", 10, None).unwrap();

    assert_eq!(hits.len(), 2);
    assert_ne!(hits[0].chunk.source, hits[1].chunk.source);
}

#[test]
fn test_empty_query_returns_nothing() {
    let index = sample_index();
    assert!(index.search("   ", 10, None).unwrap().is_empty());
}

#[test]
fn test_source_filter_applies_before_scoring() {
    let index = sample_index();
    let filter = SourceFilter::from_sources(["other.txt"]).unwrap();
    let hits = index.search("強盗 通報", 10, Some(&filter)).unwrap();
    assert!(hits.iter().all(|h| h.chunk.source == "other.txt"));
}

#[test]
fn test_replace_swaps_chunks() {
    let index = sample_index();
    assert_eq!(index.len(), 4);
    index.replace(vec![chunk("x.txt", 0, "入替後の本文")]);
    assert_eq!(index.len(), 1);
    assert!(index.search("強盗 通報", 10, None).unwrap().is_empty());
}

#[test]
fn test_from_jsonl() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"source":"m.txt","page":0,"chunk_index":0,"text":"強盗対応の基本"}}"#).unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"source":"m.txt","page":2,"chunk_index":1,"text":"閉店作業"}}"#).unwrap();

    let index = KeywordIndex::from_jsonl(file.path(), 2).unwrap();
    assert_eq!(index.len(), 2);
}

#[test]
fn test_from_jsonl_missing_file() {
    let result = KeywordIndex::from_jsonl("/nonexistent/corpus.jsonl", 2);
    assert!(matches!(result, Err(SearchError::Corpus(_))));
}

#[test]
fn test_stopwords() {
    assert!(is_stopword("です"));
    assert!(is_stopword("The"));
    assert!(!is_stopword("強盗"));
    assert_eq!(
        remove_stopwords(["強盗", "は", "どう", "したら", "いい"]),
        vec!["強盗"]
    );
}

#[test]
fn test_ngram_normalize() {
    assert_eq!(normalize("  A\r\n B\u{3000}\u{3000}C  "), "a b c");
}

#[test]
fn test_ngram_score() {
    assert_eq!(ngram::score("対応", "万引き対応マニュアル"), 1 + SUBSTRING_BONUS);
    assert_eq!(ngram::score("強盗", "レジ締め"), 0);
    assert_eq!(ngram::score("万引き 対応", "万引きを見つけたら対応する"), 3);
}
