use super::*;
use std::path::PathBuf;

#[test]
fn test_config_default() {
    let config = RerankerConfig::default();

    assert!(config.model_dir.is_none());
    assert_eq!(config.max_seq_len, MAX_SEQ_LEN);
}

#[test]
fn test_config_new() {
    let config = RerankerConfig::new("/models/japanese-reranker").with_max_seq_len(256);
    assert!(!config.is_stub());
    assert_eq!(config.max_seq_len, 256);

    assert_eq!(
        config.model_dir,
        Some(PathBuf::from("/models/japanese-reranker"))
    );
}

#[test]
fn test_config_validate() {
    assert!(RerankerConfig::default().validate().is_ok());

    let invalid = RerankerConfig {
        max_seq_len: 0,
        ..Default::default()
    };
    assert!(matches!(
        invalid.validate(),
        Err(RerankerError::InvalidConfig { .. })
    ));

    let empty_path = RerankerConfig::new("");
    assert!(empty_path.validate().is_err());
}

#[test]
fn test_stub_creation() {
    let reranker = Reranker::load(RerankerConfig::stub()).unwrap();
    assert!(!reranker.is_model_loaded());
    assert!(!Reranker::stub().is_model_loaded());
}

#[test]
fn test_load_with_missing_model() {
    let result = Reranker::load(RerankerConfig::new("/nonexistent/path/reranker"));

    assert!(matches!(
        result.unwrap_err(),
        RerankerError::ModelLoadFailed { .. }
    ));
}

#[test]
fn test_stub_prefers_overlapping_passage() {
    let reranker = Reranker::stub();
    let scores = reranker
        .score_batch(
            "消火器の使用手順",
            &[
                "消火器の使用手順は、ピンを抜き、ホースを火元に向け、レバーを握る。",
                "経費精算は月末までに申請する。",
            ],
        )
        .unwrap();

    assert_eq!(scores.len(), 2);
    assert!(scores[0] > scores[1]);
    assert!(scores[0] > 0.0);
    assert!(scores[1] < 0.0);
}

#[test]
fn test_stub_score_range() {
    let reranker = Reranker::stub();
    let exact = reranker.score("避難経路", "避難経路").unwrap();
    let none = reranker.score("避難経路", "請求書").unwrap();

    assert!((exact - 6.0).abs() < 1e-4);
    assert!((none - (-4.0)).abs() < 1e-4);
    assert_eq!(reranker.score("", "なにか").unwrap(), -4.0);
}

#[test]
fn test_score_batch_empty() {
    let reranker = Reranker::stub();
    assert!(reranker.score_batch("query", &[]).unwrap().is_empty());
}
