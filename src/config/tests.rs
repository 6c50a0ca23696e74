use super::*;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_quizrag_env() {
    let keys: Vec<String> = env::vars()
        .map(|(k, _)| k)
        .filter(|k| k.starts_with("QUIZRAG_"))
        .collect();
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for key in keys {
        unsafe { env::remove_var(key) };
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.qdrant_url, "http://localhost:6334");
    assert_eq!(config.collection, "manual_chunks");
    assert!(config.embedder_path.is_none());
    assert!(config.reranker_path.is_none());
    assert_eq!(config.llm_timeout_secs, 30);
    assert_eq!(config.retrieval.rrf_k, 20.0);
    assert_eq!(config.retrieval.candidate_min_k, 20);
    assert_eq!(config.retrieval.candidate_max_k, 60);
    assert_eq!(config.quiz.max_consecutive_duplicates, 5);
    assert_eq!(config.quiz.banned_statements_cap, 30);
}

#[test]
fn test_default_config_validates() {
    Config::default().validate().expect("defaults should be valid");
}

#[test]
fn test_session_budget_is_twice_timeout() {
    let config = Config {
        llm_timeout_secs: 7,
        ..Default::default()
    };
    assert_eq!(config.session_budget(), std::time::Duration::from_secs(14));
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_quizrag_env();

    let config = Config::from_env().expect("should parse with defaults");

    assert_eq!(config.qdrant_url, DEFAULT_QDRANT_URL);
    assert_eq!(config.retrieval, RetrievalConfig::default());
    assert_eq!(config.quiz, QuizConfig::default());
}

#[test]
#[serial]
fn test_from_env_overrides_retrieval() {
    clear_quizrag_env();

    with_env_vars(
        &[
            ("QUIZRAG_CANDIDATE_RATIO", "0.01"),
            ("QUIZRAG_RERANK_SCORE_THRESHOLD", "-1.5"),
            ("QUIZRAG_RERANK_ENABLED", "false"),
            ("QUIZRAG_TOP_K", "3"),
        ],
        || {
            let config = Config::from_env().expect("should parse");
            assert_eq!(config.retrieval.candidate_ratio, 0.01);
            assert_eq!(config.retrieval.rerank_score_threshold, -1.5);
            assert!(!config.retrieval.rerank_enabled);
            assert_eq!(config.retrieval.top_k, 3);
        },
    );
}

#[test]
#[serial]
fn test_from_env_quiz_model_follows_llm_model() {
    clear_quizrag_env();

    with_env_vars(&[("QUIZRAG_LLM_MODEL", "llama3.1:8b")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.llm_model, "llama3.1:8b");
        assert_eq!(config.llm_quiz_model, "llama3.1:8b");
    });
}

#[test]
#[serial]
fn test_from_env_invalid_number() {
    clear_quizrag_env();

    with_env_vars(&[("QUIZRAG_TOP_K", "five")], || {
        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidNumber {
                name: "QUIZRAG_TOP_K",
                ..
            })
        ));
    });
}

#[test]
#[serial]
fn test_from_env_invalid_bool() {
    clear_quizrag_env();

    with_env_vars(&[("QUIZRAG_RERANK_ENABLED", "maybe")], || {
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidBool { .. })
        ));
    });
}

#[test]
#[serial]
fn test_from_env_invalid_device() {
    clear_quizrag_env();

    with_env_vars(&[("QUIZRAG_DEVICE", "tpu")], || {
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidDevice { .. })
        ));
    });
}

#[test]
#[serial]
fn test_from_env_blank_path_is_none() {
    clear_quizrag_env();

    with_env_vars(&[("QUIZRAG_EMBEDDER_PATH", "   ")], || {
        let config = Config::from_env().expect("should parse");
        assert!(config.embedder_path.is_none());
    });
}

#[test]
fn test_validate_missing_model_dir() {
    let config = Config {
        reranker_path: Some(PathBuf::from("/nonexistent/reranker")),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::PathNotFound { .. })
    ));
}

#[test]
fn test_validate_model_path_must_be_dir() {
    let file = tempfile::NamedTempFile::new().expect("temp file");
    let config = Config {
        embedder_path: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::NotADirectory { .. })
    ));
}

#[test]
fn test_validate_inverted_candidate_bounds() {
    let config = Config {
        retrieval: RetrievalConfig {
            candidate_min_k: 80,
            candidate_max_k: 60,
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvertedBounds {
            min_name: "candidate_min_k",
            ..
        })
    ));
}

#[test]
fn test_validate_zero_quiz_attempts() {
    let config = Config {
        quiz: QuizConfig {
            max_attempts: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OutOfRange {
            name: "quiz_max_attempts",
            ..
        })
    ));
}
