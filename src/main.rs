//! quizrag command-line entrypoint.
//!
//! ```text
//! quizrag index <corpus.jsonl>
//! quizrag ask <question> [--source S]
//! quizrag quiz <level> [--count N] [--source S] [--topic T]
//! quizrag single <level> [--source S] [--topic T] [--answer true|false]
//! ```

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, bail};
use mimalloc::MiMalloc;

use quizrag::config::Config;
use quizrag::corpus::{Chunk, SourceFilter, load_jsonl};
use quizrag::embedding::{E5Config, E5Embedder, EmbedRole, Reranker, RerankerConfig, TextEmbedder};
use quizrag::llm::{ChatClient, GenaiChatClient};
use quizrag::quiz::{
    ChunkPool, Level, Orchestrator, QuizRequest, QuizService, QuizStore, SamplingRetriever,
};
use quizrag::retrieval::HybridRetriever;
use quizrag::search::KeywordIndex;
use quizrag::vectordb::{ChunkStore, QdrantChunkStore};
use quizrag::Answerer;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const USAGE: &str = "usage:
  quizrag index <corpus.jsonl>
  quizrag ask <question> [--source S]
  quizrag quiz <level> [--count N] [--source S] [--topic T]
  quizrag single <level> [--source S] [--topic T] [--answer true|false]";

/// Chunks embedded per upsert batch.
const INDEX_BATCH_SIZE: usize = 64;

const DEFAULT_QUIZ_COUNT: usize = 5;

#[derive(Debug)]
enum Command {
    Index {
        corpus: String,
    },
    Ask {
        question: String,
        source: Option<String>,
    },
    Quiz {
        level: Level,
        count: usize,
        source: Option<String>,
        topic: Option<String>,
    },
    Single {
        level: Level,
        source: Option<String>,
        topic: Option<String>,
        answer: Option<bool>,
    },
}

impl Command {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            bail!("missing command\n{USAGE}");
        };
        let (positional, options) = split_options(rest)?;
        let Some(first) = positional.first().cloned() else {
            bail!("missing argument for `{name}`\n{USAGE}");
        };

        match name.as_str() {
            "index" => Ok(Self::Index { corpus: first }),
            "ask" => Ok(Self::Ask {
                question: positional.join(" "),
                source: option(&options, "--source"),
            }),
            "quiz" => {
                let level = Level::from_str(&first).map_err(|e| anyhow::anyhow!("{e}"))?;
                let count = match option(&options, "--count") {
                    Some(raw) => raw
                        .parse()
                        .with_context(|| format!("invalid --count `{raw}`"))?,
                    None => DEFAULT_QUIZ_COUNT,
                };
                Ok(Self::Quiz {
                    level,
                    count,
                    source: option(&options, "--source"),
                    topic: option(&options, "--topic"),
                })
            }
            "single" => {
                let level = Level::from_str(&first).map_err(|e| anyhow::anyhow!("{e}"))?;
                let answer = match option(&options, "--answer") {
                    Some(raw) => Some(
                        raw.parse()
                            .with_context(|| format!("invalid --answer `{raw}`"))?,
                    ),
                    None => None,
                };
                Ok(Self::Single {
                    level,
                    source: option(&options, "--source"),
                    topic: option(&options, "--topic"),
                    answer,
                })
            }
            other => bail!("unknown command `{other}`\n{USAGE}"),
        }
    }
}

type Options = Vec<(String, String)>;

fn split_options(args: &[String]) -> anyhow::Result<(Vec<String>, Options)> {
    let mut positional = Vec::new();
    let mut options = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            let Some(value) = iter.next() else {
                bail!("missing value for `{arg}`");
            };
            options.push((arg.clone(), value.clone()));
        } else {
            positional.push(arg.clone());
        }
    }
    Ok((positional, options))
}

fn option(options: &Options, name: &str) -> Option<String> {
    options
        .iter()
        .rev()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!(
        qdrant_url = %config.qdrant_url,
        collection = %config.collection,
        "quizrag starting"
    );

    let embedder_config = match &config.embedder_path {
        Some(path) => E5Config::new(path.clone()).with_device(config.device),
        None => {
            tracing::warn!("No QUIZRAG_EMBEDDER_PATH configured, running embedder in stub mode");
            E5Config::stub()
        }
    };
    let embedder = Arc::new(E5Embedder::load(embedder_config)?);
    let store = Arc::new(QdrantChunkStore::new(&config.qdrant_url, &config.collection)?);

    match command {
        Command::Index { corpus } => index(&config, store, embedder, &corpus).await,
        Command::Ask { question, source } => {
            let retriever = build_retriever(&config, store, embedder).await?;
            let client: Arc<dyn ChatClient> = Arc::new(GenaiChatClient::from_config(&config));
            let answerer = Answerer::new(retriever, client);
            let filter = source.as_deref().and_then(|s| SourceFilter::from_sources([s]));
            let response = answerer.ask(&question, filter.as_ref(), true).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Quiz {
            level,
            count,
            source,
            topic,
        } => {
            let service = build_quiz_service(&config, store, embedder).await?;
            let request = quiz_request(level, count, source, topic);
            let response = service.generate(&request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Single {
            level,
            source,
            topic,
            answer,
        } => {
            let service = build_quiz_service(&config, store, embedder).await?;
            let request = quiz_request(level, 1, source, topic);
            let Some(single) = service.generate_single(&request).await else {
                bail!("no quiz could be generated");
            };
            let judged = answer.and_then(|a| service.judge(&single.quiz_id, a));
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "quiz": single,
                    "judge": judged,
                }))?
            );
            Ok(())
        }
    }
}

fn quiz_request(level: Level, count: usize, source: Option<String>, topic: Option<String>) -> QuizRequest {
    let mut request = QuizRequest::new(level, count);
    if let Some(source) = source {
        request = request.with_source(source);
    }
    if let Some(topic) = topic {
        request = request.with_topic(topic);
    }
    request
}

async fn build_quiz_service(
    config: &Config,
    store: Arc<QdrantChunkStore>,
    embedder: Arc<E5Embedder>,
) -> anyhow::Result<QuizService<QdrantChunkStore>> {
    let retriever = build_retriever(config, Arc::clone(&store), embedder).await?;
    let client: Arc<dyn ChatClient> = Arc::new(GenaiChatClient::from_config(config));
    let pool = Arc::new(ChunkPool::from_config(store, &config.quiz));
    let sampler = SamplingRetriever::new(pool, config.quiz.clone());
    let orchestrator = Orchestrator::new(client, config.quiz.clone(), config.session_budget());
    Ok(QuizService::new(
        sampler,
        retriever,
        orchestrator,
        Arc::new(QuizStore::new()),
    ))
}

async fn index(
    config: &Config,
    store: Arc<QdrantChunkStore>,
    embedder: Arc<E5Embedder>,
    corpus: &str,
) -> anyhow::Result<()> {
    let chunks = load_jsonl(corpus)?;
    tracing::info!(chunks = chunks.len(), corpus, "Corpus loaded");

    store.ensure_collection(embedder.dimension() as u64).await?;
    for batch in chunks.chunks(INDEX_BATCH_SIZE) {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts, EmbedRole::Passage)?;
        store.upsert(batch, vectors).await?;
    }

    let count = store.count().await?;
    tracing::info!(indexed = chunks.len(), collection_count = count, "Index complete");
    println!(
        "{}",
        serde_json::json!({
            "collection": config.collection,
            "indexed": chunks.len(),
            "collection_count": count,
        })
    );
    Ok(())
}

async fn build_retriever(
    config: &Config,
    store: Arc<QdrantChunkStore>,
    embedder: Arc<E5Embedder>,
) -> anyhow::Result<Arc<HybridRetriever<QdrantChunkStore>>> {
    let reranker_config = match &config.reranker_path {
        Some(path) => RerankerConfig::new(path.clone()).with_device(config.device),
        None => {
            tracing::warn!("No QUIZRAG_RERANKER_PATH configured, running reranker in stub mode");
            RerankerConfig::stub()
        }
    };
    let reranker = Arc::new(Reranker::load(reranker_config)?);

    let chunks = stored_chunks(store.as_ref(), config.quiz.pool_batch_size).await?;
    let keyword = Arc::new(KeywordIndex::new(chunks, config.retrieval.keyword_min_score));

    Ok(Arc::new(HybridRetriever::new(
        store,
        embedder,
        reranker,
        keyword,
        config.retrieval.clone(),
    )))
}

/// Every chunk in the collection, for the in-process keyword index.
async fn stored_chunks<S: ChunkStore>(store: &S, page_size: usize) -> anyhow::Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let mut offset = None;
    loop {
        let page = store
            .scroll(offset, page_size.max(1))
            .await
            .context("failed to scroll chunk collection")?;
        chunks.extend(page.chunks.into_iter().map(|stored| stored.chunk));
        match page.next_offset {
            Some(next) => offset = Some(next),
            None => break,
        }
    }
    tracing::info!(chunks = chunks.len(), "Keyword index loaded from collection");
    Ok(chunks)
}
