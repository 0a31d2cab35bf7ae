use anyhow::{Context, Result};
use clap::Args;
use tracing::span::EnteredSpan;

use crate::chunk::{
    TokenChunker, DEFAULT_MAX_WINDOWS, DEFAULT_OVERLAP_TOKENS, DEFAULT_WINDOW_TOKENS,
};
use crate::embedding::{Embedder, EmbeddingConfig, OpenAiEmbedder};
use crate::error::PipelineError;
use crate::graph::GraphStore;
use crate::provider::{ArticleSearch, SearchClient, SearchConfig, SearchRequest};
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::import::{Import as ImportOp, Phase as ImportPhase};
use crate::telemetry::{self};

pub mod normalize;
pub mod types;
pub mod upsert;

use normalize::{attach_embeddings, chunk_texts, normalize_batch};
use types::{ImportOutcome, ImportPlan};

#[derive(Args)]
pub struct ImportCmd {
    /// Free-text filter for the content search
    #[arg(long)]
    pub query: Option<String>,
    /// Tag-label filter for the content search
    #[arg(long)]
    pub tag: Option<String>,
    #[arg(long, default_value_t = 5)]
    pub size: usize,
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
    #[arg(long, default_value_t = DEFAULT_WINDOW_TOKENS)]
    pub window: usize,
    #[arg(long, default_value_t = DEFAULT_OVERLAP_TOKENS)]
    pub overlap: usize,
    /// Chunk windows kept per article
    #[arg(long, default_value_t = DEFAULT_MAX_WINDOWS)]
    pub max_chunks: usize,
    #[arg(long, default_value_t = false)]
    pub apply: bool,
}

pub async fn run(store: &dyn GraphStore, args: ImportCmd) -> Result<()> {
    let log = telemetry::import();
    let _g = log
        .root_span_kv([
            ("apply", args.apply.to_string()),
            ("query", format!("{:?}", args.query)),
            ("tag", format!("{:?}", args.tag)),
            ("size", args.size.to_string()),
            ("offset", args.offset.to_string()),
        ])
        .entered();

    let request = SearchRequest {
        query: args.query.clone(),
        tag: args.tag.clone(),
        size: args.size.max(1),
        offset: args.offset,
    };
    // fail fast, before any client is even constructed
    validate(&request)?;

    if !args.apply {
        if telemetry::config::json_mode() {
            let plan = ImportPlan {
                query: request.query.clone(),
                tag: request.tag.clone(),
                size: request.size,
                offset: request.offset,
                window: args.window,
                overlap: args.overlap,
                max_chunks: args.max_chunks,
            };
            log.plan(&plan)?;
        } else {
            log.info(format!(
                "📝 Import plan — query={:?} tag={:?} size={} offset={} window={} overlap={} max_chunks={}",
                request.query, request.tag, request.size, request.offset,
                args.window, args.overlap, args.max_chunks
            ));
            log.info("   Use --apply to execute.");
        }
        return Ok(());
    }

    let chunker = TokenChunker::new(args.window, args.overlap, args.max_chunks)
        .context("init token chunker")?;
    let search = SearchClient::new(SearchConfig::from_env())?;
    let embedder = OpenAiEmbedder::new(EmbeddingConfig::from_env())?;

    let outcome = run_import(&search, &embedder, store, &chunker, &request, Some(&log)).await?;

    log.totals(outcome.imported, outcome.skipped, outcome.chunks);
    if telemetry::config::json_mode() {
        log.result(&outcome)?;
    }
    Ok(())
}

/// The ingestion pipeline proper: fetch → normalize → embed → upsert, one
/// synchronous pass, first error aborts. Concurrent invocations over
/// overlapping articles are safe only because every write is an upsert by
/// stable key.
pub async fn run_import(
    search: &dyn ArticleSearch,
    embedder: &dyn Embedder,
    store: &dyn GraphStore,
    chunker: &TokenChunker,
    request: &SearchRequest,
    log: Option<&LogCtx<ImportOp>>,
) -> Result<ImportOutcome, PipelineError> {
    validate(request)?;

    let batch = {
        let _s = enter_span(log, &ImportPhase::Fetch);
        search.search(request).await?
    };
    if let Some(ctx) = log {
        ctx.info(format!("Articles fetched: {}", batch.data.len()));
    }

    let mut normalized = {
        let _s = enter_span(log, &ImportPhase::Normalize);
        normalize_batch(chunker, &batch)?
    };

    let texts = chunk_texts(&normalized.articles);
    let embeddings = if texts.is_empty() {
        Vec::new()
    } else {
        // one batched call per import, never one per chunk
        let _s = enter_span(log, &ImportPhase::Embed);
        embedder.embed_documents(&texts).await?
    };
    attach_embeddings(&mut normalized.articles, embeddings)?;

    let imported = if normalized.articles.is_empty() {
        0
    } else {
        let _s = enter_span(log, &ImportPhase::Upsert);
        upsert::upsert_batch(store, &normalized.articles).await?
    };

    Ok(ImportOutcome {
        imported,
        skipped: normalized.skipped,
        chunks: texts.len(),
    })
}

fn validate(request: &SearchRequest) -> Result<(), PipelineError> {
    let has_query = request.query.as_deref().is_some_and(|q| !q.is_empty());
    let has_tag = request.tag.as_deref().is_some_and(|t| !t.is_empty());
    if !has_query && !has_tag {
        return Err(PipelineError::InvalidRequest(
            "either `query` or `tag` must be provided".into(),
        ));
    }
    Ok(())
}

fn enter_span(log: Option<&LogCtx<ImportOp>>, phase: &ImportPhase) -> Option<EnteredSpan> {
    log.map(|ctx| ctx.span(phase).entered())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedder;
    use crate::error::ErrorKind;
    use crate::graph::{ParamValue, RecordingStore};
    use crate::provider::{ArticleBatch, ArticleHit, MockSearch, RawArticle, RawDate};

    fn chunker() -> TokenChunker {
        TokenChunker::new(DEFAULT_WINDOW_TOKENS, DEFAULT_OVERLAP_TOKENS, 5).unwrap()
    }

    fn small_chunker() -> TokenChunker {
        // tiny windows so a short fixture text produces several chunks
        TokenChunker::new(4, 1, 5).unwrap()
    }

    fn raw(id: &str, text: &str) -> RawArticle {
        RawArticle {
            id: Some(id.to_string()),
            title: Some(format!("title {id}")),
            text: Some(text.to_string()),
            language: Some("en".to_string()),
            date: Some(RawDate {
                timestamp: 1_700_000_000_000,
            }),
            site_name: Some("Example News".to_string()),
            page_url: Some(format!("https://example.com/{id}")),
            ..Default::default()
        }
    }

    fn fixture_batch() -> ArticleBatch {
        ArticleBatch {
            data: vec![
                ArticleHit {
                    entity: raw("art-1", "one two three four five six seven eight nine ten"),
                },
                ArticleHit {
                    entity: raw("art-2", ""),
                },
            ],
            hits: Some(2),
        }
    }

    fn request() -> SearchRequest {
        SearchRequest {
            query: Some("Nvidia".into()),
            tag: None,
            size: 5,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn missing_query_and_tag_fails_without_any_calls() {
        let search = MockSearch::new();
        let embedder = MockEmbedder::new(4);
        let store = RecordingStore::new();

        let err = run_import(
            &search,
            &embedder,
            &store,
            &chunker(),
            &SearchRequest {
                size: 5,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(search.calls().is_empty());
        assert!(embedder.calls().is_empty());
        assert!(store.batches().is_empty());
    }

    #[tokio::test]
    async fn query_only_request_is_accepted() {
        let search = MockSearch::new();
        search.push_batch(Ok(ArticleBatch::default()));
        let embedder = MockEmbedder::new(4);
        let store = RecordingStore::new();

        let outcome = run_import(&search, &embedder, &store, &chunker(), &request(), None)
            .await
            .unwrap();
        assert_eq!(outcome.imported, 0);
        assert_eq!(search.calls().len(), 1);
    }

    #[tokio::test]
    async fn end_to_end_batches_once_per_stage() {
        let search = MockSearch::new();
        search.push_batch(Ok(fixture_batch()));
        let embedder = MockEmbedder::new(4);
        let store = RecordingStore::new();
        let chunker = small_chunker();

        let outcome = run_import(&search, &embedder, &store, &chunker, &request(), None)
            .await
            .unwrap();

        // two articles imported, one of them chunkless
        assert_eq!(outcome.imported, 2);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.chunks, 3);

        // exactly one batched embedding call covering all three chunk texts
        let embed_calls = embedder.calls();
        assert_eq!(embed_calls.len(), 1);
        assert_eq!(embed_calls[0].len(), 3);

        // exactly one batched write: 2 article statements + 3 chunk statements
        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 5);
    }

    #[tokio::test]
    async fn chunk_embeddings_stay_aligned_with_their_text() {
        let search = MockSearch::new();
        search.push_batch(Ok(fixture_batch()));
        let embedder = MockEmbedder::new(4);
        let store = RecordingStore::new();
        let chunker = small_chunker();

        run_import(&search, &embedder, &store, &chunker, &request(), None)
            .await
            .unwrap();

        let batches = store.batches();
        for stmt in &batches[0] {
            if !stmt.text.contains("setNodeVectorProperty") {
                continue;
            }
            let Some(ParamValue::Str(text)) = stmt.param_value("text") else {
                panic!("chunk statement without text param");
            };
            let Some(ParamValue::FloatList(vector)) = stmt.param_value("embedding") else {
                panic!("chunk statement without embedding param");
            };
            let expected: Vec<f64> = embedder
                .vector_for(text)
                .into_iter()
                .map(|x| x as f64)
                .collect();
            assert_eq!(vector, &expected);
        }
    }

    #[tokio::test]
    async fn provider_failure_aborts_before_embedding() {
        let search = MockSearch::new();
        search.push_batch(Err(PipelineError::Timeout {
            service: "content-search",
        }));
        let embedder = MockEmbedder::new(4);
        let store = RecordingStore::new();

        let err = run_import(&search, &embedder, &store, &chunker(), &request(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert!(embedder.calls().is_empty());
        assert!(store.batches().is_empty());
    }

    #[tokio::test]
    async fn rerunning_the_same_fixture_writes_identical_batches() {
        let chunker = small_chunker();
        let embedder = MockEmbedder::new(4);
        let store = RecordingStore::new();

        for _ in 0..2 {
            let search = MockSearch::new();
            search.push_batch(Ok(fixture_batch()));
            run_import(&search, &embedder, &store, &chunker, &request(), None)
                .await
                .unwrap();
        }

        let batches = store.batches();
        assert_eq!(batches.len(), 2);
        // same keys, same statements: the store's MERGE semantics make the
        // second run a no-op instead of a duplicate
        assert_eq!(batches[0], batches[1]);
    }
}
