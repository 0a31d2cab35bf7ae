use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::embedding::{Embedder, EmbeddingConfig, OpenAiEmbedder};
use crate::error::PipelineError;
use crate::graph::{decode_row, schema, GraphStore, Statement};
use crate::telemetry::ops::query::Phase as QueryPhase;
use crate::telemetry::{self};

#[derive(Args, Debug)]
pub struct QueryCmd {
    /// Natural-language search text
    pub text: String,
    #[arg(long, default_value_t = 6)]
    pub topk: i64,
    /// Print the matched chunk text under each hit
    #[arg(long, default_value_t = false)]
    pub show_text: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QueryHit {
    pub chunk_id: String,
    pub article_id: String,
    pub title: Option<String>,
    pub score: f64,
    pub text: Option<String>,
}

pub async fn run(graph: &dyn GraphStore, args: QueryCmd) -> Result<()> {
    let log = telemetry::query();
    let _g = log
        .root_span_kv([
            ("topk", args.topk.to_string()),
            ("show_text", args.show_text.to_string()),
        ])
        .entered();

    let embedder = OpenAiEmbedder::new(EmbeddingConfig::from_env())?;
    let qvec = {
        let _s = log.span(&QueryPhase::EmbedQuery).entered();
        embedder.embed_query(&args.text).await?
    };

    let hits = {
        let _s = log.span(&QueryPhase::Search).entered();
        similar_chunks(graph, &qvec, args.topk.max(1)).await?
    };

    let _out = log.span(&QueryPhase::Output).entered();
    if hits.is_empty() {
        log.info("ℹ️  No results");
        return Ok(());
    }

    if telemetry::config::json_mode() {
        log.result(&hits)?;
    } else {
        log.info("🔍 Results:");
        for (rank, hit) in hits.iter().enumerate() {
            log.info(format!(
                "#{}  score={:.4}  chunk={} article={}  {:?}",
                rank + 1,
                hit.score,
                hit.chunk_id,
                hit.article_id,
                hit.title
            ));
            if args.show_text {
                if let Some(text) = &hit.text {
                    log.info(format!("  {}", text.replace('\n', " ")));
                }
            }
        }
    }

    Ok(())
}

/// Nearest chunks by cosine similarity, joined back to their owning article.
pub async fn similar_chunks(
    graph: &dyn GraphStore,
    embedding: &[f32],
    topk: i64,
) -> Result<Vec<QueryHit>, PipelineError> {
    let statement = Statement::new(format!(
        "CALL db.index.vector.queryNodes('{}', $k, $embedding)\n\
         YIELD node, score\n\
         MATCH (a:Article)-[:HAS_CHUNK]->(node)\n\
         RETURN node.id AS chunk_id, node.text AS text, a.id AS article_id,\n\
                a.title AS title, score\n\
         ORDER BY score DESC",
        schema::VECTOR_INDEX
    ))
    .param("k", topk)
    .param("embedding", embedding);

    graph
        .fetch_rows(statement)
        .await?
        .into_iter()
        .map(decode_row::<QueryHit>)
        .collect()
}
