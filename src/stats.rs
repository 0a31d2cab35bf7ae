use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::graph::{decode_row, GraphStore, Statement};
use crate::telemetry::ops::stats::Phase as StatsPhase;
use crate::telemetry::{self};

const ARTICLE_SUMMARY: &str = "\
MATCH (a:Article)
RETURN count(*) AS articles,
       sum(CASE WHEN a.sentiment > 0.5 THEN 1 ELSE 0 END) AS positive,
       sum(CASE WHEN a.sentiment >= -0.5 AND a.sentiment <= 0.5 THEN 1 ELSE 0 END) AS neutral,
       sum(CASE WHEN a.sentiment < -0.5 THEN 1 ELSE 0 END) AS negative,
       sum(CASE WHEN a.processed IS NULL THEN 1 ELSE 0 END) AS unprocessed";

const GRAPH_COUNTS: &str = "\
OPTIONAL MATCH (c:Chunk)
WITH count(c) AS chunks
OPTIONAL MATCH (s:Site)
WITH chunks, count(s) AS sites
OPTIONAL MATCH (t:Tag) WHERE t.type = 'Organization' AND t.processed IS NULL
RETURN chunks, sites, count(t) AS unprocessed_tags";

const TAG_TYPES: &str = "\
MATCH (t:Tag)
RETURN t.type AS label, count(*) AS count
ORDER BY count DESC, label
LIMIT $limit";

#[derive(Args, Debug)]
pub struct StatsCmd {
    /// Number of tag types to list
    #[arg(long, default_value_t = 7)]
    pub top_types: i64,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ArticleSummary {
    pub articles: i64,
    pub positive: i64,
    pub neutral: i64,
    pub negative: i64,
    pub unprocessed: i64,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GraphCounts {
    pub chunks: i64,
    pub sites: i64,
    pub unprocessed_tags: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TagTypeCount {
    pub label: Option<String>,
    pub count: i64,
}

#[derive(Serialize)]
pub struct StatsSummary {
    pub article: ArticleSummary,
    pub graph: GraphCounts,
    pub tag_types: Vec<TagTypeCount>,
}

pub async fn run(graph: &dyn GraphStore, args: StatsCmd) -> Result<()> {
    let log = telemetry::stats();
    let _s = log.span(&StatsPhase::Collect).entered();

    let summary = collect(graph, args.top_types).await?;

    log.info(format!(
        "📰 Articles: total={} unprocessed={}",
        summary.article.articles, summary.article.unprocessed
    ));
    log.info(format!(
        "   Sentiment: positive={} neutral={} negative={}",
        summary.article.positive, summary.article.neutral, summary.article.negative
    ));
    log.info(format!(
        "🧩 Chunks: {}   🌐 Sites: {}",
        summary.graph.chunks, summary.graph.sites
    ));
    log.info(format!(
        "   Unprocessed organizations: {}",
        summary.graph.unprocessed_tags
    ));
    log.info("🏷️  Tag types:");
    for row in &summary.tag_types {
        log.info(format!(
            "  {:24} {}",
            row.label.as_deref().unwrap_or("(untyped)"),
            row.count
        ));
    }

    if telemetry::config::json_mode() {
        log.result(&summary)?;
    }
    Ok(())
}

pub async fn collect(
    graph: &dyn GraphStore,
    top_types: i64,
) -> Result<StatsSummary, PipelineError> {
    let article = graph
        .fetch_rows(Statement::new(ARTICLE_SUMMARY))
        .await?
        .into_iter()
        .next()
        .map(decode_row::<ArticleSummary>)
        .transpose()?
        .unwrap_or_default();

    let counts = graph
        .fetch_rows(Statement::new(GRAPH_COUNTS))
        .await?
        .into_iter()
        .next()
        .map(decode_row::<GraphCounts>)
        .transpose()?
        .unwrap_or_default();

    let tag_types = graph
        .fetch_rows(Statement::new(TAG_TYPES).param("limit", top_types))
        .await?
        .into_iter()
        .map(decode_row::<TagTypeCount>)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StatsSummary {
        article,
        graph: counts,
        tag_types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RecordingStore;
    use serde_json::json;

    #[tokio::test]
    async fn collect_shapes_all_three_queries() {
        let store = RecordingStore::new();
        store.push_rows(vec![json!({
            "articles": 42, "positive": 10, "neutral": 25, "negative": 7, "unprocessed": 3
        })]);
        store.push_rows(vec![json!({"chunks": 120, "sites": 9, "unprocessed_tags": 4})]);
        store.push_rows(vec![
            json!({"label": "Organization", "count": 30}),
            json!({"label": null, "count": 2}),
        ]);

        let summary = collect(&store, 7).await.unwrap();
        assert_eq!(summary.article.articles, 42);
        assert_eq!(summary.article.negative, 7);
        assert_eq!(summary.graph.chunks, 120);
        assert_eq!(summary.tag_types.len(), 2);
        assert_eq!(summary.tag_types[0].label.as_deref(), Some("Organization"));
        assert!(summary.tag_types[1].label.is_none());
    }

    #[tokio::test]
    async fn empty_graph_yields_zeroed_summary() {
        let store = RecordingStore::new();
        let summary = collect(&store, 7).await.unwrap();
        assert_eq!(summary.article.articles, 0);
        assert_eq!(summary.graph.sites, 0);
        assert!(summary.tag_types.is_empty());
    }
}
