use serde::Serialize;

/// Normalized article record, the only article shape that exists past the
/// provider boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub text: String,
    pub language: String,
    /// Publication time, whole epoch seconds.
    pub date_epoch_secs: i64,
    pub sentiment: f64,
    pub site_name: String,
    pub publisher_region: Option<String>,
    pub author: Option<String>,
    pub page_url: String,
    /// Category names that cleared the confidence threshold.
    pub categories: Vec<String>,
    pub tags: Vec<ArticleTag>,
    pub chunks: Vec<ArticleChunk>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleTag {
    pub name: String,
    pub sentiment: f64,
    /// Coarse type from the tag's taxonomy path, e.g. "Organization".
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleChunk {
    /// `{article_id}-{seq}`, the chunk's stable upsert key.
    pub id: String,
    pub seq: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

// Plan/result envelope types
#[derive(Serialize)]
pub struct ImportPlan {
    pub query: Option<String>,
    pub tag: Option<String>,
    pub size: usize,
    pub offset: usize,
    pub window: usize,
    pub overlap: usize,
    pub max_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    /// Articles upserted into the graph.
    pub imported: usize,
    /// Malformed provider records dropped from the batch.
    pub skipped: usize,
    /// Chunks embedded and attached across the batch.
    pub chunks: usize,
}
