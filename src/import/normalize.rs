use std::collections::HashMap;

use tracing::warn;

use crate::chunk::TokenChunker;
use crate::error::PipelineError;
use crate::provider::{ArticleBatch, RawArticle, RawTag};

use super::types::{ArticleChunk, ArticleTag, NewsArticle};

/// Categories at or below this confidence are dropped (strictly greater
/// than keeps a category).
pub const CATEGORY_THRESHOLD: f64 = 0.50;

/// Coarse type assigned when a tag has no usable taxonomy path.
pub const DEFAULT_TAG_KIND: &str = "Node";

pub struct NormalizedBatch {
    pub articles: Vec<NewsArticle>,
    /// Records dropped for missing their identifier.
    pub skipped: usize,
}

/// Pure transformation of the raw provider batch into article records with
/// their chunk windows. No network, no store access; embeddings are attached
/// afterwards by the caller in one batched call.
pub fn normalize_batch(
    chunker: &TokenChunker,
    batch: &ArticleBatch,
) -> Result<NormalizedBatch, PipelineError> {
    let mut articles = Vec::with_capacity(batch.data.len());
    let mut skipped = 0usize;

    for hit in &batch.data {
        match normalize_article(chunker, &hit.entity)? {
            Some(article) => articles.push(article),
            None => skipped += 1,
        }
    }

    Ok(NormalizedBatch { articles, skipped })
}

fn normalize_article(
    chunker: &TokenChunker,
    raw: &RawArticle,
) -> Result<Option<NewsArticle>, PipelineError> {
    // The external id is the upsert key; without it the record is unusable.
    // Skip-and-log rather than aborting the batch.
    let Some(id) = raw.id.as_deref().filter(|s| !s.is_empty()) else {
        warn!(
            title = raw.title.as_deref().unwrap_or(""),
            "skipping provider record without id"
        );
        return Ok(None);
    };

    // Missing text still yields an Article node, just with zero chunks.
    let text = raw.text.clone().unwrap_or_default();
    let chunks = chunker
        .split_text(&text)?
        .into_iter()
        .enumerate()
        .map(|(i, piece)| ArticleChunk {
            id: format!("{id}-{i}"),
            seq: i,
            text: piece,
            embedding: Vec::new(),
        })
        .collect();

    Ok(Some(NewsArticle {
        id: id.to_string(),
        title: raw.title.clone().unwrap_or_default(),
        text,
        language: raw.language.clone().unwrap_or_default(),
        date_epoch_secs: raw.date.as_ref().map(|d| d.timestamp / 1000).unwrap_or(0),
        sentiment: raw.sentiment.unwrap_or(0.0),
        site_name: raw.site_name.clone().unwrap_or_default(),
        publisher_region: raw.publisher_region.clone(),
        author: raw.author.clone().filter(|a| !a.is_empty()),
        page_url: raw.page_url.clone().unwrap_or_default(),
        categories: raw
            .categories
            .iter()
            .filter(|c| c.score > CATEGORY_THRESHOLD)
            .map(|c| c.name.clone())
            .collect(),
        tags: raw.tags.iter().map(normalize_tag).collect(),
        chunks,
    }))
}

fn normalize_tag(raw: &RawTag) -> ArticleTag {
    ArticleTag {
        name: raw.label.clone(),
        sentiment: raw.sentiment,
        kind: tag_kind(&raw.types),
    }
}

/// Coarse tag type: last path segment of the first taxonomy URI, or the
/// generic label when absent or malformed.
pub fn tag_kind(types: &[String]) -> String {
    types
        .first()
        .and_then(|t| t.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_TAG_KIND.to_string())
}

/// Flatten chunk texts across the batch, in the exact order embeddings are
/// later assigned back.
pub fn chunk_texts(articles: &[NewsArticle]) -> Vec<String> {
    articles
        .iter()
        .flat_map(|a| a.chunks.iter().map(|c| c.text.clone()))
        .collect()
}

/// Assign one embedding per chunk, keyed by chunk id after a positional zip
/// over the same flatten order `chunk_texts` used.
pub fn attach_embeddings(
    articles: &mut [NewsArticle],
    embeddings: Vec<Vec<f32>>,
) -> Result<(), PipelineError> {
    let ids: Vec<String> = articles
        .iter()
        .flat_map(|a| a.chunks.iter().map(|c| c.id.clone()))
        .collect();
    if ids.len() != embeddings.len() {
        return Err(PipelineError::decode(
            "embedding",
            format!("{} chunks but {} embeddings", ids.len(), embeddings.len()),
        ));
    }

    let mut by_id: HashMap<String, Vec<f32>> = ids.into_iter().zip(embeddings).collect();
    for article in articles.iter_mut() {
        for chunk in article.chunks.iter_mut() {
            if let Some(vector) = by_id.remove(&chunk.id) {
                chunk.embedding = vector;
            }
        }
    }
    Ok(())
}
