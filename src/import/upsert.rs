use crate::error::PipelineError;
use crate::graph::{GraphStore, Statement};

use super::types::NewsArticle;

// Upsert keyed by the provider's stable id; scalar attributes are
// last-write-wins on every import. The site's publisher region is set only
// on first creation.
const ARTICLE_UPSERT: &str = "\
MERGE (a:Article {id: $id})
SET a.sentiment = $sentiment,
    a.title = $title,
    a.text = $text,
    a.language = $language,
    a.pageUrl = $page_url,
    a.date = datetime({epochSeconds: $date})
MERGE (s:Site {name: $site_name})
ON CREATE SET s.publisherRegion =
    CASE WHEN $publisher_region = '' THEN null ELSE $publisher_region END
MERGE (a)-[:ON_SITE]->(s)
FOREACH (category IN $categories |
  MERGE (c:Category {name: category})
  MERGE (a)-[:IN_CATEGORY]->(c)
)
FOREACH (i IN CASE WHEN $author <> '' THEN [1] ELSE [] END |
  MERGE (au:Author {name: $author})
  MERGE (a)-[:HAS_AUTHOR]->(au)
  MERGE (au)-[:WRITES_FOR]->(s)
)";

// Sentiment lives on the relationship and must be SET after the bare MERGE;
// a sentiment inside the MERGE pattern would mint a second edge on drift.
// The coarse type is fixed at first sight of the tag.
const TAG_UPSERT: &str = "\
MATCH (a:Article {id: $article_id})
MERGE (t:Tag {name: $name})
ON CREATE SET t.type = $kind
MERGE (a)-[r:HAS_TAG]->(t)
SET r.sentiment = $sentiment";

const CHUNK_UPSERT: &str = "\
MATCH (a:Article {id: $article_id})
MERGE (c:Chunk {id: $chunk_id})
SET c.text = $text,
    c.seq = $seq
MERGE (a)-[:HAS_CHUNK]->(c)
WITH c
CALL db.create.setNodeVectorProperty(c, 'embedding', $embedding)";

/// Statements materializing one article: the article/site/category/author
/// upsert, then one statement per tag and per chunk.
pub fn article_statements(article: &NewsArticle) -> Vec<Statement> {
    let mut statements = Vec::with_capacity(1 + article.tags.len() + article.chunks.len());

    statements.push(
        Statement::new(ARTICLE_UPSERT)
            .param("id", article.id.as_str())
            .param("sentiment", article.sentiment)
            .param("title", article.title.as_str())
            .param("text", article.text.as_str())
            .param("language", article.language.as_str())
            .param("page_url", article.page_url.as_str())
            .param("date", article.date_epoch_secs)
            .param("site_name", article.site_name.as_str())
            .param(
                "publisher_region",
                article.publisher_region.clone().unwrap_or_default(),
            )
            .param("categories", article.categories.clone())
            .param("author", article.author.clone().unwrap_or_default()),
    );

    for tag in &article.tags {
        statements.push(
            Statement::new(TAG_UPSERT)
                .param("article_id", article.id.as_str())
                .param("name", tag.name.as_str())
                .param("kind", tag.kind.as_str())
                .param("sentiment", tag.sentiment),
        );
    }

    for chunk in &article.chunks {
        statements.push(
            Statement::new(CHUNK_UPSERT)
                .param("article_id", article.id.as_str())
                .param("chunk_id", chunk.id.as_str())
                .param("text", chunk.text.as_str())
                .param("seq", chunk.seq as i64)
                .param("embedding", chunk.embedding.as_slice()),
        );
    }

    statements
}

pub fn batch_statements(articles: &[NewsArticle]) -> Vec<Statement> {
    articles.iter().flat_map(article_statements).collect()
}

/// Persist the whole batch in a single write transaction.
pub async fn upsert_batch(
    store: &dyn GraphStore,
    articles: &[NewsArticle],
) -> Result<usize, PipelineError> {
    store.execute_batch(batch_statements(articles)).await?;
    Ok(articles.len())
}
