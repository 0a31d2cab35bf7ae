use super::Statement;

pub const VECTOR_INDEX: &str = "news_vector";
pub const FULLTEXT_INDEX: &str = "news_fulltext";
pub const ENTITY_INDEX: &str = "entity";

/// Embedding dimensionality of the deployed configuration.
pub const EMBEDDING_DIM: usize = 1536;

/// Index DDL for the news graph. Each statement is idempotent and must run
/// auto-committed: Neo4j rejects schema commands inside explicit transactions.
pub fn index_statements(dimensions: usize) -> Vec<Statement> {
    vec![
        Statement::new(format!(
            "CREATE FULLTEXT INDEX {ENTITY_INDEX} IF NOT EXISTS FOR (n:Tag) ON EACH [n.name]"
        )),
        Statement::new(format!(
            "CREATE FULLTEXT INDEX {FULLTEXT_INDEX} IF NOT EXISTS FOR (n:Chunk) ON EACH [n.text]"
        )),
        Statement::new(format!(
            "CREATE VECTOR INDEX {VECTOR_INDEX} IF NOT EXISTS \
             FOR (n:Chunk) ON (n.embedding) \
             OPTIONS {{indexConfig: {{ \
             `vector.dimensions`: {dimensions}, \
             `vector.similarity_function`: 'cosine' \
             }}}}"
        )),
    ]
}
