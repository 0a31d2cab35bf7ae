use anyhow::Result;
use clap::Args;

use crate::graph::{schema, GraphStore};
use crate::telemetry::ops::init::Phase as InitPhase;
use crate::telemetry::{self};

#[derive(Args, Debug)]
pub struct InitCmd {
    /// Vector index dimensionality; must match the embedding model
    #[arg(long, default_value_t = schema::EMBEDDING_DIM)]
    pub dimensions: usize,
}

/// Create the fulltext and vector indexes the pipeline relies on. Safe to
/// re-run; every statement is IF NOT EXISTS.
pub async fn run(graph: &dyn GraphStore, args: InitCmd) -> Result<()> {
    let log = telemetry::init();
    let _g = log
        .root_span_kv([("dimensions", args.dimensions.to_string())])
        .entered();

    let statements = schema::index_statements(args.dimensions);
    let count = statements.len();
    for statement in statements {
        let _s = log.span(&InitPhase::Indexes).entered();
        // index DDL cannot run inside an explicit transaction
        graph.execute(statement).await?;
    }

    log.info(format!("✅ Ensured {count} index(es)"));
    Ok(())
}
