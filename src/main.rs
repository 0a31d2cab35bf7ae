use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

mod chunk;
mod embedding;
mod enhance;
mod error;
mod graph;
mod import;
mod init;
mod provider;
mod query;
mod stats;
mod telemetry;

use graph::{GraphConfig, Neo4jStore};

#[derive(Parser)]
#[command(name = "newsgraph", about = "News knowledge-graph ingestion CLI")]
struct Cli {
    /// Bolt URI for the graph store (overrides NEO4J_URI)
    #[arg(global = true, long)]
    uri: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ensure fulltext and vector indexes exist
    Init(init::InitCmd),
    /// Fetch, normalize, embed and upsert a batch of articles
    Import(import::ImportCmd),
    /// Enrich organization tags from the knowledge API
    Enhance(enhance::EnhanceCmd),
    /// Graph-wide counts and sentiment buckets
    Stats(stats::StatsCmd),
    /// Vector-similarity search over article chunks
    Query(query::QueryCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);
    telemetry::config::init_tracing();

    let mut graph_cfg = GraphConfig::from_env();
    if let Some(uri) = cli.uri {
        graph_cfg.uri = uri;
    }
    let store = Neo4jStore::connect(&graph_cfg).await?;

    match cli.command {
        Commands::Init(args) => init::run(&store, args).await?,
        Commands::Import(args) => import::run(&store, args).await?,
        Commands::Enhance(args) => enhance::run(&store, args).await?,
        Commands::Stats(args) => stats::run(&store, args).await?,
        Commands::Query(args) => query::run(&store, args).await?,
    }

    Ok(())
}
