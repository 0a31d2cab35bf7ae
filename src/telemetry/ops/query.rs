use tracing::info_span;
use tracing::Span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Query;

#[derive(Copy, Clone, Debug)]
pub enum Phase {
    EmbedQuery,
    Search,
    Output,
}

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::EmbedQuery => "embed_query",
            Phase::Search => "search",
            Phase::Output => "output",
        }
    }
    fn span(&self) -> Span {
        match self {
            Phase::EmbedQuery => info_span!("embed_query"),
            Phase::Search => info_span!("search"),
            Phase::Output => info_span!("output"),
        }
    }
}

impl OpMarker for Query {
    const NAME: &'static str = "query";
    type Phase = Phase;
    fn root_span() -> Span {
        info_span!("query")
    }
}
