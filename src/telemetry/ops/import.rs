use tracing::info_span;
use tracing::Span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Import;

#[derive(Copy, Clone, Debug)]
pub enum Phase {
    Fetch,
    Normalize,
    Embed,
    Upsert,
}

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Fetch => "fetch",
            Phase::Normalize => "normalize",
            Phase::Embed => "embed",
            Phase::Upsert => "upsert",
        }
    }
    fn span(&self) -> Span {
        match self {
            Phase::Fetch => info_span!("fetch"),
            Phase::Normalize => info_span!("normalize"),
            Phase::Embed => info_span!("embed"),
            Phase::Upsert => info_span!("upsert"),
        }
    }
}

impl OpMarker for Import {
    const NAME: &'static str = "import";
    type Phase = Phase;
    fn root_span() -> Span {
        info_span!("import")
    }
}
