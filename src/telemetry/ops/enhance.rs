use tracing::info_span;
use tracing::Span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Enhance;

#[derive(Copy, Clone, Debug)]
pub enum Phase {
    Select,
    Fetch,
    Store,
}

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Select => "select",
            Phase::Fetch => "fetch",
            Phase::Store => "store",
        }
    }
    fn span(&self) -> Span {
        match self {
            Phase::Select => info_span!("select"),
            Phase::Fetch => info_span!("fetch"),
            Phase::Store => info_span!("store"),
        }
    }
}

impl OpMarker for Enhance {
    const NAME: &'static str = "enhance";
    type Phase = Phase;
    fn root_span() -> Span {
        info_span!("enhance")
    }
}
