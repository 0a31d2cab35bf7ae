pub mod config;
pub mod ctx;
pub mod emit;
pub mod ops;

use ctx::LogCtx;

// Factory helpers, one per operation
pub fn import() -> LogCtx<ops::import::Import> {
    LogCtx {
        json: config::logs_are_json(),
        _marker: std::marker::PhantomData,
    }
}
pub fn enhance() -> LogCtx<ops::enhance::Enhance> {
    LogCtx {
        json: config::logs_are_json(),
        _marker: std::marker::PhantomData,
    }
}
pub fn init() -> LogCtx<ops::init::Init> {
    LogCtx {
        json: config::logs_are_json(),
        _marker: std::marker::PhantomData,
    }
}
pub fn stats() -> LogCtx<ops::stats::Stats> {
    LogCtx {
        json: config::logs_are_json(),
        _marker: std::marker::PhantomData,
    }
}
pub fn query() -> LogCtx<ops::query::Query> {
    LogCtx {
        json: config::logs_are_json(),
        _marker: std::marker::PhantomData,
    }
}
