pub mod config;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod model;

pub use graph::CitationGraph;
pub use model::{CacheRecord, Edge, EdgeKind, Identifier, Paper, PaperFilter};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .try_init();
}

pub fn init_tracing_json() {
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .try_init();
}
