pub mod client;
pub mod error;
pub mod export;

pub use analytics::{AnalysisReport, CentralityKind, YearHistogram};
pub use builder::{CancelHandle, Expansion, UnresolvedNode, UnresolvedReason};
pub use citegraph_core::config::AppConfig;
pub use citegraph_core::model::{Identifier, Paper, PaperFilter};
pub use citegraph_core::{init_tracing, init_tracing_json, CitationGraph};
pub use client::CiteGraph;
pub use error::SdkError;
