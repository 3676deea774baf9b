pub mod cancel;
pub mod error;
pub mod expand;

pub use cancel::CancelHandle;
pub use error::BuildError;
pub use expand::{
    BuilderConfig, Expansion, ExpansionStats, GraphBuilder, UnresolvedNode, UnresolvedReason,
};
