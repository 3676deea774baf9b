pub mod citations;

pub use citations::CitationIndex;
