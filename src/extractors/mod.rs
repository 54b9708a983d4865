// src/extractors/mod.rs
pub mod cascade;
pub mod fallback;
pub mod fixed_width;
pub mod heuristic;
pub mod markup;
pub mod normalize;
pub mod row;
pub mod strict;

// Re-export key extraction types for convenience
pub use cascade::{AttemptRecord, Cascade};
pub use fallback::OpenAiFallback;
pub use row::InfoTableRow;
