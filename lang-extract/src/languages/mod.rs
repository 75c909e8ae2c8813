//! Language-specific scanners.
//!
//! One module per language family. Each exposes `extract(text) -> FileFeatures`
//! and keeps its regexes private; the rest of the pipeline never re-parses
//! source text.

pub mod java;
pub mod javascript;
pub mod python;
pub mod sql;
pub mod typescript;
