//! Per-language feature extractors.
//!
//! Each language module exposes `extract(text) -> FileFeatures` built from
//! line-anchored regex scanners. Extraction is error-tolerant by contract:
//! a garbled file never aborts the pipeline, it flags `syntax_error` and
//! keeps whatever was recovered. Given identical input bytes the output is
//! byte-identical.

pub mod languages;
pub mod scan;

use impact_report::{FileFeatures, Language};
use tracing::debug;

/// Result of extracting one file.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub features: FileFeatures,
    pub syntax_error: bool,
}

/// Run the extractor for `language` over `text`.
///
/// `Language::Other` yields empty features; callers should have filtered
/// binary content beforehand.
pub fn extract(language: Language, text: &str, path: &str) -> Extracted {
    let features = match language {
        Language::Java => languages::java::extract(text),
        Language::Python => languages::python::extract(text),
        Language::JavaScript => languages::javascript::extract(text),
        Language::TypeScript => languages::typescript::extract(text),
        Language::Sql => languages::sql::extract(text),
        Language::Other => FileFeatures::default(),
    };

    let syntax_error = language.is_parsable() && scan::looks_garbled(language, text);
    if syntax_error {
        debug!(%path, %language, "syntax anomaly, keeping recovered features");
    }

    Extracted {
        features,
        syntax_error,
    }
}
