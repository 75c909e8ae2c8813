//! Language taxonomy and extension-based detection.
//!
//! Kept free of any parser machinery; extractors map a [`Language`] to their
//! own scanners. Unknown extensions fall back to [`Language::Other`] and are
//! carried through the pipeline without parsing.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Languages the extractor set understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Python,
    JavaScript,
    TypeScript,
    Sql,
    Other,
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Language::Java => "java",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Sql => "sql",
            Language::Other => "other",
        })
    }
}

impl Language {
    /// Best-effort detection by file extension.
    ///
    /// The mapping is intentionally conservative; anything unrecognized is
    /// `Other` rather than a guess.
    pub fn from_extension(ext: &str) -> Self {
        let e = ext.to_ascii_lowercase();
        match e.as_str() {
            "java" | "kt" | "kts" => Self::Java,
            "py" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "tsx" => Self::TypeScript,
            "sql" => Self::Sql,
            _ => Self::Other,
        }
    }

    /// Detection from a repo-relative path.
    pub fn from_path(path: &str) -> Self {
        match path.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Self::Other,
        }
    }

    /// Whether the extractor set has a scanner for this language.
    pub fn is_parsable(&self) -> bool {
        !matches!(self, Language::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_extensions() {
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("TS"), Language::TypeScript);
        assert_eq!(Language::from_extension("kt"), Language::Java);
        assert_eq!(Language::from_extension("sql"), Language::Sql);
    }

    #[test]
    fn unknown_extension_is_other() {
        assert_eq!(Language::from_extension("lock"), Language::Other);
        assert_eq!(Language::from_path("Makefile"), Language::Other);
        assert!(!Language::Other.is_parsable());
    }
}
