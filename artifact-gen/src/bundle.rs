//! The per-commit artifact bundle.
//!
//! Paths inside a bundle are relative to the commit prefix in the object
//! store; the names below are external contracts.

use drift_analyzer::readers::DocSet;
use std::collections::BTreeMap;

/// Mandatory filename, consumed verbatim by the delivery agent as PR body.
pub const SUMMARY_PATH: &str = "summaries/summary.md";
pub const README_PATH: &str = "docs/README.generated.md";
pub const API_REFERENCE_PATH: &str = "docs/api/api-reference.md";
pub const ARCHITECTURE_PATH: &str = "docs/architecture/overview.md";
pub const IMPACT_REPORT_PATH: &str = "impact_report.json";

/// Files written for one commit, keyed by relative path.
///
/// A `BTreeMap` keeps iteration order stable, which keeps uploads and
/// digests deterministic.
#[derive(Debug, Clone, Default)]
pub struct DocumentBundle {
    files: BTreeMap<String, Vec<u8>>,
}

impl DocumentBundle {
    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn summary(&self) -> Option<&[u8]> {
        self.get(SUMMARY_PATH)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Decoded view for drift analysis.
    pub fn as_docset(&self) -> DocSet {
        DocSet::from_bytes(&self.files)
    }
}

impl FromIterator<(String, Vec<u8>)> for DocumentBundle {
    fn from_iter<T: IntoIterator<Item = (String, Vec<u8>)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}
