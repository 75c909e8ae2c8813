//! Impact report data model.
//!
//! Serialized as `impact_report.json` next to every generated bundle; the
//! field names below are an external contract for downstream consumers.

use crate::language::Language;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Per-file change kind, mirroring the underlying git delta.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChangeKind::Added => "ADDED",
            ChangeKind::Modified => "MODIFIED",
            ChangeKind::Deleted => "DELETED",
        })
    }
}

/// Severity ladder for a change. Ordering is significant: `Patch < Minor < Major`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Patch,
    Minor,
    Major,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Patch => "PATCH",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
        })
    }
}

/// A named symbol (class, method, function) with its source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
    pub name: String,
    pub line: usize,
    /// Raw declaration line; used to notice signature changes between revisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl SymbolRef {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            signature: None,
        }
    }

    pub fn with_signature(name: impl Into<String>, line: usize, sig: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            line,
            signature: Some(sig.into()),
        }
    }

    /// Public by naming convention: a leading underscore marks private symbols
    /// in the script languages; everything else is treated as public surface.
    pub fn is_public(&self) -> bool {
        !self.name.starts_with('_')
    }
}

/// A detected HTTP endpoint, normalized across routing idioms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Uppercase HTTP verb (`GET`, `POST`, ...).
    pub verb: String,
    /// Route template as written in the source (`/users/{id}`).
    pub route: String,
    pub line: usize,
}

impl Endpoint {
    pub fn new(verb: impl Into<String>, route: impl Into<String>, line: usize) -> Self {
        Self {
            verb: verb.into().to_ascii_uppercase(),
            route: route.into(),
            line,
        }
    }

    /// Identity used for cross-revision comparison: verb + route.
    pub fn key(&self) -> (String, String) {
        (self.verb.clone(), self.route.clone())
    }
}

/// A schema declaration: ORM entity, SQL table or document-DB schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDecl {
    pub name: String,
    /// Declared fields/columns, in source order.
    pub fields: Vec<String>,
    pub line: usize,
}

/// Everything an extractor recovered from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFeatures {
    pub classes: Vec<SymbolRef>,
    pub methods: Vec<SymbolRef>,
    pub functions: Vec<SymbolRef>,
    pub annotations: Vec<String>,
    pub api_endpoints: Vec<Endpoint>,
    pub schemas: Vec<SchemaDecl>,
}

impl FileFeatures {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.methods.is_empty()
            && self.functions.is_empty()
            && self.annotations.is_empty()
            && self.api_endpoints.is_empty()
            && self.schemas.is_empty()
    }
}

/// One file's record in the impact report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub change_kind: ChangeKind,
    pub language: Language,
    pub severity: Severity,
    pub is_binary: bool,
    pub syntax_error: bool,
    pub features: FileFeatures,
}

/// Tool provenance for a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub tool_version: String,
    pub generated_at: DateTime<Utc>,
}

/// Commit-level context the report was computed against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitContext {
    pub repository: String,
    pub branch: String,
    pub commit_sha: String,
    pub author: String,
    pub commit_message: String,
    pub commit_timestamp: DateTime<Utc>,
}

impl CommitContext {
    /// First 7 hex characters of the commit sha.
    pub fn short_sha(&self) -> &str {
        let end = self.commit_sha.len().min(7);
        &self.commit_sha[..end]
    }
}

/// Rolled-up verdict over all file changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_files_changed: usize,
    pub highest_severity: Severity,
    pub breaking_changes_detected: bool,
}

/// The full report, serialized as `impact_report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub meta: ReportMeta,
    pub context: CommitContext,
    pub analysis_summary: AnalysisSummary,
    pub changes: Vec<FileChange>,
}

impl ImpactReport {
    /// All endpoints visible at the target revision, across files.
    pub fn current_endpoints(&self) -> Vec<&Endpoint> {
        self.changes
            .iter()
            .filter(|c| c.change_kind != ChangeKind::Deleted)
            .flat_map(|c| c.features.api_endpoints.iter())
            .collect()
    }

    /// All schemas visible at the target revision, across files.
    pub fn current_schemas(&self) -> Vec<&SchemaDecl> {
        self.changes
            .iter()
            .filter(|c| c.change_kind != ChangeKind::Deleted)
            .flat_map(|c| c.features.schemas.iter())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_patch_minor_major() {
        assert!(Severity::Patch < Severity::Minor);
        assert!(Severity::Minor < Severity::Major);
        assert_eq!(
            [Severity::Major, Severity::Patch, Severity::Minor]
                .into_iter()
                .max(),
            Some(Severity::Major)
        );
    }

    #[test]
    fn serde_names_are_screaming_snake() {
        let json = serde_json::to_string(&ChangeKind::Added).unwrap();
        assert_eq!(json, "\"ADDED\"");
        let json = serde_json::to_string(&Severity::Major).unwrap();
        assert_eq!(json, "\"MAJOR\"");
    }

    #[test]
    fn endpoint_verb_is_uppercased() {
        let ep = Endpoint::new("get", "/hello", 3);
        assert_eq!(ep.verb, "GET");
        assert_eq!(ep.key(), ("GET".into(), "/hello".into()));
    }

    #[test]
    fn short_sha_truncates_to_seven() {
        let ctx = CommitContext {
            repository: "demo".into(),
            branch: "main".into(),
            commit_sha: "0123456789abcdef".into(),
            author: "a".into(),
            commit_message: "m".into(),
            commit_timestamp: Utc::now(),
        };
        assert_eq!(ctx.short_sha(), "0123456");
    }
}
