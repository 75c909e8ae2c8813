//! Impact scoring rules.
//!
//! Severity is decided per file from the feature delta between the parent
//! and target revisions, then rolled up to a repository-level verdict.

use crate::model::{
    AnalysisSummary, ChangeKind, CommitContext, FileChange, FileFeatures, ImpactReport, ReportMeta,
    Severity,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Decide the severity of one file change.
///
/// `old`/`new` are the features extracted at the parent and target revisions;
/// either side may be absent (added/deleted files, binary or unparsable
/// content).
pub fn score_file(
    kind: ChangeKind,
    old: Option<&FileFeatures>,
    new: Option<&FileFeatures>,
    path: &str,
) -> Severity {
    let empty = FileFeatures::default();
    let old = old.unwrap_or(&empty);
    let new = new.unwrap_or(&empty);

    if kind == ChangeKind::Deleted && !old.api_endpoints.is_empty() {
        return Severity::Major;
    }

    if has_route_removal_or_verb_change(old, new)
        || has_public_api_removal(old, new)
        || has_signature_change(old, new)
        || has_schema_column_drop(old, new)
    {
        return Severity::Major;
    }

    if has_new_endpoint(old, new)
        || has_new_public_function(old, new)
        || has_new_schema_column(old, new)
        || (kind == ChangeKind::Added && !is_doc_path(path))
    {
        return Severity::Minor;
    }

    Severity::Patch
}

/// Assemble the full report from scored file changes.
///
/// `generated_at` comes from the pipeline context (commit timestamp domain),
/// never from wall-clock reads inside generation, so re-runs stay identical.
pub fn build_report(
    tool_version: &str,
    generated_at: DateTime<Utc>,
    context: CommitContext,
    mut changes: Vec<FileChange>,
) -> ImpactReport {
    changes.sort_by(|a, b| a.path.cmp(&b.path));

    let highest = changes
        .iter()
        .map(|c| c.severity)
        .max()
        .unwrap_or(Severity::Patch);

    ImpactReport {
        meta: ReportMeta {
            tool_version: tool_version.to_string(),
            generated_at,
        },
        context,
        analysis_summary: AnalysisSummary {
            total_files_changed: changes.len(),
            highest_severity: highest,
            breaking_changes_detected: highest == Severity::Major,
        },
        changes,
    }
}

/// Most impactful files first: severity descending, then path ascending.
pub fn top_files(report: &ImpactReport, limit: usize) -> Vec<&FileChange> {
    let mut files: Vec<&FileChange> = report.changes.iter().collect();
    files.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.path.cmp(&b.path)));
    files.truncate(limit);
    files
}

fn is_doc_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".md")
        || lower.ends_with(".rst")
        || lower.ends_with(".txt")
        || lower.starts_with("docs/")
}

fn has_route_removal_or_verb_change(old: &FileFeatures, new: &FileFeatures) -> bool {
    let new_keys: HashSet<_> = new.api_endpoints.iter().map(|e| e.key()).collect();
    old.api_endpoints.iter().any(|e| !new_keys.contains(&e.key()))
}

fn has_new_endpoint(old: &FileFeatures, new: &FileFeatures) -> bool {
    let old_keys: HashSet<_> = old.api_endpoints.iter().map(|e| e.key()).collect();
    new.api_endpoints.iter().any(|e| !old_keys.contains(&e.key()))
}

fn has_public_api_removal(old: &FileFeatures, new: &FileFeatures) -> bool {
    let new_names: HashSet<&str> = new
        .functions
        .iter()
        .chain(new.methods.iter())
        .map(|s| s.name.as_str())
        .collect();
    old.functions
        .iter()
        .chain(old.methods.iter())
        .filter(|s| s.is_public())
        .any(|s| !new_names.contains(s.name.as_str()))
}

fn has_signature_change(old: &FileFeatures, new: &FileFeatures) -> bool {
    let new_sigs: HashMap<&str, Option<&str>> = new
        .functions
        .iter()
        .chain(new.methods.iter())
        .map(|s| (s.name.as_str(), s.signature.as_deref()))
        .collect();
    old.functions
        .iter()
        .chain(old.methods.iter())
        .filter(|s| s.is_public())
        .any(|s| match (new_sigs.get(s.name.as_str()), s.signature.as_deref()) {
            (Some(Some(new_sig)), Some(old_sig)) => *new_sig != old_sig,
            _ => false,
        })
}

fn has_schema_column_drop(old: &FileFeatures, new: &FileFeatures) -> bool {
    let new_schemas: HashMap<&str, &Vec<String>> = new
        .schemas
        .iter()
        .map(|s| (s.name.as_str(), &s.fields))
        .collect();
    old.schemas.iter().any(|s| {
        match new_schemas.get(s.name.as_str()) {
            // Entity still present: any old column missing counts as a drop/rename.
            Some(fields) => s.fields.iter().any(|f| !fields.contains(f)),
            // Whole entity gone.
            None => true,
        }
    })
}

fn has_new_public_function(old: &FileFeatures, new: &FileFeatures) -> bool {
    let old_names: HashSet<&str> = old
        .functions
        .iter()
        .chain(old.methods.iter())
        .map(|s| s.name.as_str())
        .collect();
    new.functions
        .iter()
        .chain(new.methods.iter())
        .filter(|s| s.is_public())
        .any(|s| !old_names.contains(s.name.as_str()))
}

fn has_new_schema_column(old: &FileFeatures, new: &FileFeatures) -> bool {
    let old_schemas: HashMap<&str, &Vec<String>> = old
        .schemas
        .iter()
        .map(|s| (s.name.as_str(), &s.fields))
        .collect();
    new.schemas.iter().any(|s| match old_schemas.get(s.name.as_str()) {
        Some(fields) => s.fields.iter().any(|f| !fields.contains(f)),
        // Whole entity is new.
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, SchemaDecl, SymbolRef};

    fn features_with_endpoint(verb: &str, route: &str) -> FileFeatures {
        FileFeatures {
            api_endpoints: vec![Endpoint::new(verb, route, 1)],
            ..FileFeatures::default()
        }
    }

    #[test]
    fn added_source_file_is_minor() {
        let new = features_with_endpoint("GET", "/hello");
        let sev = score_file(ChangeKind::Added, None, Some(&new), "src/app.py");
        assert_eq!(sev, Severity::Minor);
    }

    #[test]
    fn added_doc_file_is_patch() {
        let sev = score_file(ChangeKind::Added, None, Some(&FileFeatures::default()), "README.md");
        assert_eq!(sev, Severity::Patch);
    }

    #[test]
    fn endpoint_removal_is_major() {
        let old = features_with_endpoint("GET", "/users");
        let new = FileFeatures::default();
        let sev = score_file(ChangeKind::Modified, Some(&old), Some(&new), "src/routes.js");
        assert_eq!(sev, Severity::Major);
    }

    #[test]
    fn verb_change_is_major() {
        let old = features_with_endpoint("GET", "/users");
        let new = features_with_endpoint("POST", "/users");
        let sev = score_file(ChangeKind::Modified, Some(&old), Some(&new), "src/routes.js");
        assert_eq!(sev, Severity::Major);
    }

    #[test]
    fn deleting_endpoint_file_is_major() {
        let old = features_with_endpoint("GET", "/users");
        let sev = score_file(ChangeKind::Deleted, Some(&old), None, "src/routes.js");
        assert_eq!(sev, Severity::Major);
    }

    #[test]
    fn signature_change_is_major() {
        let old = FileFeatures {
            functions: vec![SymbolRef::with_signature("handler", 3, "def handler(a):")],
            ..FileFeatures::default()
        };
        let new = FileFeatures {
            functions: vec![SymbolRef::with_signature("handler", 3, "def handler(a, b):")],
            ..FileFeatures::default()
        };
        let sev = score_file(ChangeKind::Modified, Some(&old), Some(&new), "src/app.py");
        assert_eq!(sev, Severity::Major);
    }

    #[test]
    fn schema_column_drop_is_major() {
        let old = FileFeatures {
            schemas: vec![SchemaDecl {
                name: "users".into(),
                fields: vec!["id".into(), "email".into()],
                line: 1,
            }],
            ..FileFeatures::default()
        };
        let new = FileFeatures {
            schemas: vec![SchemaDecl {
                name: "users".into(),
                fields: vec!["id".into()],
                line: 1,
            }],
            ..FileFeatures::default()
        };
        let sev = score_file(ChangeKind::Modified, Some(&old), Some(&new), "db/schema.sql");
        assert_eq!(sev, Severity::Major);
    }

    #[test]
    fn body_only_change_is_patch() {
        let same = FileFeatures {
            functions: vec![SymbolRef::with_signature("run", 1, "def run():")],
            ..FileFeatures::default()
        };
        let sev = score_file(ChangeKind::Modified, Some(&same), Some(&same.clone()), "src/app.py");
        assert_eq!(sev, Severity::Patch);
    }

    #[test]
    fn report_rolls_up_highest_severity() {
        let ctx = CommitContext {
            repository: "demo".into(),
            branch: "main".into(),
            commit_sha: "abc1234".into(),
            author: "a".into(),
            commit_message: "m".into(),
            commit_timestamp: Utc::now(),
        };
        let changes = vec![
            FileChange {
                path: "b.py".into(),
                change_kind: ChangeKind::Modified,
                language: crate::Language::Python,
                severity: Severity::Major,
                is_binary: false,
                syntax_error: false,
                features: FileFeatures::default(),
            },
            FileChange {
                path: "a.py".into(),
                change_kind: ChangeKind::Added,
                language: crate::Language::Python,
                severity: Severity::Minor,
                is_binary: false,
                syntax_error: false,
                features: FileFeatures::default(),
            },
        ];
        let report = build_report("0.1.0", Utc::now(), ctx, changes);
        assert_eq!(report.analysis_summary.highest_severity, Severity::Major);
        assert!(report.analysis_summary.breaking_changes_detected);
        // changes are path-sorted
        assert_eq!(report.changes[0].path, "a.py");
        // top files: severity desc, path asc
        let top = top_files(&report, 10);
        assert_eq!(top[0].path, "b.py");
    }
}
