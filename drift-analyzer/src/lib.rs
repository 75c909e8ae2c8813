//! Drift analysis between the freshly generated documentation and the
//! previously stored set for the same project.
//!
//! Stale endpoints and schema mismatches are recovered from the prior
//! bundle's markdown; a project without a prior version yields an empty
//! report, not an error.

pub mod readers;

use impact_report::ImpactReport;
use readers::DocSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use tracing::debug;

/// Issue categories, fixed by contract.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftKind {
    StaleEndpoint,
    SchemaDrift,
    OutdatedSection,
    MissingDoc,
}

impl Display for DriftKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DriftKind::StaleEndpoint => "STALE_ENDPOINT",
            DriftKind::SchemaDrift => "SCHEMA_DRIFT",
            DriftKind::OutdatedSection => "OUTDATED_SECTION",
            DriftKind::MissingDoc => "MISSING_DOC",
        })
    }
}

/// Severity bands: removal is high, field drift medium, missing prose low.
/// Ordering is significant: `High < Medium < Low` so an ascending sort puts
/// the most severe issues first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    High,
    Medium,
    Low,
}

impl Display for DriftSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DriftSeverity::High => "high",
            DriftSeverity::Medium => "medium",
            DriftSeverity::Low => "low",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftIssue {
    pub kind: DriftKind,
    /// The drifted subject: a route, a schema entity or a section heading.
    pub path: String,
    pub severity: DriftSeverity,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftReport {
    pub issues: Vec<DriftIssue>,
}

impl DriftReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Contract ordering: `(severity, description)` ascending.
    pub fn sorted_issues(&self) -> Vec<&DriftIssue> {
        let mut issues: Vec<&DriftIssue> = self.issues.iter().collect();
        issues.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.description.cmp(&b.description))
        });
        issues
    }
}

/// Compare the fresh artifact set against the previous one.
///
/// `fresh` is the newly rendered bundle (pre-drift pass); `previous` the
/// stored bundle for the predecessor commit, when one exists.
pub fn analyze(
    impact: &ImpactReport,
    fresh: &DocSet,
    previous: Option<&DocSet>,
) -> DriftReport {
    let Some(prev) = previous else {
        debug!("no previous version, empty drift report");
        return DriftReport::default();
    };

    let mut issues = Vec::new();

    let current: HashSet<(String, String)> = impact
        .current_endpoints()
        .iter()
        .map(|e| e.key())
        .collect();
    let prior = prev.endpoints();

    // Endpoints documented before but gone now.
    for (verb, route) in &prior {
        if !current.contains(&(verb.clone(), route.clone())) {
            issues.push(DriftIssue {
                kind: DriftKind::StaleEndpoint,
                path: route.clone(),
                severity: DriftSeverity::High,
                description: format!("endpoint {verb} {route} was documented but no longer exists"),
            });
        }
    }

    // Schema entities that lost fields since the prior snapshot.
    let current_schemas = impact.current_schemas();
    for (name, fields) in prev.schemas() {
        let Some(now) = current_schemas.iter().find(|s| s.name == name) else {
            issues.push(DriftIssue {
                kind: DriftKind::SchemaDrift,
                path: name.clone(),
                severity: DriftSeverity::Medium,
                description: format!("schema {name} was documented but no longer exists"),
            });
            continue;
        };
        for field in fields {
            if !now.fields.contains(&field) {
                issues.push(DriftIssue {
                    kind: DriftKind::SchemaDrift,
                    path: name.clone(),
                    severity: DriftSeverity::Medium,
                    description: format!("schema {name} lost field {field}"),
                });
            }
        }
    }

    // README sections that disappeared.
    let fresh_sections: HashSet<String> = fresh.readme_sections().into_iter().collect();
    for section in prev.readme_sections() {
        if !fresh_sections.contains(&section) {
            issues.push(DriftIssue {
                kind: DriftKind::OutdatedSection,
                path: section.clone(),
                severity: DriftSeverity::Low,
                description: format!("README section \"{section}\" is no longer generated"),
            });
        }
    }

    // New endpoints that no fresh artifact mentions.
    let prior_set: HashSet<(String, String)> = prior.into_iter().collect();
    for ep in impact.current_endpoints() {
        if prior_set.contains(&ep.key()) {
            continue;
        }
        if !fresh.mentions(&ep.route) {
            issues.push(DriftIssue {
                kind: DriftKind::MissingDoc,
                path: ep.route.clone(),
                severity: DriftSeverity::Low,
                description: format!("new endpoint {} {} is not documented", ep.verb, ep.route),
            });
        }
    }

    DriftReport { issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impact_report::{
        build_report, ChangeKind, CommitContext, Endpoint, FileChange, FileFeatures, Language,
        Severity,
    };
    use std::collections::BTreeMap;

    fn ctx() -> CommitContext {
        CommitContext {
            repository: "demo".into(),
            branch: "main".into(),
            commit_sha: "abc1234def".into(),
            author: "a".into(),
            commit_message: "m".into(),
            commit_timestamp: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn report_with_endpoints(eps: Vec<Endpoint>) -> ImpactReport {
        let change = FileChange {
            path: "src/routes.js".into(),
            change_kind: ChangeKind::Modified,
            language: Language::JavaScript,
            severity: Severity::Minor,
            is_binary: false,
            syntax_error: false,
            features: FileFeatures {
                api_endpoints: eps,
                ..FileFeatures::default()
            },
        };
        build_report("0.1.0", ctx().commit_timestamp, ctx(), vec![change])
    }

    fn docset(api_body: &str) -> DocSet {
        let mut files = BTreeMap::new();
        files.insert(
            "docs/api/api-reference.md".to_string(),
            api_body.to_string(),
        );
        files.insert(
            "docs/README.generated.md".to_string(),
            "# x\n\n## Overview\n\n## Impact\n".to_string(),
        );
        DocSet::from_texts(files)
    }

    #[test]
    fn no_previous_version_is_empty_not_error() {
        let report = report_with_endpoints(vec![Endpoint::new("GET", "/users", 1)]);
        let fresh = docset("| GET | `/users` |\n");
        let drift = analyze(&report, &fresh, None);
        assert!(drift.is_empty());
    }

    #[test]
    fn removed_endpoint_is_stale_high() {
        let report = report_with_endpoints(vec![]);
        let fresh = docset("");
        let prev = docset("| Method | Path |\n| --- | --- |\n| GET | `/users` |\n");
        let drift = analyze(&report, &fresh, Some(&prev));
        let issue = &drift.issues[0];
        assert_eq!(issue.kind, DriftKind::StaleEndpoint);
        assert_eq!(issue.path, "/users");
        assert_eq!(issue.severity, DriftSeverity::High);
    }

    #[test]
    fn surviving_endpoint_is_not_stale() {
        let report = report_with_endpoints(vec![Endpoint::new("GET", "/users", 1)]);
        let fresh = docset("| GET | `/users` |\n");
        let prev = docset("| Method | Path |\n| --- | --- |\n| GET | `/users` |\n");
        let drift = analyze(&report, &fresh, Some(&prev));
        assert!(drift.is_empty());
    }

    #[test]
    fn issues_sort_by_severity_then_description() {
        let report = DriftReport {
            issues: vec![
                DriftIssue {
                    kind: DriftKind::OutdatedSection,
                    path: "Usage".into(),
                    severity: DriftSeverity::Low,
                    description: "b".into(),
                },
                DriftIssue {
                    kind: DriftKind::StaleEndpoint,
                    path: "/x".into(),
                    severity: DriftSeverity::High,
                    description: "z".into(),
                },
                DriftIssue {
                    kind: DriftKind::StaleEndpoint,
                    path: "/a".into(),
                    severity: DriftSeverity::High,
                    description: "a".into(),
                },
            ],
        };
        let sorted = report.sorted_issues();
        assert_eq!(sorted[0].description, "a");
        assert_eq!(sorted[1].description, "z");
        assert_eq!(sorted[2].description, "b");
    }
}
