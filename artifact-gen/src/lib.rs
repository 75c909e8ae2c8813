//! Artifact generation: deterministic documentation rendering.
//!
//! Output is a pure function of (impact report, drift report, template set).
//! The only timestamp in any artifact is the commit timestamp carried by the
//! report context.

pub mod bundle;
pub mod templates;

use drift_analyzer::DriftReport;
use impact_report::{CommitContext, ImpactReport};
use thiserror::Error;
use tracing::instrument;

pub use bundle::{
    API_REFERENCE_PATH, ARCHITECTURE_PATH, DocumentBundle, IMPACT_REPORT_PATH, README_PATH,
    SUMMARY_PATH,
};

/// Version string embedded in report metadata.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub type Result<T> = std::result::Result<T, GenError>;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("report serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Render the full bundle for a commit.
#[instrument(skip_all, fields(commit = %impact.context.short_sha()))]
pub fn generate(impact: &ImpactReport, drift: Option<&DriftReport>) -> Result<DocumentBundle> {
    let mut bundle = DocumentBundle::default();

    bundle.insert(
        SUMMARY_PATH,
        templates::render_summary(impact, drift).into_bytes(),
    );
    bundle.insert(README_PATH, templates::render_readme(impact).into_bytes());
    bundle.insert(
        API_REFERENCE_PATH,
        templates::render_api_reference(impact).into_bytes(),
    );
    bundle.insert(
        ARCHITECTURE_PATH,
        templates::render_architecture(impact).into_bytes(),
    );

    let mut report_json = serde_json::to_vec_pretty(impact)?;
    report_json.push(b'\n');
    bundle.insert(IMPACT_REPORT_PATH, report_json);

    Ok(bundle)
}

/// Bundle used when generation fails: a summary that names the failure.
///
/// The run continues to delivery with this degraded bundle.
pub fn degraded_bundle(ctx: &CommitContext, error: &str) -> DocumentBundle {
    let mut bundle = DocumentBundle::default();
    bundle.insert(
        SUMMARY_PATH,
        templates::render_failed_summary(ctx, error).into_bytes(),
    );
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_analyzer::{DriftIssue, DriftKind, DriftSeverity};
    use impact_report::{
        ChangeKind, Endpoint, FileChange, FileFeatures, Language, Severity, SymbolRef,
        build_report,
    };

    fn ctx() -> CommitContext {
        CommitContext {
            repository: "demo".into(),
            branch: "main".into(),
            commit_sha: "abc1234def5678".into(),
            author: "tester".into(),
            commit_message: "feat: add hello endpoint\n\nbody".into(),
            commit_timestamp: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn sample_report() -> ImpactReport {
        let change = FileChange {
            path: "src/app.py".into(),
            change_kind: ChangeKind::Added,
            language: Language::Python,
            severity: Severity::Minor,
            is_binary: false,
            syntax_error: false,
            features: FileFeatures {
                functions: vec![SymbolRef::new("hello", 2)],
                api_endpoints: vec![
                    Endpoint::new("POST", "/hello", 5),
                    Endpoint::new("GET", "/hello", 2),
                    Endpoint::new("GET", "/admin/{id}", 9),
                ],
                ..FileFeatures::default()
            },
        };
        build_report(TOOL_VERSION, ctx().commit_timestamp, ctx(), vec![change])
    }

    #[test]
    fn generation_is_byte_deterministic() {
        let report = sample_report();
        let a = generate(&report, None).unwrap();
        let b = generate(&report, None).unwrap();
        assert_eq!(a.get(SUMMARY_PATH), b.get(SUMMARY_PATH));
        assert_eq!(a.get(README_PATH), b.get(README_PATH));
        assert_eq!(a.get(API_REFERENCE_PATH), b.get(API_REFERENCE_PATH));
        assert_eq!(a.get(IMPACT_REPORT_PATH), b.get(IMPACT_REPORT_PATH));
    }

    #[test]
    fn every_artifact_ends_with_single_trailing_newline() {
        let report = sample_report();
        let bundle = generate(&report, None).unwrap();
        for (path, bytes) in bundle.iter() {
            let text = std::str::from_utf8(bytes).unwrap();
            assert!(text.ends_with('\n'), "{path} missing trailing newline");
            assert!(!text.ends_with("\n\n"), "{path} has extra trailing newlines");
            assert!(!text.contains('\r'), "{path} must be LF-only");
        }
    }

    #[test]
    fn api_reference_rows_sorted_by_method_then_path() {
        let report = sample_report();
        let bundle = generate(&report, None).unwrap();
        let text = String::from_utf8(bundle.get(API_REFERENCE_PATH).unwrap().to_vec()).unwrap();
        let admin = text.find("| GET | `/admin/{id}`").unwrap();
        let get_hello = text.find("| GET | `/hello`").unwrap();
        let post_hello = text.find("| POST | `/hello`").unwrap();
        assert!(admin < get_hello && get_hello < post_hello);
    }

    #[test]
    fn api_reference_carries_param_hints() {
        let report = sample_report();
        let bundle = generate(&report, None).unwrap();
        let text = String::from_utf8(bundle.get(API_REFERENCE_PATH).unwrap().to_vec()).unwrap();
        assert!(text.contains("| id |"));
        assert!(text.contains("curl -X GET https://api.example.com/hello"));
    }

    #[test]
    fn summary_lists_drift_sorted_by_severity_then_description() {
        let report = sample_report();
        let drift = DriftReport {
            issues: vec![
                DriftIssue {
                    kind: DriftKind::OutdatedSection,
                    path: "Usage".into(),
                    severity: DriftSeverity::Low,
                    description: "aaa".into(),
                },
                DriftIssue {
                    kind: DriftKind::StaleEndpoint,
                    path: "/users".into(),
                    severity: DriftSeverity::High,
                    description: "zzz".into(),
                },
            ],
        };
        let text = templates::render_summary(&report, Some(&drift));
        let high = text.find("**high** STALE_ENDPOINT `/users`").unwrap();
        let low = text.find("**low** OUTDATED_SECTION `Usage`").unwrap();
        assert!(high < low);
    }

    #[test]
    fn summary_without_drift_says_so() {
        let report = sample_report();
        let text = templates::render_summary(&report, None);
        assert!(text.contains("No drift detected."));
        assert!(text.contains("Highest severity: **MINOR**"));
    }

    #[test]
    fn degraded_summary_names_the_failure() {
        let bundle = degraded_bundle(&ctx(), "template exploded");
        let text = String::from_utf8(bundle.summary().unwrap().to_vec()).unwrap();
        assert!(text.contains("## Generation Failed"));
        assert!(text.contains("template exploded"));
    }

    #[test]
    fn degraded_summary_sanitizes_error_text() {
        let token = format!("ghp_{}", "Ab12Cd34".repeat(5));
        let bundle = degraded_bundle(&ctx(), &format!("push failed for {token}"));
        let text = String::from_utf8(bundle.summary().unwrap().to_vec()).unwrap();
        assert!(!text.contains(&token));
        assert!(text.contains(redact::REDACTED));
    }

    #[test]
    fn readme_counts_languages() {
        let report = sample_report();
        let text = templates::render_readme(&report);
        assert!(text.contains("| python | 1 |"));
        assert!(text.contains("## Overview"));
        assert!(text.contains("## Artifacts"));
    }
}
