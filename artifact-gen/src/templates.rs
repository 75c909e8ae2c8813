//! Deterministic markdown renderers.
//!
//! Every renderer is a pure function of the impact report, the optional
//! drift report and the fixed template text. No wall-clock reads, no
//! randomness, no environment lookups; identical inputs render identical
//! bytes. All output is LF-terminated UTF-8 with a trailing newline.

use drift_analyzer::DriftReport;
use impact_report::{ChangeKind, CommitContext, FileChange, ImpactReport, top_files};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Annotations that suggest an endpoint sits behind authentication.
const AUTH_MARKERS: &[&str] = &[
    "Secured",
    "PreAuthorize",
    "RolesAllowed",
    "UseGuards",
    "login_required",
    "jwt_required",
    "requires_auth",
    "authenticate",
];

pub fn render_summary(impact: &ImpactReport, drift: Option<&DriftReport>) -> String {
    let ctx = &impact.context;
    let summary = &impact.analysis_summary;
    let mut out = String::new();

    out.push_str("# Documentation Summary\n\n");
    push_context_block(&mut out, ctx);

    out.push_str("## Impact\n\n");
    let _ = writeln!(out, "- Files changed: {}", summary.total_files_changed);
    let _ = writeln!(out, "- Highest severity: **{}**", summary.highest_severity);
    let _ = writeln!(
        out,
        "- Breaking changes detected: {}",
        yes_no(summary.breaking_changes_detected)
    );
    out.push('\n');

    out.push_str("## Top Changes\n\n");
    let top = top_files(impact, 10);
    if top.is_empty() {
        out.push_str("No file changes recorded.\n");
    } else {
        for file in top {
            let _ = writeln!(
                out,
                "- `{}` — {} ({}){}",
                file.path,
                file.change_kind,
                file.severity,
                change_highlights(file)
            );
        }
    }
    out.push('\n');

    out.push_str("## Drift\n\n");
    match drift {
        Some(report) if !report.is_empty() => {
            for issue in report.sorted_issues() {
                let _ = writeln!(
                    out,
                    "- **{}** {} `{}`: {}",
                    issue.severity, issue.kind, issue.path, issue.description
                );
            }
        }
        _ => out.push_str("No drift detected.\n"),
    }

    finalize(out)
}

/// Degraded summary written when artifact generation itself fails.
///
/// Delivery still proceeds with this file, so it must carry the error.
pub fn render_failed_summary(ctx: &CommitContext, error: &str) -> String {
    let mut out = String::new();
    out.push_str("# Documentation Summary\n\n");
    out.push_str("## Generation Failed\n\n");
    let _ = writeln!(out, "{}", redact::sanitize(error));
    out.push('\n');
    let _ = writeln!(
        out,
        "Commit `{}` on {}/{}.",
        ctx.short_sha(),
        ctx.repository,
        ctx.branch
    );
    finalize(out)
}

pub fn render_readme(impact: &ImpactReport) -> String {
    let ctx = &impact.context;
    let summary = &impact.analysis_summary;
    let mut out = String::new();

    let _ = writeln!(out, "# {} — Generated Documentation\n", ctx.repository);

    out.push_str("## Overview\n\n");
    out.push_str("| | |\n| --- | --- |\n");
    let _ = writeln!(out, "| Repository | {} |", ctx.repository);
    let _ = writeln!(out, "| Branch | {} |", ctx.branch);
    let _ = writeln!(out, "| Commit | `{}` |", ctx.short_sha());
    let _ = writeln!(out, "| Author | {} |", ctx.author);
    let _ = writeln!(out, "| Date | {} |", stamp(ctx));
    out.push('\n');
    let _ = writeln!(out, "> {}\n", first_line(&ctx.commit_message));

    out.push_str("## Languages\n\n");
    let counts = language_counts(impact);
    if counts.is_empty() {
        out.push_str("No source files changed.\n");
    } else {
        out.push_str("| Language | Files |\n| --- | --- |\n");
        for (language, count) in counts {
            let _ = writeln!(out, "| {language} | {count} |");
        }
    }
    out.push('\n');

    out.push_str("## Impact\n\n");
    let _ = writeln!(
        out,
        "This change touches {} file(s); highest severity **{}**, breaking changes: {}.",
        summary.total_files_changed,
        summary.highest_severity,
        yes_no(summary.breaking_changes_detected)
    );
    out.push('\n');

    out.push_str("## Artifacts\n\n");
    out.push_str("- [Change summary](../summaries/summary.md)\n");
    out.push_str("- [API reference](./api/api-reference.md)\n");
    out.push_str("- [Architecture notes](./architecture/overview.md)\n");

    finalize(out)
}

pub fn render_api_reference(impact: &ImpactReport) -> String {
    let ctx = &impact.context;
    let mut out = String::new();

    out.push_str("# API Reference\n\n");
    let _ = writeln!(out, "Generated for commit `{}`.\n", ctx.short_sha());

    // Group endpoints by file (path-sorted), rows sorted by (method, path).
    let mut by_file: BTreeMap<&str, Vec<(&FileChange, &impact_report::Endpoint)>> =
        BTreeMap::new();
    for change in &impact.changes {
        if change.change_kind == ChangeKind::Deleted {
            continue;
        }
        for ep in &change.features.api_endpoints {
            by_file.entry(change.path.as_str()).or_default().push((change, ep));
        }
    }

    out.push_str("## Endpoints\n\n");
    if by_file.is_empty() {
        out.push_str("No HTTP endpoints detected.\n");
    } else {
        for (path, mut endpoints) in by_file {
            endpoints.sort_by(|(_, a), (_, b)| {
                a.verb.cmp(&b.verb).then_with(|| a.route.cmp(&b.route))
            });
            let _ = writeln!(out, "### `{path}`\n");
            out.push_str("| Method | Path | Summary | Auth | Parameters | Example |\n");
            out.push_str("| --- | --- | --- | --- | --- | --- |\n");
            for (change, ep) in endpoints {
                let _ = writeln!(
                    out,
                    "| {} | `{}` | Handles {} {} | {} | {} | `{}` |",
                    ep.verb,
                    ep.route,
                    ep.verb,
                    ep.route,
                    auth_hint(change),
                    param_hint(&ep.route),
                    curl_example(&ep.verb, &ep.route),
                );
            }
            out.push('\n');
        }
    }

    let schemas = sorted_schemas(impact);
    if !schemas.is_empty() {
        out.push_str("## Schemas\n\n");
        for schema in schemas {
            let _ = writeln!(out, "### `{}`\n", schema.name);
            if schema.fields.is_empty() {
                out.push_str("No fields detected.\n");
            } else {
                for field in &schema.fields {
                    let _ = writeln!(out, "- `{field}`");
                }
            }
            out.push('\n');
        }
    }

    finalize(out)
}

pub fn render_architecture(impact: &ImpactReport) -> String {
    let mut out = String::new();
    out.push_str("# Architecture\n\n");
    out.push_str("Captions for diagrams produced upstream of this snapshot.\n\n");

    out.push_str("## Module Activity\n\n");
    let mut areas: BTreeMap<String, usize> = BTreeMap::new();
    for change in &impact.changes {
        let area = change
            .path
            .split_once('/')
            .map(|(head, _)| head.to_string())
            .unwrap_or_else(|| "(root)".to_string());
        *areas.entry(area).or_default() += 1;
    }
    if areas.is_empty() {
        out.push_str("No module activity in this change.\n");
    } else {
        out.push_str("| Area | Files changed |\n| --- | --- |\n");
        for (area, count) in areas {
            let _ = writeln!(out, "| {area} | {count} |");
        }
    }

    finalize(out)
}

fn push_context_block(out: &mut String, ctx: &CommitContext) {
    let _ = writeln!(out, "**Repository:** {}", ctx.repository);
    let _ = writeln!(out, "**Branch:** {}", ctx.branch);
    let _ = writeln!(out, "**Commit:** `{}`", ctx.short_sha());
    let _ = writeln!(out, "**Author:** {}", ctx.author);
    let _ = writeln!(out, "**Date:** {}", stamp(ctx));
    out.push('\n');
    let _ = writeln!(out, "> {}\n", first_line(&ctx.commit_message));
}

fn change_highlights(file: &FileChange) -> String {
    let mut parts = Vec::new();
    let f = &file.features;
    if !f.api_endpoints.is_empty() {
        parts.push(format!("{} endpoint(s)", f.api_endpoints.len()));
    }
    if !f.schemas.is_empty() {
        parts.push(format!("{} schema(s)", f.schemas.len()));
    }
    let symbols = f.classes.len() + f.methods.len() + f.functions.len();
    if symbols > 0 {
        parts.push(format!("{symbols} symbol(s)"));
    }
    if file.syntax_error {
        parts.push("syntax errors tolerated".to_string());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(": {}", parts.join(", "))
    }
}

fn sorted_schemas(impact: &ImpactReport) -> Vec<&impact_report::SchemaDecl> {
    let mut schemas = impact.current_schemas();
    schemas.sort_by(|a, b| a.name.cmp(&b.name));
    schemas
}

fn auth_hint(change: &FileChange) -> &'static str {
    let marked = change
        .features
        .annotations
        .iter()
        .any(|a| AUTH_MARKERS.iter().any(|m| a.contains(m)));
    if marked { "bearer token" } else { "none detected" }
}

fn param_hint(route: &str) -> String {
    let params: Vec<&str> = route
        .split('/')
        .filter_map(|seg| {
            seg.strip_prefix(':').or_else(|| {
                seg.strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                    .or_else(|| seg.strip_prefix('<').and_then(|s| s.strip_suffix('>')))
            })
        })
        .collect();
    if params.is_empty() {
        "—".to_string()
    } else {
        params.join(", ")
    }
}

fn curl_example(verb: &str, route: &str) -> String {
    let verb = if verb == "ANY" { "GET" } else { verb };
    format!("curl -X {verb} https://api.example.com{route}")
}

fn language_counts(impact: &ImpactReport) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for change in &impact.changes {
        *counts.entry(change.language.to_string()).or_default() += 1;
    }
    counts.into_iter().collect()
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn stamp(ctx: &CommitContext) -> String {
    ctx.commit_timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// LF endings and exactly one trailing newline.
pub fn finalize(mut text: String) -> String {
    while text.ends_with('\n') {
        text.pop();
    }
    text.push('\n');
    text
}
