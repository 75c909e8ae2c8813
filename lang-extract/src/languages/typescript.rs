//! TypeScript extraction.
//!
//! Shares the middleware-chain scanners with the JavaScript module and adds
//! the decorator routing family (NestJS-style `@Controller('/x')` +
//! `@Get(':id')`) plus decorator capture.

use crate::languages::javascript;
use crate::scan::{line_of, strip_comments};
use impact_report::{Endpoint, FileFeatures};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DECORATOR: Regex = Regex::new(r"(?m)^\s*@([A-Za-z_]\w*)").unwrap();
    static ref CONTROLLER: Regex =
        Regex::new(r#"@Controller\s*\(\s*(?:['"]([^'"]*)['"])?\s*\)"#).unwrap();
    static ref VERB_DECORATOR: Regex = Regex::new(
        r#"@(Get|Post|Put|Delete|Patch|Head|Options)\s*\(\s*(?:['"]([^'"]*)['"])?\s*\)"#
    )
    .unwrap();
}

pub fn extract(text: &str) -> FileFeatures {
    let code = strip_comments(text, false);
    let mut out = FileFeatures::default();
    javascript::scan_common(&code, &mut out);

    for cap in DECORATOR.captures_iter(&code) {
        let name = cap.get(1).unwrap().as_str().to_string();
        if !out.annotations.contains(&name) {
            out.annotations.push(name);
        }
    }

    scan_decorator_routes(&code, &mut out);
    out.api_endpoints.sort_by_key(|e| e.line);
    out
}

fn scan_decorator_routes(code: &str, out: &mut FileFeatures) {
    // Controller prefixes apply to every verb decorator that follows them,
    // up to the next @Controller.
    let mut controllers: Vec<(usize, String)> = CONTROLLER
        .captures_iter(code)
        .map(|cap| {
            let start = cap.get(0).unwrap().start();
            let prefix = cap.get(1).map(|m| m.as_str()).unwrap_or("");
            (start, normalize_prefix(prefix))
        })
        .collect();
    controllers.sort_by_key(|(start, _)| *start);

    for cap in VERB_DECORATOR.captures_iter(code) {
        let whole = cap.get(0).unwrap();
        let verb = cap.get(1).unwrap().as_str();
        let sub = cap.get(2).map(|m| m.as_str()).unwrap_or("");

        let prefix = controllers
            .iter()
            .rev()
            .find(|(start, _)| *start < whole.start())
            .map(|(_, p)| p.as_str())
            .unwrap_or("");

        out.api_endpoints.push(Endpoint::new(
            verb,
            join_route(prefix, sub),
            line_of(code, whole.start()),
        ));
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn join_route(prefix: &str, sub: &str) -> String {
    let sub = sub.trim_matches('/');
    match (prefix.is_empty(), sub.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{sub}"),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{sub}"),
    }
}
