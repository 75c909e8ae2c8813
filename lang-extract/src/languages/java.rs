//! Java / Kotlin extraction (annotated-controller routing family).
//!
//! Recognizes Spring-style mapping annotations (`@GetMapping("/x")`,
//! `@RequestMapping(value = "/x", method = RequestMethod.POST)`) including a
//! class-level `@RequestMapping` prefix, plus JPA entities as schemas.

use crate::scan::{line_of, strip_comments};
use impact_report::{Endpoint, FileFeatures, SchemaDecl, SymbolRef};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CLASS: Regex = Regex::new(
        r"(?m)^\s*(?:(?:public|protected|private|abstract|final|static|sealed|data|open)\s+)*(?:class|interface|enum|record|object)\s+([A-Za-z_]\w*)"
    )
    .unwrap();
    static ref METHOD: Regex = Regex::new(
        r"(?m)^\s*((?:(?:public|protected|private|static|final|synchronized|abstract|default|native)\s+)+[\w<>\[\],.?\s]*?([A-Za-z_]\w*)\s*\(([^)]*)\))"
    )
    .unwrap();
    static ref KT_FUN: Regex = Regex::new(
        r"(?m)^\s*((?:(?:public|private|internal|protected|suspend|override|open|inline)\s+)*fun\s+([A-Za-z_]\w*)\s*\(([^)]*)\))"
    )
    .unwrap();
    static ref ANNOTATION: Regex = Regex::new(r"(?m)^\s*@([A-Za-z_][\w.]*)").unwrap();
    static ref MAPPING: Regex = Regex::new(
        r#"@(Get|Post|Put|Delete|Patch)Mapping\s*(?:\(\s*(?:value\s*=\s*|path\s*=\s*)?"([^"]*)")?"#
    )
    .unwrap();
    static ref REQUEST_MAPPING: Regex = Regex::new(r"@RequestMapping\s*\(([^)]*)\)").unwrap();
    static ref QUOTED: Regex = Regex::new(r#""([^"]*)""#).unwrap();
    static ref REQUEST_METHOD: Regex = Regex::new(r"RequestMethod\.([A-Z]+)").unwrap();
    static ref FIELD: Regex =
        Regex::new(r"(?m)^\s*(?:private|protected|public)\s+[\w<>\[\],.?]+\s+(\w+)\s*[;=]").unwrap();
}

pub fn extract(text: &str) -> FileFeatures {
    let code = strip_comments(text, false);
    let mut out = FileFeatures::default();

    for cap in CLASS.captures_iter(&code) {
        let m = cap.get(1).unwrap();
        out.classes
            .push(SymbolRef::new(m.as_str(), line_of(&code, m.start())));
    }

    for re in [&*METHOD, &*KT_FUN] {
        for cap in re.captures_iter(&code) {
            let sig = cap.get(1).unwrap();
            let name = cap.get(2).unwrap();
            // Modifier-led declarations only; control flow never carries them.
            out.methods.push(SymbolRef::with_signature(
                name.as_str(),
                line_of(&code, sig.start()),
                normalize_ws(sig.as_str()),
            ));
        }
    }

    for cap in ANNOTATION.captures_iter(&code) {
        let name = cap.get(1).unwrap().as_str().to_string();
        if !out.annotations.contains(&name) {
            out.annotations.push(name);
        }
    }

    scan_endpoints(&code, &mut out);
    scan_entities(&code, &mut out);

    out
}

fn scan_endpoints(code: &str, out: &mut FileFeatures) {
    // Class-level @RequestMapping before the first type declaration acts as
    // a route prefix for every handler in the file.
    let first_class = CLASS.find(code).map(|m| m.start()).unwrap_or(usize::MAX);
    let mut prefix = String::new();
    for cap in REQUEST_MAPPING.captures_iter(code) {
        let whole = cap.get(0).unwrap();
        let args = cap.get(1).unwrap().as_str();
        if whole.start() < first_class {
            if let Some(q) = QUOTED.captures(args) {
                prefix = q.get(1).unwrap().as_str().trim_end_matches('/').to_string();
            }
            continue;
        }
        // Method-level @RequestMapping: explicit method or GET by default.
        let route = QUOTED
            .captures(args)
            .map(|q| q.get(1).unwrap().as_str())
            .unwrap_or("/");
        let verb = REQUEST_METHOD
            .captures(args)
            .map(|m| m.get(1).unwrap().as_str())
            .unwrap_or("GET");
        out.api_endpoints.push(Endpoint::new(
            verb,
            join_route(&prefix, route),
            line_of(code, whole.start()),
        ));
    }

    for cap in MAPPING.captures_iter(code) {
        let whole = cap.get(0).unwrap();
        let verb = cap.get(1).unwrap().as_str();
        let route = cap.get(2).map(|m| m.as_str()).unwrap_or("/");
        out.api_endpoints.push(Endpoint::new(
            verb,
            join_route(&prefix, route),
            line_of(code, whole.start()),
        ));
    }

    out.api_endpoints.sort_by_key(|e| e.line);
}

/// JPA entities: `@Entity`-annotated classes; every declared field counts
/// as a column.
fn scan_entities(code: &str, out: &mut FileFeatures) {
    let mut entity_pending = false;
    let mut current: Option<SchemaDecl> = None;
    let mut byte = 0usize;

    for line in code.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("@Entity") {
            entity_pending = true;
        } else if let Some(cap) = CLASS.captures(line) {
            if let Some(schema) = current.take() {
                out.schemas.push(schema);
            }
            if entity_pending {
                current = Some(SchemaDecl {
                    name: cap.get(1).unwrap().as_str().to_string(),
                    fields: Vec::new(),
                    line: line_of(code, byte),
                });
                entity_pending = false;
            }
        } else if let Some(schema) = current.as_mut() {
            if let Some(cap) = FIELD.captures(line) {
                schema.fields.push(cap.get(1).unwrap().as_str().to_string());
            }
        }
        byte += line.len();
    }
    if let Some(schema) = current.take() {
        out.schemas.push(schema);
    }
}

fn join_route(prefix: &str, route: &str) -> String {
    if prefix.is_empty() {
        return route.to_string();
    }
    if route == "/" || route.is_empty() {
        return prefix.to_string();
    }
    format!("{prefix}/{}", route.trim_start_matches('/'))
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROLLER: &str = r#"
package com.example.demo;

@RestController
@RequestMapping("/api/users")
public class UserController {

    @GetMapping("/{id}")
    public User find(@PathVariable Long id) {
        return service.find(id);
    }

    @PostMapping
    public User create(@RequestBody User user) {
        return service.save(user);
    }

    @RequestMapping(value = "/search", method = RequestMethod.POST)
    public List<User> search(@RequestBody Query q) {
        return service.search(q);
    }
}
"#;

    #[test]
    fn spring_mappings_with_class_prefix() {
        let f = extract(CONTROLLER);
        let keys: Vec<(String, String)> =
            f.api_endpoints.iter().map(|e| e.key()).collect();
        assert!(keys.contains(&("GET".into(), "/api/users/{id}".into())));
        assert!(keys.contains(&("POST".into(), "/api/users".into())));
        assert!(keys.contains(&("POST".into(), "/api/users/search".into())));
    }

    #[test]
    fn classes_and_methods_are_captured() {
        let f = extract(CONTROLLER);
        assert!(f.classes.iter().any(|c| c.name == "UserController"));
        assert!(f.methods.iter().any(|m| m.name == "find"));
        assert!(f.annotations.contains(&"RestController".to_string()));
    }

    #[test]
    fn jpa_entity_becomes_schema() {
        let src = r#"
@Entity
public class Account {
    private Long id;
    private String email;
    public Long getId() { return id; }
}
"#;
        let f = extract(src);
        assert_eq!(f.schemas.len(), 1);
        assert_eq!(f.schemas[0].name, "Account");
        assert_eq!(f.schemas[0].fields, vec!["id", "email"]);
    }

    #[test]
    fn kotlin_functions_are_methods() {
        let src = "class Svc {\n    suspend fun load(id: Long): User? = repo.find(id)\n}\n";
        let f = extract(src);
        assert!(f.methods.iter().any(|m| m.name == "load"));
    }

    #[test]
    fn commented_mapping_is_ignored() {
        let src = "// @GetMapping(\"/dead\")\npublic class C {}\n";
        let f = extract(src);
        assert!(f.api_endpoints.is_empty());
    }
}
