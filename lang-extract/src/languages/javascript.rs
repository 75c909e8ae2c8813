//! JavaScript extraction (middleware-chain routing family).
//!
//! Recognizes `router.get('/x', ...)` / `app.post(...)` chains, mongoose
//! `new Schema({...})` and sequelize `define('name', {...})` schemas.

use crate::scan::{brace_block, line_of, strip_comments, strip_literals};
use impact_report::{Endpoint, FileFeatures, SchemaDecl, SymbolRef};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FUNCTION: Regex = Regex::new(
        r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s+([A-Za-z_$][\w$]*)\s*\(([^)]*)\)"
    )
    .unwrap();
    static ref ARROW: Regex = Regex::new(
        r"(?m)^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?\(([^)]*)\)\s*=>"
    )
    .unwrap();
    static ref CLASS: Regex =
        Regex::new(r"(?m)^\s*(?:export\s+)?(?:default\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref CHAIN: Regex = Regex::new(
        r#"\b(?:router|app|server|api|routes)\.(get|post|put|delete|patch|all)\(\s*['"`]([^'"`]+)['"`]"#
    )
    .unwrap();
    static ref MONGOOSE: Regex = Regex::new(
        r"(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*new\s+(?:mongoose\.)?Schema\s*\("
    )
    .unwrap();
    static ref SEQUELIZE: Regex = Regex::new(
        r#"\.define\(\s*['"]([A-Za-z_$][\w$]*)['"]\s*,\s*\{"#
    )
    .unwrap();
    static ref OBJECT_KEY: Regex = Regex::new(r"(?m)^\s*([A-Za-z_$][\w$]*)\s*:").unwrap();
}

pub fn extract(text: &str) -> FileFeatures {
    let code = strip_comments(text, false);
    let mut out = FileFeatures::default();
    scan_common(&code, &mut out);
    out
}

/// Shared with the TypeScript module, which layers decorators on top.
pub(crate) fn scan_common(code: &str, out: &mut FileFeatures) {
    for re in [&*FUNCTION, &*ARROW] {
        for cap in re.captures_iter(code) {
            let whole = cap.get(0).unwrap();
            let name = cap.get(1).unwrap();
            out.functions.push(SymbolRef::with_signature(
                name.as_str(),
                line_of(code, whole.start()),
                whole.as_str().trim().to_string(),
            ));
        }
    }

    for cap in CLASS.captures_iter(code) {
        let m = cap.get(1).unwrap();
        out.classes
            .push(SymbolRef::new(m.as_str(), line_of(code, m.start())));
    }

    for cap in CHAIN.captures_iter(code) {
        let whole = cap.get(0).unwrap();
        // `all` registers every verb; normalize to ANY for the report.
        let verb = match cap.get(1).unwrap().as_str() {
            "all" => "ANY",
            v => v,
        };
        out.api_endpoints.push(Endpoint::new(
            verb,
            cap.get(2).unwrap().as_str(),
            line_of(code, whole.start()),
        ));
    }
    out.api_endpoints.sort_by_key(|e| e.line);

    scan_schemas(code, out);
}

fn scan_schemas(code: &str, out: &mut FileFeatures) {
    // Work on a literal-stripped copy for brace matching; the original
    // offsets are preserved because stripping is 1:1 on bytes.
    let blank = strip_literals(code, false);

    for cap in MONGOOSE.captures_iter(code) {
        let name = cap.get(1).unwrap().as_str().to_string();
        let whole = cap.get(0).unwrap();
        let fields = object_fields(code, &blank, whole.end());
        out.schemas.push(SchemaDecl {
            name,
            fields,
            line: line_of(code, whole.start()),
        });
    }

    for cap in SEQUELIZE.captures_iter(code) {
        let name = cap.get(1).unwrap().as_str().to_string();
        let whole = cap.get(0).unwrap();
        let fields = object_fields(code, &blank, whole.end().saturating_sub(1));
        out.schemas.push(SchemaDecl {
            name,
            fields,
            line: line_of(code, whole.start()),
        });
    }
}

/// Top-level keys of the object literal whose `{` is at or after `from`.
fn object_fields(code: &str, blank: &str, from: usize) -> Vec<String> {
    let Some(open) = blank[from..].find('{').map(|i| from + i) else {
        return Vec::new();
    };
    let Some((start, end)) = brace_block(blank, open) else {
        return Vec::new();
    };

    // Only keys at depth 0 of this object count as schema fields.
    let body = &code[start..end];
    let body_blank = &blank[start..end];
    let mut fields = Vec::new();
    let mut depth = 0i64;
    let mut line_start = 0usize;
    for (i, b) in body_blank.bytes().enumerate() {
        match b {
            b'{' | b'[' | b'(' => depth += 1,
            b'}' | b']' | b')' => depth -= 1,
            b'\n' => {
                if depth <= 0 {
                    if let Some(cap) = OBJECT_KEY.captures(&body[line_start..i]) {
                        let name = cap.get(1).unwrap().as_str().to_string();
                        if !fields.contains(&name) {
                            fields.push(name);
                        }
                    }
                }
                line_start = i + 1;
            }
            _ => {}
        }
        // A key line at depth 0 that opens a nested object is still a field.
        if b == b'{' && depth == 1 {
            if let Some(cap) = OBJECT_KEY.captures(&body[line_start..i]) {
                let name = cap.get(1).unwrap().as_str().to_string();
                if !fields.contains(&name) {
                    fields.push(name);
                }
            }
        }
    }
    if depth <= 0 {
        if let Some(cap) = OBJECT_KEY.captures(&body[line_start..]) {
            let name = cap.get(1).unwrap().as_str().to_string();
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn express_chain_endpoints() {
        let src = "const router = require('express').Router();\nrouter.get('/users', list);\nrouter.post('/users', create);\napp.delete('/users/:id', remove);\n";
        let f = extract(src);
        let keys: Vec<_> = f.api_endpoints.iter().map(|e| e.key()).collect();
        assert_eq!(
            keys,
            vec![
                ("GET".to_string(), "/users".to_string()),
                ("POST".to_string(), "/users".to_string()),
                ("DELETE".to_string(), "/users/:id".to_string()),
            ]
        );
    }

    #[test]
    fn functions_and_arrows() {
        let src = "export async function load(id) {}\nconst save = async (doc) => {\n  return db.put(doc);\n};\n";
        let f = extract(src);
        let names: Vec<_> = f.functions.iter().map(|x| x.name.as_str()).collect();
        assert!(names.contains(&"load"));
        assert!(names.contains(&"save"));
    }

    #[test]
    fn mongoose_schema_fields() {
        let src = "const userSchema = new Schema({\n  name: { type: String, required: true },\n  email: String,\n  createdAt: Date\n});\n";
        let f = extract(src);
        assert_eq!(f.schemas.len(), 1);
        assert_eq!(f.schemas[0].name, "userSchema");
        assert_eq!(f.schemas[0].fields, vec!["name", "email", "createdAt"]);
    }

    #[test]
    fn sequelize_define_fields() {
        let src = "const User = sequelize.define('User', {\n  username: DataTypes.STRING,\n  birthday: DataTypes.DATE\n});\n";
        let f = extract(src);
        assert_eq!(f.schemas[0].name, "User");
        assert_eq!(f.schemas[0].fields, vec!["username", "birthday"]);
    }

    #[test]
    fn commented_route_is_ignored() {
        let src = "// router.get('/dead', h)\nrouter.get('/live', h);\n";
        let f = extract(src);
        assert_eq!(f.api_endpoints.len(), 1);
        assert_eq!(f.api_endpoints[0].route, "/live");
    }
}
