//! Python extraction (decorator routing family).
//!
//! Recognizes Flask (`@app.route("/x", methods=["GET"])`), FastAPI-style
//! (`@router.get("/x")`) decorators, and SQLAlchemy / Django model classes
//! as schemas.

use crate::scan::{line_of, strip_comments};
use impact_report::{Endpoint, FileFeatures, SchemaDecl, SymbolRef};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FUNCTION: Regex =
        Regex::new(r"(?m)^(async\s+)?def\s+([A-Za-z_]\w*)\s*\(([^)]*)").unwrap();
    static ref METHOD: Regex =
        Regex::new(r"(?m)^[ \t]+(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(([^)]*)").unwrap();
    static ref CLASS: Regex =
        Regex::new(r"(?m)^class\s+([A-Za-z_]\w*)\s*(?:\(([^)]*)\))?\s*:").unwrap();
    static ref DECORATOR: Regex = Regex::new(r"(?m)^\s*@([\w.]+)").unwrap();
    static ref ROUTE: Regex = Regex::new(
        r#"(?m)^\s*@[\w.]+\.route\(\s*['"]([^'"]+)['"]([^)]*)\)"#
    )
    .unwrap();
    static ref VERB_CALL: Regex = Regex::new(
        r#"(?m)^\s*@[\w.]+\.(get|post|put|delete|patch)\(\s*['"]([^'"]+)['"]"#
    )
    .unwrap();
    static ref METHODS_LIST: Regex = Regex::new(r#"methods\s*=\s*\[([^\]]*)\]"#).unwrap();
    static ref VERB_WORD: Regex = Regex::new(r#"['"](\w+)['"]"#).unwrap();
    static ref ORM_FIELD: Regex = Regex::new(
        r"(?m)^[ \t]+([A-Za-z_]\w*)\s*(?::[^=\n]+)?=\s*(?:db\.Column|Column|models\.\w+Field|fields\.\w+)\("
    )
    .unwrap();
}

/// Base classes that mark a schema/model declaration.
const MODEL_BASES: &[&str] = &["Base", "db.Model", "models.Model", "BaseModel", "Document"];

pub fn extract(text: &str) -> FileFeatures {
    let code = strip_comments(text, true);
    let mut out = FileFeatures::default();

    for cap in FUNCTION.captures_iter(&code) {
        let whole = cap.get(0).unwrap();
        let name = cap.get(2).unwrap().as_str();
        out.functions.push(SymbolRef::with_signature(
            name,
            line_of(&code, whole.start()),
            signature_line(&code, whole.start()),
        ));
    }

    for cap in METHOD.captures_iter(&code) {
        let whole = cap.get(0).unwrap();
        let name = cap.get(1).unwrap().as_str();
        out.methods.push(SymbolRef::with_signature(
            name,
            line_of(&code, whole.start()),
            signature_line(&code, whole.start()),
        ));
    }

    for cap in CLASS.captures_iter(&code) {
        let m = cap.get(1).unwrap();
        out.classes
            .push(SymbolRef::new(m.as_str(), line_of(&code, m.start())));
    }

    for cap in DECORATOR.captures_iter(&code) {
        let name = cap.get(1).unwrap().as_str().to_string();
        if !out.annotations.contains(&name) {
            out.annotations.push(name);
        }
    }

    scan_routes(&code, &mut out);
    scan_models(&code, &mut out);

    out
}

fn scan_routes(code: &str, out: &mut FileFeatures) {
    for cap in ROUTE.captures_iter(code) {
        let whole = cap.get(0).unwrap();
        let route = cap.get(1).unwrap().as_str();
        let rest = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        let line = line_of(code, whole.start());

        match METHODS_LIST.captures(rest) {
            Some(list) => {
                for verb in VERB_WORD.captures_iter(list.get(1).unwrap().as_str()) {
                    out.api_endpoints.push(Endpoint::new(
                        verb.get(1).unwrap().as_str(),
                        route,
                        line,
                    ));
                }
            }
            None => out.api_endpoints.push(Endpoint::new("GET", route, line)),
        }
    }

    for cap in VERB_CALL.captures_iter(code) {
        let whole = cap.get(0).unwrap();
        out.api_endpoints.push(Endpoint::new(
            cap.get(1).unwrap().as_str(),
            cap.get(2).unwrap().as_str(),
            line_of(code, whole.start()),
        ));
    }

    out.api_endpoints.sort_by_key(|e| e.line);
}

/// ORM models: a class whose bases include a known model marker; fields are
/// column/field assignments in its body (until the next column-0 statement).
fn scan_models(code: &str, out: &mut FileFeatures) {
    for cap in CLASS.captures_iter(code) {
        let bases = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        let is_model = MODEL_BASES
            .iter()
            .any(|b| bases.split(',').any(|base| base.trim() == *b));
        if !is_model {
            continue;
        }

        let whole = cap.get(0).unwrap();
        let body_start = whole.end();
        let next_class = code[body_start..].find("\nclass ");
        let next_def = code[body_start..].find("\ndef ");
        let body_end = match (next_class, next_def) {
            (Some(a), Some(b)) => body_start + a.min(b),
            (Some(a), None) => body_start + a,
            (None, Some(b)) => body_start + b,
            (None, None) => code.len(),
        };

        let mut fields = Vec::new();
        for f in ORM_FIELD.captures_iter(&code[body_start..body_end]) {
            fields.push(f.get(1).unwrap().as_str().to_string());
        }

        out.schemas.push(SchemaDecl {
            name: cap.get(1).unwrap().as_str().to_string(),
            fields,
            line: line_of(code, whole.start()),
        });
    }
}

fn signature_line(code: &str, start: usize) -> String {
    code[start..]
        .lines()
        .next()
        .unwrap_or("")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flask_route_with_methods_list() {
        let src = "@app.route(\"/hello\", methods=[\"GET\", \"POST\"])\ndef hello():\n    return \"hi\"\n";
        let f = extract(src);
        let keys: Vec<_> = f.api_endpoints.iter().map(|e| e.key()).collect();
        assert!(keys.contains(&("GET".into(), "/hello".into())));
        assert!(keys.contains(&("POST".into(), "/hello".into())));
        assert!(f.functions.iter().any(|x| x.name == "hello"));
    }

    #[test]
    fn flask_route_defaults_to_get() {
        let src = "@app.route('/hello')\ndef hello():\n    pass\n";
        let f = extract(src);
        assert_eq!(f.api_endpoints.len(), 1);
        assert_eq!(f.api_endpoints[0].key(), ("GET".into(), "/hello".into()));
    }

    #[test]
    fn fastapi_verb_decorators() {
        let src = "@router.get('/items/{item_id}')\nasync def read(item_id: int):\n    pass\n\n@router.post('/items')\nasync def create(item: Item):\n    pass\n";
        let f = extract(src);
        let keys: Vec<_> = f.api_endpoints.iter().map(|e| e.key()).collect();
        assert_eq!(
            keys,
            vec![
                ("GET".to_string(), "/items/{item_id}".to_string()),
                ("POST".to_string(), "/items".to_string())
            ]
        );
    }

    #[test]
    fn sqlalchemy_model_fields() {
        let src = "class User(Base):\n    __tablename__ = 'users'\n    id = Column(Integer, primary_key=True)\n    email = Column(String)\n\ndef helper():\n    pass\n";
        let f = extract(src);
        assert_eq!(f.schemas.len(), 1);
        assert_eq!(f.schemas[0].name, "User");
        assert_eq!(f.schemas[0].fields, vec!["id", "email"]);
    }

    #[test]
    fn django_model_fields() {
        let src = "class Article(models.Model):\n    title = models.CharField(max_length=100)\n    body = models.TextField()\n";
        let f = extract(src);
        assert_eq!(f.schemas[0].fields, vec!["title", "body"]);
    }

    #[test]
    fn methods_are_indented_defs() {
        let src = "class Svc:\n    def run(self):\n        pass\n\ndef free():\n    pass\n";
        let f = extract(src);
        assert!(f.methods.iter().any(|m| m.name == "run"));
        assert!(f.functions.iter().any(|x| x.name == "free"));
        assert!(!f.functions.iter().any(|x| x.name == "run"));
    }

    #[test]
    fn private_functions_follow_convention() {
        let src = "def _internal():\n    pass\n";
        let f = extract(src);
        assert!(!f.functions[0].is_public());
    }
}
