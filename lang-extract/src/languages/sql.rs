//! SQL DDL extraction: `CREATE TABLE` statements become schemas.

use crate::scan::{line_of, strip_comments};
use impact_report::{FileFeatures, SchemaDecl};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CREATE_TABLE: Regex = Regex::new(
        r#"(?im)^\s*create\s+table(?:\s+if\s+not\s+exists)?\s+[`"']?([A-Za-z_]\w*)[`"']?\s*\("#
    )
    .unwrap();
    static ref COLUMN: Regex =
        Regex::new(r#"(?m)^\s*[`"']?([A-Za-z_]\w*)[`"']?\s+[A-Za-z]"#).unwrap();
}

/// Keywords that start constraint clauses rather than column definitions.
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "primary", "foreign", "constraint", "unique", "key", "index", "check", "references",
];

pub fn extract(text: &str) -> FileFeatures {
    let code = strip_comments(text, true);
    let mut out = FileFeatures::default();

    for cap in CREATE_TABLE.captures_iter(&code) {
        let whole = cap.get(0).unwrap();
        let name = cap.get(1).unwrap().as_str().to_string();

        // Column list runs from the opening paren to its matching close.
        let open = whole.end() - 1;
        let body_end = matching_paren(&code, open).unwrap_or(code.len());
        let body = &code[whole.end()..body_end];

        let mut fields = Vec::new();
        for col in COLUMN.captures_iter(body) {
            let col_name = col.get(1).unwrap().as_str();
            if CONSTRAINT_KEYWORDS.contains(&col_name.to_ascii_lowercase().as_str()) {
                continue;
            }
            fields.push(col_name.to_string());
        }

        out.schemas.push(SchemaDecl {
            name,
            fields,
            line: line_of(&code, whole.start()),
        });
    }

    out
}

fn matching_paren(code: &str, open: usize) -> Option<usize> {
    let bytes = code.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0i64;
    for (off, &b) in bytes[open..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + off);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_columns() {
        let src = "CREATE TABLE users (\n  id INTEGER PRIMARY KEY,\n  email TEXT NOT NULL,\n  created_at TIMESTAMP DEFAULT now(),\n  PRIMARY KEY (id)\n);\n";
        let f = extract(src);
        assert_eq!(f.schemas.len(), 1);
        assert_eq!(f.schemas[0].name, "users");
        assert_eq!(f.schemas[0].fields, vec!["id", "email", "created_at"]);
    }

    #[test]
    fn if_not_exists_and_quoting() {
        let src = "create table if not exists `orders` (\n  `order_id` int,\n  total decimal(10,2)\n);\n";
        let f = extract(src);
        assert_eq!(f.schemas[0].name, "orders");
        assert_eq!(f.schemas[0].fields, vec!["order_id", "total"]);
    }

    #[test]
    fn multiple_tables() {
        let src = "CREATE TABLE a (x INT);\nCREATE TABLE b (y INT);\n";
        let f = extract(src);
        let names: Vec<_> = f.schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
