//! Tolerant readers over generated markdown.
//!
//! These parse the documentation this tool itself generates, so the shapes
//! are narrow: endpoint table rows, `### Entity` schema blocks with field
//! bullets, and `##` section headings.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref ENDPOINT_ROW: Regex =
        Regex::new(r"(?m)^\|\s*([A-Z]+)\s*\|\s*`?([^|`\s]+)`?\s*\|").unwrap();
    static ref HEADING2: Regex = Regex::new(r"(?m)^##\s+(.+?)\s*$").unwrap();
    static ref FIELD_BULLET: Regex = Regex::new(r"(?m)^-\s+`?([A-Za-z_]\w*)`?\s*$").unwrap();
}

/// A decoded artifact set: repo-relative path to markdown text.
#[derive(Debug, Clone, Default)]
pub struct DocSet {
    files: BTreeMap<String, String>,
}

impl DocSet {
    pub fn from_texts(files: BTreeMap<String, String>) -> Self {
        Self { files }
    }

    /// Lossy-decode raw objects; non-markdown entries are kept for
    /// substring mention checks but never parsed structurally.
    pub fn from_bytes(files: &BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            files: files
                .iter()
                .map(|(k, v)| (k.clone(), String::from_utf8_lossy(v).into_owned()))
                .collect(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    fn api_reference(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|(k, _)| k.ends_with("api-reference.md"))
            .map(|(_, v)| v.as_str())
    }

    fn readme(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|(k, _)| k.ends_with("README.generated.md"))
            .map(|(_, v)| v.as_str())
    }

    /// `(VERB, route)` pairs recovered from the api-reference tables.
    pub fn endpoints(&self) -> Vec<(String, String)> {
        let Some(body) = self.api_reference() else {
            return Vec::new();
        };
        ENDPOINT_ROW
            .captures_iter(body)
            .filter(|cap| cap.get(1).unwrap().as_str() != "METHOD")
            .map(|cap| {
                (
                    cap.get(1).unwrap().as_str().to_string(),
                    cap.get(2).unwrap().as_str().to_string(),
                )
            })
            .collect()
    }

    /// Schema entities and their documented fields from the api-reference.
    pub fn schemas(&self) -> Vec<(String, Vec<String>)> {
        let Some(body) = self.api_reference() else {
            return Vec::new();
        };
        let Some(section_start) = body.find("## Schemas") else {
            return Vec::new();
        };
        let section = &body[section_start..];

        let mut out: Vec<(String, Vec<String>)> = Vec::new();
        for block in section.split("\n### ").skip(1) {
            let mut lines = block.lines();
            let name = lines
                .next()
                .unwrap_or("")
                .trim()
                .trim_matches('`')
                .to_string();
            if name.is_empty() {
                continue;
            }
            let rest: String = lines.collect::<Vec<_>>().join("\n");
            let fields = FIELD_BULLET
                .captures_iter(&rest)
                .map(|cap| cap.get(1).unwrap().as_str().to_string())
                .collect();
            out.push((name, fields));
        }
        out
    }

    /// `##` headings of the generated README.
    pub fn readme_sections(&self) -> Vec<String> {
        let Some(body) = self.readme() else {
            return Vec::new();
        };
        HEADING2
            .captures_iter(body)
            .map(|cap| cap.get(1).unwrap().as_str().to_string())
            .collect()
    }

    /// Case-insensitive mention check across every artifact body.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.files
            .values()
            .any(|body| body.to_ascii_lowercase().contains(&needle))
    }
}
