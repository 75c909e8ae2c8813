//! `metadata.json`: the per-commit metadata record.
//!
//! The camelCase field set is an external contract shared with every
//! consumer of the store layout; do not rename.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    pub version: Option<String>,
    pub branch: Option<String>,
    pub commit: String,
    pub commit_url: Option<String>,
    pub branch_url: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
}

impl VersionMetadata {
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_contract_fields() {
        let meta = VersionMetadata {
            version: Some("1.2.0".into()),
            branch: Some("main".into()),
            commit: "abc1234".into(),
            commit_url: None,
            branch_url: None,
            tags: vec!["release".into()],
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            updated_at: DateTime::from_timestamp(1_700_000_100, 0).unwrap(),
            title: "t".into(),
            description: "d".into(),
        };
        let json = String::from_utf8(meta.to_json_bytes().unwrap()).unwrap();
        for field in [
            "\"version\"",
            "\"branch\"",
            "\"commit\"",
            "\"commitUrl\"",
            "\"branchUrl\"",
            "\"tags\"",
            "\"createdAt\"",
            "\"updatedAt\"",
            "\"title\"",
            "\"description\"",
        ] {
            assert!(json.contains(field), "missing {field}");
        }
        let back: VersionMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
