//! Relational index: projects, settings and DocumentVersion rows.
//!
//! A thin repository layer with named queries over SQLite. The
//! `(project_id, commit_id)` uniqueness constraint is the concurrency guard
//! for upserts; the store writes rows only after objects have landed.

use crate::errors::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub upstream_url: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProjectSettingsRow {
    pub project_id: String,
    pub auto_generate_docs: bool,
    /// Opaque sealed credential; never logged, never serialized outward.
    pub upstream_credential: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct VersionRow {
    pub id: String,
    pub project_id: String,
    pub commit_id: String,
    pub branch: Option<String>,
    pub version: Option<String>,
    pub title: String,
    pub description: String,
    /// JSON-encoded tag array.
    pub tags: String,
    pub summary_path: Option<String>,
    pub readme_path: Option<String>,
    pub api_docs_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VersionRow {
    pub fn tag_list(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct VersionIndex {
    pool: SqlitePool,
}

impl VersionIndex {
    /// Open (and migrate) the index at `url`, e.g. `sqlite://docpulse.db`.
    pub async fn connect(url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // In-memory databases exist per connection; a pool of one keeps the
        // schema visible.
        let max = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(opts)
            .await?;
        let index = Self { pool };
        index.migrate().await?;
        Ok(index)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<()> {
        // One statement per call: prepared statements are single-statement.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                upstream_url TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(owner_id, upstream_url)
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS project_settings (
                project_id TEXT PRIMARY KEY REFERENCES projects(id) ON DELETE CASCADE,
                auto_generate_docs INTEGER NOT NULL DEFAULT 1,
                upstream_credential TEXT,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS document_versions (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                commit_id TEXT NOT NULL,
                branch TEXT,
                version TEXT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '[]',
                summary_path TEXT,
                readme_path TEXT,
                api_docs_path TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(project_id, commit_id)
            )",
        )
        .execute(&self.pool)
        .await?;
        info!("index schema ready");
        Ok(())
    }

    // ---- projects ----

    pub async fn insert_project(&self, row: &ProjectRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO projects (id, name, upstream_url, owner_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.upstream_url)
        .bind(&row.owner_id)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_project(&self, id: &str) -> Result<Option<ProjectRow>> {
        Ok(sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_project_by_url(&self, upstream_url: &str) -> Result<Option<ProjectRow>> {
        Ok(
            sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE upstream_url = ?1")
                .bind(upstream_url)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Delete a project; versions and settings cascade.
    pub async fn delete_project(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM projects WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- settings ----

    pub async fn upsert_settings(&self, row: &ProjectSettingsRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO project_settings (project_id, auto_generate_docs, upstream_credential, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id) DO UPDATE SET
                 auto_generate_docs = excluded.auto_generate_docs,
                 upstream_credential = excluded.upstream_credential,
                 updated_at = excluded.updated_at",
        )
        .bind(&row.project_id)
        .bind(row.auto_generate_docs)
        .bind(&row.upstream_credential)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_settings(&self, project_id: &str) -> Result<Option<ProjectSettingsRow>> {
        Ok(sqlx::query_as::<_, ProjectSettingsRow>(
            "SELECT * FROM project_settings WHERE project_id = ?1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    // ---- document versions ----

    /// Insert or replace the row for `(project_id, commit_id)`.
    ///
    /// `created_at` of an existing row survives; everything else is updated.
    pub async fn upsert_version(&self, row: &VersionRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO document_versions
                 (id, project_id, commit_id, branch, version, title, description,
                  tags, summary_path, readme_path, api_docs_path, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(project_id, commit_id) DO UPDATE SET
                 branch = excluded.branch,
                 version = excluded.version,
                 title = excluded.title,
                 description = excluded.description,
                 tags = excluded.tags,
                 summary_path = excluded.summary_path,
                 readme_path = excluded.readme_path,
                 api_docs_path = excluded.api_docs_path,
                 updated_at = excluded.updated_at",
        )
        .bind(&row.id)
        .bind(&row.project_id)
        .bind(&row.commit_id)
        .bind(&row.branch)
        .bind(&row.version)
        .bind(&row.title)
        .bind(&row.description)
        .bind(&row.tags)
        .bind(&row.summary_path)
        .bind(&row.readme_path)
        .bind(&row.api_docs_path)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Rows for a project, most recently updated first.
    pub async fn list_versions(&self, project_id: &str) -> Result<Vec<VersionRow>> {
        Ok(sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM document_versions WHERE project_id = ?1
             ORDER BY updated_at DESC, created_at DESC, commit_id ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get_version(&self, project_id: &str, commit_id: &str) -> Result<Option<VersionRow>> {
        Ok(sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM document_versions WHERE project_id = ?1 AND commit_id = ?2",
        )
        .bind(project_id)
        .bind(commit_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn delete_version(&self, project_id: &str, commit_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM document_versions WHERE project_id = ?1 AND commit_id = ?2")
            .bind(project_id)
            .bind(commit_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_version_tags(
        &self,
        project_id: &str,
        commit_id: &str,
        tags_json: &str,
        version: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE document_versions
             SET tags = ?3, version = COALESCE(?4, version), updated_at = ?5
             WHERE project_id = ?1 AND commit_id = ?2",
        )
        .bind(project_id)
        .bind(commit_id)
        .bind(tags_json)
        .bind(version)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Predecessor lookup for drift: the most recent other version of the
    /// project, constrained to `branch` when given.
    pub async fn latest_other_version(
        &self,
        project_id: &str,
        branch: Option<&str>,
        exclude_commit: &str,
    ) -> Result<Option<VersionRow>> {
        Ok(sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM document_versions
             WHERE project_id = ?1 AND commit_id != ?2 AND (?3 IS NULL OR branch = ?3)
             ORDER BY updated_at DESC, created_at DESC LIMIT 1",
        )
        .bind(project_id)
        .bind(exclude_commit)
        .bind(branch)
        .fetch_optional(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str) -> ProjectRow {
        ProjectRow {
            id: id.to_string(),
            name: format!("proj-{id}"),
            upstream_url: format!("https://git.example.com/{id}.git"),
            owner_id: "owner-1".to_string(),
            created_at: Utc::now(),
        }
    }

    fn version(project_id: &str, commit: &str, updated_at: DateTime<Utc>) -> VersionRow {
        VersionRow {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            commit_id: commit.to_string(),
            branch: Some("main".to_string()),
            version: None,
            title: format!("docs for {commit}"),
            description: String::new(),
            tags: "[]".to_string(),
            summary_path: Some("summaries/summary.md".to_string()),
            readme_path: Some("docs/README.generated.md".to_string()),
            api_docs_path: Some("docs/api/api-reference.md".to_string()),
            created_at: updated_at,
            updated_at,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_commit() {
        let index = VersionIndex::in_memory().await.unwrap();
        index.insert_project(&project("p1")).await.unwrap();

        let t = Utc::now();
        index.upsert_version(&version("p1", "abc1234", t)).await.unwrap();
        index.upsert_version(&version("p1", "abc1234", t)).await.unwrap();

        let rows = index.list_versions("p1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].commit_id, "abc1234");
    }

    #[tokio::test]
    async fn listing_orders_by_updated_at_desc() {
        let index = VersionIndex::in_memory().await.unwrap();
        index.insert_project(&project("p1")).await.unwrap();

        let older = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let newer = DateTime::from_timestamp(1_700_000_500, 0).unwrap();
        index.upsert_version(&version("p1", "old1111", older)).await.unwrap();
        index.upsert_version(&version("p1", "new2222", newer)).await.unwrap();

        let rows = index.list_versions("p1").await.unwrap();
        assert_eq!(rows[0].commit_id, "new2222");
        assert_eq!(rows[1].commit_id, "old1111");
    }

    #[tokio::test]
    async fn project_delete_cascades_versions() {
        let index = VersionIndex::in_memory().await.unwrap();
        index.insert_project(&project("p1")).await.unwrap();
        index
            .upsert_version(&version("p1", "abc1234", Utc::now()))
            .await
            .unwrap();

        index.delete_project("p1").await.unwrap();
        assert!(index.list_versions("p1").await.unwrap().is_empty());
        assert!(index.find_project("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tags_update_leaves_other_fields() {
        let index = VersionIndex::in_memory().await.unwrap();
        index.insert_project(&project("p1")).await.unwrap();
        let t = Utc::now();
        index.upsert_version(&version("p1", "abc1234", t)).await.unwrap();

        index
            .update_version_tags("p1", "abc1234", "[\"release\"]", None, Utc::now())
            .await
            .unwrap();

        let row = index.get_version("p1", "abc1234").await.unwrap().unwrap();
        assert_eq!(row.tag_list(), vec!["release"]);
        assert_eq!(row.title, "docs for abc1234");
    }

    #[tokio::test]
    async fn predecessor_lookup_respects_branch() {
        let index = VersionIndex::in_memory().await.unwrap();
        index.insert_project(&project("p1")).await.unwrap();

        let t1 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let t2 = DateTime::from_timestamp(1_700_000_500, 0).unwrap();
        index.upsert_version(&version("p1", "aaa0001", t1)).await.unwrap();
        index.upsert_version(&version("p1", "bbb0002", t2)).await.unwrap();

        let prev = index
            .latest_other_version("p1", Some("main"), "bbb0002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(prev.commit_id, "aaa0001");

        let none = index
            .latest_other_version("p1", Some("develop"), "bbb0002")
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn upstream_url_lookup() {
        let index = VersionIndex::in_memory().await.unwrap();
        index.insert_project(&project("p1")).await.unwrap();
        let found = index
            .find_project_by_url("https://git.example.com/p1.git")
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().id, "p1");
    }
}
