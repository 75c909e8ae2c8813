//! Store behavior against the filesystem backend and an in-memory index.

use artifact_gen::{DocumentBundle, SUMMARY_PATH};
use artifact_store::{
    ArtifactStore, FsStore, ProjectRow, SearchFilters, UploadRequest, VersionIndex,
};
use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;

async fn store_with_project(project: &str) -> (TempDir, ArtifactStore) {
    let dir = TempDir::new().unwrap();
    let index = VersionIndex::in_memory().await.unwrap();
    index
        .insert_project(&ProjectRow {
            id: project.to_string(),
            name: project.to_string(),
            upstream_url: format!("https://git.example.com/{project}.git"),
            owner_id: "owner-1".to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    let store = ArtifactStore::new(Arc::new(FsStore::new(dir.path())), index);
    (dir, store)
}

fn bundle(summary: &str) -> DocumentBundle {
    let mut b = DocumentBundle::default();
    b.insert(SUMMARY_PATH, summary.as_bytes().to_vec());
    b.insert(
        "docs/README.generated.md",
        b"# demo \xE2\x80\x94 Generated Documentation\n".to_vec(),
    );
    b.insert("docs/api/api-reference.md", b"# API Reference\n| GET | `/hello` |\n".to_vec());
    b
}

fn upload_req(branch: &str, tags: &[&str]) -> UploadRequest {
    UploadRequest {
        title: "docs".into(),
        description: "generated".into(),
        branch: Some(branch.into()),
        version: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        commit_url: None,
        branch_url: None,
    }
}

#[tokio::test]
async fn upload_then_get_content_roundtrips_bytes() {
    let (_dir, store) = store_with_project("p1").await;
    let b = bundle("# Documentation Summary\nGET /hello added\n");
    store.upload("p1", "abc1234", &b, upload_req("main", &[])).await.unwrap();

    let content = store.get_content("p1", "abc1234").await.unwrap();
    assert_eq!(
        content.get("summaries/summary.md").map(Vec::as_slice),
        b.get(SUMMARY_PATH)
    );
    // metadata.json exists alongside artifacts
    assert!(content.contains_key("metadata.json"));
}

#[tokio::test]
async fn list_only_returns_commits_with_metadata() {
    let (_dir, store) = store_with_project("p1").await;
    store
        .upload("p1", "abc1234", &bundle("s\n"), upload_req("main", &[]))
        .await
        .unwrap();

    let commits = store.list("p1").await.unwrap();
    assert_eq!(commits, vec!["abc1234"]);
    for commit in &commits {
        assert!(store.get_metadata("p1", commit).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn reupload_is_idempotent_and_list_has_one_entry() {
    let (_dir, store) = store_with_project("p1").await;
    let b = bundle("same bytes\n");
    let first = store.upload("p1", "abc1234", &b, upload_req("main", &[])).await.unwrap();
    let second = store.upload("p1", "abc1234", &b, upload_req("main", &[])).await.unwrap();

    // createdAt survives the overwrite, updatedAt moves forward
    assert_eq!(first.created_at, second.created_at);
    assert!(second.updated_at >= first.updated_at);

    assert_eq!(store.list("p1").await.unwrap(), vec!["abc1234"]);
    let summary = store.get_summary("p1", "abc1234").await.unwrap().unwrap();
    assert_eq!(summary, b"same bytes\n");
}

#[tokio::test]
async fn delete_removes_objects_then_index_row() {
    let (_dir, store) = store_with_project("p1").await;
    store
        .upload("p1", "abc1234", &bundle("s\n"), upload_req("main", &[]))
        .await
        .unwrap();

    store.delete("p1", "abc1234").await.unwrap();

    assert!(store.get_metadata("p1", "abc1234").await.unwrap().is_none());
    assert!(store.get_content("p1", "abc1234").await.unwrap().is_empty());
    assert!(store.list("p1").await.unwrap().is_empty());
}

#[tokio::test]
async fn update_tags_rewrites_metadata_only() {
    let (_dir, store) = store_with_project("p1").await;
    store
        .upload("p1", "abc1234", &bundle("s\n"), upload_req("main", &["draft"]))
        .await
        .unwrap();

    let meta = store
        .update_tags("p1", "abc1234", vec!["release".into()], Some("1.0.0".into()))
        .await
        .unwrap();
    assert_eq!(meta.tags, vec!["release"]);
    assert_eq!(meta.version.as_deref(), Some("1.0.0"));

    let reread = store.get_metadata("p1", "abc1234").await.unwrap().unwrap();
    assert_eq!(reread.tags, vec!["release"]);
    assert_eq!(reread.title, "docs");
    // artifacts untouched
    let summary = store.get_summary("p1", "abc1234").await.unwrap().unwrap();
    assert_eq!(summary, b"s\n");
}

#[tokio::test]
async fn search_is_case_insensitive_and_filtered() {
    let (_dir, store) = store_with_project("p1").await;
    store
        .upload(
            "p1",
            "aaa1111",
            &bundle("# Summary\nEndpoint GET /Hello added\n"),
            upload_req("main", &["release"]),
        )
        .await
        .unwrap();
    store
        .upload(
            "p1",
            "bbb2222",
            &bundle("# Summary\nnothing here\n"),
            upload_req("develop", &[]),
        )
        .await
        .unwrap();

    let hits = store
        .search("p1", "get /hello", &SearchFilters::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].commit_id, "aaa1111");
    assert_eq!(hits[0].path, "summaries/summary.md");
    assert_eq!(hits[0].line, 2);
    assert!(hits[0].snippet.contains("GET /Hello"));

    // branch predicate ANDs with the text match
    let hits = store
        .search(
            "p1",
            "get /hello",
            &SearchFilters {
                branch: Some("develop".into()),
                ..SearchFilters::default()
            },
        )
        .await
        .unwrap();
    assert!(hits.is_empty());

    // tag predicate
    let hits = store
        .search(
            "p1",
            "get /hello",
            &SearchFilters {
                tags: Some(vec!["release".into()]),
                ..SearchFilters::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn previous_content_finds_branch_predecessor() {
    let (_dir, store) = store_with_project("p1").await;
    store
        .upload("p1", "aaa1111", &bundle("old\n"), upload_req("main", &[]))
        .await
        .unwrap();
    store
        .upload("p1", "bbb2222", &bundle("new\n"), upload_req("main", &[]))
        .await
        .unwrap();

    let (prev_commit, content) = store
        .previous_content("p1", Some("main"), "bbb2222")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prev_commit, "aaa1111");
    assert_eq!(content.get("summaries/summary.md").unwrap(), b"old\n");

    assert!(
        store
            .previous_content("p1", Some("main"), "aaa1111")
            .await
            .unwrap()
            .map(|(c, _)| c)
            == Some("bbb2222".to_string())
    );
}
