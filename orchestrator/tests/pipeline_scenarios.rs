//! End-to-end pipeline scenarios against a scratch git repo, the filesystem
//! object store and an in-memory index.

use artifact_store::{ArtifactStore, FsStore, ProjectRow, VersionIndex};
use chrono::Utc;
use git2::{Repository, Signature};
use impact_report::ImpactReport;
use orchestrator::job::{JobKey, PipelineJob, TriggerPayload};
use orchestrator::{PipelineDeps, RunOutcome, run_pipeline};
use source_fetcher::RepoSource;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn sig() -> Signature<'static> {
    Signature::now("tester", "tester@example.com").unwrap()
}

fn commit_all(repo: &Repository, message: &str) -> String {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig(), &sig(), message, &tree, &parents)
        .unwrap()
        .to_string()
}

async fn deps_with_project(project_id: &str, upstream: &Path) -> (TempDir, PipelineDeps) {
    let objects_dir = TempDir::new().unwrap();
    let index = VersionIndex::in_memory().await.unwrap();
    index
        .insert_project(&ProjectRow {
            id: project_id.to_string(),
            name: project_id.to_string(),
            upstream_url: upstream.to_string_lossy().into_owned(),
            owner_id: "owner-1".to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    let store = ArtifactStore::new(Arc::new(FsStore::new(objects_dir.path())), index);
    (objects_dir, PipelineDeps::new(store))
}

fn job_for(project_id: &str, commit: &str, repo_dir: &Path) -> PipelineJob {
    PipelineJob {
        key: JobKey::new(project_id, commit),
        payload: TriggerPayload {
            source: RepoSource::LocalPath(repo_dir.to_path_buf()),
            branch: None,
            credential: None,
            repository_name: Some("demo".to_string()),
            commit_url: None,
            branch_url: None,
        },
    }
}

async fn stored_impact(deps: &PipelineDeps, project: &str, commit: &str) -> ImpactReport {
    let content = deps.store.get_content(project, commit).await.unwrap();
    serde_json::from_slice(content.get("impact_report.json").unwrap()).unwrap()
}

#[tokio::test]
async fn initial_commit_scores_minor_with_one_endpoint() {
    let repo_dir = TempDir::new().unwrap();
    let repo = Repository::init(repo_dir.path()).unwrap();
    std::fs::create_dir_all(repo_dir.path().join("src")).unwrap();
    std::fs::write(
        repo_dir.path().join("src/app.py"),
        "@app.route(\"/hello\")\ndef hello():\n    return \"hi\"\n",
    )
    .unwrap();
    let commit = commit_all(&repo, "feat: hello endpoint");

    let (_objects, deps) = deps_with_project("p1", repo_dir.path()).await;
    let outcome = run_pipeline(&deps, job_for("p1", &commit, repo_dir.path())).await;
    assert_eq!(outcome, RunOutcome::Succeeded);

    let impact = stored_impact(&deps, "p1", &commit).await;
    assert_eq!(impact.changes.len(), 1);
    let change = &impact.changes[0];
    assert_eq!(change.path, "src/app.py");
    assert_eq!(change.change_kind.to_string(), "ADDED");
    assert_eq!(change.language.to_string(), "python");
    assert_eq!(change.features.api_endpoints.len(), 1);
    assert_eq!(change.features.api_endpoints[0].verb, "GET");
    assert_eq!(change.features.api_endpoints[0].route, "/hello");
    assert_eq!(impact.analysis_summary.highest_severity.to_string(), "MINOR");
    assert!(!impact.analysis_summary.breaking_changes_detected);

    // api-reference carries exactly one endpoint row
    let api = deps.store.get_api_docs("p1", &commit).await.unwrap().unwrap();
    let api = String::from_utf8(api).unwrap();
    assert_eq!(api.matches("| GET | `/hello` |").count(), 1);
    assert_eq!(api.matches("Handles GET /hello").count(), 1);
}

#[tokio::test]
async fn endpoint_removal_is_breaking_with_stale_drift() {
    let repo_dir = TempDir::new().unwrap();
    let repo = Repository::init(repo_dir.path()).unwrap();
    std::fs::write(
        repo_dir.path().join("routes.js"),
        "router.get('/users', list);\nrouter.get('/health', ping);\n",
    )
    .unwrap();
    let c1 = commit_all(&repo, "feat: users endpoint");

    std::fs::write(repo_dir.path().join("routes.js"), "router.get('/health', ping);\n").unwrap();
    let c2 = commit_all(&repo, "chore: drop users endpoint");

    let (_objects, deps) = deps_with_project("p1", repo_dir.path()).await;
    assert_eq!(
        run_pipeline(&deps, job_for("p1", &c1, repo_dir.path())).await,
        RunOutcome::Succeeded
    );
    assert_eq!(
        run_pipeline(&deps, job_for("p1", &c2, repo_dir.path())).await,
        RunOutcome::Succeeded
    );

    let impact = stored_impact(&deps, "p1", &c2).await;
    assert_eq!(impact.analysis_summary.highest_severity.to_string(), "MAJOR");
    assert!(impact.analysis_summary.breaking_changes_detected);

    let content = deps.store.get_content("p1", &c2).await.unwrap();
    let drift: drift_analyzer::DriftReport =
        serde_json::from_slice(content.get("drift_report.json").unwrap()).unwrap();
    let stale = drift
        .issues
        .iter()
        .find(|i| i.kind == drift_analyzer::DriftKind::StaleEndpoint)
        .expect("stale endpoint issue");
    assert_eq!(stale.path, "/users");
    assert_eq!(stale.severity, drift_analyzer::DriftSeverity::High);

    // drift issue is rendered into the summary
    let summary = deps.store.get_summary("p1", &c2).await.unwrap().unwrap();
    let summary = String::from_utf8(summary).unwrap();
    assert!(summary.contains("STALE_ENDPOINT `/users`"));

    // the PR title for this run would carry the MAJOR marker
    assert!(delivery_agent::pr_title(&impact).contains("MAJOR"));
}

#[tokio::test]
async fn rerun_is_byte_identical_and_list_has_one_entry() {
    let repo_dir = TempDir::new().unwrap();
    let repo = Repository::init(repo_dir.path()).unwrap();
    std::fs::create_dir_all(repo_dir.path().join("src")).unwrap();
    std::fs::write(
        repo_dir.path().join("src/app.py"),
        "@app.route(\"/hello\")\ndef hello():\n    return \"hi\"\n",
    )
    .unwrap();
    let commit = commit_all(&repo, "feat: hello endpoint");

    let (_objects, deps) = deps_with_project("p1", repo_dir.path()).await;
    run_pipeline(&deps, job_for("p1", &commit, repo_dir.path())).await;
    let first = deps.store.get_summary("p1", &commit).await.unwrap().unwrap();
    let first_readme = deps.store.get_readme("p1", &commit).await.unwrap().unwrap();
    let first_api = deps.store.get_api_docs("p1", &commit).await.unwrap().unwrap();

    run_pipeline(&deps, job_for("p1", &commit, repo_dir.path())).await;
    let second = deps.store.get_summary("p1", &commit).await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first_readme,
        deps.store.get_readme("p1", &commit).await.unwrap().unwrap()
    );
    assert_eq!(
        first_api,
        deps.store.get_api_docs("p1", &commit).await.unwrap().unwrap()
    );

    assert_eq!(deps.store.list("p1").await.unwrap(), vec![commit.clone()]);
}

// Injected generation failure: the degraded summary still ships and the
// run succeeds with warnings.
#[tokio::test]
async fn generation_failure_ships_degraded_summary() {
    let repo_dir = TempDir::new().unwrap();
    let repo = Repository::init(repo_dir.path()).unwrap();
    std::fs::write(repo_dir.path().join("app.py"), "def f():\n    pass\n").unwrap();
    let commit = commit_all(&repo, "feat: f");

    let (_objects, mut deps) = deps_with_project("p1", repo_dir.path()).await;
    deps.inject_generation_failure = Some("template engine exploded".to_string());

    let outcome = run_pipeline(&deps, job_for("p1", &commit, repo_dir.path())).await;
    match outcome {
        RunOutcome::SucceededWithWarnings { warnings } => {
            assert!(warnings.iter().any(|w| w.contains("generation failed")));
        }
        other => panic!("expected warnings outcome, got {other:?}"),
    }

    let summary = deps.store.get_summary("p1", &commit).await.unwrap().unwrap();
    let summary = String::from_utf8(summary).unwrap();
    assert!(summary.contains("## Generation Failed"));
    assert!(summary.contains("template engine exploded"));

    // metadata still landed, so the commit is listed
    assert_eq!(deps.store.list("p1").await.unwrap(), vec![commit]);
}

// Unknown revision fails at the fetching stage without poisoning the key.
#[tokio::test]
async fn failed_run_reports_stage_and_reason() {
    let repo_dir = TempDir::new().unwrap();
    let repo = Repository::init(repo_dir.path()).unwrap();
    std::fs::write(repo_dir.path().join("a.txt"), "x\n").unwrap();
    let good = commit_all(&repo, "initial");

    let (_objects, deps) = deps_with_project("p1", repo_dir.path()).await;
    let outcome = run_pipeline(&deps, job_for("p1", "deadbeef", repo_dir.path())).await;
    match outcome {
        RunOutcome::Failed { stage, .. } => assert_eq!(stage, "fetching"),
        other => panic!("expected failure, got {other:?}"),
    }

    // The key is not poisoned: a valid commit for the project still runs.
    let outcome = run_pipeline(&deps, job_for("p1", &good, repo_dir.path())).await;
    assert_eq!(outcome, RunOutcome::Succeeded);
}
