//! `docpulse-deliver`: CI entry point for the delivery agent.
//!
//! Required env: `PROVIDER_TOKEN`, `REPO_OWNER`, `REPO_NAME`, `COMMIT_SHA`.
//! Optional env: `TARGET_BRANCH` (default `main`), `ARTIFACTS_DIR` (default
//! `artifacts`), `DOCS_BUCKET_PATH` (`s3://`, `gs://` or `r2://`),
//! `PROVIDER` (default `github`), `PROVIDER_API_BASE`, `UPSTREAM_URL`,
//! `DOCS_ROOT`, `DOCS_S3_ENDPOINT`, `DOCS_PROJECT_ID`.
//!
//! Exit codes: 0 success, 2 bad args, 3 fetch failure, 4 parse aborted
//! (unreachable: extractors are error-tolerant), 5 store failure,
//! 6 delivery failure.

use artifact_gen::DocumentBundle;
use artifact_store::{BucketPath, METADATA_FILE, ObjectStore, S3Store, VersionMetadata};
use clap::Parser;
use colored::Colorize;
use delivery_agent::errors::DeliveryError;
use delivery_agent::provider::{ProviderConfig, ProviderKind};
use delivery_agent::{DeliveryConfig, deliver};
use drift_analyzer::DriftReport;
use impact_report::ImpactReport;
use source_fetcher::Credential;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

const EXIT_BAD_ARGS: u8 = 2;
const EXIT_FETCH: u8 = 3;
const EXIT_STORE: u8 = 5;
const EXIT_DELIVERY: u8 = 6;

#[derive(Debug, Parser)]
#[command(name = "docpulse-deliver", about = "Deliver generated docs to the upstream repository")]
struct Cli {
    /// Path to impact_report.json (default: <ARTIFACTS_DIR>/impact_report.json).
    #[arg(long)]
    impact: Option<PathBuf>,

    /// Path to drift_report.json, if drift analysis ran.
    #[arg(long)]
    drift: Option<PathBuf>,

    /// Pre-rendered docs directory to deliver instead of regenerating.
    #[arg(long)]
    docs: Option<PathBuf>,

    /// Commit sha; overrides COMMIT_SHA.
    #[arg(long)]
    commit: Option<String>,
}

struct Fatal {
    code: u8,
    message: String,
}

impl Fatal {
    fn new(code: u8, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .try_init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_BAD_ARGS);
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(fatal) => {
            eprintln!("{} {}", "error:".red().bold(), redact::sanitize(&fatal.message));
            ExitCode::from(fatal.code)
        }
    }
}

async fn run(cli: Cli) -> Result<(), Fatal> {
    let token = require_env("PROVIDER_TOKEN")?;
    let owner = require_env("REPO_OWNER")?;
    let repo = require_env("REPO_NAME")?;
    let commit = match cli.commit {
        Some(c) => c,
        None => require_env("COMMIT_SHA")?,
    };
    let target_branch = env_or("TARGET_BRANCH", "main");
    let artifacts_dir = PathBuf::from(env_or("ARTIFACTS_DIR", "artifacts"));

    let provider_kind = ProviderKind::parse(&env_or("PROVIDER", "github"))
        .map_err(|e| Fatal::new(EXIT_BAD_ARGS, e.to_string()))?;
    let api_base = std::env::var("PROVIDER_API_BASE")
        .unwrap_or_else(|_| provider_kind.default_api_base().to_string());
    let slug = format!("{owner}/{repo}");
    let upstream_url = std::env::var("UPSTREAM_URL")
        .unwrap_or_else(|_| format!("https://github.com/{slug}.git"));

    // Impact report is the interchange input; without it there is nothing
    // to title or score the PR with.
    let impact_path = cli
        .impact
        .unwrap_or_else(|| artifacts_dir.join("impact_report.json"));
    let impact: ImpactReport = read_json(&impact_path)
        .map_err(|e| Fatal::new(EXIT_BAD_ARGS, format!("impact report: {e}")))?;

    if !commit.starts_with(impact.context.short_sha()) && commit != impact.context.commit_sha {
        println!(
            "{} impact report commit {} differs from requested {commit}",
            "warning:".yellow(),
            impact.context.short_sha()
        );
    }

    let drift: Option<DriftReport> = match &cli.drift {
        Some(path) => Some(
            read_json(path).map_err(|e| Fatal::new(EXIT_BAD_ARGS, format!("drift report: {e}")))?,
        ),
        None => None,
    };

    // Bundle: pre-rendered directory wins, otherwise regenerate.
    let bundle = match &cli.docs {
        Some(dir) => read_docs_dir(dir)
            .map_err(|e| Fatal::new(EXIT_BAD_ARGS, format!("docs dir: {e}")))?,
        None => match artifact_gen::generate(&impact, drift.as_ref()) {
            Ok(bundle) => bundle,
            Err(e) => {
                println!(
                    "{} generation failed, delivering degraded summary: {e}",
                    "warning:".yellow()
                );
                artifact_gen::degraded_bundle(&impact.context, &e.to_string())
            }
        },
    };

    // Optional object-store upload before delivery.
    if let Ok(raw) = std::env::var("DOCS_BUCKET_PATH") {
        upload_to_bucket(&raw, &slug, &commit, &impact, &bundle)
            .await
            .map_err(|e| Fatal::new(EXIT_STORE, e))?;
        println!("{} bundle uploaded to {raw}", "ok:".green());
    }

    let cfg = DeliveryConfig {
        provider: ProviderConfig {
            kind: provider_kind,
            base_api: api_base,
            token: token.clone(),
        },
        repo_slug: slug.clone(),
        upstream_url,
        target_branch,
        docs_root: env_or("DOCS_ROOT", ""),
        credential: Some(Credential::token(token)),
    };

    match deliver(&cfg, &impact, &bundle).await {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                println!("{} {warning}", "warning:".yellow());
            }
            if let Some(pr) = &outcome.pull_request {
                let action = if pr.created { "opened" } else { "updated" };
                println!("{} pull request {action}: {}", "ok:".green().bold(), pr.url);
            }
            Ok(())
        }
        Err(DeliveryError::Fetch(e)) => Err(Fatal::new(EXIT_FETCH, e.to_string())),
        Err(e) => Err(Fatal::new(EXIT_DELIVERY, e.to_string())),
    }
}

fn require_env(name: &str) -> Result<String, Fatal> {
    std::env::var(name)
        .map_err(|_| Fatal::new(EXIT_BAD_ARGS, format!("missing required env var {name}")))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("{}: {e}", path.display()))
}

fn read_docs_dir(dir: &Path) -> Result<DocumentBundle, String> {
    if !dir.is_dir() {
        return Err(format!("{} is not a directory", dir.display()));
    }
    let mut bundle = DocumentBundle::default();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| e.to_string())?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let bytes = std::fs::read(entry.path()).map_err(|e| e.to_string())?;
        bundle.insert(rel, bytes);
    }
    if bundle.is_empty() {
        return Err(format!("{} contains no files", dir.display()));
    }
    Ok(bundle)
}

/// Upload the bundle (objects first, metadata last) under the bucket prefix.
async fn upload_to_bucket(
    raw: &str,
    slug: &str,
    commit: &str,
    impact: &ImpactReport,
    bundle: &DocumentBundle,
) -> Result<(), String> {
    let parsed = BucketPath::parse(raw).map_err(|e| e.to_string())?;
    let endpoint = std::env::var("DOCS_S3_ENDPOINT").ok();
    let store = S3Store::from_env(parsed.bucket.clone(), endpoint.as_deref()).await;

    let project_id =
        std::env::var("DOCS_PROJECT_ID").unwrap_or_else(|_| slug.replace('/', "-"));
    let base = if parsed.prefix.is_empty() {
        format!("projects/{project_id}/commits/{commit}/")
    } else {
        format!("{}/projects/{project_id}/commits/{commit}/", parsed.prefix)
    };

    for (path, bytes) in bundle.iter() {
        store
            .put(&format!("{base}{path}"), bytes::Bytes::from(bytes.clone()))
            .await
            .map_err(|e| e.to_string())?;
    }

    let now = chrono::Utc::now();
    let metadata = VersionMetadata {
        version: None,
        branch: Some(impact.context.branch.clone()),
        commit: commit.to_string(),
        commit_url: None,
        branch_url: None,
        tags: Vec::new(),
        created_at: now,
        updated_at: now,
        title: format!("docs for {}", impact.context.short_sha()),
        description: impact
            .context
            .commit_message
            .lines()
            .next()
            .unwrap_or("")
            .to_string(),
    };
    store
        .put(
            &format!("{base}{METADATA_FILE}"),
            bytes::Bytes::from(metadata.to_json_bytes().map_err(|e| e.to_string())?),
        )
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_accepts_contract_flags() {
        let cli = Cli::try_parse_from([
            "docpulse-deliver",
            "--impact",
            "artifacts/impact_report.json",
            "--drift",
            "artifacts/drift_report.json",
            "--docs",
            "artifacts/docs",
            "--commit",
            "abc1234",
        ])
        .unwrap();
        assert_eq!(cli.commit.as_deref(), Some("abc1234"));
        assert!(cli.impact.is_some() && cli.drift.is_some() && cli.docs.is_some());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["docpulse-deliver", "--force-push"]).is_err());
    }

    #[test]
    fn docs_dir_reader_requires_files() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(read_docs_dir(dir.path()).is_err());
        std::fs::create_dir_all(dir.path().join("summaries")).unwrap();
        std::fs::write(dir.path().join("summaries/summary.md"), "# s\n").unwrap();
        let bundle = read_docs_dir(dir.path()).unwrap();
        assert!(bundle.get("summaries/summary.md").is_some());
    }
}
