//! Per-commit pipeline execution: sequential stages with deadlines.

use crate::errors::PipelineError;
use crate::job::PipelineJob;
use crate::status::{RunOutcome, Stage, StatusRegistry};
use artifact_store::{ArtifactStore, UploadRequest};
use change_detector::filter::ScanConfig;
use change_detector::DetectedChange;
use delivery_agent::DeliveryConfig;
use drift_analyzer::readers::DocSet;
use impact_report::{ChangeKind, FileChange, FileFeatures, score_file};
use source_fetcher::FetchRequest;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Optional drift artifact written alongside the bundle.
pub const DRIFT_REPORT_PATH: &str = "drift_report.json";

/// Per-stage wall-clock budgets.
#[derive(Debug, Clone, Copy)]
pub struct StageDeadlines {
    pub fetch: Duration,
    pub parse: Duration,
    pub upload: Duration,
    pub deliver: Duration,
}

impl Default for StageDeadlines {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(120),
            parse: Duration::from_secs(60),
            upload: Duration::from_secs(300),
            deliver: Duration::from_secs(120),
        }
    }
}

/// Everything a worker needs to run pipelines.
pub struct PipelineDeps {
    pub store: ArtifactStore,
    pub scan: ScanConfig,
    /// Delivery is optional: projects without an upstream PR target still
    /// produce stored bundles.
    pub delivery: Option<DeliveryConfig>,
    pub registry: StatusRegistry,
    pub deadlines: StageDeadlines,
    /// Cooperative cancellation, checked at stage boundaries.
    pub cancelled: Arc<AtomicBool>,
    /// Fault injection for exercising the degraded-generation path in tests.
    pub inject_generation_failure: Option<String>,
}

impl PipelineDeps {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            scan: ScanConfig::default(),
            delivery: None,
            registry: StatusRegistry::default(),
            deadlines: StageDeadlines::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
            inject_generation_failure: None,
        }
    }
}

/// Run one job to a terminal outcome. Never panics the worker; every error
/// lands in the status registry as `failed(stage, reason)`.
#[instrument(skip_all, fields(key = %job.key))]
pub async fn run_pipeline(deps: &PipelineDeps, job: PipelineJob) -> RunOutcome {
    let run_id = deps.registry.begin(&job.key);
    let outcome = match execute(deps, &job, run_id).await {
        Ok(outcome) => outcome,
        Err((stage, err)) => {
            let reason = redact::sanitize(&err.to_string());
            warn!(%stage, %reason, "pipeline failed");
            RunOutcome::Failed {
                stage: stage.to_string(),
                reason,
            }
        }
    };
    deps.registry.finish(run_id, outcome.clone());
    outcome
}

type StageResult<T> = std::result::Result<T, (Stage, PipelineError)>;

async fn execute(deps: &PipelineDeps, job: &PipelineJob, run_id: Uuid) -> StageResult<RunOutcome> {
    let key = &job.key;
    let payload = &job.payload;
    let mut warnings: Vec<String> = Vec::new();

    // ---- fetching -------------------------------------------------------
    check_cancelled(deps, Stage::Fetching)?;
    deps.registry.set_stage(run_id, Stage::Fetching);
    let mut req = FetchRequest::new(payload.source.clone());
    req.credential = payload.credential.clone();
    req.branch = payload.branch.clone();
    req.revision = Some(key.commit_id.clone());
    let fetched = with_deadline(deps.deadlines.fetch, Stage::Fetching, source_fetcher::fetch(req))
        .await?;

    let repo_name = payload
        .repository_name
        .clone()
        .unwrap_or_else(|| key.project_id.clone());
    let ctx = fetched.commit().to_context(&repo_name);

    // ---- detecting ------------------------------------------------------
    check_cancelled(deps, Stage::Detecting)?;
    deps.registry.set_stage(run_id, Stage::Detecting);
    let changes = {
        let path = fetched.path().to_path_buf();
        let sha = fetched.commit().sha.clone();
        let scan = deps.scan.clone();
        with_deadline(
            deps.deadlines.parse,
            Stage::Detecting,
            async move {
                task::spawn_blocking(move || change_detector::detect_changes(&path, &sha, &scan))
                    .await
                    .map_err(PipelineError::from)?
                    .map_err(PipelineError::from)
            },
        )
        .await?
    };

    // ---- parsing + scoring ----------------------------------------------
    check_cancelled(deps, Stage::Parsing)?;
    deps.registry.set_stage(run_id, Stage::Parsing);
    let file_changes = extract_and_score(&changes);

    deps.registry.set_stage(run_id, Stage::Scoring);
    let impact = impact_report::build_report(
        artifact_gen::TOOL_VERSION,
        ctx.commit_timestamp,
        ctx,
        file_changes,
    );
    info!(
        files = impact.analysis_summary.total_files_changed,
        severity = %impact.analysis_summary.highest_severity,
        "impact scored"
    );

    // ---- generating + drifting ------------------------------------------
    check_cancelled(deps, Stage::Generating)?;
    deps.registry.set_stage(run_id, Stage::Generating);
    let generated = match &deps.inject_generation_failure {
        Some(message) => Err(message.clone()),
        None => artifact_gen::generate(&impact, None).map_err(|e| e.to_string()),
    };

    let bundle = match generated {
        Ok(first_pass) => {
            check_cancelled(deps, Stage::Drifting)?;
            deps.registry.set_stage(run_id, Stage::Drifting);
            let previous = match deps
                .store
                .previous_content(
                    &key.project_id,
                    Some(impact.context.branch.as_str()),
                    &key.commit_id,
                )
                .await
            {
                Ok(prev) => prev,
                Err(e) => {
                    warnings.push(format!("drift lookup failed: {e}"));
                    None
                }
            };
            let prev_docs = previous.map(|(_, files)| DocSet::from_bytes(&files));
            let drift = drift_analyzer::analyze(&impact, &first_pass.as_docset(), prev_docs.as_ref());

            if drift.is_empty() {
                first_pass
            } else {
                info!(issues = drift.issues.len(), "drift detected");
                let mut regenerated = artifact_gen::generate(&impact, Some(&drift))
                    .map_err(|e| (Stage::Generating, e.into()))?;
                let mut drift_json = serde_json::to_vec_pretty(&drift)
                    .map_err(|e| (Stage::Drifting, artifact_gen::GenError::from(e).into()))?;
                drift_json.push(b'\n');
                regenerated.insert(DRIFT_REPORT_PATH, drift_json);
                regenerated
            }
        }
        Err(message) => {
            // Degraded path: a summary that names the failure still ships.
            warnings.push(format!("generation failed: {message}"));
            artifact_gen::degraded_bundle(&impact.context, &message)
        }
    };

    // ---- storing --------------------------------------------------------
    check_cancelled(deps, Stage::Storing)?;
    deps.registry.set_stage(run_id, Stage::Storing);
    let upload = UploadRequest {
        title: format!("Docs for {}", impact.context.short_sha()),
        description: impact
            .context
            .commit_message
            .lines()
            .next()
            .unwrap_or_default()
            .to_string(),
        branch: Some(impact.context.branch.clone()),
        version: None,
        tags: Vec::new(),
        commit_url: payload.commit_url.clone(),
        branch_url: payload.branch_url.clone(),
    };
    with_deadline(
        deps.deadlines.upload,
        Stage::Storing,
        deps.store.upload(&key.project_id, &key.commit_id, &bundle, upload),
    )
    .await?;

    // ---- delivering -----------------------------------------------------
    if let Some(cfg) = &deps.delivery {
        if auto_docs_enabled(deps, &key.project_id).await {
            check_cancelled(deps, Stage::Delivering)?;
            deps.registry.set_stage(run_id, Stage::Delivering);
            let outcome = with_deadline(
                deps.deadlines.deliver,
                Stage::Delivering,
                delivery_agent::deliver(cfg, &impact, &bundle),
            )
            .await?;
            warnings.extend(outcome.warnings);
        }
    }

    info!(warnings = warnings.len(), "pipeline complete");
    if warnings.is_empty() {
        Ok(RunOutcome::Succeeded)
    } else {
        Ok(RunOutcome::SucceededWithWarnings { warnings })
    }
}

/// Extract features on both sides of every change and score it.
fn extract_and_score(changes: &[DetectedChange]) -> Vec<FileChange> {
    changes
        .iter()
        .map(|change| {
            let old = side_features(change, change.old_text.as_deref());
            let new = side_features(change, change.new_text.as_deref());

            let severity = score_file(
                change.kind,
                old.as_ref().map(|(f, _)| f),
                new.as_ref().map(|(f, _)| f),
                &change.path,
            );

            // Deleted files keep the features that vanished with them.
            let (features, syntax_error) = match change.kind {
                ChangeKind::Deleted => old.unwrap_or_default(),
                _ => new.unwrap_or_default(),
            };

            FileChange {
                path: change.path.clone(),
                change_kind: change.kind,
                language: change.language,
                severity,
                is_binary: change.is_binary,
                syntax_error,
                features,
            }
        })
        .collect()
}

fn side_features(
    change: &DetectedChange,
    text: Option<&str>,
) -> Option<(FileFeatures, bool)> {
    if !change.safe_to_read || !change.language.is_parsable() {
        return None;
    }
    let text = text?;
    let extracted = lang_extract::extract(change.language, text, &change.path);
    Some((extracted.features, extracted.syntax_error))
}

async fn auto_docs_enabled(deps: &PipelineDeps, project_id: &str) -> bool {
    match deps.store.index().get_settings(project_id).await {
        Ok(Some(settings)) => settings.auto_generate_docs,
        Ok(None) => true,
        Err(e) => {
            warn!(%project_id, error = %e, "settings lookup failed, assuming enabled");
            true
        }
    }
}

fn check_cancelled(deps: &PipelineDeps, stage: Stage) -> StageResult<()> {
    if deps.cancelled.load(Ordering::Relaxed) {
        return Err((
            stage,
            PipelineError::Internal("run cancelled at stage boundary".into()),
        ));
    }
    Ok(())
}

async fn with_deadline<T, E, F>(deadline: Duration, stage: Stage, fut: F) -> StageResult<T>
where
    E: Into<PipelineError>,
    F: Future<Output = std::result::Result<T, E>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err((stage, e.into())),
        Err(_) => Err((stage, PipelineError::Deadline(deadline.as_secs()))),
    }
}
