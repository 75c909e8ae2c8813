//! Environment-driven configuration.
//!
//! Defaults are applied for everything non-secret; secrets stay inside the
//! struct and never reach `Debug` output or logs.

use anyhow::{Context, Result, bail};
use delivery_agent::DeliveryConfig;
use delivery_agent::provider::{ProviderConfig, ProviderKind};
use source_fetcher::Credential;

#[derive(Clone)]
pub struct ApiConfig {
    /// Listen port (`DOCPULSE_PORT`, default 8095).
    pub port: u16,
    /// SQLite index URL (`DOCPULSE_DB`).
    pub database_url: String,
    /// Filesystem object-store root, used when no S3 bucket is configured.
    pub data_dir: String,
    /// S3-compatible bucket (`DOCS_S3_BUCKET`) and optional endpoint
    /// (`DOCS_S3_ENDPOINT` for R2 / GCS interop / MinIO).
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>,
    /// Webhook HMAC shared secret (`WEBHOOK_SECRET`).
    pub webhook_secret: String,
    /// Raw `API_AUTH_TOKENS` table, parsed by the auth registry.
    pub auth_tokens: String,
    /// Optional delivery target; docs are stored either way.
    delivery: Option<DeliverySettings>,
}

#[derive(Clone)]
struct DeliverySettings {
    provider: ProviderKind,
    api_base: String,
    token: String,
    repo_slug: String,
    upstream_url: String,
    target_branch: String,
    docs_root: String,
}

impl ApiConfig {
    /// Programmatic configuration with defaults; used by embedders and tests.
    pub fn new(webhook_secret: impl Into<String>, auth_tokens: impl Into<String>) -> Self {
        Self {
            port: 8095,
            database_url: "sqlite::memory:".into(),
            data_dir: "docpulse_data".into(),
            s3_bucket: None,
            s3_endpoint: None,
            webhook_secret: webhook_secret.into(),
            auth_tokens: auth_tokens.into(),
            delivery: None,
        }
    }

    pub fn load_from_env() -> Result<Self> {
        let port = match std::env::var("DOCPULSE_PORT") {
            Ok(raw) => raw.parse().context("invalid DOCPULSE_PORT")?,
            Err(_) => 8095,
        };

        let webhook_secret = std::env::var("WEBHOOK_SECRET").unwrap_or_default();
        if webhook_secret.is_empty() {
            bail!("WEBHOOK_SECRET must be set");
        }

        let delivery = match std::env::var("DELIVERY_REPO_SLUG") {
            Ok(repo_slug) => {
                let provider = ProviderKind::parse(
                    &std::env::var("DELIVERY_PROVIDER").unwrap_or_else(|_| "github".into()),
                )
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
                let token = std::env::var("PROVIDER_TOKEN")
                    .context("PROVIDER_TOKEN required when delivery is configured")?;
                Some(DeliverySettings {
                    provider,
                    api_base: std::env::var("PROVIDER_API_BASE")
                        .unwrap_or_else(|_| provider.default_api_base().to_string()),
                    token,
                    upstream_url: std::env::var("DELIVERY_UPSTREAM_URL").unwrap_or_else(|_| {
                        format!("https://github.com/{repo_slug}.git")
                    }),
                    repo_slug,
                    target_branch: std::env::var("TARGET_BRANCH")
                        .unwrap_or_else(|_| "main".into()),
                    docs_root: std::env::var("DOCS_ROOT").unwrap_or_default(),
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            port,
            database_url: std::env::var("DOCPULSE_DB")
                .unwrap_or_else(|_| "sqlite://docpulse.db".into()),
            data_dir: std::env::var("DOCS_DATA_DIR").unwrap_or_else(|_| "docpulse_data".into()),
            s3_bucket: std::env::var("DOCS_S3_BUCKET").ok(),
            s3_endpoint: std::env::var("DOCS_S3_ENDPOINT").ok(),
            webhook_secret,
            auth_tokens: std::env::var("API_AUTH_TOKENS").unwrap_or_default(),
            delivery,
        })
    }

    /// Delivery configuration for the pipeline, when an upstream is set.
    pub fn delivery_config(&self) -> Option<DeliveryConfig> {
        self.delivery.as_ref().map(|d| DeliveryConfig {
            provider: ProviderConfig {
                kind: d.provider,
                base_api: d.api_base.clone(),
                token: d.token.clone(),
            },
            repo_slug: d.repo_slug.clone(),
            upstream_url: d.upstream_url.clone(),
            target_branch: d.target_branch.clone(),
            docs_root: d.docs_root.clone(),
            credential: Some(Credential::token(d.token.clone())),
        })
    }
}
